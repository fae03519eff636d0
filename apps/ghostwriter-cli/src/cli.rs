use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgGroup, Args, Parser, Subcommand};
use colored::Colorize;
use ghostwriter_core::{
    Engine, EngineConfig, ExportFormat, SessionStore, export_to_file, load_project_config,
    load_prompts,
};
use tracing::info;

use crate::output;
use crate::tui::App;

#[derive(Debug, Parser)]
#[command(
    name = "ghostwriter",
    version,
    about = "Generate written content with Gemini and check it for originality"
)]
pub struct Cli {
    /// Directory holding `.ghostwriter/` state (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Provider request timeout in seconds (overrides generation.timeoutSecs)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate content from a prompt or template and check it for originality
    #[command(group(ArgGroup::new("input").required(true).args(["prompt", "template"])))]
    Generate {
        /// The prompt to send to the model
        #[arg(short, long)]
        prompt: Option<String>,

        /// Name of a content template (see `ghostwriter templates`)
        #[arg(short, long)]
        template: Option<String>,

        /// Template variable as key=value (repeatable)
        #[arg(long = "var", value_parser = parse_var, requires = "template")]
        vars: Vec<(String, String)>,

        /// Use this model for every call instead of the configured pool
        #[arg(short, long)]
        model: Option<String>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Rewrite the last generated content to make it more original
    Regenerate {
        #[command(flatten)]
        export: ExportArgs,
    },

    /// Search the web for text without generating anything
    Check {
        /// The text to check
        #[arg(short, long)]
        text: String,
    },

    /// List available content templates
    Templates,

    /// Show request count and cooldown for the current session
    Status,

    /// Delete the persisted session
    Reset,

    /// Start the interactive screen
    Interactive {
        /// Use this model for every call instead of the configured pool
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Write the generated text to this file
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Export format: txt, csv, json or md (inferred from the file extension by default)
    #[arg(short, long, requires = "export")]
    pub format: Option<ExportFormat>,
}

impl Cli {
    /// Working directory and log name for this invocation.
    ///
    /// Commands that never reach a provider get no log file.
    pub fn log_context(&self) -> (PathBuf, Option<&'static str>) {
        let command = match self.command {
            Commands::Generate { .. } => Some("generate"),
            Commands::Regenerate { .. } => Some("regenerate"),
            Commands::Check { .. } => Some("check"),
            Commands::Interactive { .. } => Some("interactive"),
            Commands::Templates | Commands::Status | Commands::Reset => None,
        };
        (self.dir.clone(), command)
    }

    /// Whether log lines may go to stderr. The interactive screen owns the terminal.
    pub fn logs_to_stderr(&self) -> bool {
        !matches!(self.command, Commands::Interactive { .. })
    }

    pub async fn run(self) -> Result<()> {
        let Cli {
            dir,
            timeout,
            command,
        } = self;
        match command {
            Commands::Generate {
                prompt,
                template,
                vars,
                model,
                export,
            } => {
                let engine = build_engine(&dir, model, timeout)?;
                let mut lease = engine.session_store().lock().await?;
                let session = lease.session_mut();

                let result = match (prompt, template) {
                    (_, Some(template)) => {
                        let vars = serde_json::Value::Object(
                            vars.into_iter()
                                .map(|(k, v)| (k, serde_json::Value::String(v)))
                                .collect(),
                        );
                        engine
                            .workflow()
                            .generate_from_template(session, &template, &vars)
                            .await
                    }
                    (prompt, None) => {
                        let prompt = prompt.unwrap_or_default();
                        engine.workflow().generate(session, &prompt).await
                    }
                };
                lease.commit()?;
                let content = result?;

                print!("{}", output::format_generated(&content));
                if !content.placeholder {
                    write_export(&content.text, export)?;
                }
                Ok(())
            }
            Commands::Regenerate { export } => {
                let engine = build_engine(&dir, None, timeout)?;
                let mut lease = engine.session_store().lock().await?;
                let result = engine.workflow().regenerate(lease.session_mut()).await;
                lease.commit()?;
                let text = result?;

                print!("{}", output::format_regenerated(&text));
                write_export(&text, export)?;
                Ok(())
            }
            Commands::Check { text } => {
                let engine = build_engine(&dir, None, timeout)?;
                let outcome = engine.workflow().check_originality(&text).await?;
                let verdict = outcome.originality(engine.workflow().display_limit());
                print!("{}", output::format_originality(&outcome, verdict));
                Ok(())
            }
            Commands::Templates => {
                let config = EngineConfig::builder().work_dir(dir).build();
                let project = load_project_config(&config.config_path())?;
                let prompts = load_prompts(config.work_dir(), &project.prompts)?;

                println!("{}", "Available templates:".bold());
                for name in prompts.content_templates() {
                    println!("  {name}");
                }
                Ok(())
            }
            Commands::Status => {
                let config = EngineConfig::builder().work_dir(dir).build();
                let project = load_project_config(&config.config_path())?;
                let session = SessionStore::new(config.session_path()).load()?;
                print!(
                    "{}",
                    output::format_status(&session, &project.limits.rate_limiter(), Utc::now())
                );
                Ok(())
            }
            Commands::Reset => {
                let config = EngineConfig::builder().work_dir(dir).build();
                SessionStore::new(config.session_path())
                    .lock()
                    .await?
                    .clear()?;
                println!("{}", "Session reset.".green());
                Ok(())
            }
            Commands::Interactive { model } => {
                let engine = build_engine(&dir, model, timeout)?;
                let mut terminal = ratatui::init();
                let result = App::new().run(&engine, &mut terminal).await;
                ratatui::restore();
                result
            }
        }
    }
}

fn build_engine(dir: &Path, model: Option<String>, timeout: Option<u64>) -> Result<Engine> {
    let builder = EngineConfig::builder().work_dir(dir.to_path_buf());
    let config = match (model, timeout) {
        (Some(model), Some(secs)) => builder.model(model).timeout_secs(secs).build(),
        (Some(model), None) => builder.model(model).build(),
        (None, Some(secs)) => builder.timeout_secs(secs).build(),
        (None, None) => builder.build(),
    };
    Engine::new(config).context("failed to initialize engine")
}

fn write_export(text: &str, args: ExportArgs) -> Result<()> {
    let Some(path) = args.export else {
        return Ok(());
    };
    let format = export_to_file(text, &path, args.format)?;
    info!(path = %path.display(), ?format, "export written");
    println!(
        "{}",
        format!("Saved as {} to {}", format.extension(), path.display()).green()
    );
    Ok(())
}

/// Parse a `key=value` template variable.
fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid variable '{s}', expected key=value"))?;
    if key.is_empty() {
        return Err(format!("invalid variable '{s}', key is empty"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("ghostwriter").chain(args.iter().copied()))
    }

    #[test]
    fn test_should_parse_generate_with_prompt() {
        let cli = parse(&["generate", "--prompt", "Write a haiku about rain"]).unwrap();
        match cli.command {
            Commands::Generate { prompt, template, .. } => {
                assert_eq!(prompt.as_deref(), Some("Write a haiku about rain"));
                assert!(template.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.dir, PathBuf::from("."));
    }

    #[test]
    fn test_should_parse_template_vars_and_export() {
        let cli = parse(&[
            "--dir",
            "/tmp/drafts",
            "generate",
            "--template",
            "blog_post",
            "--var",
            "topic=AI trends in 2025",
            "--var",
            "tone=casual",
            "--export",
            "post.md",
        ])
        .unwrap();

        assert_eq!(cli.dir, PathBuf::from("/tmp/drafts"));
        match cli.command {
            Commands::Generate {
                template,
                vars,
                export,
                ..
            } => {
                assert_eq!(template.as_deref(), Some("blog_post"));
                assert_eq!(
                    vars,
                    vec![
                        ("topic".to_owned(), "AI trends in 2025".to_owned()),
                        ("tone".to_owned(), "casual".to_owned()),
                    ]
                );
                assert_eq!(export.export, Some(PathBuf::from("post.md")));
                assert!(export.format.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_should_require_prompt_or_template() {
        assert!(parse(&["generate"]).is_err());
        assert!(parse(&["generate", "--prompt", "a", "--template", "essay"]).is_err());
    }

    #[test]
    fn test_should_parse_export_format() {
        let cli = parse(&["regenerate", "--export", "out.dat", "--format", "csv"]).unwrap();
        match cli.command {
            Commands::Regenerate { export } => {
                assert_eq!(export.format, Some(ExportFormat::Csv));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(parse(&["regenerate", "--export", "out", "--format", "pdf"]).is_err());
    }

    #[test]
    fn test_should_reject_malformed_var() {
        assert!(parse(&["generate", "--template", "essay", "--var", "topic"]).is_err());
        assert!(parse_var("=value").is_err());
        assert_eq!(
            parse_var("a=b=c").unwrap(),
            ("a".to_owned(), "b=c".to_owned())
        );
    }

    #[test]
    fn test_should_parse_global_timeout() {
        let cli = parse(&["check", "--text", "hello", "--timeout", "45"]).unwrap();
        assert_eq!(cli.timeout, Some(45));
        assert!(parse(&["generate"]).is_err());
        assert!(parse(&["--timeout", "0", "status"]).is_err());
        assert_eq!(parse(&["status"]).unwrap().timeout, None);
    }

    #[test]
    fn test_should_derive_log_context_per_command() {
        let cli = parse(&["check", "--text", "hello"]).unwrap();
        assert_eq!(cli.log_context(), (PathBuf::from("."), Some("check")));
        assert!(cli.logs_to_stderr());

        let cli = parse(&["status"]).unwrap();
        assert_eq!(cli.log_context().1, None);

        let cli = parse(&["interactive"]).unwrap();
        assert_eq!(cli.log_context().1, Some("interactive"));
        assert!(!cli.logs_to_stderr());
    }
}
