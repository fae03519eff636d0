use thiserror::Error;

/// Errors raised while loading or rendering prompt templates.
#[derive(Debug, Error)]
pub enum PmError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// A template printed a variable the caller did not supply.
    #[error("missing template variable: {0}")]
    MissingVariable(String),

    #[error("template syntax error: {0}")]
    Syntax(String),

    #[error("template rendering failed: {0}")]
    Render(String),

    #[error("failed to read templates: {0}")]
    Io(#[from] std::io::Error),
}

impl From<minijinja::Error> for PmError {
    fn from(e: minijinja::Error) -> Self {
        let message = e.to_string();
        match e.kind() {
            minijinja::ErrorKind::TemplateNotFound => Self::UnknownTemplate(message),
            minijinja::ErrorKind::UndefinedError => Self::MissingVariable(message),
            minijinja::ErrorKind::SyntaxError => Self::Syntax(message),
            _ => Self::Render(message),
        }
    }
}
