//! Interactive screen: type a prompt, generate, review originality, regenerate.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ghostwriter_core::{
    Decision, Engine, GeneratedContent, GenerationError, Originality, RateLimiter, Session,
};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};
use ratatui::{DefaultTerminal, Frame};

/// How long to wait for input before redrawing.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What the user asked for with a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Generate(String),
    Regenerate,
    Quit,
}

/// Main TUI application state.
#[derive(Debug)]
pub struct App {
    input: String,
    output: Vec<Line<'static>>,
    status: Line<'static>,
    scroll: u16,
    requests: String,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            output: vec![Line::from(
                "Enter a prompt, e.g. \"Write a blog about AI trends in 2025.\"",
            )],
            status: Line::from("Ready."),
            scroll: 0,
            requests: String::new(),
        }
    }

    /// Run the event loop until the user quits.
    pub async fn run(mut self, engine: &Engine, terminal: &mut DefaultTerminal) -> Result<()> {
        let store = engine.session_store();
        let limiter = *engine.workflow().limiter();
        self.update_requests(&store.load()?, &limiter);

        loop {
            terminal.draw(|frame| self.draw(frame))?;

            if !event::poll(POLL_INTERVAL)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            let Some(action) = self.handle_key(key) else {
                continue;
            };

            match action {
                Action::Quit => break,
                Action::Generate(prompt) => {
                    self.set_status("Generating...", Color::Cyan);
                    terminal.draw(|frame| self.draw(frame))?;
                    let mut lease = store.lock().await?;
                    let result = engine.workflow().generate(lease.session_mut(), &prompt).await;
                    let session = lease.commit()?;
                    match result {
                        Ok(content) => self.show_generated(&content),
                        Err(e) => self.show_error(&e),
                    }
                    self.update_requests(&session, &limiter);
                }
                Action::Regenerate => {
                    self.set_status("Rewriting for originality...", Color::Cyan);
                    terminal.draw(|frame| self.draw(frame))?;
                    let mut lease = store.lock().await?;
                    let result = engine.workflow().regenerate(lease.session_mut()).await;
                    let session = lease.commit()?;
                    match result {
                        Ok(text) => self.show_regenerated(&text),
                        Err(e) => self.show_error(&e),
                    }
                    self.update_requests(&session, &limiter);
                }
            }
        }
        Ok(())
    }

    /// Translate a key press into an edit or an [`Action`].
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            KeyCode::Char('r') if ctrl => Some(Action::Regenerate),
            KeyCode::Char(c) if !ctrl => {
                self.input.push(c);
                None
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Enter => Some(Action::Generate(self.input.clone())),
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                self.scroll = self.scroll.saturating_add(1);
                None
            }
            _ => None,
        }
    }

    pub fn draw(&self, frame: &mut Frame) {
        let [input_area, output_area, status_area, help_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let input = Paragraph::new(self.input.as_str())
            .block(Block::bordered().title(" Prompt "));
        frame.render_widget(input, input_area);

        let output = Paragraph::new(self.output.clone())
            .block(Block::bordered().title(" Ghostwriter "))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        frame.render_widget(output, output_area);

        frame.render_widget(Paragraph::new(self.status.clone()), status_area);

        let help = Line::from(vec![
            Span::raw(self.requests.clone()),
            Span::styled(
                "  Enter generate · Ctrl-R regenerate · ↑/↓ scroll · Esc quit",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(Paragraph::new(help), help_area);
    }

    fn show_generated(&mut self, content: &GeneratedContent) {
        let verdict = (!content.placeholder).then(|| content.originality());
        self.show_content(&content.text, &content.model, verdict);
    }

    /// Render text and, unless it is a placeholder, its originality verdict.
    fn show_content(&mut self, text: &str, model: &str, verdict: Option<Originality<'_>>) {
        let mut lines = vec![heading("Generated Content:")];
        lines.extend(text_lines(text));
        lines.push(Line::default());

        if let Some(verdict) = verdict {
            lines.push(heading("Searching for Similar Content Online:"));
            match verdict {
                Originality::Original => lines.push(colored(
                    "No similar content found online. Your content seems original!",
                    Color::Green,
                )),
                Originality::SimilarFound { total, shown } => {
                    lines.push(colored(
                        &format!("Similar content found on the web ({total} results):"),
                        Color::Yellow,
                    ));
                    for (i, hit) in shown.iter().enumerate() {
                        lines.push(Line::from(Span::styled(
                            format!("{}. {}", i + 1, hit.title),
                            Style::default().add_modifier(Modifier::BOLD),
                        )));
                        if let Some(link) = &hit.link {
                            lines.push(Line::from(format!("   Source: {link}")));
                        }
                        if let Some(snippet) = &hit.snippet {
                            lines.push(Line::from(format!("   Snippet: {}", snippet.trim())));
                        }
                    }
                    lines.push(colored(
                        "Press Ctrl-R to regenerate the content for originality.",
                        Color::Yellow,
                    ));
                }
                Originality::Unchecked => lines.push(colored(
                    "Originality could not be checked.",
                    Color::Red,
                )),
            }
        }

        self.output = lines;
        self.scroll = 0;
        self.set_status(&format!("Generated with {model}."), Color::Green);
    }

    fn show_regenerated(&mut self, text: &str) {
        let mut lines = vec![heading("Regenerated Content:")];
        lines.extend(text_lines(text));
        self.output = lines;
        self.scroll = 0;
        self.set_status(
            "Content has been regenerated for originality.",
            Color::Green,
        );
    }

    fn show_error(&mut self, err: &GenerationError) {
        self.set_status(&err.to_string(), Color::Red);
    }

    fn set_status(&mut self, message: &str, color: Color) {
        self.status = colored(message, color);
    }

    fn update_requests(&mut self, session: &Session, limiter: &RateLimiter) {
        let now = Utc::now();
        self.requests = match limiter.peek(session, now) {
            Decision::Blocked { remaining_secs } => format!("Limit reached ({remaining_secs}s)"),
            Decision::Admit => format!(
                "Requests {}/{}",
                limiter.used(session, now),
                limiter.max_requests()
            ),
        };
    }
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_owned(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn colored(text: &str, color: Color) -> Line<'static> {
    Line::from(Span::styled(text.to_owned(), Style::default().fg(color)))
}

fn text_lines(text: &str) -> Vec<Line<'static>> {
    text.lines().map(|l| Line::from(l.to_owned())).collect()
}
