//! Output rendering for the terminal frontend.
//!
//! [`TerminalPresenter`] turns the stream of session snapshots into
//! incremental terminal output: each snapshot of a streaming turn prints only
//! the text that arrived since the previous one. Assistant text is printed
//! raw; no markdown rendering is attempted.

use std::io::{self, Stdout, Write};

use crate::session::{SessionSnapshot, SnapshotObserver, TurnState};

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Print a chunk of response text.
    ///
    /// This is called incrementally as text is streamed from the endpoint.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines after streaming.
    fn finish_response(&mut self);
}

/// Plain text renderer with optional ANSI styling.
///
/// Output goes to stdout unless another writer is supplied.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    // Terminal write failures are not recoverable here; drop them.
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_text(&mut self, text: &str) {
        self.emit(text);
    }

    fn print_error(&mut self, error: &str) {
        let line = if self.use_color {
            format!("{ANSI_RED}Error: {error}{ANSI_RESET}\n")
        } else {
            format!("Error: {error}\n")
        };
        self.emit(&line);
    }

    fn print_info(&mut self, info: &str) {
        let line = if self.use_color {
            format!("{ANSI_DIM}{info}{ANSI_RESET}\n")
        } else {
            format!("{info}\n")
        };
        self.emit(&line);
    }

    fn finish_response(&mut self) {
        self.emit("\n");
    }
}

////////////////////////////////////////// TerminalPresenter //////////////////////////////////////////

/// A [`SnapshotObserver`] that prints a session as it changes.
pub struct TerminalPresenter<R: Renderer> {
    renderer: R,
    // Index of the assistant message being printed, and how many bytes of it are out.
    streaming: Option<usize>,
    printed: usize,
    last_error: Option<String>,
}

impl<R: Renderer> TerminalPresenter<R> {
    /// Creates a presenter that draws through `renderer`.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            streaming: None,
            printed: 0,
            last_error: None,
        }
    }

    /// Returns the renderer.
    pub fn into_inner(self) -> R {
        self.renderer
    }

    fn print_new_text(&mut self, snapshot: &SessionSnapshot) {
        let Some(index) = self.streaming else {
            return;
        };
        let Some(message) = snapshot.messages.get(index).filter(|m| m.is_assistant()) else {
            return;
        };
        match message.content.get(self.printed..) {
            Some(suffix) if !suffix.is_empty() => {
                self.renderer.print_text(suffix);
                self.printed = message.content.len();
            }
            _ => {}
        }
    }
}

impl<R: Renderer> SnapshotObserver for TerminalPresenter<R> {
    fn snapshot_changed(&mut self, snapshot: &SessionSnapshot) {
        match snapshot.state {
            TurnState::Streaming => {
                let index = snapshot.messages.len().saturating_sub(1);
                if self.streaming != Some(index) {
                    self.streaming = Some(index);
                    self.printed = 0;
                }
                self.print_new_text(snapshot);
            }
            TurnState::Idle if self.streaming.is_some() => {
                if snapshot.error.is_none() {
                    self.print_new_text(snapshot);
                }
                self.renderer.finish_response();
                self.streaming = None;
                self.printed = 0;
            }
            TurnState::Idle | TurnState::Sending => {}
        }

        if snapshot.error != self.last_error {
            if let Some(error) = &snapshot.error {
                self.renderer.print_error(error);
            }
            self.last_error = snapshot.error.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Model, ValidationStatus};

    fn snapshot(state: TurnState, messages: Vec<Message>, error: Option<&str>) -> SessionSnapshot {
        SessionSnapshot {
            messages,
            loading: state != TurnState::Idle,
            error: error.map(str::to_string),
            validation: ValidationStatus::Unknown,
            validating: false,
            state,
            model: Model::default(),
            has_credential: true,
        }
    }

    fn assistant(content: &str) -> Message {
        let mut message = Message::assistant();
        message.content = content.to_string();
        message
    }

    fn output(presenter: TerminalPresenter<PlainTextRenderer<Vec<u8>>>) -> String {
        String::from_utf8(presenter.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn renderer_plain_output() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.print_info("ready");
        renderer.print_text("Hi");
        renderer.finish_response();
        renderer.print_error("boom");
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "ready\nHi\nError: boom\n");
    }

    #[test]
    fn renderer_colored_error() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
        renderer.print_error("boom");
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "\x1b[31mError: boom\x1b[0m\n");
    }

    #[test]
    fn prints_only_new_text() {
        let mut presenter =
            TerminalPresenter::new(PlainTextRenderer::with_writer(Vec::new(), false));
        let user = Message::user("Hello");
        presenter.snapshot_changed(&snapshot(TurnState::Sending, vec![user.clone()], None));
        for total in ["", "Hi", "Hi there"] {
            presenter.snapshot_changed(&snapshot(
                TurnState::Streaming,
                vec![user.clone(), assistant(total)],
                None,
            ));
        }
        presenter.snapshot_changed(&snapshot(
            TurnState::Idle,
            vec![user, assistant("Hi there")],
            None,
        ));
        assert_eq!(output(presenter), "Hi there\n");
    }

    #[test]
    fn failed_turn_prints_error_once() {
        let mut presenter =
            TerminalPresenter::new(PlainTextRenderer::with_writer(Vec::new(), false));
        let user = Message::user("Hello");
        presenter.snapshot_changed(&snapshot(
            TurnState::Streaming,
            vec![user.clone(), assistant("par")],
            None,
        ));
        let failed = snapshot(TurnState::Idle, vec![], Some("Request failed: reset"));
        presenter.snapshot_changed(&failed);
        presenter.snapshot_changed(&failed);
        assert_eq!(output(presenter), "par\nError: Request failed: reset\n");
    }

    #[test]
    fn open_failure_prints_error_only() {
        let mut presenter =
            TerminalPresenter::new(PlainTextRenderer::with_writer(Vec::new(), false));
        presenter.snapshot_changed(&snapshot(
            TurnState::Sending,
            vec![Message::user("Hello")],
            None,
        ));
        presenter.snapshot_changed(&snapshot(
            TurnState::Idle,
            vec![],
            Some("Authentication error: HTTP status 401"),
        ));
        assert_eq!(
            output(presenter),
            "Error: Authentication error: HTTP status 401\n"
        );
    }
}
