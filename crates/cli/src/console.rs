//! Terminal host for `sceneflow play`: prints each committed scene with
//! numbered buttons and queues redirects for the input loop.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use sceneflow_core::ParseMode;
use sceneflow_engine::{
    ButtonView, HostError, MessageRef, RenderSink, StyledText, Transport, VariableResolver,
};

use crate::OutputFormat;

/// State shared between the host (owned by the session) and the input loop.
#[derive(Debug, Default)]
pub(crate) struct ConsoleState {
    /// Labels of the clickable buttons, in display order.
    pub(crate) callbacks: Vec<String>,
    pub(crate) redirects: VecDeque<String>,
    pub(crate) listening: bool,
    pub(crate) handed_off: Option<String>,
}

#[derive(Default)]
struct Staged {
    title: Option<StyledText>,
    message: Option<StyledText>,
    text: Option<StyledText>,
    image: Option<String>,
    italics: bool,
    rows: Vec<Vec<ButtonView>>,
}

pub(crate) struct ConsoleHost {
    staged: Staged,
    state: Arc<Mutex<ConsoleState>>,
    output: OutputFormat,
    renders: usize,
}

impl ConsoleHost {
    pub(crate) fn new(output: OutputFormat) -> (Self, Arc<Mutex<ConsoleState>>) {
        let state = Arc::new(Mutex::new(ConsoleState::default()));
        (
            ConsoleHost {
                staged: Staged::default(),
                state: Arc::clone(&state),
                output,
                renders: 0,
            },
            state,
        )
    }

    fn body(&self) -> Vec<String> {
        let italic = |t: &StyledText| {
            if self.staged.italics {
                format!("_{}_", t.content)
            } else {
                t.content.clone()
            }
        };
        let mut lines = Vec::new();
        if let Some(title) = &self.staged.title {
            lines.push(format!("== {} ==", title.content));
        }
        if let Some(message) = &self.staged.message {
            lines.push(italic(message));
        }
        if let Some(text) = &self.staged.text {
            lines.push(italic(text));
        }
        lines
    }
}

/// Numbered callback buttons; links are shown with their URL.
fn keyboard_lines(rows: &[Vec<ButtonView>]) -> (Vec<String>, Vec<String>) {
    let mut callbacks = Vec::new();
    let mut lines = Vec::new();
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|b| match b {
                ButtonView::Callback { label } => {
                    callbacks.push(label.clone());
                    format!("[{}] {}", callbacks.len(), label)
                }
                ButtonView::Link { label, url } => format!("[↗] {} <{}>", label, url),
            })
            .collect();
        lines.push(cells.join("   "));
    }
    (lines, callbacks)
}

impl RenderSink for ConsoleHost {
    fn set_title(&mut self, title: StyledText) {
        self.staged.title = Some(title);
    }

    fn set_message(&mut self, message: StyledText) {
        self.staged.message = Some(message);
    }

    fn set_text(&mut self, text: StyledText) {
        self.staged.text = Some(text);
    }

    fn set_image(&mut self, image: Option<&str>) {
        self.staged.image = image.map(str::to_owned);
    }

    fn set_italics(&mut self, italics: bool) {
        self.staged.italics = italics;
    }

    // markup is printed verbatim
    fn set_parse_mode(&mut self, _mode: Option<ParseMode>) {}

    fn set_buttons(&mut self, rows: Vec<Vec<ButtonView>>) {
        self.staged.rows = rows;
    }

    fn commit(&mut self) -> Result<MessageRef, HostError> {
        let (keyboard, callbacks) = keyboard_lines(&self.staged.rows);
        match self.output {
            OutputFormat::Json => {
                let event = serde_json::json!({
                    "event": "render",
                    "title": self.staged.title.as_ref().map(|t| &t.content),
                    "message": self.staged.message.as_ref().map(|t| &t.content),
                    "text": self.staged.text.as_ref().map(|t| &t.content),
                    "image": self.staged.image,
                    "buttons": callbacks,
                });
                println!("{}", event);
            }
            OutputFormat::Text => {
                println!();
                if let Some(image) = &self.staged.image {
                    println!("[image: {}]", image);
                }
                for line in self.body() {
                    println!("{}", line);
                }
                for line in keyboard {
                    println!("  {}", line);
                }
            }
        }
        self.state.lock().callbacks = callbacks;
        self.staged = Staged::default();
        self.renders += 1;
        Ok(MessageRef(format!("console-{}", self.renders)))
    }

    fn discard(&mut self) {
        self.staged = Staged::default();
    }

    fn append_notice(&mut self, notice: StyledText, button: ButtonView) -> Result<(), HostError> {
        let label = button.label().to_owned();
        match self.output {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "event": "notice", "text": notice.content, "buttons": [label] })
            ),
            OutputFormat::Text => {
                println!();
                println!("** {} **", notice.content);
                println!("  [1] {}", label);
            }
        }
        self.state.lock().callbacks = vec![label];
        Ok(())
    }

    fn show_error(&mut self, summary: &str, detail: &str) {
        match self.output {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "event": "error", "summary": summary, "detail": detail })
            ),
            OutputFormat::Text => println!("\n{}", summary),
        }
    }
}

impl Transport for ConsoleHost {
    fn set_entry_listener(&mut self, enabled: bool) {
        self.state.lock().listening = enabled;
    }

    fn handoff(&mut self, handler: &str, last_message: Option<&MessageRef>) -> Result<(), HostError> {
        tracing::debug!(handler, last_message = ?last_message, "console handoff");
        self.state.lock().handed_off = Some(handler.to_owned());
        Ok(())
    }

    fn redirect(&mut self, text: &str) -> Result<(), HostError> {
        self.state.lock().redirects.push_back(text.to_owned());
        Ok(())
    }
}

impl VariableResolver for ConsoleHost {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_are_numbered_across_rows() {
        let rows = vec![
            vec![
                ButtonView::Callback { label: "FAQ".into() },
                ButtonView::Link {
                    label: "Site".into(),
                    url: "https://e.x".into(),
                },
            ],
            vec![ButtonView::Callback { label: "Back".into() }],
        ];
        let (lines, callbacks) = keyboard_lines(&rows);
        assert_eq!(callbacks, vec!["FAQ", "Back"]);
        assert_eq!(lines[0], "[1] FAQ   [↗] Site <https://e.x>");
        assert_eq!(lines[1], "[2] Back");
    }

    #[test]
    fn redirects_are_queued() {
        let (mut host, state) = ConsoleHost::new(OutputFormat::Text);
        host.redirect("/start").unwrap();
        host.redirect("/help").unwrap();
        assert_eq!(
            state.lock().redirects.iter().collect::<Vec<_>>(),
            vec!["/start", "/help"]
        );
    }
}
