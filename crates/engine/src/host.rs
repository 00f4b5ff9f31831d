//! Host collaborator abstraction.
//!
//! The engine never talks to a chat platform directly. A session drives
//! three host-implemented traits:
//! - [`RenderSink`] -- receives the styled parts of a scene and commits them
//! - [`Transport`] -- entry-listener toggling, handoff and redirect
//! - [`VariableResolver`] -- host-supplied `{{name}}` values
//!
//! [`Host`] bundles all three and is implemented automatically.

use crate::error::HostError;
use sceneflow_core::ParseMode;
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Render payloads
// ──────────────────────────────────────────────

/// Text handed to the sink. `sanitize` asks the sink to escape the whole
/// content because the scene declared no parse mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledText {
    pub content: String,
    pub sanitize: bool,
}

impl StyledText {
    pub fn raw(content: impl Into<String>) -> Self {
        StyledText {
            content: content.into(),
            sanitize: false,
        }
    }

    pub fn sanitized(content: impl Into<String>) -> Self {
        StyledText {
            content: content.into(),
            sanitize: true,
        }
    }
}

/// One keyboard button as the host should display it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonView {
    /// Interactive; the host reports presses back through `click(label)`.
    Callback { label: String },
    /// Non-interactive hyperlink.
    Link { label: String, url: String },
}

impl ButtonView {
    pub fn label(&self) -> &str {
        match self {
            ButtonView::Callback { label } | ButtonView::Link { label, .. } => label,
        }
    }
}

/// Host-side handle of the last committed message (for in-place edits
/// and for handing the conversation over to another handler).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

/// Identity of the user a session talks to; feeds built-in variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i64,
    pub chat_id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

// ──────────────────────────────────────────────
// Collaborator traits
// ──────────────────────────────────────────────

pub trait RenderSink: Send {
    fn set_title(&mut self, title: StyledText);
    fn set_message(&mut self, message: StyledText);
    fn set_text(&mut self, text: StyledText);
    fn set_image(&mut self, image: Option<&str>);
    fn set_italics(&mut self, italics: bool);
    fn set_parse_mode(&mut self, mode: Option<ParseMode>);
    /// Buttons grouped into rows of at most the scene's `row_width`.
    fn set_buttons(&mut self, rows: Vec<Vec<ButtonView>>);
    /// Publish the staged scene, replacing the previous one.
    fn commit(&mut self) -> Result<MessageRef, HostError>;
    /// Drop everything staged since the last commit; called when a render
    /// fails part way.
    fn discard(&mut self);
    /// Append a bold notice below the current message and replace its
    /// keyboard with a single button (used for the timeout prompt).
    fn append_notice(&mut self, notice: StyledText, button: ButtonView) -> Result<(), HostError>;
    /// Show a generic failure to the user; `detail` is for logs and debug views.
    fn show_error(&mut self, summary: &str, detail: &str);
}

pub trait Transport: Send {
    /// Install or remove the free-text listener for the current scene.
    fn set_entry_listener(&mut self, enabled: bool);
    /// Pass the conversation to another handler, carrying the last message.
    fn handoff(&mut self, handler: &str, last_message: Option<&MessageRef>) -> Result<(), HostError>;
    /// Treat `text` as if the user had sent it. Hosts must queue it rather
    /// than feed it back into the same session synchronously.
    fn redirect(&mut self, text: &str) -> Result<(), HostError>;
}

pub trait VariableResolver: Send {
    /// Value for `{{name}}`, consulted after static variables and before
    /// built-ins. `None` falls through.
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

pub trait Host: RenderSink + Transport + VariableResolver {}

impl<T: RenderSink + Transport + VariableResolver> Host for T {}
