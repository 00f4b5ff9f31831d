//! The executable model: the validated output of the builder and the only
//! thing the engine consumes.
//!
//! Every type here round-trips through serde so a compiled script can be
//! inspected, persisted or diffed as plain JSON. Derived bookkeeping fields
//! keep their underscore-prefixed names (`_next`, `_has_back_button`, ...)
//! in the serialized form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Navigation directions resolved at transition time rather than declared scenes.
pub const MAGIC_SCENES: [&str; 2] = ["back", "next"];
/// Button kinds that are keywords in button position.
pub const SPECIAL_NAMES: [&str; 5] = ["link", "suggest", "redirect", "handoff", "return"];
/// Prefix of static-variable config keys.
pub const VARS_PREFIX: &str = "vars_";

pub const DEFAULT_NEXT_LABEL: &str = "Next »";
pub const DEFAULT_BACK_LABEL: &str = "« Back";

/// Whether `name` collides with a magic scene or a special button kind.
pub fn is_reserved_name(name: &str) -> bool {
    MAGIC_SCENES.contains(&name) || SPECIAL_NAMES.contains(&name)
}

// ──────────────────────────────────────────────
// Scene references
// ──────────────────────────────────────────────

/// Target of a scene-navigating button or entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SceneRef {
    Named(String),
    Back,
    Next,
}

impl SceneRef {
    pub fn parse(name: &str) -> Self {
        match name {
            "back" => SceneRef::Back,
            "next" => SceneRef::Next,
            other => SceneRef::Named(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SceneRef::Named(n) => n,
            SceneRef::Back => "back",
            SceneRef::Next => "next",
        }
    }

    pub fn is_magic(&self) -> bool {
        !matches!(self, SceneRef::Named(_))
    }
}

impl From<String> for SceneRef {
    fn from(s: String) -> Self {
        match s.as_str() {
            "back" => SceneRef::Back,
            "next" => SceneRef::Next,
            _ => SceneRef::Named(s),
        }
    }
}

impl From<SceneRef> for String {
    fn from(r: SceneRef) -> Self {
        match r {
            SceneRef::Named(n) => n,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for SceneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Enumerated options
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    Html,
    Markdown,
}

impl ParseMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "html" => Some(ParseMode::Html),
            "markdown" => Some(ParseMode::Markdown),
            _ => None,
        }
    }
}

/// Template engine applied to scene text, button labels and hook arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// No substitution.
    Plain,
    /// `{{name[:default]}}` lookup.
    #[default]
    Vars,
    /// Expression templates.
    Jinja,
}

impl TemplateKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "plain" => Some(TemplateKind::Plain),
            "vars" => Some(TemplateKind::Vars),
            "jinja" => Some(TemplateKind::Jinja),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Config
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_label: Option<String>,
    #[serde(default)]
    pub next_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateKind>,
    /// `vars_*` static variables, keyed with their prefix.
    #[serde(flatten)]
    pub vars: BTreeMap<String, serde_json::Value>,
}

impl Config {
    /// Static variables with the `vars_` prefix stripped.
    pub fn static_vars(&self) -> BTreeMap<String, serde_json::Value> {
        self.vars
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(VARS_PREFIX).map(|n| (n.to_owned(), v.clone())))
            .collect()
    }
}

// ──────────────────────────────────────────────
// Scenes
// ──────────────────────────────────────────────

/// Required scene content: `title` + `message`, or a single `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Titled { title: String, message: String },
    Text { text: String },
}

/// One call in a hook list. `args` is `None` when the call had no
/// parentheses; string arguments are templates resolved at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookCall {
    pub method: String,
    #[serde(default)]
    pub args: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "lowercase")]
pub enum ButtonAction {
    /// Navigate to a scene (or a magic direction).
    Scene(SceneRef),
    /// Roll history back to the named scene and render it.
    Return(String),
    /// Record `entry` as if the user typed it, then render `scene`.
    Suggest { scene: SceneRef, entry: String },
    /// Re-submit arbitrary text as a user message.
    Redirect(String),
    /// Transfer control to another handler.
    Handoff(String),
    /// Non-interactive hyperlink.
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

fn default_row_width() -> u32 {
    1
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(flatten)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub use_italics: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<Vec<HookCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter_once: Option<Vec<HookCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_exit: Option<Vec<HookCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<Vec<HookCall>>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default = "default_row_width")]
    pub row_width: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, SceneRef>,
    #[serde(
        rename = "_default_entry_target",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_entry_target: Option<SceneRef>,
    #[serde(rename = "_has_back_button", default)]
    pub has_back_button: bool,
    #[serde(rename = "_has_next_button", default)]
    pub has_next_button: bool,
    #[serde(rename = "_next", default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(rename = "_keep_history", default)]
    pub keep_history: bool,
}

impl Scene {
    /// Minimal scene with the given content and every optional field unset.
    pub fn new(name: impl Into<String>, content: Content) -> Self {
        Scene {
            name: name.into(),
            content,
            image: None,
            use_italics: false,
            parse_mode: None,
            template: None,
            on_enter: None,
            on_enter_once: None,
            on_exit: None,
            on_timeout: None,
            buttons: Vec::new(),
            row_width: 1,
            entries: BTreeMap::new(),
            default_entry_target: None,
            has_back_button: false,
            has_next_button: false,
            next: None,
            keep_history: false,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match &self.content {
            Content::Titled { title, .. } => Some(title),
            Content::Text { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.content {
            Content::Titled { message, .. } => Some(message),
            Content::Text { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text { text } => Some(text),
            Content::Titled { .. } => None,
        }
    }

    /// Whether the scene installs a text-entry listener.
    pub fn accepts_entries(&self) -> bool {
        !self.entries.is_empty() || self.default_entry_target.is_some()
    }

    /// Every scene-valued target this scene refers to (buttons, entries,
    /// suggestions), with a description for diagnostics.
    pub fn scene_refs(&self) -> Vec<(String, &SceneRef)> {
        let mut refs = Vec::new();
        for b in &self.buttons {
            match &b.action {
                ButtonAction::Scene(r) | ButtonAction::Suggest { scene: r, .. } => {
                    refs.push((format!("Button '{}'", b.label), r));
                }
                _ => {}
            }
        }
        for (trigger, r) in &self.entries {
            refs.push((format!("Entry '{}'", trigger), r));
        }
        if let Some(r) = &self.default_entry_target {
            refs.push(("Default entry".to_owned(), r));
        }
        refs
    }
}

// ──────────────────────────────────────────────
// Model
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableModel {
    pub config: Config,
    pub scenes: BTreeMap<String, Scene>,
    /// Scene names in declaration order.
    pub order: Vec<String>,
    /// Script text the model was built from (empty for imported models).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl ExecutableModel {
    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    /// JSON form for display and diffing; omits the embedded source text.
    pub fn to_display_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("source");
        }
        value
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scene_ref_serializes_as_plain_string() {
        let refs = vec![SceneRef::Back, SceneRef::Next, SceneRef::Named("faq".into())];
        let v = serde_json::to_value(&refs).unwrap();
        assert_eq!(v, json!(["back", "next", "faq"]));
        let back: Vec<SceneRef> = serde_json::from_value(v).unwrap();
        assert_eq!(back, refs);
    }

    #[test]
    fn config_vars_are_flattened() {
        let cfg: Config = serde_json::from_value(json!({
            "timeout_time": 60,
            "next_order": ["main"],
            "vars_greeting": "hi",
        }))
        .unwrap();
        assert_eq!(cfg.timeout_time, Some(60));
        assert_eq!(cfg.static_vars()["greeting"], json!("hi"));
        assert_eq!(serde_json::to_value(&cfg).unwrap()["vars_greeting"], json!("hi"));
    }

    #[test]
    fn scene_content_and_buttons_shape() {
        let mut scene = Scene::new(
            "main",
            Content::Titled {
                title: "T".into(),
                message: "M".into(),
            },
        );
        scene.buttons.push(Button {
            label: "Hint".into(),
            action: ButtonAction::Suggest {
                scene: SceneRef::Named("check".into()),
                entry: "pw".into(),
            },
        });
        let v = serde_json::to_value(&scene).unwrap();
        assert_eq!(v["title"], json!("T"));
        assert_eq!(v["buttons"][0]["action"]["type"], json!("suggest"));
        assert_eq!(v["buttons"][0]["action"]["target"]["entry"], json!("pw"));
        assert_eq!(v["_has_back_button"], json!(false));

        let parsed: Scene = serde_json::from_value(v).unwrap();
        assert_eq!(parsed, scene);
    }

    #[test]
    fn text_scene_from_minimal_json() {
        let scene: Scene = serde_json::from_value(json!({"name": "a", "text": "Hello"})).unwrap();
        assert_eq!(scene.text(), Some("Hello"));
        assert_eq!(scene.row_width, 1);
        assert!(scene.buttons.is_empty());
    }
}
