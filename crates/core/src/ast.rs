//! Syntax tree produced by the parser and consumed by the builder passes.
//!
//! The tree is purely structural: field names and value types are not
//! checked here, and button labels may still be unresolved ([`ButtonLabel::NoLabel`]).

use std::collections::BTreeMap;

// ──────────────────────────────────────────────
// Provenance
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Provenance {
    pub line: u32,
    pub column: u32,
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    /// Bare identifier used in value position; treated as a string by the builder.
    Ident(String),
    List(Vec<RawValue>),
    Buttons(RawButtons),
    Entries(Vec<RawEntry>),
    Hooks(Vec<RawHookCall>),
}

impl RawValue {
    /// String content of a string literal or bare identifier.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Str(s) | RawValue::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Type name used in builder diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Str(_) | RawValue::Ident(_) => "string",
            RawValue::Int(_) => "integer",
            RawValue::Bool(_) => "boolean",
            RawValue::None => "none",
            RawValue::List(_) => "list",
            RawValue::Buttons(_) => "buttons block",
            RawValue::Entries(_) => "entries block",
            RawValue::Hooks(_) => "hook block",
        }
    }

    /// Plain-data view, used for static variables and hook arguments.
    /// Block values have no data form and map to `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RawValue::Str(s) | RawValue::Ident(s) => serde_json::Value::String(s.clone()),
            RawValue::Int(n) => serde_json::Value::from(*n),
            RawValue::Bool(b) => serde_json::Value::Bool(*b),
            RawValue::List(items) => {
                serde_json::Value::Array(items.iter().map(RawValue::to_json).collect())
            }
            RawValue::None | RawValue::Buttons(_) | RawValue::Entries(_) | RawValue::Hooks(_) => {
                serde_json::Value::Null
            }
        }
    }
}

/// A field value together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub value: RawValue,
    pub prov: Provenance,
}

// ──────────────────────────────────────────────
// Scene sub-blocks
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonLabel {
    Explicit(String),
    /// Filled in by the builder from the target's default label.
    NoLabel,
}

/// `target("Label", argument)` inside a `buttons { ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct RawButton {
    pub label: ButtonLabel,
    pub target: String,
    pub argument: Option<String>,
    pub prov: Provenance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawButtons {
    pub width: i64,
    pub buttons: Vec<RawButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Text(String),
    /// Matches any submitted text.
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub trigger: Trigger,
    pub target: String,
    pub prov: Provenance,
}

/// `method(arg, ...)` inside a hook block. `args` is `None` when written
/// without parentheses.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHookCall {
    pub method: String,
    pub args: Option<Vec<RawValue>>,
    pub prov: Provenance,
}

// ──────────────────────────────────────────────
// Blocks
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RawBlock {
    /// `$ [name] { key = value; ... }`
    Config {
        name: Option<String>,
        fields: BTreeMap<String, RawField>,
        prov: Provenance,
    },
    /// `@ [name] [("Default label")] { ... }`
    Scene {
        name: Option<String>,
        default_label: Option<String>,
        fields: BTreeMap<String, RawField>,
        prov: Provenance,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    pub body: Vec<RawBlock>,
}
