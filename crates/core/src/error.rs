use serde::{Deserialize, Serialize};
use std::fmt;

/// Compiler stage that produced a [`ScriptError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lex,
    Parse,
    Build,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Build => "build",
        };
        f.write_str(s)
    }
}

/// A compilation error. A script is all-or-nothing: any `ScriptError`
/// aborts compilation and no partial model is produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{stage} error at line {line}:{column}: {message}")]
pub struct ScriptError {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl ScriptError {
    pub fn new(
        stage: Stage,
        scene: Option<&str>,
        field: Option<&str>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        ScriptError {
            stage,
            scene: scene.map(str::to_owned),
            field: field.map(str::to_owned),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn lex(line: u32, column: u32, message: impl Into<String>) -> Self {
        ScriptError::new(Stage::Lex, None, None, line, column, message)
    }

    pub fn parse(line: u32, column: u32, message: impl Into<String>) -> Self {
        ScriptError::new(Stage::Parse, None, None, line, column, message)
    }

    /// A semantic error attributed to a scene (or to config when `scene` is `None`).
    pub fn build(scene: Option<&str>, field: Option<&str>, line: u32, message: impl Into<String>) -> Self {
        ScriptError::new(Stage::Build, scene, field, line, 0, message)
    }

    /// Serialize with every key present (null for missing), for tooling that
    /// diffs error reports.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "column":  self.column,
            "field":   self.field,
            "line":    self.line,
            "message": self.message,
            "scene":   self.scene,
            "stage":   self.stage,
        })
    }
}
