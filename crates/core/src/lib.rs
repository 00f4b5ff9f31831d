#![allow(clippy::result_large_err)]
//! sceneflow-core: scene script compiler.
//!
//! Turns scene script source (or a canvas document) into an
//! [`ExecutableModel`]: a validated, serializable description of every
//! scene, its buttons, entries and hooks, plus the script configuration.
//!
//! # Public API
//!
//! - [`compile()`] -- lex, parse and run the four builder passes
//! - [`ExecutableModel`], [`Scene`], [`Config`] -- the compiled model
//! - [`ScriptError`] -- lex/parse/build diagnostic with a source position
//! - [`import_canvas_str()`] -- canvas JSON to model
//!
//! The individual stages are public for tooling that needs a partial
//! pipeline (e.g. syntax-only checks).

pub mod ast;
pub mod build;
pub mod canvas;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod pass1_config;
pub mod pass2_index;
pub mod pass3_scenes;
pub mod pass4_links;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Ast, Provenance};
pub use canvas::CanvasError;
pub use error::{ScriptError, Stage};
pub use model::{
    Button, ButtonAction, Config, Content, ExecutableModel, HookCall, ParseMode, Scene, SceneRef,
    TemplateKind,
};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use build::{build, compile};
pub use canvas::{import_canvas, import_canvas_str};
pub use lexer::tokenize;
pub use parser::parse;
