//! Four-pass builder: scene script source -> [`ExecutableModel`].
//!
//! A thin orchestrator that runs the lexer, the parser and each builder
//! pass in order, stopping at the first error.

use crate::ast::Ast;
use crate::error::ScriptError;
use crate::lexer;
use crate::model::ExecutableModel;
use crate::parser;
use crate::pass1_config;
use crate::pass2_index;
use crate::pass3_scenes;
use crate::pass4_links;

/// Compile script text into an executable model, or return the first
/// lex, parse or build error encountered.
pub fn compile(source: &str) -> Result<ExecutableModel, ScriptError> {
    let tokens = lexer::tokenize(source)?;
    let ast = parser::parse(&tokens)?;
    build(&ast, source)
}

/// Run the builder passes over an already parsed tree.
pub fn build(ast: &Ast, source: &str) -> Result<ExecutableModel, ScriptError> {
    // Pass 1: config merging
    let draft = pass1_config::build_config(ast)?;

    // Pass 2: scene indexing and default labels
    let index = pass2_index::build_index(ast, &draft.config)?;

    // Pass 3: per-scene analysis
    let mut scenes = pass3_scenes::analyze_scenes(&index)?;

    // Pass 4: cross-references and derived flags
    let next_order = pass4_links::link_scenes(&mut scenes, &index, draft.next_order.as_ref())?;

    let mut config = draft.config;
    config.next_order = next_order;
    let order: Vec<String> = scenes.iter().map(|s| s.name.clone()).collect();

    tracing::debug!(
        scenes = order.len(),
        next_order = ?config.next_order,
        "built executable model"
    );

    Ok(ExecutableModel {
        config,
        scenes: scenes.into_iter().map(|s| (s.name.clone(), s)).collect(),
        order,
        source: source.to_owned(),
    })
}
