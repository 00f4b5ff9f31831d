//! Pass 1: Config merging -- fold every `$` block into one namespaced
//! mapping and type-check the recognized keys.

use crate::ast::{Ast, Provenance, RawBlock, RawField, RawValue};
use crate::error::ScriptError;
use crate::model::{Config, TemplateKind, VARS_PREFIX};
use std::collections::{BTreeMap, HashSet};

/// Config after pass 1. `next_order` is only checked for shape here; its
/// references are resolved once scenes are known (pass 4).
#[derive(Debug, Clone)]
pub struct ConfigDraft {
    pub config: Config,
    pub next_order: Option<(Vec<String>, Provenance)>,
}

const KNOWN_KEYS: [&str; 7] = [
    "timeout_time",
    "timeout_message",
    "timeout_label",
    "next_order",
    "next_label",
    "back_label",
    "template",
];

pub fn build_config(ast: &Ast) -> Result<ConfigDraft, ScriptError> {
    let mut merged: BTreeMap<String, &RawField> = BTreeMap::new();

    for block in &ast.body {
        let RawBlock::Config { name, fields, .. } = block else {
            continue;
        };
        let prefix = match name {
            Some(n) if !n.is_empty() => format!("{}_", n),
            _ => String::new(),
        };
        for (field, raw) in fields {
            let key = format!("{}{}", prefix, field);
            if let Some(first) = merged.get(&key) {
                return Err(config_err(
                    &key,
                    raw.prov,
                    format!(
                        "duplicate config field '{}': first declared at line {}",
                        key, first.prov.line
                    ),
                ));
            }
            merged.insert(key, raw);
        }
    }

    for (key, raw) in &merged {
        if !KNOWN_KEYS.contains(&key.as_str()) && !key.starts_with(VARS_PREFIX) {
            return Err(config_err(
                key,
                raw.prov,
                format!("unknown config field '{}': this option is not allowed", key),
            ));
        }
    }

    let mut config = Config::default();
    let mut next_order = None;

    if let Some(raw) = merged.get("timeout_time") {
        match raw.value {
            RawValue::Int(n) if n > 0 => config.timeout_time = Some(n as u64),
            RawValue::Int(_) => {
                return Err(config_err(
                    "timeout_time",
                    raw.prov,
                    "config 'timeout_time' cannot be negative or 0",
                ));
            }
            _ => return Err(type_err("timeout_time", raw, "integer")),
        }
    }
    config.timeout_message = opt_string(&merged, "timeout_message")?;
    config.timeout_label = opt_string(&merged, "timeout_label")?;
    config.next_label = opt_string(&merged, "next_label")?;
    config.back_label = opt_string(&merged, "back_label")?;

    if let Some(raw) = merged.get("template") {
        let name = raw
            .value
            .as_str()
            .ok_or_else(|| type_err("template", raw, "string"))?;
        config.template = Some(TemplateKind::from_name(name).ok_or_else(|| {
            config_err(
                "template",
                raw.prov,
                format!(
                    "config 'template' must be one of 'plain', 'vars' or 'jinja', got '{}'",
                    name
                ),
            )
        })?);
    }

    if let Some(raw) = merged.get("next_order") {
        let RawValue::List(items) = &raw.value else {
            return Err(type_err("next_order", raw, "list"));
        };
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for item in items {
            let name = item.as_str().ok_or_else(|| {
                config_err(
                    "next_order",
                    raw.prov,
                    "config 'next_order' must be a list of scene names",
                )
            })?;
            if !seen.insert(name) {
                return Err(config_err(
                    "next_order",
                    raw.prov,
                    format!("config 'next_order' must contain unique values; '{}' repeats", name),
                ));
            }
            names.push(name.to_owned());
        }
        next_order = Some((names, raw.prov));
    }

    config.vars = merged
        .iter()
        .filter(|(k, _)| k.starts_with(VARS_PREFIX))
        .map(|(k, raw)| (k.clone(), raw.value.to_json()))
        .collect();

    Ok(ConfigDraft { config, next_order })
}

fn opt_string(
    merged: &BTreeMap<String, &RawField>,
    key: &str,
) -> Result<Option<String>, ScriptError> {
    match merged.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .value
            .as_str()
            .map(|s| Some(s.to_owned()))
            .ok_or_else(|| type_err(key, raw, "string")),
    }
}

fn config_err(key: &str, prov: Provenance, message: impl Into<String>) -> ScriptError {
    ScriptError::build(None, Some(key), prov.line, message)
}

fn type_err(key: &str, raw: &RawField, expected: &str) -> ScriptError {
    config_err(
        key,
        raw.prov,
        format!(
            "config field '{}' must be of type {}, got {}",
            key,
            expected,
            raw.value.type_name()
        ),
    )
}
