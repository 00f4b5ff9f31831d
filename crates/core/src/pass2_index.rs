//! Pass 2: Scene indexing -- name anonymous scenes, reject duplicate and
//! reserved names, require `main`, and build the default-label table.
//!
//! The label table must exist before any scene body is analyzed: a button
//! may omit its label and refer to a scene declared later in the source.

use crate::ast::{Ast, Provenance, RawBlock, RawField, RawValue};
use crate::error::ScriptError;
use crate::model::{is_reserved_name, Config, DEFAULT_BACK_LABEL, DEFAULT_NEXT_LABEL};
use std::collections::{BTreeMap, HashMap};

/// A scene block with its final name.
#[derive(Debug, Clone)]
pub struct SceneDecl<'a> {
    pub name: String,
    pub fields: &'a BTreeMap<String, RawField>,
    pub prov: Provenance,
}

pub struct SceneIndex<'a> {
    /// Scenes in declaration order.
    pub decls: Vec<SceneDecl<'a>>,
    pub provs: HashMap<String, Provenance>,
    /// Default button label per scene name, plus the magic `back`/`next`.
    pub labels: HashMap<String, String>,
}

impl<'a> SceneIndex<'a> {
    pub fn contains(&self, name: &str) -> bool {
        self.provs.contains_key(name)
    }
}

pub fn build_index<'a>(ast: &'a Ast, config: &Config) -> Result<SceneIndex<'a>, ScriptError> {
    let mut decls = Vec::new();
    let mut provs: HashMap<String, Provenance> = HashMap::new();
    let mut labels: HashMap<String, String> = HashMap::new();
    let mut anonymous = 0usize;

    for block in &ast.body {
        let RawBlock::Scene {
            name,
            default_label,
            fields,
            prov,
        } = block
        else {
            continue;
        };

        let name = match name {
            Some(n) => n.clone(),
            None => {
                anonymous += 1;
                format!("anonymous_{}", anonymous)
            }
        };

        if is_reserved_name(&name) {
            return Err(ScriptError::build(
                Some(&name),
                None,
                prov.line,
                format!(
                    "the scene name '{}' is reserved; please choose another one",
                    name
                ),
            ));
        }
        if let Some(first) = provs.get(&name) {
            return Err(ScriptError::build(
                Some(&name),
                None,
                prov.line,
                format!(
                    "duplicate scene name '@{}': first declared at line {}",
                    name, first.line
                ),
            ));
        }

        labels.insert(name.clone(), default_label_for(&name, default_label.as_deref(), fields));
        provs.insert(name.clone(), *prov);
        decls.push(SceneDecl {
            name,
            fields,
            prov: *prov,
        });
    }

    if !provs.contains_key("main") {
        return Err(ScriptError::build(
            None,
            None,
            0,
            "missing required '@ main { ... }' scene (entry point)",
        ));
    }

    labels.insert(
        "next".to_owned(),
        config
            .next_label
            .clone()
            .unwrap_or_else(|| DEFAULT_NEXT_LABEL.to_owned()),
    );
    labels.insert(
        "back".to_owned(),
        config
            .back_label
            .clone()
            .unwrap_or_else(|| DEFAULT_BACK_LABEL.to_owned()),
    );

    Ok(SceneIndex {
        decls,
        provs,
        labels,
    })
}

/// Explicit label, else `title`, else the first line of `text` when it is
/// not blank, else the name.
fn default_label_for(
    name: &str,
    explicit: Option<&str>,
    fields: &BTreeMap<String, RawField>,
) -> String {
    if let Some(label) = explicit {
        return label.to_owned();
    }
    if let Some(RawValue::Str(title)) = fields.get("title").map(|f| &f.value) {
        return title.clone();
    }
    if let Some(RawValue::Str(text)) = fields.get("text").map(|f| &f.value) {
        if let Some(first) = text.lines().next().map(str::trim).filter(|l| !l.is_empty()) {
            return first.to_owned();
        }
    }
    name.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn with_index<T>(src: &str, f: impl FnOnce(Result<SceneIndex<'_>, ScriptError>) -> T) -> T {
        let tokens = lexer::tokenize(src).unwrap();
        let ast = parser::parse(&tokens).unwrap();
        f(build_index(&ast, &Config::default()))
    }

    #[test]
    fn anonymous_scenes_are_numbered_in_order() {
        let src = "@ main { text = \"m\" } @ { text = \"a\" } @ { text = \"b\" }";
        with_index(src, |idx| {
            let names: Vec<_> = idx.unwrap().decls.iter().map(|d| d.name.clone()).collect();
            assert_eq!(names, vec!["main", "anonymous_1", "anonymous_2"]);
        });
    }

    #[test]
    fn default_labels_follow_precedence() {
        let src = r#"
@ main("Home") { title = "Main title" message = "m" }
@ faq { title = "FAQ" message = "m" }
@ about { text = `About us
  more` }
@ blank_first { text = `
  Contact` }
@ empty { text = "" }
"#;
        with_index(src, |idx| {
            let labels = idx.unwrap().labels;
            assert_eq!(labels["main"], "Home");
            assert_eq!(labels["faq"], "FAQ");
            assert_eq!(labels["about"], "About us");
            assert_eq!(labels["blank_first"], "blank_first");
            assert_eq!(labels["empty"], "empty");
            assert_eq!(labels["next"], DEFAULT_NEXT_LABEL);
            assert_eq!(labels["back"], DEFAULT_BACK_LABEL);
        });
    }

    #[test]
    fn missing_main_is_rejected() {
        with_index("@ faq { text = \"x\" }", |idx| {
            let err = idx.err().unwrap();
            assert!(err.message.contains("missing required '@ main"));
        });
    }

    #[test]
    fn duplicate_names_are_rejected() {
        with_index("@ main { text = \"a\" }\n@ main { text = \"b\" }", |idx| {
            let err = idx.err().unwrap();
            assert!(err.message.contains("duplicate scene name '@main'"));
            assert_eq!(err.line, 2);
        });
    }

    #[test]
    fn reserved_names_are_rejected() {
        for name in ["back", "next", "link", "suggest", "redirect", "handoff", "return"] {
            let src = format!("@ main {{ text = \"a\" }} @ {} {{ text = \"b\" }}", name);
            with_index(&src, |idx| {
                let err = idx.err().unwrap();
                assert!(err.message.contains("reserved"), "{}: {}", name, err.message);
            });
        }
    }
}
