//! Pass 4: Cross-reference resolution -- reference closure, `next_order`
//! finalization, the `_has_*` flags, precomputed `_next` successors and the
//! `_keep_history` policy.

use crate::ast::Provenance;
use crate::error::ScriptError;
use crate::model::{ButtonAction, Scene, SceneRef};
use crate::pass2_index::SceneIndex;
use std::collections::HashSet;

/// Resolve cross-scene links in place and return the final `next_order`.
pub fn link_scenes(
    scenes: &mut [Scene],
    index: &SceneIndex<'_>,
    declared_order: Option<&(Vec<String>, Provenance)>,
) -> Result<Vec<String>, ScriptError> {
    check_references(scenes, index)?;
    let next_order = finalize_next_order(scenes, index, declared_order)?;

    for scene in scenes.iter_mut() {
        let (back, next) = {
            let refs = scene.scene_refs();
            (
                refs.iter().any(|(_, r)| **r == SceneRef::Back),
                refs.iter().any(|(_, r)| **r == SceneRef::Next),
            )
        };
        scene.has_back_button = back;
        scene.has_next_button = next;
    }

    if let Some(last) = next_order.last() {
        if let Some(scene) = scenes.iter().find(|s| &s.name == last && s.has_next_button) {
            return Err(ScriptError::build(
                Some(&scene.name),
                Some("buttons"),
                line_of(index, &scene.name),
                format!(
                    "scene '@{}' is last in next_order but refers to 'next'; \
                     there is no scene to go to",
                    scene.name
                ),
            ));
        }
    }

    let names: Vec<String> = scenes.iter().map(|s| s.name.clone()).collect();
    for scene in scenes.iter_mut().filter(|s| s.has_next_button) {
        // `None` falls back to `main` when the button is clicked
        scene.next = successor(&scene.name, &names, &next_order);
    }

    let any_return = scenes.iter().any(|s| {
        s.buttons
            .iter()
            .any(|b| matches!(b.action, ButtonAction::Return(_)))
    });
    for scene in scenes.iter_mut() {
        scene.keep_history = any_return || scene.has_back_button;
    }

    Ok(next_order)
}

fn line_of(index: &SceneIndex<'_>, name: &str) -> u32 {
    index.provs.get(name).map(|p| p.line).unwrap_or(0)
}

fn check_references(scenes: &[Scene], index: &SceneIndex<'_>) -> Result<(), ScriptError> {
    for scene in scenes {
        for (what, target) in scene.scene_refs() {
            if let SceneRef::Named(name) = target {
                if !index.contains(name) {
                    return Err(ScriptError::build(
                        Some(&scene.name),
                        None,
                        line_of(index, &scene.name),
                        format!(
                            "{} in scene '@{}' points to non-existent scene '@{}'",
                            what, scene.name, name
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn finalize_next_order(
    scenes: &[Scene],
    index: &SceneIndex<'_>,
    declared: Option<&(Vec<String>, Provenance)>,
) -> Result<Vec<String>, ScriptError> {
    let Some((names, prov)) = declared else {
        let mut order = vec!["main".to_owned()];
        order.extend(
            scenes
                .iter()
                .map(|s| s.name.clone())
                .filter(|n| n != "main" && !n.starts_with('_')),
        );
        return Ok(order);
    };

    for name in names {
        if !index.contains(name) {
            return Err(ScriptError::build(
                None,
                Some("next_order"),
                prov.line,
                format!("config 'next_order' refers to non-existent scene '@{}'", name),
            ));
        }
    }
    if !names.iter().any(|n| n == "main") {
        return Err(ScriptError::build(
            None,
            Some("next_order"),
            prov.line,
            "config 'next_order' must contain the 'main' scene",
        ));
    }
    Ok(names.clone())
}

/// The first scene declared after `name` that also appears in `next_order`.
fn successor(name: &str, declared: &[String], next_order: &[String]) -> Option<String> {
    let listed: HashSet<&str> = next_order.iter().map(String::as_str).collect();
    let start = declared.iter().position(|n| n == name)?;
    declared[start + 1..]
        .iter()
        .find(|n| listed.contains(n.as_str()))
        .cloned()
}
