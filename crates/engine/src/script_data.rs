//! Per-session runtime state.
//!
//! The executable model is shared read-only behind an `Arc`; everything a
//! session mutates (history, pending entry, once-hook keys, memoized
//! reference counts) lives in a [`ScriptData`] minted by a factory for each
//! flow start.

use crate::error::RuntimeError;
use sceneflow_core::{ButtonAction, Config, ExecutableModel, Scene, SceneRef, TemplateKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub type ScriptDataFactory = Arc<dyn Fn() -> ScriptData + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ScriptData {
    model: Arc<ExecutableModel>,
    /// Last submitted or suggested free text; cleared after every render.
    pub entry: Option<String>,
    /// Visited scene names; the last element is the current scene.
    pub history: Vec<String>,
    /// `"scene.hook"` keys of once-hooks that already ran.
    pub executed_once_hooks: HashSet<String>,
    pub static_vars: BTreeMap<String, Value>,
    button_ref_count: HashMap<String, usize>,
    scene_ref_count: HashMap<String, usize>,
}

/// Check `model` for internal consistency and return a factory producing
/// fresh state for each session.
pub fn script_data_factory(model: Arc<ExecutableModel>) -> Result<ScriptDataFactory, RuntimeError> {
    validate_model(&model)?;
    Ok(Arc::new(move || ScriptData::new(Arc::clone(&model))))
}

fn validate_model(model: &ExecutableModel) -> Result<(), RuntimeError> {
    if !model.scenes.contains_key("main") {
        return Err(RuntimeError::Model("missing 'main' scene".into()));
    }
    if model.order.len() != model.scenes.len() {
        return Err(RuntimeError::Model(format!(
            "'order' lists {} scenes but the model holds {}",
            model.order.len(),
            model.scenes.len()
        )));
    }
    for name in &model.order {
        if !model.scenes.contains_key(name) {
            return Err(RuntimeError::Model(format!("'order' names unknown scene '{}'", name)));
        }
    }
    for (key, scene) in &model.scenes {
        if key != &scene.name {
            return Err(RuntimeError::Model(format!(
                "scene stored under '{}' is named '{}'",
                key, scene.name
            )));
        }
    }
    if !model.config.next_order.iter().any(|n| n == "main") {
        return Err(RuntimeError::Model("'next_order' must contain 'main'".into()));
    }
    for name in &model.config.next_order {
        if !model.scenes.contains_key(name) {
            return Err(RuntimeError::Model(format!(
                "'next_order' names unknown scene '{}'",
                name
            )));
        }
    }
    for scene in model.scenes.values() {
        for (what, target) in scene.scene_refs() {
            if let SceneRef::Named(name) = target {
                if !model.scenes.contains_key(name) {
                    return Err(RuntimeError::Model(format!(
                        "{} in scene '{}' points to unknown scene '{}'",
                        what, scene.name, name
                    )));
                }
            }
        }
        if let Some(next) = &scene.next {
            if !model.scenes.contains_key(next) {
                return Err(RuntimeError::Model(format!(
                    "scene '{}' has unknown successor '{}'",
                    scene.name, next
                )));
            }
        }
    }
    Ok(())
}

impl ScriptData {
    pub fn new(model: Arc<ExecutableModel>) -> Self {
        let static_vars = model.config.static_vars();
        ScriptData {
            model,
            entry: None,
            history: Vec::new(),
            executed_once_hooks: HashSet::new(),
            static_vars,
            button_ref_count: HashMap::new(),
            scene_ref_count: HashMap::new(),
        }
    }

    pub fn model(&self) -> &Arc<ExecutableModel> {
        &self.model
    }

    pub fn config(&self) -> &Config {
        &self.model.config
    }

    pub fn timeout_time(&self) -> Option<u64> {
        self.model.config.timeout_time
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.model.scene(name)
    }

    pub fn current_scene_name(&self) -> &str {
        self.history.last().map(String::as_str).unwrap_or("main")
    }

    pub fn prev_scene_name(&self) -> &str {
        match self.history.len() {
            n if n >= 2 => &self.history[n - 2],
            _ => "main",
        }
    }

    /// Precomputed successor of the current scene.
    pub fn next_scene_name(&self) -> Option<&str> {
        self.scene(self.current_scene_name())
            .and_then(|s| s.next.as_deref())
    }

    /// Template engine for `scene`: its own setting, then the config's,
    /// then `vars`.
    pub fn template_kind(&self, scene: &Scene) -> TemplateKind {
        scene
            .template
            .or(self.model.config.template)
            .unwrap_or_default()
    }

    /// Drop the current scene and take the one before it.
    pub fn pop_prev_scene_name(&mut self) -> Option<String> {
        self.history.pop();
        self.history.pop()
    }

    /// Truncate history to just before the last occurrence of `target`.
    /// No-op when `target` was never visited.
    pub fn rollback_to(&mut self, target: &str) {
        if let Some(pos) = self.history.iter().rposition(|n| n == target) {
            self.history.truncate(pos);
        }
    }

    /// Reset history to the single current scene.
    pub fn collapse_history(&mut self, current: &str) {
        self.history.clear();
        self.history.push(current.to_owned());
    }

    /// Mark a once-hook as executed; returns `false` if it already ran.
    pub fn claim_once(&mut self, scene: &str, hook: &str) -> bool {
        self.executed_once_hooks.insert(format!("{}.{}", scene, hook))
    }

    pub fn has_run_once(&self, scene: &str, hook: &str) -> bool {
        self.executed_once_hooks.contains(&format!("{}.{}", scene, hook))
    }

    /// Number of buttons, across all scenes, that navigate to `name`.
    pub fn button_ref_count(&mut self, name: &str) -> usize {
        if let Some(n) = self.button_ref_count.get(name) {
            return *n;
        }
        let count = self
            .model
            .scenes
            .values()
            .map(|s| s.buttons.iter().filter(|b| targets(&b.action, name)).count())
            .sum();
        self.button_ref_count.insert(name.to_owned(), count);
        count
    }

    /// Number of scenes holding at least one button to `name`.
    pub fn scene_ref_count(&mut self, name: &str) -> usize {
        if let Some(n) = self.scene_ref_count.get(name) {
            return *n;
        }
        let count = self
            .model
            .scenes
            .values()
            .filter(|s| s.buttons.iter().any(|b| targets(&b.action, name)))
            .count();
        self.scene_ref_count.insert(name.to_owned(), count);
        count
    }
}

fn targets(action: &ButtonAction, name: &str) -> bool {
    matches!(action, ButtonAction::Scene(SceneRef::Named(n)) if n == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneflow_core::compile;

    fn data(src: &str) -> ScriptData {
        let model = Arc::new(compile(src).unwrap());
        script_data_factory(model).unwrap()()
    }

    const SRC: &str = r#"
$ vars { greeting = "hi" }
@ main { text = "m" buttons { a b } }
@ a { text = "a" buttons { b back } }
@ b { text = "b" buttons { main("Home") } }
"#;

    #[test]
    fn factory_gives_independent_state() {
        let model = Arc::new(compile(SRC).unwrap());
        let factory = script_data_factory(model).unwrap();
        let mut one = factory();
        let two = factory();
        one.history.push("a".into());
        assert!(two.history.is_empty());
        assert_eq!(one.static_vars["greeting"], "hi");
    }

    #[test]
    fn history_navigation() {
        let mut d = data(SRC);
        assert_eq!(d.current_scene_name(), "main");
        assert_eq!(d.prev_scene_name(), "main");
        d.history = vec!["main".into(), "a".into(), "b".into(), "a".into(), "b".into()];
        assert_eq!(d.prev_scene_name(), "a");

        d.rollback_to("a");
        assert_eq!(d.history, vec!["main", "a", "b"]);
        d.rollback_to("nowhere");
        assert_eq!(d.history, vec!["main", "a", "b"]);

        assert_eq!(d.pop_prev_scene_name().as_deref(), Some("a"));
        assert_eq!(d.history, vec!["main"]);
        assert_eq!(d.pop_prev_scene_name(), None);
    }

    #[test]
    fn reference_counts_are_memoized() {
        let mut d = data(SRC);
        assert_eq!(d.button_ref_count("b"), 2);
        assert_eq!(d.scene_ref_count("b"), 2);
        assert_eq!(d.button_ref_count("main"), 1);
        assert_eq!(d.button_ref_count("b"), 2);
    }

    #[test]
    fn once_hook_keys() {
        let mut d = data(SRC);
        assert!(d.claim_once("main", "on_enter_once"));
        assert!(!d.claim_once("main", "on_enter_once"));
        assert!(d.has_run_once("main", "on_enter_once"));
    }

    #[test]
    fn inconsistent_model_is_rejected() {
        let mut model = compile(SRC).unwrap();
        model.config.next_order.retain(|n| n != "main");
        let err = script_data_factory(Arc::new(model)).err().unwrap();
        assert!(matches!(err, RuntimeError::Model(_)));

        let mut model = compile(SRC).unwrap();
        model.order.push("ghost".into());
        assert!(script_data_factory(Arc::new(model)).is_err());
    }
}
