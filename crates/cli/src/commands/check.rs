use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::process;

use sceneflow_core::{ButtonAction, ExecutableModel, SceneRef};
use sceneflow_engine::Flow;

use crate::{load_model, report_error, InputKind, OutputFormat};

pub(crate) fn cmd_check(file: &Path, output: OutputFormat, quiet: bool) {
    let model = load_model(file, InputKind::detect(file, false), output, quiet);
    let hooks = hook_methods(&model);
    let unreachable = unreachable_scenes(&model);

    // a loaded model JSON has not been through the builder
    let flow = match Flow::from_model(model) {
        Ok(f) => f,
        Err(e) => {
            report_error(&format!("invalid model: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let model = flow.model();

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "ok": true,
                "scenes": model.order,
                "next_order": model.config.next_order,
                "hooks": hooks,
                "unreachable": unreachable,
                "timeout_time": model.config.timeout_time,
            });
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}: ok", file.display());
            println!("  Scenes: {} ({})", model.order.len(), model.order.join(", "));
            println!("  Next order: {}", model.config.next_order.join(" → "));
            if !hooks.is_empty() {
                println!(
                    "  Hooks: {}",
                    hooks.iter().cloned().collect::<Vec<_>>().join(", ")
                );
            }
            if let Some(secs) = model.config.timeout_time {
                println!("  Timeout: {}s", secs);
            }
            for name in &unreachable {
                println!("  WARNING: scene '{}' is not reachable from 'main'", name);
            }
        }
    }
}

/// Every hook method a host must register to run the script.
pub(crate) fn hook_methods(model: &ExecutableModel) -> BTreeSet<String> {
    model
        .scenes
        .values()
        .flat_map(|s| {
            [&s.on_enter, &s.on_enter_once, &s.on_exit, &s.on_timeout]
                .into_iter()
                .flatten()
                .flatten()
        })
        .map(|call| call.method.clone())
        .collect()
}

/// Scenes no forward path leads to from `main`. `back` is not followed
/// since it can only return to an already visited scene.
fn unreachable_scenes(model: &ExecutableModel) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from(["main".to_owned()]);
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(scene) = model.scene(&name) else {
            continue;
        };
        let mut targets: Vec<String> = scene
            .scene_refs()
            .into_iter()
            .filter_map(|(_, r)| match r {
                SceneRef::Named(n) => Some(n.clone()),
                _ => None,
            })
            .collect();
        targets.extend(scene.buttons.iter().filter_map(|b| match &b.action {
            ButtonAction::Return(t) => Some(t.clone()),
            _ => None,
        }));
        targets.extend(scene.next.clone());
        queue.extend(targets.into_iter().filter(|t| !seen.contains(t)));
    }
    model
        .order
        .iter()
        .filter(|n| !seen.contains(*n))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_follows_buttons_entries_and_next() {
        let model = sceneflow_core::compile(
            r#"
@ main { text = "m" buttons { a("A") next } }
@ a { text = "a" entries { b } }
@ b { text = "b" on_enter { track } buttons { next } }
@ island { text = "i" on_exit { track save } }
"#,
        )
        .unwrap();
        assert_eq!(unreachable_scenes(&model), Vec::<String>::new());
        assert_eq!(
            hook_methods(&model).into_iter().collect::<Vec<_>>(),
            vec!["save", "track"]
        );

        let model = sceneflow_core::compile(
            r#"
$ { next_order = ["main"] }
@ main { text = "m" buttons { a("A") } }
@ a { text = "a" }
@ island { text = "i" }
"#,
        )
        .unwrap();
        assert_eq!(unreachable_scenes(&model), vec!["island"]);
    }
}
