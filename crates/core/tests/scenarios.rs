//! End-to-end compile scenarios and whole-model properties.

use sceneflow_core::{compile, ButtonAction, ExecutableModel, SceneRef, Stage};
use std::path::Path;

fn demo_source() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/help.scene");
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

fn demo() -> ExecutableModel {
    compile(&demo_source()).unwrap_or_else(|e| panic!("demo script failed to compile: {}", e))
}

#[test]
fn demo_script_compiles() {
    let model = demo();
    assert_eq!(model.order, vec!["main", "faq", "reset", "unknown", "contact"]);
    assert_eq!(model.config.timeout_time, Some(120));
    assert_eq!(model.config.static_vars()["product"], "Sceneflow");

    let main = model.scene("main").unwrap();
    assert_eq!(main.row_width, 2);
    let labels: Vec<_> = main.buttons.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["FAQ", "Contact", "Continue »", "Website"]);
    assert_eq!(main.next.as_deref(), Some("faq"));
    assert_eq!(main.message(), Some("This is the {{product}} help centre.\nPick a topic below."));

    let faq = model.scene("faq").unwrap();
    assert_eq!(faq.entries["password"], SceneRef::Named("reset".into()));
    assert_eq!(faq.default_entry_target, Some(SceneRef::Named("unknown".into())));
    assert_eq!(
        faq.buttons[0].action,
        ButtonAction::Suggest {
            scene: SceneRef::Named("reset".into()),
            entry: "password".into()
        }
    );

    let reset = model.scene("reset").unwrap();
    assert_eq!(reset.buttons[0].label, "Home");
    assert_eq!(reset.buttons[0].action, ButtonAction::Return("main".into()));
}

#[test]
fn compiling_twice_is_deterministic() {
    let src = demo_source();
    let a = compile(&src).unwrap();
    let b = compile(&src).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn main_is_always_an_entry_point() {
    let model = demo();
    assert!(model.scenes.contains_key("main"));
    assert!(model.config.next_order.iter().any(|n| n == "main"));
}

#[test]
fn every_named_target_resolves() {
    let model = demo();
    for scene in model.scenes.values() {
        for (what, target) in scene.scene_refs() {
            if let SceneRef::Named(name) = target {
                assert!(
                    model.scenes.contains_key(name),
                    "{} in '{}' points to '{}'",
                    what,
                    scene.name,
                    name
                );
            }
        }
    }
}

#[test]
fn model_survives_json_round_trip() {
    let model = demo();
    let value = serde_json::to_value(&model).unwrap();
    let back = ExecutableModel::from_json(value).unwrap();
    assert_eq!(back, model);

    let display = model.to_display_json();
    assert!(display.get("source").is_none());
    assert_eq!(display["scenes"]["faq"]["_keep_history"], true);
    assert_eq!(display["scenes"]["main"]["_next"], "faq");
}

#[test]
fn lone_main_with_next_fails() {
    let err = compile(r#"@ main { title="T" message="M" buttons { next } }"#).unwrap_err();
    assert_eq!(err.stage, Stage::Build);
    assert_eq!(err.scene.as_deref(), Some("main"));
}

#[test]
fn next_successor_is_the_next_declared_listed_scene() {
    let model = compile(
        r#"$ { next_order = ["main", "c", "b"] }
           @ main { text = "m" buttons { next } }
           @ b { text = "b" buttons { back } }
           @ c { text = "c" buttons { next } }
           @ _tail { text = "t" buttons { next } }"#,
    )
    .unwrap();
    assert_eq!(model.scene("main").unwrap().next.as_deref(), Some("b"));
    assert_eq!(model.scene("c").unwrap().next, None);
    let tail = model.scene("_tail").unwrap();
    assert!(tail.has_next_button);
    assert_eq!(tail.next, None);
}

#[test]
fn last_in_next_order_with_next_fails() {
    let err = compile(
        r#"$ { next_order = ["c", "main"] }
           @ main { text = "m" buttons { next } }
           @ c { text = "c" buttons { next } }"#,
    )
    .unwrap_err();
    assert_eq!(err.stage, Stage::Build);
    assert_eq!(err.scene.as_deref(), Some("main"));
    assert!(err.message.contains("last in next_order"));
}

#[test]
fn duplicate_main_fails() {
    let err = compile("@ main { text = \"a\" }\n@ main { text = \"b\" }").unwrap_err();
    assert!(err.message.contains("duplicate scene name"));
}

#[test]
fn suggest_without_entry_fails() {
    let err = compile(
        r#"@ main { text = "m" buttons { faq suggest("Hint", "pw") } }
           @ faq { text = "f" entries { main("other") } }"#,
    )
    .unwrap_err();
    assert_eq!(err.stage, Stage::Build);
    assert!(err.message.contains("suggest-button 'Hint'"));
}

#[test]
fn errors_report_their_stage() {
    let err = compile("@ main { text = \"open }").unwrap_err();
    assert_eq!(err.stage, Stage::Lex);

    let err = compile("@ main { text = }").unwrap_err();
    assert_eq!(err.stage, Stage::Parse);
    assert!(err.message.contains("expected"));

    let err = compile("@ faq { text = \"x\" }").unwrap_err();
    assert_eq!(err.stage, Stage::Build);
    assert!(err.to_string().starts_with("build error at line"));
}

#[test]
fn script_without_back_or_return_collapses_history() {
    let model = compile(
        r#"@ main { text = "m" buttons { next } }
           @ second { text = "s" buttons { main("Start over") } }"#,
    )
    .unwrap();
    assert!(model.scenes.values().all(|s| !s.keep_history));
}
