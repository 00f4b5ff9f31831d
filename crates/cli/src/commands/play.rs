use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;
use std::process;
use std::sync::Arc;

use parking_lot::Mutex;
use sceneflow_engine::{Flow, HookRegistry, Outcome, SessionHandle, TokioTimer, UserInfo};
use serde_json::Value;

use crate::console::{ConsoleHost, ConsoleState};
use crate::{load_model, report_error, InputKind, OutputFormat};

pub(crate) fn cmd_play(
    file: &Path,
    scene: Option<&str>,
    name: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let model = load_model(file, InputKind::detect(file, false), output, quiet);
    let hooks = console_hooks(&super::check::hook_methods(&model), output);
    let flow = match Flow::from_model(model) {
        Ok(f) => f.with_hooks(hooks),
        Err(e) => {
            report_error(&format!("invalid model: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start timer runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let (host, state) = ConsoleHost::new(output);
    let user = UserInfo {
        user_id: 1,
        chat_id: 1,
        first_name: name.to_owned(),
        ..UserInfo::default()
    };
    let timer = TokioTimer::new(runtime.handle().clone());
    let (session, first) = flow.start(Box::new(host), Box::new(timer), user, scene);
    note(&first, output, quiet);
    if !quiet && output == OutputFormat::Text {
        eprintln!("(enter a button number, free text, or /quit)");
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                report_error(&format!("error reading input: {}", e), output, quiet);
                break;
            }
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" {
            break;
        }

        let outcome = dispatch(&session, &state, input);
        note(&outcome, output, quiet);
        drain_redirects(&session, &state, output, quiet);

        let handed_off = state.lock().handed_off.clone();
        if let Some(handler) = handed_off {
            if !quiet && output == OutputFormat::Text {
                println!("\n(conversation handed off to {})", handler);
            }
            break;
        }
    }

    if !quiet && output == OutputFormat::Json {
        let snapshot = serde_json::to_value(session.snapshot()).unwrap_or(Value::Null);
        println!("{}", serde_json::json!({ "event": "end", "session": snapshot }));
    }
    // dropping the session disarms its timer before the runtime goes away
    drop(session);
}

/// A button number or exact label clicks; anything else is typed text.
fn dispatch(session: &SessionHandle, state: &Arc<Mutex<ConsoleState>>, input: &str) -> Outcome {
    let label = {
        let state = state.lock();
        input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| state.callbacks.get(i).cloned())
            .or_else(|| state.callbacks.iter().find(|l| l.as_str() == input).cloned())
    };
    match label {
        Some(label) => session.click(&label),
        None => session.submit_text(input),
    }
}

/// Feed queued redirect text back as user input, one event at a time.
fn drain_redirects(
    session: &SessionHandle,
    state: &Arc<Mutex<ConsoleState>>,
    output: OutputFormat,
    quiet: bool,
) {
    loop {
        let next = state.lock().redirects.pop_front();
        let Some(text) = next else {
            break;
        };
        if !quiet && output == OutputFormat::Text {
            println!("> {}", text);
        }
        let outcome = session.submit_text(&text);
        note(&outcome, output, quiet);
    }
}

fn note(outcome: &Outcome, output: OutputFormat, quiet: bool) {
    if quiet || output == OutputFormat::Json {
        return;
    }
    match outcome {
        Outcome::Ignored => println!("(nothing to do with that)"),
        Outcome::Failed(e) => eprintln!("  detail: {}", e),
        _ => {}
    }
}

fn arg_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `log` prints its arguments, `noop` does nothing, and any other method
/// the script names is echoed so scripts run without host code.
fn console_hooks(methods: &BTreeSet<String>, output: OutputFormat) -> HookRegistry {
    let mut echoed = methods.clone();
    echoed.insert("log".to_owned());
    echoed.remove("noop");

    let mut hooks = HookRegistry::new();
    hooks.register("noop", |_, _| Ok(()));
    for method in echoed {
        let name = method.clone();
        hooks.register(method, move |ctx, args| {
            let text: Vec<String> = args.iter().map(arg_text).collect();
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "event": "hook",
                        "method": name,
                        "scene": ctx.scene,
                        "trigger": ctx.event,
                        "args": args,
                    })
                ),
                OutputFormat::Text => println!("[{}] {}", name, text.join(" ")),
            }
            Ok(())
        });
    }
    hooks
}
