use std::path::Path;
use std::process;

use crate::{load_model, report_error, InputKind, OutputFormat};

pub(crate) fn cmd_compile(
    file: &Path,
    canvas: bool,
    out: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let model = load_model(file, InputKind::detect(file, canvas), output, quiet);

    // files written with --out keep the source so they can be played back
    let value = match out {
        Some(_) => serde_json::to_value(&model).unwrap_or(serde_json::Value::Null),
        None => model.to_display_json(),
    };
    let pretty = serde_json::to_string_pretty(&value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));

    match out {
        None => println!("{}", pretty),
        Some(path) => {
            if let Err(e) = std::fs::write(path, pretty + "\n") {
                let msg = format!("error writing '{}': {}", path.display(), e);
                report_error(&msg, output, quiet);
                process::exit(1);
            }
            if !quiet {
                match output {
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::json!({ "written": path.display().to_string(), "scenes": model.order.len() })
                    ),
                    OutputFormat::Text => println!(
                        "wrote {} scene(s) to {}",
                        model.order.len(),
                        path.display()
                    ),
                }
            }
        }
    }
}
