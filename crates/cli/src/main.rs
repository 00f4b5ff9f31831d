mod commands;
mod console;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use sceneflow_core::ExecutableModel;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Sceneflow scene script toolchain.
#[derive(Parser)]
#[command(name = "sceneflow", version, about = "Sceneflow scene script toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log engine activity (debug level) to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a scene script (or canvas) to executable model JSON
    Compile {
        /// Path to the .scene source file
        file: PathBuf,
        /// Treat the input as a canvas document
        #[arg(long)]
        canvas: bool,
        /// Write the model to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check a scene script and summarize it
    Check {
        /// Path to the .scene source file, canvas or compiled model JSON
        file: PathBuf,
    },

    /// Play a scene script interactively in the terminal
    Play {
        /// Path to the .scene source file, canvas or compiled model JSON
        file: PathBuf,
        /// Scene to start from (defaults to main)
        #[arg(long)]
        scene: Option<String>,
        /// First name used for built-in variables
        #[arg(long, default_value = "friend")]
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile { file, canvas, out } => {
            commands::compile::cmd_compile(&file, canvas, out.as_deref(), cli.output, cli.quiet);
        }
        Commands::Check { file } => {
            commands::check::cmd_check(&file, cli.output, cli.quiet);
        }
        Commands::Play { file, scene, name } => {
            commands::play::cmd_play(&file, scene.as_deref(), &name, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// How an input file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputKind {
    Script,
    Canvas,
    Model,
}

impl InputKind {
    pub(crate) fn detect(path: &Path, canvas: bool) -> Self {
        if canvas {
            return InputKind::Canvas;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("canvas") => InputKind::Canvas,
            Some("json") => InputKind::Model,
            _ => InputKind::Script,
        }
    }
}

/// Read and build `path`, exiting with status 1 on any failure.
pub(crate) fn load_model(
    path: &Path,
    kind: InputKind,
    output: OutputFormat,
    quiet: bool,
) -> ExecutableModel {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let result = match kind {
        InputKind::Script => sceneflow_core::compile(&text).map_err(|e| {
            match output {
                OutputFormat::Json => {
                    let err_json = serde_json::to_string_pretty(&e.to_json_value())
                        .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
                    eprintln!("{}", err_json);
                }
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("{}: {}", path.display(), e);
                    }
                }
            }
        }),
        InputKind::Canvas => sceneflow_core::import_canvas_str(&text).map_err(|e| {
            let msg = format!("error importing canvas '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
        }),
        InputKind::Model => serde_json::from_str::<ExecutableModel>(&text).map_err(|e| {
            let msg = format!("error parsing model JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
        }),
    };

    match result {
        Ok(model) => model,
        Err(()) => process::exit(1),
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
