// ============================================================================
// Sketchpad CLI — headless replay of recorded gesture scripts
// ============================================================================
//
// Usage examples:
//   sketchpad --script doodle.json --output doodle.png
//   sketchpad -s scripts/*.json --output-dir renders/ --seed 7
//
// No window is opened in CLI mode. Each script builds a fresh project, feeds
// its events through the same dispatcher the GUI uses, and exports the final
// surface as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::io::{self, ExportError};
use crate::project::{HexColor, InputEvent, Project};
use crate::settings::AppSettings;

/// Sketchpad headless renderer.
///
/// Replay gesture scripts (JSON) against a drawing surface and export PNGs.
#[derive(Parser, Debug)]
#[command(
    name = "sketchpad",
    about = "Sketchpad headless gesture replay",
    long_about = "Replay recorded pointer/wheel/history events against a fresh drawing\n\
                  surface and export the result as PNG, without opening the GUI.\n\n\
                  Example:\n  \
                  sketchpad --script doodle.json --output doodle.png\n  \
                  sketchpad -s 'scripts/*.json' --output-dir renders/"
)]
pub struct CliArgs {
    /// Gesture script(s). Glob patterns accepted (e.g. "scripts/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub script: Vec<String>,

    /// Output PNG path. Only valid for a single script.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch replay; files keep the script's stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Seed for spray scatter, for reproducible renders.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print per-script history and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when a CLI-mode flag is present in the process arguments.
    /// Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--script" || a == "-s")
    }
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("could not read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

/// A recorded session: surface setup plus the events to replay.
#[derive(Debug, Deserialize)]
pub struct GestureScript {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub foreground: Option<HexColor>,
    #[serde(default)]
    pub background: Option<HexColor>,
    #[serde(default)]
    pub brush_size: Option<f32>,
    pub events: Vec<InputEvent>,
}

pub fn parse_script(source: &str) -> Result<GestureScript, ScriptError> {
    Ok(serde_json::from_str(source)?)
}

/// Build a project for `script` and run every event through it.
pub fn replay(script: &GestureScript, settings: &AppSettings, seed: Option<u64>) -> Project {
    let mut settings = settings.clone();
    if let Some(c) = script.foreground {
        settings.foreground = c.0;
    }
    if let Some(c) = script.background {
        settings.background = c.0;
    }
    if let Some(size) = script.brush_size {
        settings.brush_size = size;
    }

    let mut project = Project::new_untitled(1, script.width, script.height, &settings);
    if let Some(seed) = seed {
        project = project.with_seed(seed);
    }
    for event in &script.events {
        project.handle(event.clone());
    }
    // A script that ends mid-gesture is treated like the pointer leaving.
    project.handle(InputEvent::PointerLeave);
    project
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every script rendered, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.script);
    if inputs.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch replay.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let settings = AppSettings::load();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let started = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &settings, args.seed, args.verbose) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Replay one script file and write its PNG.
pub fn run_one(
    input: &Path,
    output: &Path,
    settings: &AppSettings,
    seed: Option<u64>,
    verbose: bool,
) -> Result<(), ScriptError> {
    let source = std::fs::read_to_string(input)?;
    let script = parse_script(&source)?;
    let project = replay(&script, settings, seed);

    if verbose {
        let history = project.history();
        println!(
            "  {} events, {} frame(s) in history, cursor at {:?}",
            script.events.len(),
            history.len(),
            history.step()
        );
        for desc in history.undo_history() {
            println!("    {}", desc);
        }
    }

    io::write_png(&project.render(), output)?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for one script.
///
/// Priority:
/// 1. `--output` (explicit path, single script)
/// 2. `--output-dir` (batch directory, script stem + `.png`)
/// 3. Next to the script, same stem, `.png`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let file_name = format!("{}.png", stem);

    if let Some(dir) = output_dir {
        return Some(dir.join(file_name));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(file_name))
}
