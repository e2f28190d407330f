use std::error::Error;
use std::path::{Path, PathBuf};

use checkercal::candidates::size_hint;
use checkercal::detect::detect_image_file;
use checkercal::pipeline::{Pipeline, PipelineParams};
use checkercal::report::{outcome_json, CalibrationReport, DetectionReport};
use checkercal::session_io::SessionInput;
use checkercal::CalibError;
use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Chessboard corner detection and camera calibration.
#[derive(Debug, Parser)]
#[command(author, version, about = "Chessboard corner detection and camera calibration")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON file with pipeline parameter overrides. Defaults are used if omitted.
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    /// Pretty-print the JSON payload.
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Find the inner corners of a chessboard. Omit ROWS/COLS (or pass 0)
    /// to search sizes automatically.
    #[command(allow_negative_numbers = true)]
    Detect {
        image: PathBuf,
        #[arg(default_value_t = 0)]
        rows: i64,
        #[arg(default_value_t = 0)]
        cols: i64,
    },
    /// Calibrate a camera from per-view image and board points.
    Calibrate {
        /// Text data file, or a JSON request with `--json`.
        data: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn load_session(path: &Path, json: bool) -> Result<SessionInput, CalibError> {
    let loaded = if json {
        SessionInput::load_json(path)
    } else {
        SessionInput::load_text(path)
    };
    loaded.map_err(|err| CalibError::InvalidInput(format!("{}: {err}", path.display())))
}

fn invocation_failed<T>(outcome: &Result<T, CalibError>) -> bool {
    match outcome {
        Err(err) if err.kind().is_invocation_error() => {
            log::error!("{err}");
            true
        }
        _ => false,
    }
}

/// Run the selected command and print its payload. Returns whether the
/// payload reports an invocation failure.
fn run(args: &Args) -> Result<bool, Box<dyn Error>> {
    let params = match &args.params {
        Some(path) => PipelineParams::load_json(path)
            .map_err(|err| format!("params file {}: {err}", path.display()))?,
        None => PipelineParams::default(),
    };
    let pipeline = Pipeline::native(params);

    let (payload, failed) = match &args.command {
        Command::Detect { image, rows, cols } => {
            let outcome = detect_image_file(image, size_hint(*rows, *cols), &pipeline);
            (
                outcome_json::<_, DetectionReport>(&outcome, args.pretty),
                invocation_failed(&outcome),
            )
        }
        Command::Calibrate { data, json } => {
            let outcome = load_session(data, *json).and_then(|input| {
                pipeline.calibrate(input.image_points, input.object_points, input.image_size)
            });
            (
                outcome_json::<_, CalibrationReport>(&outcome, args.pretty),
                invocation_failed(&outcome),
            )
        }
    };
    println!("{payload}");
    Ok(failed)
}

fn main() {
    match try_main() {
        Ok(false) => {}
        Ok(true) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn try_main() -> Result<bool, Box<dyn Error>> {
    let args = Args::parse();

    #[cfg(not(feature = "tracing"))]
    checkercal::core::init_with_level(args.log_level)?;
    #[cfg(feature = "tracing")]
    checkercal::core::init_tracing(false, args.log_level);

    run(&args)
}
