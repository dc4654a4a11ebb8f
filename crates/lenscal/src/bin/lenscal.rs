//! `lenscal <board_w> <board_h> <n_boards> [delay] [image_scale]`
//!
//! Collects `n_boards` chessboard views from a frame directory, calibrates,
//! writes the intrinsics file and then undistorts the remaining frames.

use clap::error::ErrorKind;
use clap::Parser;
use lenscal::{
    BoardGeometry, CalibError, CalibrationConfig, DebounceTiming, Display, ImageDirDisplay,
    ImageDirSource, NullDisplay, Pipeline,
};
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "lenscal",
    about = "Checkerboard camera calibration with live undistortion",
    version
)]
struct Cli {
    /// Interior corners per board row.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    board_w: u32,

    /// Interior corners per board column.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    board_h: u32,

    /// Number of board views to collect.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    n_boards: u32,

    /// Minimum seconds between accepted views [default: 1.0].
    delay: Option<f64>,

    /// Detection-time downscale factor [default: 0.5].
    image_scale: Option<f32>,

    /// Directory of frames standing in for the camera.
    #[arg(long, default_value = "frames")]
    source: PathBuf,

    /// Intrinsics output file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write preview frames into this directory.
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Debounce on the nominal frame period of a stream at this rate
    /// instead of the wall clock.
    #[arg(long)]
    frame_rate: Option<f64>,

    /// JSON calibration config; positional arguments override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info", value_parser = lenscal::core::parse_level)]
    log_level: LevelFilter,

    /// Emit JSON log lines (requires the `tracing` feature).
    #[arg(long)]
    json_log: bool,

    /// Stop after the undistortion map is built.
    #[arg(long)]
    skip_live: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return usage_error(err),
    };
    init_logging(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn usage_error(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        ErrorKind::MissingRequiredArgument
        | ErrorKind::UnknownArgument
        | ErrorKind::TooManyValues => {
            eprintln!("ERROR: wrong number of input parameters");
            let _ = err.print();
            ExitCode::FAILURE
        }
        _ => {
            let _ = err.print();
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    let _ = lenscal::core::init_with_level(cli.log_level);
    if cli.json_log {
        log::warn!("--json-log needs the `tracing` feature; using plain logs");
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    let _ = tracing_log::LogTracer::init_with_filter(cli.log_level);
    lenscal::core::init_tracing(cli.log_level, cli.json_log);
}

fn build_config(cli: &Cli) -> Result<CalibrationConfig, CalibError> {
    let board = BoardGeometry::new(cli.board_w, cli.board_h)
        .map_err(|e| CalibError::Configuration(e.to_string()))?;
    let mut config = match &cli.config {
        Some(path) => CalibrationConfig::load_json(path)?,
        None => CalibrationConfig::new(board, cli.n_boards as usize),
    };
    config.board = board;
    config.n_boards = cli.n_boards as usize;
    if let Some(delay) = cli.delay {
        config.delay_s = delay;
    }
    if let Some(scale) = cli.image_scale {
        config.image_scale = scale;
    }
    if let Some(fps) = cli.frame_rate {
        config.timing = DebounceTiming::FrameRate { fps };
    }
    if let Some(output) = &cli.output {
        config.output_path = output.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CalibError> {
    let config = build_config(&cli)?;
    let pipeline = Pipeline::with_chess_detector(config)?;
    let mut source = ImageDirSource::open(&cli.source)?;
    let mut display: Box<dyn Display> = match &cli.preview_dir {
        Some(dir) => Box::new(ImageDirDisplay::create(dir)?),
        None => Box::new(NullDisplay),
    };

    let report = pipeline.calibrate(&mut source, &mut display)?;
    println!(
        "reprojection error {:.4} px, intrinsics written to {}",
        report.calibration.rms,
        report.output_path.display()
    );
    if cli.skip_live {
        return Ok(());
    }

    let frames = pipeline.run_live(&mut source, &mut display, &report.corrector)?;
    info!("live loop finished after {frames} frames");
    Ok(())
}
