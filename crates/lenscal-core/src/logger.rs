//! Stderr logger for calibration runs.
//!
//! Every line is tagged with the calibration stage that emitted it, derived
//! from the record target:
//!
//! ```text
//! [  0.412s  INFO   collect] collected 3 of 10 boards
//! [  2.981s  INFO     solve] calibrated 10 samples: rms 0.2310 px, ...
//! ```
//!
//! Records from the `lenscal` crates honour the configured level; other
//! crates (image decoding, corner detection backends) are capped at `warn`.
//! Use [`init_with_level`] once at startup, or [`init_tracing`] with the
//! `tracing` feature.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose records follow the configured level.
const LENSCAL_CRATES: [&str; 5] = [
    "lenscal",
    "lenscal_core",
    "lenscal_chessboard",
    "lenscal_optim",
    "lenscal_undistort",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level `{0}` (expected off, error, warn, info, debug or trace)")]
pub struct LevelParseError(pub String);

/// Parse a level name as accepted on the command line.
pub fn parse_level(name: &str) -> Result<LevelFilter, LevelParseError> {
    name.trim()
        .parse::<LevelFilter>()
        .map_err(|_| LevelParseError(name.to_owned()))
}

fn is_lenscal_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    LENSCAL_CRATES.contains(&krate)
}

/// Short stage tag for a record target.
fn stage_of(target: &str) -> &str {
    let mut path = target.split("::");
    let krate = path.next().unwrap_or(target);
    match krate {
        "lenscal_chessboard" => "detect",
        "lenscal_optim" => "solve",
        "lenscal_undistort" => "undistort",
        "lenscal_core" => "core",
        "lenscal" => match path.next() {
            Some("collector") => "collect",
            Some("store") => "store",
            Some("source") | Some("display") => "io",
            Some(_) | None => "run",
        },
        _ => krate,
    }
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn new(level: LevelFilter) -> Self {
        Self {
            level,
            started: Instant::now(),
        }
    }

    fn line(&self, elapsed: f64, record: &Record) -> String {
        format!(
            "[{:7.3}s {:>5} {:>9}] {}",
            elapsed,
            record.level(),
            stage_of(record.target()),
            record.args()
        )
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let limit = if is_lenscal_target(metadata.target()) {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        };
        metadata.level() <= limit
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.line(self.started.elapsed().as_secs_f64(), record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger::new(level));
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// `EnvFilter` directives equivalent to the stderr logger's policy.
#[cfg(feature = "tracing")]
fn default_directives(level: LevelFilter) -> String {
    let level = level.to_string().to_lowercase();
    let mut directives = String::from("warn");
    for krate in LENSCAL_CRATES {
        directives.push_str(&format!(",{krate}={level}"));
    }
    directives
}

/// Install a `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the `lenscal` crates log at `level`
/// and everything else at `warn`. Span close events carry the timing of the
/// instrumented calibration stages. With `json` set, events are emitted as
/// flattened JSON lines.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}
