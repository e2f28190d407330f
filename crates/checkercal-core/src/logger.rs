//! Stderr logger for the `log` facade.
//!
//! Lines look like `[  0.012s  INFO checkercal::search] message`. Front ends
//! call [`init_with_level`] once at startup; library code only emits through
//! `log` macros and never installs a logger itself.

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

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs anything; later calls are no-ops and keep the
/// original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` wins when set; otherwise
/// events at `default_level` and above are kept.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(default_level)));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(feature = "tracing")]
fn level_directive(level: LevelFilter) -> String {
    level.to_string().to_ascii_lowercase()
}

#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter as TraceLevel;

    #[test]
    fn log_level_becomes_filter_default() {
        assert_eq!("warn", level_directive(LevelFilter::Warn));
        assert_eq!("off", level_directive(LevelFilter::Off));

        let filter = EnvFilter::new(level_directive(LevelFilter::Debug));
        assert_eq!(Some(TraceLevel::DEBUG), filter.max_level_hint());
        let filter = EnvFilter::new(level_directive(LevelFilter::Error));
        assert_eq!(Some(TraceLevel::ERROR), filter.max_level_hint());
    }
}
