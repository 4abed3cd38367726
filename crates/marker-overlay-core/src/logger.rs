//! Session logging.
//!
//! [`init_with_level`] installs a stderr logger that applies the requested
//! level to the `marker_overlay*` crates and caps every other target at
//! `warn`, so image codecs and the like stay quiet in verbose runs. Lines
//! look like `+   1.250s DEBUG render::scene: message`.
//!
//! With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` instead, reporting span close events so per-frame
//! timings of the instrumented stages show up.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt as tfmt, EnvFilter};

const OWN_TARGET_PREFIX: &str = "marker_overlay";
const FOREIGN_LEVEL: LevelFilter = LevelFilter::Warn;

/// Output flavor of [`init_tracing`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines with an uptime timestamp.
    #[default]
    Text,
    /// One JSON object per event, fields flattened.
    Json,
}

/// Level that applies to `target`.
fn level_for(target: &str, own: LevelFilter) -> LevelFilter {
    if target.starts_with(OWN_TARGET_PREFIX) {
        own
    } else {
        own.min(FOREIGN_LEVEL)
    }
}

/// Shorten `marker_overlay_render::scene` to `render::scene`.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix(OWN_TARGET_PREFIX)
        .map(|rest| rest.trim_start_matches(['_', ':']))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(target)
}

fn write_line(
    out: &mut dyn Write,
    elapsed: Duration,
    level: Level,
    target: &str,
    args: &fmt::Arguments<'_>,
) -> io::Result<()> {
    writeln!(
        out,
        "+{:>8.3}s {:<5} {}: {}",
        elapsed.as_secs_f64(),
        level,
        short_target(target),
        args
    )
}

struct SessionLogger {
    level: LevelFilter,
    started: Instant,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl SessionLogger {
    fn new(level: LevelFilter, sink: Box<dyn Write + Send>) -> Self {
        Self {
            level,
            started: Instant::now(),
            sink: Mutex::new(sink),
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_for(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // A poisoned sink still accepts writes.
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let _ = write_line(
            &mut **sink,
            self.started.elapsed(),
            record.level(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let _ = sink.flush();
    }
}

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

/// Install the stderr logger; `level` applies to this workspace's crates.
///
/// Only the first call installs anything; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| SessionLogger::new(level, Box::new(io::stderr())));
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// `info` for this workspace and `warn` elsewhere.
#[cfg(feature = "tracing")]
pub fn init_tracing(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{OWN_TARGET_PREFIX}=info")));
    let builder = tfmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(tfmt::time::Uptime::default());
    match format {
        LogFormat::Json => builder.json().flatten_event(true).finish().try_init(),
        LogFormat::Text => builder.compact().finish().try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().expect("buffer").clone()).expect("utf8")
        }
    }

    fn emit(logger: &SessionLogger, level: Level, target: &str, msg: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(format_args!("{msg}"))
                .build(),
        );
    }

    #[test]
    fn foreign_targets_are_capped_at_warn() {
        assert_eq!(level_for("marker_overlay_render::scene", LevelFilter::Trace), LevelFilter::Trace);
        assert_eq!(level_for("image::codecs::png", LevelFilter::Trace), LevelFilter::Warn);
        assert_eq!(level_for("image::codecs::png", LevelFilter::Error), LevelFilter::Error);
    }

    #[test]
    fn targets_drop_the_workspace_prefix() {
        assert_eq!(short_target("marker_overlay_render::scene"), "render::scene");
        assert_eq!(short_target("marker_overlay::pipeline"), "pipeline");
        assert_eq!(short_target("marker_overlay"), "marker_overlay");
        assert_eq!(short_target("image::codecs"), "image::codecs");
    }

    #[test]
    fn lines_carry_elapsed_level_and_target() {
        let mut out = Vec::new();
        write_line(
            &mut out,
            Duration::from_millis(1250),
            Level::Debug,
            "marker_overlay_core::conflict",
            &format_args!("marker {} excluded", 9),
        )
        .expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "+   1.250s DEBUG core::conflict: marker 9 excluded\n"
        );
    }

    #[test]
    fn logger_filters_before_writing() {
        let captured = Captured::default();
        let logger = SessionLogger::new(LevelFilter::Debug, Box::new(captured.clone()));
        emit(&logger, Level::Debug, "marker_overlay::pipeline", "kept");
        emit(&logger, Level::Trace, "marker_overlay::pipeline", "too verbose");
        emit(&logger, Level::Info, "png::decoder", "foreign chatter");
        emit(&logger, Level::Warn, "png::decoder", "foreign warning");

        let text = captured.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("DEBUG pipeline: kept"));
        assert!(lines[1].ends_with("WARN  png::decoder: foreign warning"));
    }

    #[test]
    fn second_install_is_a_no_op() {
        init_with_level(LevelFilter::Warn).expect("first install");
        init_with_level(LevelFilter::Trace).expect("second install");
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
