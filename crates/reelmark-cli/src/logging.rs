use std::io;
use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Filter directive for the given verbosity.
///
/// 0 uses the configured level, 1 is debug with noisy HTTP internals
/// suppressed, 2+ is trace.
pub fn filter_directive(configured: &str, verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".into();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "debug,hyper=warn,hyper_util=warn,reqwest=info".into(),
        _ => "trace".into(),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over flags and config.
///
/// With `log_dir` set, events also go to a daily-rotated file; the returned
/// guard must be held until exit so buffered lines are flushed.
pub fn init_logging(
    configured: &str,
    verbose: u8,
    quiet: bool,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let directive = filter_directive(configured, verbose, quiet);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let stderr_layer = fmt::layer().with_target(false).with_writer(io::stderr);
    let registry = Registry::default().with(filter).with(stderr_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            // Files are named reelmark.log.YYYY-MM-DD.
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "reelmark.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
            registry.with(file_layer).try_init()?;
            Ok(Some(guard))
        }
        None => {
            registry.try_init()?;
            Ok(None)
        }
    }
}
