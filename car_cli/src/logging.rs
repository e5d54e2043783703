//! Tracing setup: console layer on stderr plus an optional JSON-lines file.
//!
//! stdout may carry the protocol, so nothing but replies is ever written there.

use std::path::Path;

use eyre::WrapErr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::FILE_GUARD;

/// Resolve the filter: `RUST_LOG` first, then the CLI flag, then the config.
fn env_filter(cli_level: Option<&str>, cfg_level: Option<&str>) -> EnvFilter {
    if let Ok(f) = EnvFilter::try_from_default_env() {
        return f;
    }
    let level = cli_level.or(cfg_level).unwrap_or("info");
    EnvFilter::try_new(level).unwrap_or_else(|err| {
        eprintln!("invalid log level {level:?} ({err}); defaulting to info");
        EnvFilter::new("info")
    })
}

fn file_appender(path: &str, rotation: Option<&str>) -> eyre::Result<RollingFileAppender> {
    let path = Path::new(path);
    let Some(name) = path.file_name() else {
        eyre::bail!("logging.file has no file name: {}", path.display());
    };
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("creating log directory {}", dir.display()))?;
    let rotation = match rotation.unwrap_or("never") {
        "daily" => Rotation::DAILY,
        "hourly" => Rotation::HOURLY,
        _ => Rotation::NEVER,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .wrap_err_with(|| format!("opening log file {}", path.display()))
}

pub fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    cfg: &car_config::Logging,
) -> eyre::Result<()> {
    let filter = env_filter(cli_level, cfg.level.as_deref());

    let console = if json {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match cfg.file.as_deref() {
        Some(path) => {
            let appender = file_appender(path, cfg.rotation.as_deref())?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    tracing::debug!(json, file = ?cfg.file, "tracing initialised");
    Ok(())
}
