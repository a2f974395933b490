use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Installs the global stderr subscriber.
///
/// An explicit `level` (any `EnvFilter` directive, e.g. `debug` or
/// `taxi_core=trace`) wins over `RUST_LOG`; with neither, `info` is used.
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log level '{directive}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("a global logger is already installed")?;
    Ok(())
}
