use anyhow::Context;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default directive, overridden by `RUST_LOG`.
    pub level: String,
    pub console: bool,
    pub file: Option<PathBuf>,
}

pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(
                config
                    .level
                    .parse::<Directive>()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            )
            .from_env_lossy()
    };

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter())
    });

    let file_layer = match &config.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
