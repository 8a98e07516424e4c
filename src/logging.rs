use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// stderr と `logs/<name>_<timestamp>.log` の両方に出力する。
///
/// `RUST_LOG` が無ければ info。戻り値はログファイルのパス。
pub fn init(name: &str) -> Result<String> {
    fs::create_dir_all("logs").context("Failed to create logs directory")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("logs/{}_{}.log", name, ts);
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}
