use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use podcast_ingest::{pipeline, Config};

/// Get the default config path (~/.config/podcast-ingest/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("podcast-ingest")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "podcast-ingest",
    version,
    about = "Fetch a podcast feed once and store episodes not seen before"
)]
struct Args {
    /// Config file (defaults to ~/.config/podcast-ingest/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON run report
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let report = pipeline::run(&config)
        .await
        .context("Ingest run failed")?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
    println!("{json}");
    Ok(())
}
