mod api;
mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod query;
mod store;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pivotwatch")]
#[command(about = "A terminal dashboard for tracking changes at competitor companies")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pivotwatch/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base URL of the tracker API
  #[arg(long)]
  api_url: Option<String>,

  /// Email to prefill on the login form
  #[arg(short, long)]
  email: Option<String>,

  /// Disable the query cache; every read goes to the server
  #[arg(long)]
  no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }
  if let Some(email) = args.email {
    config.api.email = Some(email);
  }
  if args.no_cache {
    config.cache.enabled = false;
  }

  // The terminal belongs to the TUI, so logs go to a file
  let _guard = init_tracing(config.log_level.as_deref())?;
  tracing::info!(api = %config.api.url, cache = config.cache.enabled, "starting pivotwatch");

  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}

fn init_tracing(level: Option<&str>) -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine data directory"))?
    .join("pivotwatch");
  std::fs::create_dir_all(&dir)?;

  let appender = tracing_appender::rolling::daily(dir, "pivotwatch.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("PIVOTWATCH_LOG")
    .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| color_eyre::eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

  Ok(guard)
}
