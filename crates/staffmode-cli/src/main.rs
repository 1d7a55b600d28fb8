//! `staffmode` — inspect and maintain the staff mode data file offline.
//!
//! # Usage
//!
//! ```
//! staffmode list
//! staffmode show 0b6a1f0e-8d4e-4a53-9f57-3f0a8e4f6c11
//! staffmode check
//! staffmode --config /srv/staff-mode.config.yml remove 0b6a1f0e-8d4e-4a53-9f57-3f0a8e4f6c11
//! ```

mod commands;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use staffmode_service::{ServiceConfig, config::DEFAULT_CONFIG_FILE};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "staffmode", about = "Inspect and maintain survival staff mode data")]
struct Args {
  /// Path to the YAML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
  config: PathBuf,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// List every stored profile.
  List,
  /// Print one profile's stored data.
  Show { id: Uuid },
  /// Verify that every stored snapshot can be read back.
  Check,
  /// Back up the data file, then delete one profile.
  Remove { id: Uuid },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let config = ServiceConfig::load(&args.config)
    .with_context(|| format!("reading config from {}", args.config.display()))?;
  let mut data = commands::open(&config)?;

  let mut out = std::io::stdout().lock();
  match args.command {
    Cmd::List => commands::list(&mut data, &mut out),
    Cmd::Show { id } => commands::show(&mut data, id, &mut out),
    Cmd::Check => {
      let problems = commands::check(&data, &mut out)?;
      if problems > 0 {
        anyhow::bail!("{problems} problem(s) found");
      }
      Ok(())
    }
    Cmd::Remove { id } => commands::remove(&mut data, id, &mut out),
  }
}
