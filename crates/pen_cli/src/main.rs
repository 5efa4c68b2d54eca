//! `pen` command-line front end.
//!
//! # Responsibility
//! - Resolve config and open the vault.
//! - Dispatch one subcommand and print its output.

mod args;
mod commands;

use anyhow::{Context, Result};
use args::{Args, Parser};
use commands::Ctx;
use pen_core::{init_from_config, VaultConfig, VaultStore};

fn run(args: Args) -> Result<String> {
    let mut config = VaultConfig::load_or_default(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    if let Some(db) = args.db {
        config.database_path = db;
    }
    init_from_config(&config).context("failed to start logging")?;

    let store = VaultStore::open(&config.database_path)
        .with_context(|| format!("failed to open vault {}", config.database_path.display()))?;
    let mut ctx = Ctx {
        store,
        config,
        password: args.password,
    };
    commands::execute(&mut ctx, args.command)
}

fn main() {
    let args = Args::parse();
    match run(args) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
        }
        Err(err) => {
            log::error!("event=cli module=cli status=error error={err:#}");
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
