// Report card entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (log to file, not terminal)
// 3. Load config, copying defaults on first run
// 4. Open database
// 5. Dispatch the subcommand

mod cli;
mod commands;
mod render;

use std::io;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use reportcard_core::config;
use reportcard_core::db::Database;
use tracing::info;

use cli::{Cli, Commands};
use commands::App;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.dir)?;
    info!("reportcard starting in {}", cli.dir.display());

    let config = config::load_config(&cli.dir).context("failed to load configuration")?;

    let db_path = cli.dir.join(&config.storage.db_path);
    let db = Database::open(&db_path.to_string_lossy()).context("failed to open database")?;
    info!("Database opened at {}", db_path.display());

    let app = App {
        config,
        db,
        base_dir: cli.dir.clone(),
    };
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Player(cmd) => commands::player(&app, cmd, &mut out),
        Commands::Note(cmd) => commands::note(&app, cmd, &mut out),
        Commands::Thresholds(cmd) => commands::thresholds(&app, cmd, &mut out),
        Commands::Merge {
            category,
            out: dest,
            labels,
            files,
        } => commands::merge(&category, &files, &labels, dest, &mut out),
        Commands::Template { name, out_dir } => commands::template(&name, &out_dir, &mut out),
        Commands::Report(args) => commands::report(&app, args, &mut out),
    }
}

fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("reportcard.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("reportcard=info,reportcard_core=info,reportcard_metrics=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
