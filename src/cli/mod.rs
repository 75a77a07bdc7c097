pub mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    engine::start_engine,
    store::{
        self,
        state_store::{JsonStateStore, StateStore},
    },
    utils::{dir::create_application_default_path, logging::enable_logging, time::parse_date_key},
};

#[derive(Parser, Debug)]
#[command(name = "sitetime", version)]
#[command(about = "Tracks time spent on websites, with daily limits and reminders")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable verbose logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run the accounting engine speaking the native-messaging protocol on stdin/stdout"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Show accumulated time per domain for a day")]
    Report {
        #[arg(long, help = "Day to report as YYYY-MM-DD. Defaults to today")]
        date: Option<String>,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
    #[command(about = "Delete today's accumulated time for a domain")]
    DeleteToday {
        domain: String,
        #[arg(long, help = "Application directory")]
        dir: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    match args.commands {
        Commands::Serve { dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            // stdout carries protocol frames, so logs go to files only
            let level = args.log.then_some(LevelFilter::TRACE);
            enable_logging(&app_dir, level, false)?;
            start_engine(app_dir).await
        }
        Commands::Report { date, dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            let date = match date {
                Some(raw) => parse_date_key(&raw)
                    .with_context(|| format!("'{raw}' is not a YYYY-MM-DD date"))?,
                None => Utc::now().date_naive(),
            };
            let ledger = JsonStateStore::new(app_dir.join("state"))?
                .load_ledger()
                .await?;
            println!("{}", report::render_day_report(date, &ledger));
            Ok(())
        }
        Commands::DeleteToday { domain, dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            let store = JsonStateStore::new(app_dir.join("state"))?;
            let changed = store::delete_today(&store, &domain, Utc::now().date_naive()).await?;
            if changed {
                println!("Removed today's time for {domain}");
            } else {
                println!("No time recorded today for {domain}");
            }
            Ok(())
        }
    }
}
