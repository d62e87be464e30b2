use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod db;

use commands::{
    AddCommand, ConfigCommand, DoneCommand, EditCommand, FitCommand, ListCommand, QuietCommand,
    RemoveCommand, SyncCommand,
};
use config::Config;
use db::{init_db, MetaRepository, TaskRepository};

#[derive(Parser)]
#[command(name = "taskfit")]
#[command(version)]
#[command(about = "An offline-first task manager that syncs across devices", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task, e.g. `taskfit add "Write report tomorrow at 10am (30m)"`
    Add(AddCommand),

    /// List tasks
    List(ListCommand),

    /// Mark a task as done
    Done(DoneCommand),

    /// Remove a task
    Rm(RemoveCommand),

    /// Edit a task
    Edit(EditCommand),

    /// Show tasks that fit into the given number of minutes
    Fit(FitCommand),

    /// Show whether quiet hours are currently active
    Quiet(QuietCommand),

    /// Sync with the configured server
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskfit=warn".into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Add(cmd)) => {
            let (repo, meta) = open_stores(&config).await?;
            cmd.run(&repo, &meta, &config).await?;
        }
        Some(Commands::List(cmd)) => {
            let (repo, _meta) = open_stores(&config).await?;
            cmd.run(&repo).await?;
        }
        Some(Commands::Done(cmd)) => {
            let (repo, meta) = open_stores(&config).await?;
            cmd.run(&repo, &meta).await?;
        }
        Some(Commands::Rm(cmd)) => {
            let (repo, meta) = open_stores(&config).await?;
            cmd.run(&repo, &meta).await?;
        }
        Some(Commands::Edit(cmd)) => {
            let (repo, meta) = open_stores(&config).await?;
            cmd.run(&repo, &meta, &config).await?;
        }
        Some(Commands::Fit(cmd)) => {
            let (repo, _meta) = open_stores(&config).await?;
            cmd.run(&repo, &config).await?;
        }
        Some(Commands::Quiet(cmd)) => {
            cmd.run(&config)?;
        }
        Some(Commands::Sync(cmd)) => {
            let (repo, meta) = open_stores(&config).await?;
            cmd.run(&repo, &meta, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

async fn open_stores(
    config: &Config,
) -> Result<(TaskRepository, MetaRepository), Box<dyn std::error::Error>> {
    let pool = init_db(config.database_path.clone()).await?;
    Ok((
        TaskRepository::new(pool.clone()),
        MetaRepository::new(pool),
    ))
}
