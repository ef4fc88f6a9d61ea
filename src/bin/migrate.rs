// Database migration CLI for the scraper tables

use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use std::error::Error;
use tracing::info;

use blockchain_scraper::config::AppConfig;
use blockchain_scraper::db::DbPool;

/// Scraper database management CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending migrations
    Up {
        /// Number of migrations to run (all if not specified)
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        /// Number of migrations to roll back
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
    },
    /// Drop all tables and run every migration again
    Reset,
    /// Show migration status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    info!("Connecting to database");
    let pool = DbPool::new(&config.database).await?;
    let connection = pool.get_connection();

    match Cli::parse().command {
        Commands::Up { steps } => {
            info!("Running migrations");
            Migrator::up(connection, steps).await?;
        }
        Commands::Down { steps } => {
            info!("Rolling back {} migration(s)", steps);
            Migrator::down(connection, Some(steps)).await?;
        }
        Commands::Reset => {
            info!("Resetting database");
            Migrator::fresh(connection).await?;
        }
        Commands::Status => {
            Migrator::status(connection).await?;
        }
    }

    info!("Done");
    Ok(())
}
