use clap::Parser;
use eyre::{Result, eyre};

use bouquet::cli::{BouquetsCommands, CatalogCommands, Cli, Commands};
use bouquet::commands::{
    Command,
    catalog::{ExportCatalogCommand, ImportCatalogCommand},
    export::ExportBouquetsCommand,
    run::RunCommand,
};
use bouquet_core::config::BotConfig;
use bouquet_core::utils::AppPaths;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // .env first so its values can feed the env-backed flags
    bouquet::cli::config::load_env()?;
    let cli = Cli::parse();

    let log_dir = AppPaths::log_dir();
    bouquet_core::utils::tracing::init_tracing(log_dir.as_deref())?;

    let config = BotConfig::load(cli.config.as_deref())
        .map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    let db = cli.db.clone().unwrap_or_else(|| config.database_path());
    debug!(db = %db.display(), "Resolved database path");

    match cli.command {
        Commands::Run => RunCommand { config, db }.execute().await,
        Commands::Catalog {
            action: CatalogCommands::Import { file },
        } => ImportCatalogCommand { file, db }.execute().await,
        Commands::Catalog {
            action: CatalogCommands::Export { output },
        } => ExportCatalogCommand { output, db }.execute().await,
        Commands::Bouquets {
            action: BouquetsCommands::Export { output },
        } => ExportBouquetsCommand { output, db }.execute().await,
    }
}
