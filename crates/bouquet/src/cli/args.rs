use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Builds catalog bouquet records through a step-by-step conversation.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML). Defaults to ./.bouquet/config.toml, then the user config dir
    #[arg(long, global = true, env = "BOUQUET_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides `database.path` from the configuration)
    #[arg(long, global = true, env = "BOUQUET_DB")]
    pub db: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Drive the conversation from JSON lines on stdin, replying on stdout
    Run,
    /// Manage the flower catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
    /// Work with saved bouquets
    Bouquets {
        #[command(subcommand)]
        action: BouquetsCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommands {
    /// Replace the catalog with the contents of a TOML file
    Import {
        /// Catalog file with [[categories]] and [[products]] tables
        file: PathBuf,
    },
    /// Write the catalog as TOML that `catalog import` accepts
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum BouquetsCommands {
    /// Write every bouquet as a JSON array
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "bouquet",
            "catalog",
            "import",
            "flowers.toml",
            "--db",
            "/tmp/b.db",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/b.db")));
        match cli.command {
            Commands::Catalog {
                action: CatalogCommands::Import { file },
            } => assert_eq!(file, PathBuf::from("flowers.toml")),
            other => unreachable!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn catalog_export_takes_an_output_file() {
        let cli =
            Cli::try_parse_from(["bouquet", "catalog", "export", "-o", "catalog.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Catalog {
                action: CatalogCommands::Export { output: Some(ref path) }
            } if path == &PathBuf::from("catalog.toml")
        ));
    }

    #[test]
    fn export_output_is_optional() {
        let cli = Cli::try_parse_from(["bouquet", "bouquets", "export"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Bouquets {
                action: BouquetsCommands::Export { output: None }
            }
        ));
    }
}
