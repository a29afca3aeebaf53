pub mod args;
pub mod config;

pub use args::{BouquetsCommands, CatalogCommands, Cli, Commands};
