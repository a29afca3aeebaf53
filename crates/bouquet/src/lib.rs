pub mod cli;
pub mod commands;

pub use bouquet_core::{catalog, config, flow, repository, session};

use eyre::{Result, eyre};
use std::path::Path;
use std::sync::Arc;

use bouquet_core::repository::BouquetRepository;
use bouquet_core::session::SqliteSessionStore;

pub async fn open_repository(db_path: &Path) -> Result<Arc<BouquetRepository>> {
    let repo = BouquetRepository::new(db_path)
        .await
        .map_err(|e| eyre!("Failed to open database {}: {}", db_path.display(), e))?;
    Ok(Arc::new(repo))
}

pub async fn open_session_store(db_path: &Path) -> Result<Arc<SqliteSessionStore>> {
    let store = SqliteSessionStore::new(db_path)
        .await
        .map_err(|e| eyre!("Failed to open session store {}: {}", db_path.display(), e))?;
    Ok(Arc::new(store))
}
