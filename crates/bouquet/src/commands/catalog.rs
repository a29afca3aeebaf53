use async_trait::async_trait;
use eyre::{Result, eyre};
use std::io::Write;
use std::path::PathBuf;

use super::Command;
use bouquet_core::catalog::CatalogImport;

pub struct ImportCatalogCommand {
    pub file: PathBuf,
    pub db: PathBuf,
}

#[async_trait]
impl Command for ImportCatalogCommand {
    async fn execute(&self) -> Result<()> {
        let catalog = CatalogImport::from_path(&self.file)
            .and_then(|import| import.normalize())
            .map_err(|e| eyre!("Failed to read catalog {}: {}", self.file.display(), e))?;

        let repo = crate::open_repository(&self.db).await?;
        let summary = repo
            .replace_catalog(&catalog)
            .await
            .map_err(|e| eyre!("Failed to import catalog: {}", e))?;
        repo.close().await;

        let mut stdout = std::io::stdout();
        writeln!(
            stdout,
            "Imported {} categories and {} products.",
            summary.categories, summary.products
        )?;
        Ok(())
    }
}

pub struct ExportCatalogCommand {
    pub output: Option<PathBuf>,
    pub db: PathBuf,
}

#[async_trait]
impl Command for ExportCatalogCommand {
    async fn execute(&self) -> Result<()> {
        let repo = crate::open_repository(&self.db).await?;
        let catalog = repo
            .export_catalog()
            .await
            .map_err(|e| eyre!("Failed to export catalog: {}", e))?;
        repo.close().await;

        let toml = catalog
            .to_toml_string()
            .map_err(|e| eyre!("Failed to export catalog: {}", e))?;
        match &self.output {
            Some(path) => {
                std::fs::write(path, &toml)
                    .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
                tracing::info!(
                    target: "bouquet::export",
                    path = %path.display(),
                    products = catalog.products.len(),
                    "Exported catalog"
                );
            }
            None => {
                let mut stdout = std::io::stdout();
                write!(stdout, "{toml}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn exported_catalog_can_be_imported_again() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("bouquets.db");
        let source = dir.path().join("catalog.toml");
        let exported = dir.path().join("exported.toml");
        std::fs::write(
            &source,
            "[[products]]\ncategory = \"Roses\"\nname = \"Red Naomi\"\ncolor = \"red\"\n",
        )
        .unwrap();

        ImportCatalogCommand {
            file: source,
            db: db.clone(),
        }
        .execute()
        .await
        .unwrap();
        ExportCatalogCommand {
            output: Some(exported.clone()),
            db: db.clone(),
        }
        .execute()
        .await
        .unwrap();

        let reread = CatalogImport::from_path(&exported)
            .unwrap()
            .normalize()
            .unwrap();
        assert_eq!(reread.categories, vec!["Roses"]);
        assert_eq!(reread.products[0].name, "Red Naomi");
        assert_eq!(reread.products[0].color.as_deref(), Some("red"));

        ImportCatalogCommand { file: exported, db }
            .execute()
            .await
            .unwrap();
    }
}
