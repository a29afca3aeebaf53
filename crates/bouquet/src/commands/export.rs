use async_trait::async_trait;
use eyre::{Result, eyre};
use std::io::Write;
use std::path::PathBuf;

use super::Command;

pub struct ExportBouquetsCommand {
    pub output: Option<PathBuf>,
    pub db: PathBuf,
}

#[async_trait]
impl Command for ExportBouquetsCommand {
    async fn execute(&self) -> Result<()> {
        let repo = crate::open_repository(&self.db).await?;
        let records = repo
            .export_bouquets()
            .await
            .map_err(|e| eyre!("Failed to export bouquets: {}", e))?;
        repo.close().await;

        let json = serde_json::to_string_pretty(&records)?;
        match &self.output {
            Some(path) => {
                std::fs::write(path, format!("{json}\n"))
                    .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
                tracing::info!(
                    target: "bouquet::export",
                    path = %path.display(),
                    count = records.len(),
                    "Exported bouquets"
                );
            }
            None => {
                let mut stdout = std::io::stdout();
                writeln!(stdout, "{json}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bouquet_core::repository::{BouquetRepository, NewBouquet};
    use bouquet_core::types::UserId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn export_writes_a_json_array_to_the_output_file() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("bouquets.db");
        let output = dir.path().join("export.json");

        let repo = BouquetRepository::new(&db).await.unwrap();
        let owner = repo.get_or_create_user(UserId(1), 6).await.unwrap();
        repo.create_bouquet(&NewBouquet {
            bouquet_id: "0201".into(),
            owner_id: owner.id,
            short_title: "Spring".into(),
            description: String::new(),
            composition: Vec::new(),
            photos: vec!["https://cdn.test/1.jpg".into(), "AgAD".into()],
            video: None,
            price_minor: 100_000,
        })
        .await
        .unwrap();
        repo.close().await;

        ExportBouquetsCommand {
            output: Some(output.clone()),
            db,
        }
        .execute()
        .await
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["title_display"], "Spring №0201");
        assert_eq!(written[0]["photo_urls"].as_array().unwrap().len(), 1);
    }
}
