use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    Row,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
        SqliteSynchronous,
    },
};
use tracing::{debug, info};

use super::RepositoryError;
use super::models::{
    Bouquet, BouquetExport, BouquetUpdate, Category, ImportSummary, NewBouquet, Product, User,
    title_display,
};
use crate::catalog::{
    CatalogImport, CategoryRow, CompositionItem, NormalizedCatalog, Page, ProductRow,
};
use crate::types::UserId;

/// Durable storage for users, the product catalog and saved bouquets.
pub struct BouquetRepository {
    pool: SqlitePool,
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |e| RepositoryError::database(format!("{context}: {e}"))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::database(format!("Failed to read column {name}: {e}")))
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    name: &str,
) -> Result<T, RepositoryError> {
    let raw: String = column(row, name)?;
    serde_json::from_str(&raw)
        .map_err(|e| RepositoryError::serialization(format!("Invalid {name} data: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::serialization(format!("Failed to serialize: {e}")))
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    let media_limit: i64 = column(row, "media_limit")?;
    Ok(User {
        id: column(row, "id")?,
        external_id: UserId(column(row, "external_id")?),
        media_limit: media_limit.max(0) as usize,
    })
}

fn category_from_row(row: &SqliteRow) -> Result<Category, RepositoryError> {
    Ok(Category {
        id: column(row, "id")?,
        name: column(row, "name")?,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: column(row, "id")?,
        category_id: column(row, "category_id")?,
        name: column(row, "name")?,
        color: column(row, "color")?,
        kind: column(row, "kind")?,
        active: column(row, "is_active")?,
    })
}

fn bouquet_from_row(row: &SqliteRow) -> Result<Bouquet, RepositoryError> {
    Ok(Bouquet {
        bouquet_id: column(row, "bouquet_id")?,
        owner_id: column(row, "owner_id")?,
        short_title: column(row, "short_title")?,
        title_display: column(row, "title_display")?,
        description: column(row, "description")?,
        composition: json_column(row, "composition")?,
        photos: json_column(row, "photos")?,
        video: column(row, "video")?,
        price_minor: column(row, "price_minor")?,
        currency: column(row, "currency")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

const BOUQUET_COLUMNS: &str = "bouquet_id, owner_id, short_title, title_display, description, \
     composition, photos, video, price_minor, currency, created_at, updated_at";

impl BouquetRepository {
    pub async fn new(path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RepositoryError::connection(format!("Failed to create directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| RepositoryError::connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        Self::connect(options).await
    }

    pub async fn new_in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RepositoryError::connection(format!("Invalid SQLite path: {e}")))?
            .foreign_keys(true);

        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                RepositoryError::connection(format!("Failed to connect to SQLite: {e}"))
            })?;

        let repo = Self { pool };
        repo.run_migrations().await?;
        Ok(repo)
    }

    /// Closes the pool; every later call fails with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<(), RepositoryError> {
        let statements = [
            (
                "users",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    external_id INTEGER NOT NULL UNIQUE,
                    media_limit INTEGER NOT NULL DEFAULT 6,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
            ),
            (
                "categories",
                r#"
                CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                )
                "#,
            ),
            (
                "products",
                r#"
                CREATE TABLE IF NOT EXISTS products (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    color TEXT,
                    kind TEXT NOT NULL DEFAULT 'other',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
                )
                "#,
            ),
            (
                "bouquets",
                r#"
                CREATE TABLE IF NOT EXISTS bouquets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    bouquet_id TEXT NOT NULL UNIQUE,
                    owner_id INTEGER NOT NULL,
                    short_title TEXT NOT NULL,
                    title_display TEXT NOT NULL,
                    description TEXT NOT NULL,
                    composition TEXT NOT NULL DEFAULT '[]',
                    photos TEXT NOT NULL DEFAULT '[]',
                    video TEXT,
                    price_minor INTEGER NOT NULL,
                    currency TEXT NOT NULL DEFAULT 'RUB',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (owner_id) REFERENCES users(id)
                )
                "#,
            ),
            (
                "bouquets index",
                r#"
                CREATE INDEX IF NOT EXISTS idx_bouquets_owner_created
                ON bouquets(owner_id, created_at)
                "#,
            ),
        ];

        for (name, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| RepositoryError::Migration {
                    message: format!("Failed to create {name}: {e}"),
                })?;
        }

        Ok(())
    }

    pub async fn get_or_create_user(
        &self,
        external_id: UserId,
        default_limit: usize,
    ) -> Result<User, RepositoryError> {
        sqlx::query(
            "INSERT INTO users (external_id, media_limit) VALUES (?1, ?2) \
             ON CONFLICT(external_id) DO NOTHING",
        )
        .bind(external_id.0)
        .bind(default_limit as i64)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to create user"))?;

        let row = sqlx::query("SELECT id, external_id, media_limit FROM users WHERE external_id = ?1")
            .bind(external_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to load user"))?;

        user_from_row(&row)
    }

    pub async fn set_media_limit(&self, user_id: i64, limit: usize) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET media_limit = ?1, updated_at = datetime('now') WHERE id = ?2",
        )
        .bind(limit as i64)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update media limit"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("user", user_id));
        }
        Ok(())
    }

    /// Next free bouquet number: one past the highest numeric id stored, or
    /// one past `first_number` for an empty table. Zero-padded to 4 digits.
    pub async fn next_bouquet_number(&self, first_number: u32) -> Result<String, RepositoryError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT bouquet_id FROM bouquets")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to read bouquet ids"))?;

        let highest = ids
            .iter()
            .filter_map(|id| id.trim().parse::<u32>().ok())
            .max()
            .unwrap_or(first_number);

        Ok(format!("{:04}", highest.saturating_add(1)))
    }

    pub async fn create_bouquet(&self, new: &NewBouquet) -> Result<Bouquet, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO bouquets (
                bouquet_id, owner_id, short_title, title_display, description,
                composition, photos, video, price_minor, currency, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'RUB', ?10, ?10)
            "#,
        )
        .bind(&new.bouquet_id)
        .bind(new.owner_id)
        .bind(&new.short_title)
        .bind(new.title_display())
        .bind(&new.description)
        .bind(to_json(&new.composition)?)
        .bind(to_json(&new.photos)?)
        .bind(&new.video)
        .bind(new.price_minor)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(RepositoryError::Conflict {
                    entity: "bouquet",
                    id: new.bouquet_id.clone(),
                });
            }
            Err(e) => return Err(db_error("Failed to create bouquet")(e)),
        }

        info!(
            target: "bouquet::repository",
            bouquet_id = %new.bouquet_id,
            owner_id = new.owner_id,
            photos = new.photos.len(),
            "Bouquet saved"
        );

        self.get_bouquet(&new.bouquet_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("bouquet", &new.bouquet_id))
    }

    pub async fn get_bouquet(&self, bouquet_id: &str) -> Result<Option<Bouquet>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {BOUQUET_COLUMNS} FROM bouquets WHERE bouquet_id = ?1"
        ))
        .bind(bouquet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load bouquet"))?;

        row.as_ref().map(bouquet_from_row).transpose()
    }

    /// One page of the owner's bouquets, newest first.
    pub async fn list_bouquets(
        &self,
        owner_id: i64,
        page: Page,
    ) -> Result<Vec<Bouquet>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOUQUET_COLUMNS} FROM bouquets WHERE owner_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(owner_id)
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list bouquets"))?;

        rows.iter().map(bouquet_from_row).collect()
    }

    pub async fn count_bouquets(&self, owner_id: i64) -> Result<usize, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bouquets WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count bouquets"))?;
        Ok(count.max(0) as usize)
    }

    pub async fn update_bouquet_field(
        &self,
        bouquet_id: &str,
        update: &BouquetUpdate,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let result = match update {
            BouquetUpdate::Title(title) => {
                sqlx::query(
                    "UPDATE bouquets SET short_title = ?1, title_display = ?2, updated_at = ?3 \
                     WHERE bouquet_id = ?4",
                )
                .bind(title)
                .bind(title_display(title, bouquet_id))
                .bind(now)
                .bind(bouquet_id)
                .execute(&self.pool)
                .await
            }
            BouquetUpdate::Description(description) => {
                sqlx::query(
                    "UPDATE bouquets SET description = ?1, updated_at = ?2 WHERE bouquet_id = ?3",
                )
                .bind(description)
                .bind(now)
                .bind(bouquet_id)
                .execute(&self.pool)
                .await
            }
            BouquetUpdate::Composition(items) => {
                sqlx::query(
                    "UPDATE bouquets SET composition = ?1, updated_at = ?2 WHERE bouquet_id = ?3",
                )
                .bind(to_json::<Vec<CompositionItem>>(items)?)
                .bind(now)
                .bind(bouquet_id)
                .execute(&self.pool)
                .await
            }
            BouquetUpdate::Price(price) => {
                sqlx::query(
                    "UPDATE bouquets SET price_minor = ?1, updated_at = ?2 WHERE bouquet_id = ?3",
                )
                .bind(i64::from(*price) * 100)
                .bind(now)
                .bind(bouquet_id)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(db_error("Failed to update bouquet"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("bouquet", bouquet_id));
        }

        debug!(
            target: "bouquet::repository",
            bouquet_id,
            field = update.field_name(),
            "Bouquet updated"
        );
        Ok(())
    }

    /// Returns `false` when no such bouquet existed.
    pub async fn delete_bouquet(&self, bouquet_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM bouquets WHERE bouquet_id = ?1")
            .bind(bouquet_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete bouquet"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name COLLATE NOCASE, id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list categories"))?;
        rows.iter().map(category_from_row).collect()
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load category"))?;
        row.as_ref().map(category_from_row).transpose()
    }

    /// Active products of a category, ordered by name.
    pub async fn list_products(&self, category_id: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, category_id, name, color, kind, is_active FROM products \
             WHERE category_id = ?1 AND is_active = 1 ORDER BY name COLLATE NOCASE, id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list products"))?;
        rows.iter().map(product_from_row).collect()
    }

    pub async fn get_product(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, category_id, name, color, kind, is_active FROM products WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load product"))?;
        row.as_ref().map(product_from_row).transpose()
    }

    /// Replaces the whole catalog in one transaction.
    pub async fn replace_catalog(
        &self,
        catalog: &NormalizedCatalog,
    ) -> Result<ImportSummary, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        sqlx::query("DELETE FROM products")
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to clear products"))?;
        sqlx::query("DELETE FROM categories")
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to clear categories"))?;

        let mut category_ids = std::collections::HashMap::new();
        for name in &catalog.categories {
            let id = sqlx::query("INSERT INTO categories (name) VALUES (?1)")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert category"))?
                .last_insert_rowid();
            category_ids.insert(name.as_str(), id);
        }

        for product in &catalog.products {
            let category_id = match category_ids.get(product.category.as_str()) {
                Some(id) => *id,
                None => {
                    let id = sqlx::query("INSERT INTO categories (name) VALUES (?1)")
                        .bind(&product.category)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error("Failed to insert category"))?
                        .last_insert_rowid();
                    category_ids.insert(product.category.as_str(), id);
                    id
                }
            };

            sqlx::query(
                "INSERT INTO products (category_id, name, color, kind) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(category_id)
            .bind(&product.name)
            .bind(&product.color)
            .bind(&product.kind)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert product"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit catalog"))?;

        let summary = ImportSummary {
            categories: category_ids.len(),
            products: catalog.products.len(),
        };
        info!(
            target: "bouquet::repository",
            categories = summary.categories,
            products = summary.products,
            "Catalog replaced"
        );
        Ok(summary)
    }

    /// The stored catalog in the shape [`CatalogImport`] reads, so an export
    /// can be fed straight back into [`Self::replace_catalog`].
    pub async fn export_catalog(&self) -> Result<CatalogImport, RepositoryError> {
        let categories = self
            .list_categories()
            .await?
            .into_iter()
            .map(|c| CategoryRow { name: Some(c.name) })
            .collect();

        let rows = sqlx::query(
            "SELECT c.name AS category, p.name, p.color, p.kind FROM products p \
             JOIN categories c ON c.id = p.category_id \
             ORDER BY c.name COLLATE NOCASE, p.name COLLATE NOCASE, p.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to export products"))?;

        let products = rows
            .iter()
            .map(|row| {
                Ok(ProductRow {
                    category: Some(column(row, "category")?),
                    name: Some(column(row, "name")?),
                    color: column(row, "color")?,
                    kind: Some(column(row, "kind")?),
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        debug!(
            target: "bouquet::repository",
            products = products.len(),
            "Catalog exported"
        );
        Ok(CatalogImport {
            categories,
            products,
        })
    }

    /// Every bouquet, newest first, in export form.
    pub async fn export_bouquets(&self) -> Result<Vec<BouquetExport>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOUQUET_COLUMNS} FROM bouquets ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to export bouquets"))?;

        rows.iter()
            .map(|row| bouquet_from_row(row).map(|b| BouquetExport::from(&b)))
            .collect()
    }
}
