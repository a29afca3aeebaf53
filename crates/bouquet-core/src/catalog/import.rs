use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::composition::DEFAULT_KIND;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Catalog contains no valid products (each needs a category and a name)")]
    NoProducts,

    #[error("Failed to write catalog: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Raw catalog file as written by the operator.
///
/// ```toml
/// [[categories]]
/// name = "Roses"
///
/// [[products]]
/// category = "Roses"
/// name = "Red Naomi"
/// color = "red"
/// kind = "rose"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogImport {
    #[serde(default)]
    pub categories: Vec<CategoryRow>,
    #[serde(default)]
    pub products: Vec<ProductRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProduct {
    pub category: String,
    pub name: String,
    pub color: Option<String>,
    pub kind: String,
}

/// Catalog with blanks trimmed away, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCatalog {
    /// Category names in first-seen order, without duplicates.
    pub categories: Vec<String>,
    pub products: Vec<ImportProduct>,
}

fn clean(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CatalogImport {
    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        Ok(toml::to_string(self)?)
    }

    /// Drops rows without a category or name, defaults missing kinds and
    /// adds categories that only products mention.
    pub fn normalize(&self) -> Result<NormalizedCatalog, CatalogError> {
        fn push_category(name: String, categories: &mut Vec<String>) {
            if !categories.contains(&name) {
                categories.push(name);
            }
        }

        let mut categories: Vec<String> = Vec::new();

        for row in &self.categories {
            if let Some(name) = clean(row.name.as_ref()) {
                push_category(name, &mut categories);
            }
        }

        let mut products = Vec::new();
        for row in &self.products {
            let (Some(category), Some(name)) =
                (clean(row.category.as_ref()), clean(row.name.as_ref()))
            else {
                continue;
            };
            push_category(category.clone(), &mut categories);
            products.push(ImportProduct {
                category,
                name,
                color: clean(row.color.as_ref()),
                kind: clean(row.kind.as_ref()).unwrap_or_else(|| DEFAULT_KIND.to_string()),
            });
        }

        if products.is_empty() {
            return Err(CatalogError::NoProducts);
        }

        Ok(NormalizedCatalog {
            categories,
            products,
        })
    }
}
