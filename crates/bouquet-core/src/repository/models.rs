use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CompositionItem, flatten_composition};
use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub external_id: UserId,
    pub media_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub color: Option<String>,
    pub kind: String,
    pub active: bool,
}

impl Product {
    /// Button label: `name (color)` when a colour is set.
    pub fn label(&self) -> String {
        match &self.color {
            Some(color) => format!("{} ({})", self.name, color),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bouquet {
    /// Zero-padded public number, e.g. `"0201"`.
    pub bouquet_id: String,
    pub owner_id: i64,
    pub short_title: String,
    pub title_display: String,
    pub description: String,
    pub composition: Vec<CompositionItem>,
    /// Stored URLs, or transport refs for items that were not uploaded.
    pub photos: Vec<String>,
    pub video: Option<String>,
    pub price_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a bouquet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBouquet {
    pub bouquet_id: String,
    pub owner_id: i64,
    pub short_title: String,
    pub description: String,
    pub composition: Vec<CompositionItem>,
    pub photos: Vec<String>,
    pub video: Option<String>,
    pub price_minor: i64,
}

impl NewBouquet {
    pub fn title_display(&self) -> String {
        title_display(&self.short_title, &self.bouquet_id)
    }
}

pub fn title_display(short_title: &str, bouquet_id: &str) -> String {
    format!("{short_title} №{bouquet_id}")
}

/// Single-field edit applied to a stored bouquet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BouquetUpdate {
    Title(String),
    Description(String),
    Composition(Vec<CompositionItem>),
    /// Whole currency units.
    Price(u32),
}

impl BouquetUpdate {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Description(_) => "description",
            Self::Composition(_) => "composition",
            Self::Price(_) => "price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub categories: usize,
    pub products: usize,
}

/// Flat export record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BouquetExport {
    pub bouquet_id: String,
    pub title_display: String,
    pub short_title: String,
    pub description: String,
    pub composition: String,
    /// Search tags collected from the composition, first-seen order.
    pub tags: Vec<String>,
    pub price: f64,
    pub currency: String,
    pub video_url: Option<String>,
    pub photo_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn is_http_url(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl From<&Bouquet> for BouquetExport {
    fn from(bouquet: &Bouquet) -> Self {
        let mut photo_urls: Vec<String> = Vec::new();
        for photo in &bouquet.photos {
            let photo = photo.trim();
            if is_http_url(photo) && !photo_urls.iter().any(|u| u == photo) {
                photo_urls.push(photo.to_string());
            }
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in bouquet.composition.iter().flat_map(CompositionItem::tags) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Self {
            bouquet_id: bouquet.bouquet_id.clone(),
            title_display: bouquet.title_display.clone(),
            short_title: bouquet.short_title.clone(),
            description: bouquet.description.clone(),
            composition: flatten_composition(&bouquet.composition),
            tags,
            price: bouquet.price_minor as f64 / 100.0,
            currency: bouquet.currency.clone(),
            video_url: bouquet.video.clone().filter(|v| is_http_url(v)),
            photo_urls,
            created_at: bouquet.created_at,
            updated_at: bouquet.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bouquet(photos: &[&str]) -> Bouquet {
        let now = Utc::now();
        Bouquet {
            bouquet_id: "0201".into(),
            owner_id: 1,
            short_title: "Spring".into(),
            title_display: title_display("Spring", "0201"),
            description: String::new(),
            composition: Vec::new(),
            photos: photos.iter().map(|p| (*p).to_string()).collect(),
            video: Some("AgADvideo".into()),
            price_minor: 350_000,
            currency: "RUB".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn export_keeps_unique_http_urls_in_order() {
        let record = BouquetExport::from(&bouquet(&[
            "https://cdn/a.jpg",
            "AgACAgIA-file-id",
            "http://cdn/b.jpg",
            "https://cdn/a.jpg",
        ]));

        assert_eq!(record.photo_urls, vec!["https://cdn/a.jpg", "http://cdn/b.jpg"]);
        assert_eq!(record.video_url, None);
        assert!((record.price - 3500.0).abs() < f64::EPSILON);
        assert_eq!(record.title_display, "Spring №0201");
    }
}
