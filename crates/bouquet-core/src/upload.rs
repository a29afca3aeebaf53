//! Boundary to durable media storage.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::ItemRef;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Storage rejected the upload: {message}")]
    Storage { message: String },
}

/// Copies transport files into durable storage.
///
/// `Ok(None)` means the uploader chose not to store the file; callers keep
/// the transport reference in that case.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload_photo(
        &self,
        item: &ItemRef,
        bouquet_id: &str,
        index: usize,
    ) -> Result<Option<String>, UploadError>;

    async fn upload_video(
        &self,
        item: &ItemRef,
        bouquet_id: &str,
    ) -> Result<Option<String>, UploadError>;

    /// Removes everything stored under a bouquet.
    async fn delete_bouquet_files(&self, _bouquet_id: &str) -> Result<(), UploadError> {
        Ok(())
    }
}

/// Uploader that stores nothing and leaves transport references in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUploader;

#[async_trait]
impl MediaUploader for NullUploader {
    async fn upload_photo(
        &self,
        _item: &ItemRef,
        _bouquet_id: &str,
        _index: usize,
    ) -> Result<Option<String>, UploadError> {
        Ok(None)
    }

    async fn upload_video(
        &self,
        _item: &ItemRef,
        _bouquet_id: &str,
    ) -> Result<Option<String>, UploadError> {
        Ok(None)
    }
}

/// Uploads `items` in order. Items that fail or are not stored keep their
/// transport reference, so the result always has one entry per input.
pub async fn upload_all(
    uploader: &dyn MediaUploader,
    items: &[ItemRef],
    bouquet_id: &str,
) -> Vec<String> {
    let mut stored = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if item.is_url() {
            stored.push(item.to_string());
            continue;
        }
        match uploader.upload_photo(item, bouquet_id, index).await {
            Ok(Some(url)) => {
                debug!(target: "bouquet::upload", bouquet_id, index, "Uploaded photo");
                stored.push(url);
            }
            Ok(None) => stored.push(item.to_string()),
            Err(e) => {
                warn!(
                    target: "bouquet::upload",
                    bouquet_id,
                    index,
                    error = %e,
                    "Photo upload failed, keeping transport reference"
                );
                stored.push(item.to_string());
            }
        }
    }
    stored
}
