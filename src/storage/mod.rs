// src/storage/mod.rs
//! Durable hosting for files whose Notion URLs expire.
//!
//! The resolver depends on the two traits below, never on Google Drive or
//! HTTP details; the concrete implementations live in the submodules.

mod auth;
mod drive;
mod fetch;

use crate::classify::MediaCategory;
use crate::error::AppError;

pub use auth::{AccessTokenSource, ServiceAccountKey};
pub use drive::{drive_embed_url, drive_file_id, DriveConfig, GoogleDriveStore};
pub use fetch::HttpFileFetcher;

/// An object written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub object_id: String,
    /// URL suitable for embedding; may be empty if the store could not build one.
    pub embed_url: String,
}

/// The ability to download the bytes behind a URL.
#[async_trait::async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError>;
}

/// The ability to keep files at a URL that does not expire.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        category: MediaCategory,
    ) -> Result<StoredObject, AppError>;

    /// Removes an object written by `upload`.
    async fn delete(&self, object_id: &str) -> Result<(), AppError>;

    /// The object behind an embed URL this store hands out.
    fn object_id_for_url(&self, _url: &str) -> Option<String> {
        None
    }
}
