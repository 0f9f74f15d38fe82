// src/api/mod.rs
//! Notion API interaction: reading form rows and writing pages and blocks.
//!
//! This module provides a data-oriented interface to the Notion API,
//! with clear separation between I/O operations, parsing, and business logic.

pub mod client;
pub mod parser;
mod responses;
mod simple_pagination;

use crate::error::AppError;
use crate::model::{ContentBlock, DestinationSchema, ExistingBlock, FileRef, NewRowProperties, Page};
use crate::types::{BlockId, DatabaseId, PageId};

/// The ability to read and modify a Notion workspace.
///
/// Business logic depends on this trait, never on HTTP details. Listing
/// methods drain pagination before returning.
#[async_trait::async_trait]
pub trait NotionRepository: Send + Sync {
    /// Every row of a database, in API order.
    async fn query_rows(&self, database: &DatabaseId) -> Result<Vec<Page>, AppError>;

    /// Column names and types of a database.
    async fn retrieve_schema(&self, database: &DatabaseId) -> Result<DestinationSchema, AppError>;

    /// Top-level children of a page or block, in page order.
    async fn list_children(&self, parent: &BlockId) -> Result<Vec<ExistingBlock>, AppError>;

    /// Appends blocks after the last child. At most 100 blocks per call.
    async fn append_children(
        &self,
        parent: &BlockId,
        blocks: &[ContentBlock],
    ) -> Result<(), AppError>;

    async fn delete_block(&self, block: &BlockId) -> Result<(), AppError>;

    /// Creates a page in `database`; `children` may hold at most 100 blocks.
    async fn create_page(
        &self,
        database: &DatabaseId,
        properties: &NewRowProperties,
        children: &[ContentBlock],
    ) -> Result<PageId, AppError>;

    async fn archive_page(&self, page: &PageId) -> Result<(), AppError>;

    /// Replaces the files of one files-typed property.
    async fn update_files(
        &self,
        page: &PageId,
        column: &str,
        files: &[FileRef],
    ) -> Result<(), AppError>;
}

// Re-export the public interface
pub use client::NotionHttpClient;
