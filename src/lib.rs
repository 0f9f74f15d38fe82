// src/lib.rs
//! notion-attachments library — keeps Notion upload-form attachments viewable.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling** — `AppError`, `LookupError`, `ResolutionError`, `ValidationError`
//! - **Configuration** — `RunConfig`, `CommandLineInput`, `TableKey`
//! - **Domain model** — `Row`, `Attachment`, `ResolvedAttachment`, `ContentBlock`, etc.
//! - **Domain types** — `ApiKey`, `PageId`, `BlockId`, `DatabaseId`
//! - **Classification** — `classify_media`, `classify_preview`, `TemporaryUrlPolicy`
//! - **Storage** — `FileFetcher`, `ObjectStore`, `GoogleDriveStore`
//! - **API client** — `NotionRepository`, `NotionHttpClient`
//! - **Operations** — `Resolver`, `synthesize`, `PageEmbedder`, `RowMigrator`, `HtmlExporter`, `BatchRunner`

mod api;

#[cfg(feature = "bench")]
pub mod classify;
#[cfg(not(feature = "bench"))]
mod classify;

mod config;
mod constants;
mod embed;
mod error;
mod export;
mod migrate;
mod model;
mod pipeline;
mod resolve;
mod storage;
mod synthesize;
mod types;

// --- Error Handling ---
pub use crate::error::{
    AppError, LookupError, NotionErrorCode, ResolutionError, ResolutionFailure, WriteOperation,
};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{
    Command, CommandLineInput, DriveCredentials, DriveSettings, RunConfig, RunMode, TableKey,
};
pub use crate::constants::{
    DEFAULT_LINK_COLUMN, DEFAULT_SUBMITTED_AT_COLUMN, DEFAULT_UPLOAD_COLUMN, EMBED_MARKER,
};

// --- Domain Model ---
pub use crate::model::{
    Attachment, ColumnType, ContentBlock, DateValue, DestinationSchema, DurableKind,
    ExistingBlock, ExistingBlockKind, ExternalFile, FileRef, FileSource, HostedFile,
    NewRowProperties, Page, PersonRef, PropertyEntry, PropertyKind, PropertyValue, RelationRef,
    ResolvedAttachment, RichTextItem, Row, SelectOption, SourceKind, UploadColumn,
};

// --- Domain Types ---
pub use crate::types::{ApiKey, BlockId, DatabaseId, Id, PageId};

// --- Classification ---
pub use crate::classify::{
    classify_media, classify_preview, mime_type_for, MediaCategory, PreviewAffordance,
    TemporaryUrlPolicy,
};

// --- Storage ---
pub use crate::storage::{
    drive_embed_url, drive_file_id, AccessTokenSource, DriveConfig, FileFetcher, GoogleDriveStore,
    HttpFileFetcher, ObjectStore, ServiceAccountKey, StoredObject,
};

// --- API Client ---
pub use crate::api::{NotionHttpClient, NotionRepository};

// --- Operations ---
pub use crate::embed::{
    append_in_batches, compose_embed_section, scan_embed_section, EmbedOutcome, PageEmbedder,
};
pub use crate::export::{collect_rows, ExportFile, ExportRow, HtmlExporter};
pub use crate::migrate::{
    map_properties, select_link_attachment, ColumnAlias, LinkTieBreak, MigrationConfig,
    MigrationOutcome, MigrationPlan, RowMigrator,
};
pub use crate::pipeline::{rehost_row, BatchRunner, RehostOutcome, RowFailure, RunReport};
pub use crate::resolve::{ResolvedSet, Resolver};
pub use crate::synthesize::synthesize;
