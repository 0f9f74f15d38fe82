// src/api/responses.rs
//! Wire shapes of Notion API responses.
//!
//! These mirror the JSON closely and are converted to domain types in
//! `parser`; nothing outside the `api` module sees them.

use crate::types::{BlockId, PageId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub object: String,
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Everything collected by draining a cursor.
#[derive(Debug, Clone)]
pub struct PaginationResult<T> {
    pub items: Vec<T>,
    pub total_fetched: usize,
}

/// A property object as found on pages (value) and databases (column config).
#[derive(Debug, Clone, Deserialize)]
pub struct RawProperty {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub property_type: String,
    /// Remaining fields; the type-specific payload sits under `property_type`.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl RawProperty {
    pub fn take_payload(&mut self) -> Value {
        self.rest.remove(&self.property_type).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    pub id: PageId,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: IndexMap<String, RawProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDatabase {
    pub id: String,
    #[serde(default)]
    pub properties: IndexMap<String, RawProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Error body returned with every non-2xx Notion response.
#[derive(Debug, Clone, Deserialize)]
pub struct NotionErrorBody {
    #[serde(default)]
    pub status: u16,
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Only the ID of a created page is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPage {
    pub id: PageId,
}
