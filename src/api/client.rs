// src/api/client.rs
//! Pure HTTP client wrapper for Notion API.
//!
//! This module provides a thin wrapper around reqwest for making
//! HTTP requests to the Notion API. It handles authentication and
//! basic request/response operations without parsing or business logic.

use super::parser;
use crate::constants::{APPEND_BATCH_LIMIT, NOTION_API_BASE_URL, NOTION_API_VERSION};
use crate::error::AppError;
use crate::model::{ContentBlock, DestinationSchema, ExistingBlock, FileRef, NewRowProperties, Page};
use crate::types::{ApiKey, BlockId, DatabaseId, PageId};
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// A thin wrapper around reqwest Client for Notion API requests.
#[derive(Clone)]
pub struct NotionHttpClient {
    client: Client,
    base_url: String,
}

impl NotionHttpClient {
    /// Creates a new HTTP client with Notion API authentication.
    pub fn new(api_key: &ApiKey, timeout: Duration) -> Result<Self, AppError> {
        Self::with_base_url(api_key, timeout, NOTION_API_BASE_URL)
    }

    /// Creates a client talking to another host, e.g. a mock server.
    pub fn with_base_url(
        api_key: &ApiKey,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .default_headers(Self::create_headers(api_key)?)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates the default headers for Notion API requests.
    fn create_headers(api_key: &ApiKey) -> Result<header::HeaderMap, AppError> {
        let mut headers = header::HeaderMap::new();

        let auth_header = format!("Bearer {}", api_key.as_str());
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth_header).map_err(|e| {
                AppError::MissingConfiguration(format!("Invalid API token format: {}", e))
            })?,
        );

        headers.insert(
            "Notion-Version",
            header::HeaderValue::from_static(NOTION_API_VERSION),
        );

        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Makes a GET request to the specified endpoint.
    pub async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Response, AppError> {
        let url = self.url(endpoint);
        log::debug!("GET {}", url);
        Ok(self.client.get(url).query(query).send().await?)
    }

    /// Makes a POST request with JSON body to the specified endpoint.
    pub async fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<Response, AppError> {
        let url = self.url(endpoint);
        log::debug!("POST {}", url);
        Ok(self.client.post(url).json(body).send().await?)
    }

    /// Makes a PATCH request with JSON body to the specified endpoint.
    pub async fn patch<T: Serialize>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<Response, AppError> {
        let url = self.url(endpoint);
        log::debug!("PATCH {}", url);
        Ok(self.client.patch(url).json(body).send().await?)
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Response, AppError> {
        let url = self.url(endpoint);
        log::debug!("DELETE {}", url);
        Ok(self.client.delete(url).send().await?)
    }
}

#[async_trait::async_trait]
impl super::NotionRepository for NotionHttpClient {
    async fn query_rows(&self, database: &DatabaseId) -> Result<Vec<Page>, AppError> {
        let endpoint = format!("databases/{}/query", database.to_dashed());
        let client = self.clone();
        let pagination_result = super::simple_pagination::fetch_all_pages_simple(
            |page_size, cursor| {
                let client = client.clone();
                let endpoint = endpoint.clone();
                async move {
                    let mut query = json!({ "page_size": page_size });
                    if let Some(cursor) = cursor {
                        query["start_cursor"] = json!(cursor);
                    }
                    let response = client.post(&endpoint, &query).await?;
                    let result = extract_response_text(response).await?;
                    parser::parse_pages_pagination(result)
                }
            },
            None,
        )
        .await?;
        log::info!(
            "Fetched {} rows from database {}",
            pagination_result.total_fetched,
            database
        );
        Ok(pagination_result.items)
    }

    async fn retrieve_schema(&self, database: &DatabaseId) -> Result<DestinationSchema, AppError> {
        let endpoint = format!("databases/{}", database.to_dashed());
        let response = self.get(&endpoint, &[]).await?;
        let result = extract_response_text(response).await?;
        parser::parse_schema_response(result)
    }

    async fn list_children(&self, parent: &BlockId) -> Result<Vec<ExistingBlock>, AppError> {
        let endpoint = format!("blocks/{}/children", parent.to_dashed());
        let client = self.clone();
        let pagination_result = super::simple_pagination::fetch_all_pages_simple(
            |page_size, cursor| {
                let client = client.clone();
                let endpoint = endpoint.clone();
                async move {
                    let mut query = vec![("page_size", page_size.to_string())];
                    if let Some(cursor) = cursor {
                        query.push(("start_cursor", cursor));
                    }
                    let response = client.get(&endpoint, &query).await?;
                    let result = extract_response_text(response).await?;
                    parser::parse_blocks_pagination(result)
                }
            },
            None,
        )
        .await?;
        Ok(pagination_result.items)
    }

    async fn append_children(
        &self,
        parent: &BlockId,
        blocks: &[ContentBlock],
    ) -> Result<(), AppError> {
        if blocks.len() > APPEND_BATCH_LIMIT {
            return Err(AppError::InternalError {
                message: format!(
                    "Append of {} blocks exceeds the per-request limit of {}",
                    blocks.len(),
                    APPEND_BATCH_LIMIT
                ),
                source: None,
            });
        }
        let endpoint = format!("blocks/{}/children", parent.to_dashed());
        let response = self
            .patch(&endpoint, &json!({ "children": blocks }))
            .await?;
        parser::expect_success(extract_response_text(response).await?)
    }

    async fn delete_block(&self, block: &BlockId) -> Result<(), AppError> {
        let endpoint = format!("blocks/{}", block.to_dashed());
        let response = self.delete(&endpoint).await?;
        parser::expect_success(extract_response_text(response).await?)
    }

    async fn create_page(
        &self,
        database: &DatabaseId,
        properties: &NewRowProperties,
        children: &[ContentBlock],
    ) -> Result<PageId, AppError> {
        let mut body = json!({
            "parent": { "database_id": database.to_dashed() },
            "properties": properties.to_request(),
        });
        if !children.is_empty() {
            body["children"] = json!(children);
        }
        let response = self.post("pages", &body).await?;
        parser::parse_created_page(extract_response_text(response).await?)
    }

    async fn archive_page(&self, page: &PageId) -> Result<(), AppError> {
        let endpoint = format!("pages/{}", page.to_dashed());
        let response = self.patch(&endpoint, &json!({ "archived": true })).await?;
        parser::expect_success(extract_response_text(response).await?)
    }

    async fn update_files(
        &self,
        page: &PageId,
        column: &str,
        files: &[FileRef],
    ) -> Result<(), AppError> {
        let endpoint = format!("pages/{}", page.to_dashed());
        let body = json!({ "properties": { column: { "files": files } } });
        let response = self.patch(&endpoint, &body).await?;
        parser::expect_success(extract_response_text(response).await?)
    }
}

/// Result of an HTTP operation with response metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: reqwest::StatusCode,
    pub url: String,
}

/// Extracts the response body as text with metadata.
pub async fn extract_response_text(response: Response) -> Result<ApiResponse<String>, AppError> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response.text().await?;

    Ok(ApiResponse {
        data: text,
        status,
        url,
    })
}
