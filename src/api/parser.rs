// src/api/parser.rs
//! Parsing of Notion API responses into domain types.
//!
//! Every response passes through `parse_api_response`, which decodes either
//! the success body or Notion's error envelope.

use super::client::ApiResponse;
use super::responses::{
    CreatedPage, NotionErrorBody, PaginatedResponse, RawBlock, RawDatabase, RawPage, RawProperty,
};
use crate::constants::ERROR_BODY_PREVIEW_LENGTH;
use crate::error::{AppError, NotionErrorCode};
use crate::model::{
    ColumnType, DestinationSchema, ExistingBlock, ExistingBlockKind, Page, PropertyEntry,
    PropertyValue,
};
use crate::types::PageId;
use reqwest::StatusCode;
use serde_json::Value;

/// Parse any Notion API response
pub fn parse_api_response<T>(result: ApiResponse<String>) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned,
{
    if result.status.is_success() {
        parse_success_body(&result.data, &result.url)
    } else {
        Err(parse_error_body(&result.data, result.status, &result.url))
    }
}

/// Checks the status of a response whose body is not needed.
pub fn expect_success(result: ApiResponse<String>) -> Result<(), AppError> {
    if result.status.is_success() {
        Ok(())
    } else {
        Err(parse_error_body(&result.data, result.status, &result.url))
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() > ERROR_BODY_PREVIEW_LENGTH {
        let cut: String = body.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect();
        format!("{}...", cut)
    } else {
        body.to_string()
    }
}

fn parse_success_body<T>(body: &str, url: &str) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(body).map_err(|e| {
        log::error!("Failed to parse response from {}: {}", url, e);
        AppError::MalformedResponse(format!("{} (body: {})", e, preview(body)))
    })
}

fn parse_error_body(body: &str, status: StatusCode, url: &str) -> AppError {
    if let Ok(error) = serde_json::from_str::<NotionErrorBody>(body) {
        log::debug!(
            "Notion error {} from {} (request {})",
            error.code,
            url,
            error.request_id.as_deref().unwrap_or("-")
        );
        return AppError::NotionService {
            code: NotionErrorCode::from_api_response(&error.code),
            message: error.message,
            status,
        };
    }

    // Fallback to generic error with HTTP status code
    AppError::NotionService {
        code: NotionErrorCode::from_http_status(status.as_u16()),
        message: format!("HTTP {} from {}: {}", status, url, preview(body)),
        status,
    }
}

/// Typed property values of a page. A payload that does not decode as its
/// declared type is kept as `Unsupported` so the rest of the row survives.
fn convert_properties(
    page: &PageId,
    properties: indexmap::IndexMap<String, RawProperty>,
) -> indexmap::IndexMap<String, PropertyEntry> {
    properties
        .into_iter()
        .map(|(name, mut raw)| {
            let payload = raw.take_payload();
            let value = PropertyValue::from_api(&raw.property_type, payload).unwrap_or_else(|e| {
                log::warn!("Page {}: ignoring property '{}': {}", page, name, e);
                PropertyValue::Unsupported {
                    kind: raw.property_type.clone(),
                }
            });
            (name, PropertyEntry { id: raw.id, value })
        })
        .collect()
}

/// Converts a raw page into the domain page.
pub fn convert_page(raw: RawPage) -> Page {
    let properties = convert_properties(&raw.id, raw.properties);
    Page {
        id: raw.id,
        created_time: raw.created_time,
        archived: raw.archived,
        properties,
    }
}

/// Parses one block object as returned by `blocks/{id}/children`.
///
/// Heading text is read from `plain_text`, falling back to `text.content`
/// for block objects in request shape.
pub fn parse_block(raw: RawBlock) -> ExistingBlock {
    let url = raw.rest.get(&raw.block_type).and_then(linked_url);
    let level = match raw.block_type.as_str() {
        "heading_1" => Some(1),
        "heading_2" => Some(2),
        "heading_3" => Some(3),
        _ => None,
    };

    let kind = match level {
        Some(level) => {
            let text = raw
                .rest
                .get(&raw.block_type)
                .and_then(|payload| payload.get("rich_text"))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| {
                            item.get("plain_text")
                                .and_then(Value::as_str)
                                .or_else(|| item.pointer("/text/content").and_then(Value::as_str))
                                .unwrap_or_default()
                        })
                        .collect::<String>()
                })
                .unwrap_or_default();
            ExistingBlockKind::Heading { level, text }
        }
        None => ExistingBlockKind::Other {
            block_type: raw.block_type,
        },
    };

    ExistingBlock {
        id: raw.id,
        kind,
        url,
    }
}

/// `embed.url`, `image.external.url` / `image.file.url`, or the first
/// linked rich-text item of a text block.
fn linked_url(payload: &Value) -> Option<String> {
    let direct = ["/url", "/external/url", "/file/url"]
        .iter()
        .find_map(|pointer| payload.pointer(pointer).and_then(Value::as_str));
    let linked = || {
        payload
            .get("rich_text")
            .and_then(Value::as_array)?
            .iter()
            .find_map(|item| {
                item.get("href")
                    .and_then(Value::as_str)
                    .or_else(|| item.pointer("/text/link/url").and_then(Value::as_str))
            })
    };
    direct.or_else(linked).map(str::to_string)
}

pub fn parse_pages_pagination(
    result: ApiResponse<String>,
) -> Result<PaginatedResponse<Page>, AppError> {
    let response: PaginatedResponse<RawPage> = parse_api_response(result)?;
    let pages = response.results.into_iter().map(convert_page).collect();

    Ok(PaginatedResponse {
        object: response.object,
        results: pages,
        next_cursor: response.next_cursor,
        has_more: response.has_more,
    })
}

pub fn parse_blocks_pagination(
    result: ApiResponse<String>,
) -> Result<PaginatedResponse<ExistingBlock>, AppError> {
    let response: PaginatedResponse<RawBlock> = parse_api_response(result)?;

    Ok(PaginatedResponse {
        object: response.object,
        results: response.results.into_iter().map(parse_block).collect(),
        next_cursor: response.next_cursor,
        has_more: response.has_more,
    })
}

pub fn parse_schema_response(result: ApiResponse<String>) -> Result<DestinationSchema, AppError> {
    let database: RawDatabase = parse_api_response(result)?;
    log::debug!(
        "Database {} has {} columns",
        database.id,
        database.properties.len()
    );
    Ok(database
        .properties
        .into_iter()
        .map(|(name, raw)| (name, ColumnType::from_api_name(&raw.property_type)))
        .collect())
}

pub fn parse_created_page(result: ApiResponse<String>) -> Result<PageId, AppError> {
    let created: CreatedPage = parse_api_response(result)?;
    Ok(created.id)
}
