// src/export.rs
//! Renders form attachments into a single static HTML page.

use crate::classify::MediaCategory;
use crate::error::AppError;
use crate::model::{Attachment, Row};
use crate::resolve::Resolver;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

pub const TEMPLATE_NAME: &str = "file_viewer";
const TEMPLATE_SOURCE: &str = include_str!("../templates/file_viewer.hbs");

const PAGE_TITLE: &str = "Notion Files";
const PAGE_HEADING: &str = "アップロードファイル";
const EMPTY_NOTICE: &str = "ファイルが見つかりませんでした";

/// One file as the template sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFile {
    pub name: String,
    pub url: String,
    pub mime_type: String,
    pub is_image: bool,
    pub is_video: bool,
    pub is_audio: bool,
}

impl ExportFile {
    fn new(attachment: &Attachment, url: &str) -> Self {
        let category = attachment.media_category();
        Self {
            name: attachment.name().to_string(),
            url: url.to_string(),
            mime_type: attachment.mime_type(),
            is_image: category == MediaCategory::Image,
            is_video: category == MediaCategory::Video,
            is_audio: category == MediaCategory::Audio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub id: String,
    pub title: String,
    pub files: Vec<ExportFile>,
}

/// Collects the files of each row for rendering.
///
/// With an object store configured, attachments are resolved first so the
/// page keeps working after Notion's signed URLs expire; unresolvable ones
/// are left out. Without one, source URLs are used as they are.
pub async fn collect_rows(rows: &[Row], resolver: &Resolver) -> Vec<ExportRow> {
    let mut collected = Vec::with_capacity(rows.len());
    for row in rows {
        let files = if resolver.has_object_store() {
            resolver
                .resolve_all(&row.attachments)
                .await
                .resolved
                .iter()
                .map(|r| ExportFile::new(r.attachment(), r.durable_url()))
                .collect()
        } else {
            row.attachments
                .iter()
                .map(|a| ExportFile::new(a, a.source_url()))
                .collect()
        };
        collected.push(ExportRow {
            id: row.id.to_string(),
            title: row.display_title(),
            files,
        });
    }
    collected
}

pub struct HtmlExporter {
    handlebars: Handlebars<'static>,
}

impl HtmlExporter {
    pub fn new() -> Result<Self, AppError> {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string(TEMPLATE_NAME, TEMPLATE_SOURCE)
            .map_err(|e| AppError::TemplateRenderError {
                name: TEMPLATE_NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { handlebars })
    }

    pub fn render(&self, rows: &[ExportRow]) -> Result<String, AppError> {
        let file_count: usize = rows.iter().map(|r| r.files.len()).sum();
        let data = json!({
            "title": PAGE_TITLE,
            "heading": PAGE_HEADING,
            "empty_notice": EMPTY_NOTICE,
            "has_files": file_count > 0,
            "rows": rows,
        });
        let html = self.handlebars.render(TEMPLATE_NAME, &data)?;
        log::info!(
            "Rendered {} files from {} rows ({} bytes)",
            file_count,
            rows.len(),
            html.len()
        );
        Ok(html)
    }
}
