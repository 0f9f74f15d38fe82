// src/storage/drive.rs
//! Google Drive as the durable object store.
//!
//! Uploads are three calls: a media upload that creates the file, a metadata
//! patch that names it and moves it into the per-category folder, and a
//! permission grant so anyone with the link can view it. A Drive file has a
//! single parent, so the move removes the parent the upload landed in.

use super::{AccessTokenSource, ObjectStore, StoredObject};
use crate::classify::MediaCategory;
use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DRIVE_API_BASE_URL, ERROR_BODY_PREVIEW_LENGTH};
use crate::error::AppError;
use crate::types::ValidationError;
use parking_lot::Mutex;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// The link Notion should embed for a Drive file of the given category.
pub fn drive_embed_url(file_id: &str, category: MediaCategory) -> String {
    match category {
        MediaCategory::Image => format!("https://drive.google.com/uc?export=view&id={}", file_id),
        MediaCategory::Video | MediaCategory::Audio => {
            format!("https://drive.google.com/file/d/{}/preview", file_id)
        }
        MediaCategory::Other => format!("https://drive.google.com/file/d/{}/view", file_id),
    }
}

/// Inverse of [`drive_embed_url`].
pub fn drive_file_id(embed_url: &str) -> Option<String> {
    let url = Url::parse(embed_url).ok()?;
    if url.host_str() != Some("drive.google.com") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.collect();
    let id = match segments.as_slice() {
        ["uc"] => url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned()),
        ["file", "d", id, "preview" | "view"] => Some(id.to_string()),
        _ => None,
    };
    id.filter(|id| !id.is_empty())
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_base_url: Url,
    /// Folder under which per-category folders are created. Files stay in
    /// the account's root when unset.
    pub root_folder_id: Option<String>,
    pub timeout: Duration,
}

impl DriveConfig {
    /// Talks to the public Drive API.
    pub fn new() -> Result<Self, ValidationError> {
        Ok(Self {
            api_base_url: parse_base_url(DRIVE_API_BASE_URL)?,
            root_folder_id: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ValidationError> {
        self.api_base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_root_folder(mut self, folder_id: Option<String>) -> Self {
        self.root_folder_id = folder_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ValidationError> {
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| ValidationError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct GoogleDriveStore {
    http: Client,
    config: DriveConfig,
    auth: AccessTokenSource,
    folders: Mutex<HashMap<MediaCategory, String>>,
}

impl GoogleDriveStore {
    pub fn new(config: DriveConfig, auth: AccessTokenSource) -> Result<Self, AppError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            auth,
            folders: Mutex::new(HashMap::new()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.config
            .api_base_url
            .join(path)
            .map_err(|e| AppError::InternalError {
                message: format!("cannot build Drive URL for '{}'", path),
                source: Some(Box::new(e)),
            })
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AppError> {
        let token = self.auth.token().await?;
        Ok(request.bearer_auth(token))
    }

    /// Folder for `category` under the root folder, created on first use.
    async fn category_folder(
        &self,
        root: &str,
        category: MediaCategory,
    ) -> Result<String, AppError> {
        if let Some(id) = self.folders.lock().get(&category).cloned() {
            return Ok(id);
        }

        let name = category.folder_name();
        let query = format!(
            "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
            name, FOLDER_MIME_TYPE, root
        );
        let request = self
            .http
            .get(self.endpoint("drive/v3/files")?)
            .query(&[("q", query.as_str()), ("fields", "files(id)")]);
        let listed: FileList = read_json(self.authorized(request).await?.send().await?).await?;

        let id = match listed.files.into_iter().next() {
            Some(existing) => existing.id,
            None => {
                log::info!("Creating Drive folder '{}'", name);
                let request = self.http.post(self.endpoint("drive/v3/files")?).json(&json!({
                    "name": name,
                    "mimeType": FOLDER_MIME_TYPE,
                    "parents": [root],
                }));
                let created: DriveFile =
                    read_json(self.authorized(request).await?.send().await?).await?;
                created.id
            }
        };

        self.folders.lock().insert(category, id.clone());
        Ok(id)
    }

    async fn finish_upload(
        &self,
        uploaded: &DriveFile,
        file_name: &str,
        category: MediaCategory,
    ) -> Result<(), AppError> {
        let file_id = uploaded.id.as_str();
        let mut request = self
            .http
            .patch(self.endpoint(&format!("drive/v3/files/{}", file_id))?)
            .json(&json!({ "name": file_name }));
        if let Some(root) = self.config.root_folder_id.as_deref() {
            let folder = self.category_folder(root, category).await?;
            request = request.query(&[("addParents", folder.as_str())]);
            let previous: Vec<&str> = uploaded
                .parents
                .iter()
                .map(String::as_str)
                .filter(|parent| *parent != folder)
                .collect();
            if !previous.is_empty() {
                request = request.query(&[("removeParents", previous.join(","))]);
            }
        }
        expect_ok(self.authorized(request).await?.send().await?).await?;

        let request = self
            .http
            .post(self.endpoint(&format!("drive/v3/files/{}/permissions", file_id))?)
            .json(&json!({ "type": "anyone", "role": "reader" }));
        expect_ok(self.authorized(request).await?.send().await?).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for GoogleDriveStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        category: MediaCategory,
    ) -> Result<StoredObject, AppError> {
        let size = bytes.len();
        let request = self
            .http
            .post(self.endpoint("upload/drive/v3/files")?)
            .query(&[("uploadType", "media"), ("fields", "id,parents")])
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes);
        let created: DriveFile = read_json(self.authorized(request).await?.send().await?).await?;
        log::debug!("Uploaded {} bytes as Drive file {}", size, created.id);

        if let Err(e) = self.finish_upload(&created, file_name, category).await {
            if let Err(cleanup) = self.delete(&created.id).await {
                log::warn!("Could not remove half-uploaded file {}: {}", created.id, cleanup);
            }
            return Err(e);
        }

        log::info!("Stored '{}' as Drive file {}", file_name, created.id);
        Ok(StoredObject {
            embed_url: drive_embed_url(&created.id, category),
            object_id: created.id,
        })
    }

    async fn delete(&self, object_id: &str) -> Result<(), AppError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("drive/v3/files/{}", object_id))?);
        expect_ok(self.authorized(request).await?.send().await?).await?;
        log::info!("Deleted Drive file {}", object_id);
        Ok(())
    }

    fn object_id_for_url(&self, url: &str) -> Option<String> {
        drive_file_id(url)
    }
}

async fn expect_ok(response: Response) -> Result<String, AppError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect();
    Err(AppError::ObjectStore {
        status,
        message: preview,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let body = expect_ok(response).await?;
    serde_json::from_str(&body)
        .map_err(|e| AppError::MalformedResponse(format!("Drive response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn embed_urls_follow_category() {
        assert_eq!(
            drive_embed_url("abc", MediaCategory::Image),
            "https://drive.google.com/uc?export=view&id=abc"
        );
        assert_eq!(
            drive_embed_url("abc", MediaCategory::Video),
            "https://drive.google.com/file/d/abc/preview"
        );
        assert_eq!(
            drive_embed_url("abc", MediaCategory::Audio),
            "https://drive.google.com/file/d/abc/preview"
        );
        assert_eq!(
            drive_embed_url("abc", MediaCategory::Other),
            "https://drive.google.com/file/d/abc/view"
        );
    }

    #[test]
    fn file_ids_are_read_back_from_embed_urls() {
        for category in [
            MediaCategory::Image,
            MediaCategory::Video,
            MediaCategory::Audio,
            MediaCategory::Other,
        ] {
            assert_eq!(
                drive_file_id(&drive_embed_url("1AbC", category)),
                Some("1AbC".to_string())
            );
        }
        assert_eq!(drive_file_id("https://cdn.test/file/d/1AbC/view"), None);
        assert_eq!(drive_file_id("https://drive.google.com/drive/folders/1AbC"), None);
        assert_eq!(drive_file_id("not a url"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = DriveConfig::new()
            .unwrap()
            .with_base_url("http://127.0.0.1:9000")
            .unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:9000/");
        assert!(DriveConfig::new().unwrap().with_base_url("not a url").is_err());
    }

    #[test]
    fn blank_root_folder_is_ignored() {
        let config = DriveConfig::new().unwrap().with_root_folder(Some("  ".to_string()));
        assert_eq!(config.root_folder_id, None);
    }
}
