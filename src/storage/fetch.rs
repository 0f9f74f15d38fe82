// src/storage/fetch.rs
//! Downloads attachment bytes over HTTP.

use super::FileFetcher;
use crate::error::AppError;
use reqwest::Client;
use std::time::Duration;

/// Plain GET download with a per-request timeout.
#[derive(Clone)]
pub struct HttpFileFetcher {
    client: Client,
}

impl HttpFileFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        log::debug!("Downloading {}", url.split('?').next().unwrap_or(url));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ObjectStore {
                status,
                message: format!("download returned {}", status),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
