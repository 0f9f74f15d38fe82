// src/storage/auth.rs
//! Google OAuth2 access tokens from a service-account key.

use crate::constants::{
    DRIVE_SCOPE, GOOGLE_TOKEN_URL, SERVICE_ACCOUNT_TOKEN_LIFETIME_SECS, TOKEN_REFRESH_MARGIN_SECS,
};
use crate::error::AppError;
use crate::types::ValidationError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

#[derive(Deserialize)]
struct ServiceAccountFile {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// Claims of the assertion exchanged for an access token.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// A parsed service-account key, ready to sign token requests.
#[derive(Clone)]
pub struct ServiceAccountKey {
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Decodes a key given as JSON, base64 JSON, or a base64 data URI.
    pub fn decode(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let invalid = |reason: String| ValidationError::InvalidServiceAccountKey { reason };

        let json = if let Some((_, encoded)) = raw.split_once(";base64,") {
            decode_base64_text(encoded).map_err(invalid)?
        } else if raw.starts_with('{') {
            raw.to_string()
        } else {
            decode_base64_text(raw).map_err(invalid)?
        };

        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let file: ServiceAccountFile = serde_json::from_str(json).map_err(|e| {
            ValidationError::InvalidServiceAccountKey {
                reason: format!("not a service-account JSON key: {}", e),
            }
        })?;
        let encoding_key = EncodingKey::from_rsa_pem(file.private_key.as_bytes()).map_err(|e| {
            ValidationError::InvalidServiceAccountKey {
                reason: format!("private_key is not a PEM RSA key: {}", e),
            }
        })?;

        Ok(Self {
            client_email: file.client_email,
            token_uri: file.token_uri,
            encoding_key,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Signed RS256 JWT asserting this account for `scope`.
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + SERVICE_ACCOUNT_TOKEN_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Authentication(format!("cannot sign token request: {}", e)))
    }
}

fn decode_base64_text(encoded: &str) -> Result<String, String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("decoded key is not UTF-8: {}", e))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

enum TokenKind {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        http: Client,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Where Drive access tokens come from.
pub struct AccessTokenSource {
    kind: TokenKind,
}

impl fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Static(_) => f.write_str("AccessTokenSource::Static(...)"),
            TokenKind::ServiceAccount { key, .. } => write!(
                f,
                "AccessTokenSource::ServiceAccount({})",
                key.client_email()
            ),
        }
    }
}

impl AccessTokenSource {
    /// A pre-issued token, used as-is.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Static(token.into()),
        }
    }

    /// Tokens minted from a service-account key and cached until shortly
    /// before they expire.
    pub fn service_account(key: ServiceAccountKey, http: Client) -> Self {
        Self {
            kind: TokenKind::ServiceAccount {
                key,
                http,
                cached: Mutex::new(None),
            },
        }
    }

    pub async fn token(&self) -> Result<String, AppError> {
        let (key, http, cached) = match &self.kind {
            TokenKind::Static(token) => return Ok(token.clone()),
            TokenKind::ServiceAccount { key, http, cached } => (key, http, cached),
        };

        let now = Utc::now();
        let fresh = cached
            .lock()
            .clone()
            .filter(|hit| hit.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now);
        if let Some(hit) = fresh {
            return Ok(hit.token);
        }

        log::debug!("Requesting access token for {}", key.client_email());
        let assertion = key.assertion(DRIVE_SCOPE, now)?;
        let response = http
            .post(key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Authentication(format!("unreadable token response: {}", e)))?;

        let lifetime = token
            .expires_in
            .unwrap_or(SERVICE_ACCOUNT_TOKEN_LIFETIME_SECS);
        *cached.lock() = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: now + Duration::seconds(lifetime),
        });
        Ok(token.access_token)
    }
}
