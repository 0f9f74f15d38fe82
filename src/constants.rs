// src/constants.rs
//! Domain constants that define the operational boundaries of the system.
//!
//! Each constant is named for the domain concept it constrains, not its
//! technical role.

// ---------------------------------------------------------------------------
// Notion API boundaries
// ---------------------------------------------------------------------------

/// How many objects the Notion API returns per page of results.
pub const NOTION_API_PAGE_SIZE: usize = 100;

/// Most children a single append (or page creation) request may carry.
pub const APPEND_BATCH_LIMIT: usize = 100;

/// Notion API version pinned for every request.
pub const NOTION_API_VERSION: &str = "2022-06-28";

pub const NOTION_API_BASE_URL: &str = "https://api.notion.com/v1/";

// ---------------------------------------------------------------------------
// Upload form conventions
// ---------------------------------------------------------------------------

/// Text of the heading that opens the embed section on a row's page.
pub const EMBED_MARKER: &str = "アップロードファイル埋め込み";

/// Upload column on the form table.
pub const DEFAULT_UPLOAD_COLUMN: &str = "アップロード";

/// Destination column that receives the single attachment link.
pub const DEFAULT_LINK_COLUMN: &str = "ファイル";

/// Destination column filled from the source row's creation time.
pub const DEFAULT_SUBMITTED_AT_COLUMN: &str = "提出日時";

/// Host marker of Notion's signed S3 URLs.
pub const TEMPORARY_HOST_MARKER: &str = "prod-files-secure.s3";

/// Query markers that show a signed URL carries an expiry.
pub const TEMPORARY_EXPIRY_MARKERS: [&str; 2] = ["X-Amz-Expires", "expiry_time"];

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

pub const DRIVE_API_BASE_URL: &str = "https://www.googleapis.com/";

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Lifetime requested for service-account assertions, in seconds.
pub const SERVICE_ACCOUNT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Refresh cached access tokens this many seconds before they expire.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Per-request timeout for Notion and Drive calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Downloads of large media get a longer budget.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Error display
// ---------------------------------------------------------------------------

/// Maximum characters shown when previewing error response bodies.
pub const ERROR_BODY_PREVIEW_LENGTH: usize = 200;
