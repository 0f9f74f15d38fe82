// src/config.rs
use crate::classify::TemporaryUrlPolicy;
use crate::constants::{
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LINK_COLUMN,
    DEFAULT_SUBMITTED_AT_COLUMN, DEFAULT_UPLOAD_COLUMN, EMBED_MARKER,
};
use crate::error::AppError;
use crate::migrate::{ColumnAlias, LinkTieBreak, MigrationConfig};
use crate::model::UploadColumn;
use crate::storage::ServiceAccountKey;
use crate::types::{ApiKey, DatabaseId, PageId, ValidationError};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::time::Duration;

/// Parsed and validated command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    #[command(subcommand)]
    pub command: Command,

    /// Upload-form table ID or table key (overrides UPLOADFORM_TABLEKEY)
    #[arg(long, global = true)]
    pub database_id: Option<String>,

    /// Process only this row (page URL or ID)
    #[arg(long, global = true)]
    pub page_id: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Timeout in seconds for Notion and Drive API calls
    #[arg(long, global = true, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout: u64,

    /// Timeout in seconds for downloading a single attachment
    #[arg(long, global = true, default_value_t = DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
    pub download_timeout: u64,

    /// Heading text that marks the embed section
    #[arg(long, global = true, default_value = EMBED_MARKER)]
    pub marker: String,

    /// Host marker of time-limited file URLs (repeatable)
    #[arg(long = "temp-host-marker", global = true)]
    pub temp_host_markers: Vec<String>,

    /// Query marker of time-limited file URLs (repeatable)
    #[arg(long = "temp-expiry-marker", global = true)]
    pub temp_expiry_markers: Vec<String>,

    /// Name of the files column holding the uploads
    #[arg(long, global = true, default_value = DEFAULT_UPLOAD_COLUMN)]
    pub upload_column: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render all attachments into an HTML page, or embed them into each row's page
    View {
        /// Embed attachments into each row's own page instead of exporting HTML
        #[arg(long, default_value_t = false)]
        embed: bool,

        /// HTML output file
        #[arg(short, long, default_value = "output.html")]
        output: PathBuf,
    },

    /// Copy rows into the data-management table
    Migrate {
        /// Archive each source row after its destination page is created
        #[arg(long, default_value_t = false)]
        archive_source: bool,

        /// Carry the embed section into the new page's body
        #[arg(long, default_value_t = false)]
        with_blocks: bool,

        /// Feed a destination column from another source column, as DEST=SOURCE (repeatable)
        #[arg(long = "alias")]
        aliases: Vec<ColumnAlias>,

        /// Which attachment fills the link column: first, last or reject-if-multiple
        #[arg(long, default_value = "first")]
        tie_break: LinkTieBreak,

        /// Destination column receiving the attachment URL
        #[arg(long, default_value = DEFAULT_LINK_COLUMN)]
        link_column: String,

        /// Destination column filled from the row's creation time
        #[arg(long, default_value = DEFAULT_SUBMITTED_AT_COLUMN)]
        submitted_at_column: String,
    },

    /// Replace time-limited files in the upload column with durable links
    Rehost,
}

/// A database plus, optionally, the property IDs of its columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableKey {
    pub database_id: DatabaseId,
    pub columns: IndexMap<String, String>,
}

impl TableKey {
    /// Accepts a bare ID or URL, or a JSON object whose `database_id` (or
    /// `id`) entry names the table and whose other entries map column names
    /// to property IDs.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if !raw.starts_with('{') {
            return Ok(Self {
                database_id: DatabaseId::parse(raw)?,
                columns: IndexMap::new(),
            });
        }

        let invalid = |reason: String| ValidationError::InvalidTableKey { reason };
        let entries: IndexMap<String, serde_json::Value> =
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;

        let mut database_id = None;
        let mut columns = IndexMap::new();
        for (key, value) in entries {
            let serde_json::Value::String(value) = value else {
                return Err(invalid(format!("value of '{}' must be a string", key)));
            };
            match key.as_str() {
                "database_id" | "id" => database_id = Some(DatabaseId::parse(&value)?),
                _ => {
                    columns.insert(key, value);
                }
            }
        }

        Ok(Self {
            database_id: database_id
                .ok_or_else(|| invalid("missing 'database_id'".to_string()))?,
            columns,
        })
    }

    pub fn property_id(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// How Drive requests are authorized.
#[derive(Debug, Clone)]
pub enum DriveCredentials {
    ServiceAccount(ServiceAccountKey),
    AccessToken(String),
}

#[derive(Debug, Clone)]
pub struct DriveSettings {
    pub credentials: DriveCredentials,
    pub root_folder_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RunMode {
    Export { output: PathBuf },
    Embed,
    Migrate(MigrationConfig),
    Rehost,
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Export { .. } => "export",
            RunMode::Embed => "embed",
            RunMode::Migrate(_) => "migrate",
            RunMode::Rehost => "rehost",
        }
    }
}

/// Resolved run configuration, validated once and handed to every component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_key: ApiKey,
    pub source: TableKey,
    pub page_filter: Option<PageId>,
    pub mode: RunMode,
    pub upload_column: UploadColumn,
    pub marker: String,
    pub temporary_urls: TemporaryUrlPolicy,
    pub http_timeout: Duration,
    pub download_timeout: Duration,
    pub drive: Option<DriveSettings>,
    #[allow(dead_code)] // Used by bin crate
    pub verbose: bool,
}

impl RunConfig {
    /// Resolves a complete run configuration from CLI input and environment.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, AppError> {
        Self::resolve_with(cli, |name| std::env::var(name).ok())
    }

    /// Like `resolve`, reading variables through `env` instead of the process
    /// environment.
    pub fn resolve_with(
        cli: CommandLineInput,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let var = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let api_key_str = var("NOTION_API_KEY").ok_or_else(|| {
            AppError::MissingConfiguration(
                "NOTION_API_KEY environment variable not set".to_string(),
            )
        })?;
        let api_key = ApiKey::new(api_key_str)?;

        let source_raw = cli
            .database_id
            .clone()
            .or_else(|| var("UPLOADFORM_TABLEKEY"))
            .ok_or_else(|| {
                AppError::MissingConfiguration(
                    "pass --database-id or set UPLOADFORM_TABLEKEY".to_string(),
                )
            })?;
        let source = TableKey::parse(&source_raw)?;

        let page_filter = cli.page_id.as_deref().map(PageId::parse).transpose()?;

        let marker = cli.marker.trim().to_string();
        if marker.is_empty() {
            return Err(ValidationError::EmptyField("marker").into());
        }

        let upload_column = UploadColumn::named(cli.upload_column.clone()).with_property_id(
            source
                .property_id(&cli.upload_column)
                .map(str::to_string),
        );

        let drive = Self::drive_settings(&var)?;

        let mode = match cli.command {
            Command::View { embed: true, .. } => RunMode::Embed,
            Command::View { embed: false, output } => RunMode::Export { output },
            Command::Rehost => {
                if drive.is_none() {
                    return Err(AppError::MissingConfiguration(
                        "rehost needs GDRIVE_KEY or GDRIVE_ACCESS_TOKEN".to_string(),
                    ));
                }
                RunMode::Rehost
            }
            Command::Migrate {
                archive_source,
                with_blocks,
                aliases,
                tie_break,
                link_column,
                submitted_at_column,
            } => {
                let destination_raw = var("DATA_MANAGE_TABLEKEY").ok_or_else(|| {
                    AppError::MissingConfiguration(
                        "DATA_MANAGE_TABLEKEY environment variable not set".to_string(),
                    )
                })?;
                let destination = TableKey::parse(&destination_raw)?;
                RunMode::Migrate(MigrationConfig {
                    destination: destination.database_id,
                    link_column,
                    submitted_at_column,
                    aliases: if aliases.is_empty() {
                        default_aliases()
                    } else {
                        aliases
                    },
                    tie_break,
                    with_blocks,
                    archive_source,
                    marker: marker.clone(),
                })
            }
        };

        Ok(RunConfig {
            api_key,
            source,
            page_filter,
            mode,
            upload_column,
            marker,
            temporary_urls: TemporaryUrlPolicy::new(cli.temp_host_markers, cli.temp_expiry_markers),
            http_timeout: Duration::from_secs(cli.http_timeout),
            download_timeout: Duration::from_secs(cli.download_timeout),
            drive,
            verbose: cli.verbose,
        })
    }

    fn drive_settings(
        var: &impl Fn(&str) -> Option<String>,
    ) -> Result<Option<DriveSettings>, AppError> {
        let credentials = match (var("GDRIVE_KEY"), var("GDRIVE_ACCESS_TOKEN")) {
            (Some(key), _) => DriveCredentials::ServiceAccount(ServiceAccountKey::decode(&key)?),
            (None, Some(token)) => DriveCredentials::AccessToken(token.trim().to_string()),
            (None, None) => return Ok(None),
        };
        Ok(Some(DriveSettings {
            credentials,
            root_folder_id: var("GDRIVE_FOLDER_ID"),
        }))
    }
}

/// The upload form's category answer lands in the destination's category column.
fn default_aliases() -> Vec<ColumnAlias> {
    vec![ColumnAlias {
        destination: "カテゴリ".to_string(),
        source: "アップロード予定のファイル".to_string(),
    }]
}
