use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Rich text item, reduced to what the pipeline reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextItem {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
}

impl RichTextItem {
    pub fn plain_text(text: &str) -> Self {
        Self {
            plain_text: text.to_string(),
            href: None,
        }
    }
}

/// Select option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Date value; start/end are kept as the API's ISO strings so that both
/// dates and date-times survive a copy untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// A user referenced from a people property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A page referenced from a relation property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
}

/// Notion-hosted file payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedFile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
}

/// Externally hosted file payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFile {
    pub url: String,
}

/// Where a file object points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FileSource {
    #[serde(rename = "file")]
    File { file: HostedFile },
    #[serde(rename = "external")]
    External { external: ExternalFile },
}

/// One entry of a files property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub source: FileSource,
}

impl FileRef {
    /// An externally hosted file object, the only kind the API accepts on write.
    pub fn external(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::External {
                external: ExternalFile { url: url.into() },
            },
        }
    }

    pub fn url(&self) -> &str {
        match &self.source {
            FileSource::File { file } => &file.url,
            FileSource::External { external } => &external.url,
        }
    }
}

/// The type of a property, shared by page values and database columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Title,
    RichText,
    Number,
    Select,
    MultiSelect,
    Status,
    Date,
    People,
    Files,
    Checkbox,
    Url,
    Email,
    PhoneNumber,
    Relation,
    CreatedTime,
    LastEditedTime,
    /// Computed or otherwise unhandled types (formula, rollup, unique_id, ...).
    Other(String),
}

impl PropertyKind {
    pub fn from_api_name(name: &str) -> Self {
        match name {
            "title" => Self::Title,
            "rich_text" => Self::RichText,
            "number" => Self::Number,
            "select" => Self::Select,
            "multi_select" => Self::MultiSelect,
            "status" => Self::Status,
            "date" => Self::Date,
            "people" => Self::People,
            "files" => Self::Files,
            "checkbox" => Self::Checkbox,
            "url" => Self::Url,
            "email" => Self::Email,
            "phone_number" => Self::PhoneNumber,
            "relation" => Self::Relation,
            "created_time" => Self::CreatedTime,
            "last_edited_time" => Self::LastEditedTime,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn api_name(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::RichText => "rich_text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Status => "status",
            Self::Date => "date",
            Self::People => "people",
            Self::Files => "files",
            Self::Checkbox => "checkbox",
            Self::Url => "url",
            Self::Email => "email",
            Self::PhoneNumber => "phone_number",
            Self::Relation => "relation",
            Self::CreatedTime => "created_time",
            Self::LastEditedTime => "last_edited_time",
            Self::Other(name) => name,
        }
    }

    /// Timestamp columns are maintained by Notion and never written.
    pub fn is_system_timestamp(&self) -> bool {
        matches!(self, Self::CreatedTime | Self::LastEditedTime)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// A typed property value. One variant per Notion property type, so every
/// consumer matches exhaustively instead of branching on a `type` string.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(Vec<RichTextItem>),
    RichText(Vec<RichTextItem>),
    Number(Option<f64>),
    Select(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    Status(Option<SelectOption>),
    Date(Option<DateValue>),
    People(Vec<PersonRef>),
    Files(Vec<FileRef>),
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    Relation(Vec<RelationRef>),
    CreatedTime(DateTime<Utc>),
    LastEditedTime(DateTime<Utc>),
    Unsupported { kind: String },
}

impl PropertyValue {
    /// Parses the type-specific payload of a property object.
    ///
    /// `value` is the payload under the key named by `property_type`,
    /// e.g. the array under `"title"`.
    pub fn from_api(property_type: &str, value: Value) -> Result<Self, AppError> {
        fn decode<T: serde::de::DeserializeOwned>(
            property_type: &str,
            value: Value,
        ) -> Result<T, AppError> {
            serde_json::from_value(value).map_err(|e| {
                AppError::MalformedResponse(format!(
                    "Invalid '{}' property payload: {}",
                    property_type, e
                ))
            })
        }

        let parsed = match property_type {
            "title" => Self::Title(decode(property_type, value)?),
            "rich_text" => Self::RichText(decode(property_type, value)?),
            "number" => Self::Number(decode(property_type, value)?),
            "select" => Self::Select(decode(property_type, value)?),
            "multi_select" => Self::MultiSelect(decode(property_type, value)?),
            "status" => Self::Status(decode(property_type, value)?),
            "date" => Self::Date(decode(property_type, value)?),
            "people" => Self::People(decode(property_type, value)?),
            "files" => Self::Files(decode(property_type, value)?),
            "checkbox" => Self::Checkbox(decode(property_type, value)?),
            "url" => Self::Url(decode(property_type, value)?),
            "email" => Self::Email(decode(property_type, value)?),
            "phone_number" => Self::PhoneNumber(decode(property_type, value)?),
            "relation" => Self::Relation(decode(property_type, value)?),
            "created_time" => Self::CreatedTime(decode(property_type, value)?),
            "last_edited_time" => Self::LastEditedTime(decode(property_type, value)?),
            other => {
                log::debug!("Property type '{}' is read-only here, not decoding", other);
                Self::Unsupported {
                    kind: other.to_string(),
                }
            }
        };
        Ok(parsed)
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Title(_) => PropertyKind::Title,
            Self::RichText(_) => PropertyKind::RichText,
            Self::Number(_) => PropertyKind::Number,
            Self::Select(_) => PropertyKind::Select,
            Self::MultiSelect(_) => PropertyKind::MultiSelect,
            Self::Status(_) => PropertyKind::Status,
            Self::Date(_) => PropertyKind::Date,
            Self::People(_) => PropertyKind::People,
            Self::Files(_) => PropertyKind::Files,
            Self::Checkbox(_) => PropertyKind::Checkbox,
            Self::Url(_) => PropertyKind::Url,
            Self::Email(_) => PropertyKind::Email,
            Self::PhoneNumber(_) => PropertyKind::PhoneNumber,
            Self::Relation(_) => PropertyKind::Relation,
            Self::CreatedTime(_) => PropertyKind::CreatedTime,
            Self::LastEditedTime(_) => PropertyKind::LastEditedTime,
            Self::Unsupported { kind } => PropertyKind::Other(kind.clone()),
        }
    }

    /// Text rendering used for titles, HTML export and logging.
    pub fn plain_text(&self) -> String {
        fn join(items: &[RichTextItem]) -> String {
            items.iter().map(|item| item.plain_text.as_str()).collect()
        }
        match self {
            Self::Title(items) | Self::RichText(items) => join(items),
            Self::Number(n) => n.map(|n| n.to_string()).unwrap_or_default(),
            Self::Select(opt) | Self::Status(opt) => {
                opt.as_ref().map(|o| o.name.clone()).unwrap_or_default()
            }
            Self::MultiSelect(opts) => opts
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Date(date) => date.as_ref().map(|d| d.start.clone()).unwrap_or_default(),
            Self::People(people) => people
                .iter()
                .map(|p| p.name.clone().unwrap_or_else(|| p.id.clone()))
                .collect::<Vec<_>>()
                .join(", "),
            Self::Files(files) => files
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Checkbox(checked) => checked.to_string(),
            Self::Url(s) | Self::Email(s) | Self::PhoneNumber(s) => s.clone().unwrap_or_default(),
            Self::Relation(pages) => pages
                .iter()
                .map(|p| p.id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Self::CreatedTime(t) | Self::LastEditedTime(t) => t.to_rfc3339(),
            Self::Unsupported { .. } => String::new(),
        }
    }

    /// The request payload used when writing this value to a page, or `None`
    /// for values Notion computes itself.
    pub fn to_request_value(&self) -> Option<Value> {
        fn rich_text(items: &[RichTextItem]) -> Value {
            Value::Array(
                items
                    .iter()
                    .map(|item| {
                        let mut text = json!({ "content": item.plain_text });
                        if let Some(href) = &item.href {
                            text["link"] = json!({ "url": href });
                        }
                        json!({ "type": "text", "text": text })
                    })
                    .collect(),
            )
        }
        fn option_name(opt: &Option<SelectOption>) -> Value {
            opt.as_ref()
                .map(|o| json!({ "name": o.name }))
                .unwrap_or(Value::Null)
        }

        let value = match self {
            Self::Title(items) => json!({ "title": rich_text(items) }),
            Self::RichText(items) => json!({ "rich_text": rich_text(items) }),
            Self::Number(n) => json!({ "number": n }),
            Self::Select(opt) => json!({ "select": option_name(opt) }),
            Self::Status(opt) => json!({ "status": option_name(opt) }),
            Self::MultiSelect(opts) => json!({
                "multi_select": opts.iter().map(|o| json!({ "name": o.name })).collect::<Vec<_>>()
            }),
            Self::Date(date) => json!({ "date": date }),
            Self::People(people) => json!({
                "people": people.iter().map(|p| json!({ "id": p.id })).collect::<Vec<_>>()
            }),
            Self::Files(files) => json!({ "files": files }),
            Self::Checkbox(checked) => json!({ "checkbox": checked }),
            Self::Url(url) => json!({ "url": url }),
            Self::Email(email) => json!({ "email": email }),
            Self::PhoneNumber(phone) => json!({ "phone_number": phone }),
            Self::Relation(pages) => json!({
                "relation": pages.iter().map(|p| json!({ "id": p.id })).collect::<Vec<_>>()
            }),
            Self::CreatedTime(_) | Self::LastEditedTime(_) | Self::Unsupported { .. } => {
                return None
            }
        };
        Some(value)
    }
}
