mod attachment;
mod block;
mod new_row;
mod property_value;
mod row;
mod schema;

pub use attachment::{Attachment, DurableKind, ResolvedAttachment, SourceKind};
pub use block::{ContentBlock, ExistingBlock, ExistingBlockKind};
pub use property_value::{
    DateValue, ExternalFile, FileRef, FileSource, HostedFile, PersonRef, PropertyKind,
    PropertyValue, RelationRef, RichTextItem, SelectOption,
};
pub use new_row::NewRowProperties;
pub use row::{Row, UploadColumn};
pub use schema::{ColumnType, DestinationSchema};

use crate::types::PageId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// A property as it appears on a page: its stable ID and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    pub id: String,
    pub value: PropertyValue,
}

/// A Notion page as returned by a database query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: PageId,
    pub created_time: Option<DateTime<Utc>>,
    pub archived: bool,
    /// Properties keyed by name, in API order.
    pub properties: IndexMap<String, PropertyEntry>,
}
