use super::property_value::{FileRef, FileSource};
use crate::classify::{classify_media, mime_type_for, MediaCategory};
use crate::types::ValidationError;
use chrono::{DateTime, Utc};

/// Name used when the form stored a file without one.
const UNNAMED_ATTACHMENT: &str = "Unnamed";

/// Who hosts the bytes behind a source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Uploaded to Notion; the URL may be signed and short-lived.
    InternallyHosted,
    /// A link the submitter pasted.
    ExternallyHosted,
}

/// A file referenced by a form row.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    name: String,
    source_url: String,
    source_kind: SourceKind,
    expiry: Option<DateTime<Utc>>,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        source_kind: SourceKind,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        let source_url = source_url.into().trim().to_string();
        if source_url.is_empty() {
            return Err(ValidationError::EmptyField("source_url"));
        }

        let name = name.into().trim().to_string();
        let name = if name.is_empty() {
            UNNAMED_ATTACHMENT.to_string()
        } else {
            name
        };

        Ok(Self {
            name,
            source_url,
            source_kind,
            expiry,
        })
    }

    /// Builds an attachment from one entry of a files property.
    pub fn from_file_ref(file: &FileRef) -> Result<Self, ValidationError> {
        match &file.source {
            FileSource::File { file: hosted } => Self::new(
                &file.name,
                &hosted.url,
                SourceKind::InternallyHosted,
                hosted.expiry_time,
            ),
            FileSource::External { external } => {
                Self::new(&file.name, &external.url, SourceKind::ExternallyHosted, None)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn media_category(&self) -> MediaCategory {
        classify_media(&self.name)
    }

    pub fn mime_type(&self) -> String {
        mime_type_for(&self.name)
    }
}

/// How the durable URL of a resolved attachment came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurableKind {
    /// The source URL was already durable and is used as-is.
    ExternalLink,
    /// The bytes were re-hosted; `object_id` names the stored object.
    RemoteObject { object_id: String },
}

/// An attachment paired with a URL that will not expire.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttachment {
    attachment: Attachment,
    durable_url: String,
    durable_kind: DurableKind,
}

impl ResolvedAttachment {
    /// The attachment's own URL is durable.
    pub fn external_link(attachment: Attachment) -> Self {
        let durable_url = attachment.source_url.clone();
        Self {
            attachment,
            durable_url,
            durable_kind: DurableKind::ExternalLink,
        }
    }

    /// The attachment was copied to object storage.
    pub fn remote_object(
        attachment: Attachment,
        object_id: impl Into<String>,
        durable_url: impl Into<String>,
    ) -> Self {
        Self {
            attachment,
            durable_url: durable_url.into(),
            durable_kind: DurableKind::RemoteObject {
                object_id: object_id.into(),
            },
        }
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn durable_url(&self) -> &str {
        &self.durable_url
    }

    pub fn durable_kind(&self) -> &DurableKind {
        &self.durable_kind
    }

    /// Object ID to clean up if the write that referenced it fails.
    pub fn remote_object_id(&self) -> Option<&str> {
        match &self.durable_kind {
            DurableKind::RemoteObject { object_id } => Some(object_id),
            DurableKind::ExternalLink => None,
        }
    }
}
