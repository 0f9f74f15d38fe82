use super::{Attachment, Page, PropertyEntry, PropertyKind, PropertyValue};
use crate::error::LookupError;
use crate::types::PageId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// How the upload column is found on a row: by property ID when the table
/// key supplied one, otherwise by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadColumn {
    pub name: String,
    pub property_id: Option<String>,
}

impl UploadColumn {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_id: None,
        }
    }

    pub fn with_property_id(mut self, property_id: Option<String>) -> Self {
        self.property_id = property_id;
        self
    }

    /// Locates the upload column among a row's properties.
    ///
    /// A missing column is recovered by taking the first files-typed
    /// property; the returned flag carries the recovered lookup error.
    pub fn locate(
        &self,
        row_id: &PageId,
        properties: &IndexMap<String, PropertyEntry>,
    ) -> Result<(String, Option<LookupError>), LookupError> {
        if let Some(pid) = &self.property_id {
            if let Some((name, _)) = properties.iter().find(|(_, entry)| &entry.id == pid) {
                return Ok((name.clone(), None));
            }
        }

        if let Some(entry) = properties.get(&self.name) {
            if entry.value.kind() == PropertyKind::Files {
                return Ok((self.name.clone(), None));
            }
        }

        let missing = LookupError::MissingColumn {
            row_id: row_id.to_string(),
            column: self.name.clone(),
        };
        properties
            .iter()
            .find(|(_, entry)| entry.value.kind() == PropertyKind::Files)
            .map(|(name, _)| (name.clone(), Some(missing)))
            .ok_or_else(|| LookupError::NoFilesColumn {
                row_id: row_id.to_string(),
            })
    }
}

/// One record of the upload-form table with its attachments extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: PageId,
    pub created_time: Option<DateTime<Utc>>,
    pub properties: IndexMap<String, PropertyEntry>,
    /// Name of the property the attachments were read from.
    pub upload_column: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Row {
    /// Extracts the row's attachments, in the order the files property lists them.
    pub fn from_page(page: Page, upload_column: &UploadColumn) -> Self {
        let (column, attachments) = match upload_column.locate(&page.id, &page.properties) {
            Ok((column, recovered)) => {
                if let Some(lookup) = recovered {
                    log::warn!("{}; using files column '{}' instead", lookup, column);
                }
                let attachments = page
                    .properties
                    .get(&column)
                    .map(|entry| extract_attachments(&page.id, &entry.value))
                    .unwrap_or_default();
                (Some(column), attachments)
            }
            Err(lookup) => {
                log::warn!("{}", lookup);
                (None, Vec::new())
            }
        };

        Self {
            id: page.id,
            created_time: page.created_time,
            properties: page.properties,
            upload_column: column,
            attachments,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).map(|entry| &entry.value)
    }

    /// The row title, or its ID when the title is empty.
    pub fn display_title(&self) -> String {
        self.properties
            .values()
            .find(|entry| entry.value.kind() == PropertyKind::Title)
            .map(|entry| entry.value.plain_text())
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| self.id.to_string())
    }
}

fn extract_attachments(row_id: &PageId, value: &PropertyValue) -> Vec<Attachment> {
    let PropertyValue::Files(files) = value else {
        return Vec::new();
    };
    files
        .iter()
        .filter_map(|file| match Attachment::from_file_ref(file) {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                log::warn!("Row {}: skipping file '{}': {}", row_id, file.name, e);
                None
            }
        })
        .collect()
}
