// tests/common/mod.rs
//! In-memory collaborators shared by the pipeline tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use notion_attachments::{
    AppError, Attachment, BlockId, ContentBlock, DatabaseId, DestinationSchema, ExistingBlock,
    ExistingBlockKind, FileFetcher, FileRef, FileSource, HostedFile, MediaCategory,
    NewRowProperties, NotionRepository, ObjectStore, Page, PageId, PropertyEntry, PropertyValue,
    Resolver, RichTextItem, Row, StoredObject, TemporaryUrlPolicy, UploadColumn,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const MARKER: &str = "アップロードファイル埋め込み";
pub const UPLOAD: &str = "アップロード";

/// A block held by the fake, with the content it was appended from.
#[derive(Debug, Clone)]
pub struct FakeBlock {
    pub id: BlockId,
    pub kind: ExistingBlockKind,
    pub content: Option<ContentBlock>,
}

impl FakeBlock {
    pub fn paragraph(text: &str) -> Self {
        Self {
            id: BlockId::new_v4(),
            kind: ExistingBlockKind::Other {
                block_type: "paragraph".to_string(),
            },
            content: Some(ContentBlock::Caption {
                text: text.to_string(),
            }),
        }
    }

    pub fn heading(text: &str) -> Self {
        Self::from_content(ContentBlock::Heading {
            text: text.to_string(),
        })
    }

    fn from_content(content: ContentBlock) -> Self {
        let kind = match &content {
            ContentBlock::Heading { text } => ExistingBlockKind::Heading {
                level: 3,
                text: text.clone(),
            },
            other => ExistingBlockKind::Other {
                block_type: other.block_type().to_string(),
            },
        };
        Self {
            id: BlockId::new_v4(),
            kind,
            content: Some(content),
        }
    }
}

#[derive(Default)]
pub struct FakeState {
    pub pages: Vec<Page>,
    pub children: HashMap<String, Vec<FakeBlock>>,
    pub schema: DestinationSchema,
    pub created: Vec<(PageId, NewRowProperties, Vec<ContentBlock>)>,
    pub archived: Vec<PageId>,
    pub file_updates: Vec<(PageId, String, Vec<FileRef>)>,
    /// Block counts of every append call, in order.
    pub append_sizes: Vec<usize>,
    /// Every mutating call, in order.
    pub calls: Vec<String>,
    pub fail_appends_on: HashSet<String>,
    pub fail_create: bool,
    pub fail_file_updates: bool,
}

/// A Notion workspace held in memory.
#[derive(Default)]
pub struct FakeNotion {
    pub state: Mutex<FakeState>,
}

impl FakeNotion {
    pub fn with_pages(pages: Vec<Page>) -> Arc<Self> {
        let fake = Self::default();
        fake.state.lock().pages = pages;
        Arc::new(fake)
    }

    pub fn seed_children(&self, page: &PageId, blocks: Vec<FakeBlock>) {
        self.state
            .lock()
            .children
            .insert(page.as_str().to_string(), blocks);
    }

    pub fn children_of(&self, page: &PageId) -> Vec<FakeBlock> {
        self.state
            .lock()
            .children
            .get(page.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn content_of(&self, page: &PageId) -> Vec<ContentBlock> {
        self.children_of(page)
            .into_iter()
            .filter_map(|block| block.content)
            .collect()
    }

    pub fn marker_count(&self, page: &PageId) -> usize {
        self.children_of(page)
            .iter()
            .filter(|b| {
                matches!(&b.kind, ExistingBlockKind::Heading { text, .. } if text == MARKER)
            })
            .count()
    }
}

fn rejected(message: &str) -> AppError {
    AppError::MalformedResponse(message.to_string())
}

#[async_trait::async_trait]
impl NotionRepository for FakeNotion {
    async fn query_rows(&self, _database: &DatabaseId) -> Result<Vec<Page>, AppError> {
        Ok(self.state.lock().pages.clone())
    }

    async fn retrieve_schema(&self, _database: &DatabaseId) -> Result<DestinationSchema, AppError> {
        Ok(self.state.lock().schema.clone())
    }

    async fn list_children(&self, parent: &BlockId) -> Result<Vec<ExistingBlock>, AppError> {
        Ok(self
            .state
            .lock()
            .children
            .get(parent.as_str())
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|b| ExistingBlock {
                        id: b.id.clone(),
                        kind: b.kind.clone(),
                        url: b
                            .content
                            .as_ref()
                            .and_then(ContentBlock::url)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_children(
        &self,
        parent: &BlockId,
        blocks: &[ContentBlock],
    ) -> Result<(), AppError> {
        assert!(blocks.len() <= 100, "append of {} blocks", blocks.len());
        let mut state = self.state.lock();
        state.calls.push(format!("append {}", parent));
        if state.fail_appends_on.contains(parent.as_str()) {
            return Err(rejected("append refused"));
        }
        state.append_sizes.push(blocks.len());
        state
            .children
            .entry(parent.as_str().to_string())
            .or_default()
            .extend(blocks.iter().cloned().map(FakeBlock::from_content));
        Ok(())
    }

    async fn delete_block(&self, block: &BlockId) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete {}", block));
        for blocks in state.children.values_mut() {
            blocks.retain(|b| &b.id != block);
        }
        Ok(())
    }

    async fn create_page(
        &self,
        _database: &DatabaseId,
        properties: &NewRowProperties,
        children: &[ContentBlock],
    ) -> Result<PageId, AppError> {
        assert!(children.len() <= 100, "create with {} children", children.len());
        let mut state = self.state.lock();
        state.calls.push("create".to_string());
        if state.fail_create {
            return Err(rejected("create refused"));
        }
        let id = PageId::new_v4();
        state.children.insert(
            id.as_str().to_string(),
            children.iter().cloned().map(FakeBlock::from_content).collect(),
        );
        state
            .created
            .push((id.clone(), properties.clone(), children.to_vec()));
        Ok(id)
    }

    async fn archive_page(&self, page: &PageId) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(format!("archive {}", page));
        state.archived.push(page.clone());
        Ok(())
    }

    async fn update_files(
        &self,
        page: &PageId,
        column: &str,
        files: &[FileRef],
    ) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(format!("update {}", page));
        if state.fail_file_updates {
            return Err(rejected("update refused"));
        }
        state
            .file_updates
            .push((page.clone(), column.to_string(), files.to_vec()));
        Ok(())
    }
}

/// Serves fixed bytes, failing for URLs containing "broken".
#[derive(Default)]
pub struct StubFetcher {
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl FileFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        self.fetched.lock().push(url.to_string());
        if url.contains("broken") {
            return Err(rejected("download refused"));
        }
        Ok(b"bytes".to_vec())
    }
}

/// Records uploads and deletions; uploads get sequential object IDs.
#[derive(Default)]
pub struct StubStore {
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl ObjectStore for StubStore {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        file_name: &str,
        _mime_type: &str,
        _category: MediaCategory,
    ) -> Result<StoredObject, AppError> {
        let mut uploaded = self.uploaded.lock();
        uploaded.push(file_name.to_string());
        let object_id = format!("obj{}", uploaded.len());
        Ok(StoredObject {
            embed_url: format!("https://drive.test/{}", object_id),
            object_id,
        })
    }

    async fn delete(&self, object_id: &str) -> Result<(), AppError> {
        self.deleted.lock().push(object_id.to_string());
        Ok(())
    }

    fn object_id_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("https://drive.test/").map(str::to_string)
    }
}

pub fn resolver(store: Option<Arc<StubStore>>) -> Resolver {
    Resolver::new(
        Arc::new(StubFetcher::default()),
        store.map(|s| s as Arc<dyn ObjectStore>),
        TemporaryUrlPolicy::default(),
    )
}

/// A Notion-hosted file with a signed, expiring URL.
pub fn hosted(name: &str) -> FileRef {
    FileRef {
        name: name.to_string(),
        source: FileSource::File {
            file: HostedFile {
                url: format!(
                    "https://prod-files-secure.s3.us-west-2.amazonaws.com/{}?X-Amz-Expires=3600",
                    name
                ),
                expiry_time: None,
            },
        },
    }
}

pub fn external(name: &str) -> FileRef {
    FileRef::external(name, format!("https://cdn.test/{}", name))
}

pub fn page(id: &PageId, title: &str, files: Vec<FileRef>) -> Page {
    let mut properties = IndexMap::new();
    properties.insert(
        "名前".to_string(),
        PropertyEntry {
            id: "title".to_string(),
            value: PropertyValue::Title(vec![RichTextItem::plain_text(title)]),
        },
    );
    properties.insert(
        UPLOAD.to_string(),
        PropertyEntry {
            id: "upl".to_string(),
            value: PropertyValue::Files(files),
        },
    );
    Page {
        id: id.clone(),
        created_time: Some(Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()),
        archived: false,
        properties,
    }
}

pub fn row(id: &PageId, files: Vec<FileRef>) -> Row {
    Row::from_page(page(id, "応募", files), &UploadColumn::named(UPLOAD))
}

pub fn attachment_names(row: &Row) -> Vec<String> {
    row.attachments
        .iter()
        .map(|a: &Attachment| a.name().to_string())
        .collect()
}
