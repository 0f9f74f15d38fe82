// src/embed.rs
//! Idempotent embedding of a row's attachments into its own page.
//!
//! The embed section is the run of blocks that starts at a heading whose
//! text is the marker and ends before the next heading with any other text.
//! Every run is deleted before the fresh section is appended, so running
//! twice leaves exactly one section. Re-hosted objects that only the old
//! section pointed at are removed with it.

use crate::api::NotionRepository;
use crate::constants::APPEND_BATCH_LIMIT;
use crate::error::{AppError, ResolutionError, WriteOperation};
use crate::model::{ContentBlock, ExistingBlock, Row};
use crate::resolve::Resolver;
use crate::synthesize::synthesize;
use crate::types::{BlockId, PageId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    MarkerFound,
    Collecting,
    Done,
}

/// IDs of every block belonging to an embed section, in page order.
///
/// A heading with other text ends a section and is kept. A later heading
/// carrying the marker starts another section, so duplicates left by an
/// interrupted run are all collected.
pub fn scan_embed_section(blocks: &[ExistingBlock], marker: &str) -> Vec<BlockId> {
    let mut state = ScanState::Scanning;
    let mut marked = Vec::new();

    for block in blocks {
        let heading = block.heading_text();
        let is_marker = heading.is_some_and(|text| text.trim() == marker);

        state = match (state, heading) {
            _ if is_marker => {
                marked.push(block.id.clone());
                ScanState::MarkerFound
            }
            (ScanState::MarkerFound | ScanState::Collecting, Some(_)) => ScanState::Done,
            (ScanState::MarkerFound | ScanState::Collecting, None) => {
                marked.push(block.id.clone());
                ScanState::Collecting
            }
            (other, _) => other,
        };
    }

    log::debug!(
        "Embed scan finished in {:?} with {} marked blocks",
        state,
        marked.len()
    );
    marked
}

/// Assembles the section: marker heading, then each group in order with a
/// divider between consecutive groups.
pub fn compose_embed_section(marker: &str, groups: Vec<Vec<ContentBlock>>) -> Vec<ContentBlock> {
    let mut blocks = vec![ContentBlock::Heading {
        text: marker.to_string(),
    }];
    let count = groups.len();
    for (i, group) in groups.into_iter().enumerate() {
        blocks.extend(group);
        if i + 1 < count {
            blocks.push(ContentBlock::Divider);
        }
    }
    blocks
}

/// What embedding one row did.
#[derive(Debug, Clone, Default)]
pub struct EmbedOutcome {
    pub removed_blocks: usize,
    pub appended_blocks: usize,
    pub embedded_attachments: usize,
    /// Stored objects removed because only the old section used them.
    pub released_objects: usize,
    pub unresolved: Vec<ResolutionError>,
}

/// Writes embed sections onto row pages.
pub struct PageEmbedder {
    repo: Arc<dyn NotionRepository>,
    resolver: Resolver,
    marker: String,
}

impl PageEmbedder {
    pub fn new(
        repo: Arc<dyn NotionRepository>,
        resolver: Resolver,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            resolver,
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Replaces the row page's embed section with one built from its
    /// current attachments.
    ///
    /// Attachments that cannot be resolved are skipped and reported in the
    /// outcome. Stored objects the old section pointed at and the new one
    /// does not are removed. A failed Notion write abandons the row; running
    /// again repairs whatever was left behind.
    pub async fn embed_row(&self, row: &Row) -> Result<EmbedOutcome, AppError> {
        let page: BlockId = row.id.cast();
        let existing = self.repo.list_children(&page).await?;
        let stale = scan_embed_section(&existing, &self.marker);
        let stale_objects = self.referenced_objects(
            existing
                .iter()
                .filter(|block| stale.contains(&block.id))
                .filter_map(|block| block.url.as_deref()),
        );

        for block_id in &stale {
            self.repo
                .delete_block(block_id)
                .await
                .map_err(|e| AppError::write(WriteOperation::DeleteBlock, block_id, e))?;
        }
        if !stale.is_empty() {
            log::info!("Row {}: removed {} stale embed blocks", row.id, stale.len());
        }

        let mut outcome = EmbedOutcome {
            removed_blocks: stale.len(),
            ..Default::default()
        };

        if row.attachments.is_empty() {
            log::info!("Row {}: no attachments, nothing to embed", row.id);
            outcome.released_objects = self.release_unreferenced(&stale_objects, &[]).await;
            return Ok(outcome);
        }

        let set = self.resolver.resolve_all(&row.attachments).await;
        outcome.unresolved = set.failures;
        if set.resolved.is_empty() {
            log::warn!(
                "Row {}: none of {} attachments could be resolved",
                row.id,
                row.attachments.len()
            );
            outcome.released_objects = self.release_unreferenced(&stale_objects, &[]).await;
            return Ok(outcome);
        }

        let groups: Vec<_> = set.resolved.iter().map(synthesize).collect();
        outcome.embedded_attachments = groups.len();
        let section = compose_embed_section(&self.marker, groups);
        let current = self.referenced_objects(section.iter().filter_map(ContentBlock::url));
        outcome.released_objects = self.release_unreferenced(&stale_objects, &current).await;

        append_in_batches(self.repo.as_ref(), &row.id, &section).await?;
        outcome.appended_blocks = section.len();

        log::info!(
            "Row {}: embedded {} attachments ({} blocks)",
            row.id,
            outcome.embedded_attachments,
            outcome.appended_blocks
        );
        Ok(outcome)
    }

    /// Stored objects behind `urls`, deduplicated, in first-seen order.
    fn referenced_objects<'a>(&self, urls: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut objects: Vec<String> = Vec::new();
        for object_id in urls.filter_map(|url| self.resolver.stored_object_for_url(url)) {
            if !objects.contains(&object_id) {
                objects.push(object_id);
            }
        }
        objects
    }

    async fn release_unreferenced(&self, stale: &[String], current: &[String]) -> usize {
        let orphaned: Vec<&str> = stale
            .iter()
            .filter(|object_id| !current.contains(*object_id))
            .map(String::as_str)
            .collect();
        if orphaned.is_empty() {
            return 0;
        }
        self.resolver.release(&orphaned).await
    }
}

/// Appends blocks to a page in request-sized chunks, preserving order.
pub async fn append_in_batches(
    repo: &dyn NotionRepository,
    page: &PageId,
    blocks: &[ContentBlock],
) -> Result<(), AppError> {
    let parent: BlockId = page.cast();
    for chunk in blocks.chunks(APPEND_BATCH_LIMIT) {
        repo.append_children(&parent, chunk)
            .await
            .map_err(|e| AppError::write(WriteOperation::AppendBlocks, page, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExistingBlockKind;
    use pretty_assertions::assert_eq;

    const MARKER: &str = "アップロードファイル埋め込み";

    fn heading(id: &str, text: &str) -> ExistingBlock {
        ExistingBlock {
            id: BlockId::from_normalized(id.to_string()),
            kind: ExistingBlockKind::Heading {
                level: 3,
                text: text.to_string(),
            },
            url: None,
        }
    }

    fn other(id: &str) -> ExistingBlock {
        ExistingBlock {
            id: BlockId::from_normalized(id.to_string()),
            kind: ExistingBlockKind::Other {
                block_type: "paragraph".to_string(),
            },
            url: None,
        }
    }

    fn ids(marked: Vec<BlockId>) -> Vec<String> {
        marked.into_iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn section_ends_at_next_heading() {
        let blocks = vec![
            other("intro"),
            heading("m", MARKER),
            other("img"),
            other("div"),
            heading("notes", "Notes"),
            other("tail"),
        ];
        assert_eq!(
            ids(scan_embed_section(&blocks, MARKER)),
            vec!["m", "img", "div"]
        );
    }

    #[test]
    fn section_runs_to_end_of_page() {
        let blocks = vec![heading("m", MARKER), other("a"), other("b")];
        assert_eq!(ids(scan_embed_section(&blocks, MARKER)), vec!["m", "a", "b"]);
    }

    #[test]
    fn duplicate_sections_are_all_collected() {
        let blocks = vec![
            heading("m1", MARKER),
            other("a"),
            heading("m2", MARKER),
            other("b"),
            heading("h", "Keep me"),
            other("c"),
        ];
        assert_eq!(
            ids(scan_embed_section(&blocks, MARKER)),
            vec!["m1", "a", "m2", "b"]
        );
    }

    #[test]
    fn no_marker_means_nothing_to_delete() {
        let blocks = vec![other("a"), heading("h", "Other"), other("b")];
        assert!(scan_embed_section(&blocks, MARKER).is_empty());
    }

    #[test]
    fn compose_puts_dividers_between_groups_only() {
        let image = ContentBlock::Image {
            url: "https://x.test/a.png".to_string(),
        };
        let embed = ContentBlock::Embed {
            url: "https://x.test/b".to_string(),
        };
        let section = compose_embed_section(MARKER, vec![vec![image.clone()], vec![embed.clone()]]);
        assert_eq!(
            section,
            vec![
                ContentBlock::Heading {
                    text: MARKER.to_string()
                },
                image,
                ContentBlock::Divider,
                embed,
            ]
        );
    }

    #[test]
    fn compose_single_group_has_no_divider() {
        let section = compose_embed_section(MARKER, vec![vec![ContentBlock::Divider]]);
        assert_eq!(section.len(), 2);
    }
}
