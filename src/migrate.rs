// src/migrate.rs
//! Copies form rows into the data-management table.
//!
//! Values are copied by column name when the destination has a column of
//! the same type. The upload column never travels as files; one of its
//! attachments is resolved and written to the link column instead.

use crate::api::NotionRepository;
use crate::constants::APPEND_BATCH_LIMIT;
use crate::embed::{append_in_batches, compose_embed_section};
use crate::error::{AppError, ResolutionError, WriteOperation};
use crate::model::{
    ColumnType, ContentBlock, DateValue, DestinationSchema, FileRef, NewRowProperties,
    PropertyValue, ResolvedAttachment, RichTextItem, Row,
};
use crate::resolve::Resolver;
use crate::synthesize::synthesize;
use crate::types::{DatabaseId, PageId};
use std::str::FromStr;
use std::sync::Arc;

/// Which attachment fills the single-valued link column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkTieBreak {
    /// The first attachment in the upload column.
    #[default]
    First,
    /// The last attachment in the upload column.
    Last,
    /// Fail the row when it has more than one attachment.
    RejectIfMultiple,
}

impl FromStr for LinkTieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "reject-if-multiple" | "reject" => Ok(Self::RejectIfMultiple),
            other => Err(format!(
                "unknown tie-break '{}', expected first, last or reject-if-multiple",
                other
            )),
        }
    }
}

/// Feeds a destination column from a differently named source column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAlias {
    pub destination: String,
    pub source: String,
}

impl FromStr for ColumnAlias {
    type Err = String;

    /// Parses `DEST=SOURCE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (destination, source) = s
            .split_once('=')
            .ok_or_else(|| format!("alias '{}' must look like DEST=SOURCE", s))?;
        let (destination, source) = (destination.trim(), source.trim());
        if destination.is_empty() || source.is_empty() {
            return Err(format!("alias '{}' has an empty column name", s));
        }
        Ok(Self {
            destination: destination.to_string(),
            source: source.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub destination: DatabaseId,
    /// Destination column receiving the single attachment URL.
    pub link_column: String,
    /// Never copied; filled from the row's creation time when typed as a date.
    pub submitted_at_column: String,
    pub aliases: Vec<ColumnAlias>,
    pub tie_break: LinkTieBreak,
    /// Carry the embed section into the new page's body.
    pub with_blocks: bool,
    /// Archive the source row once the destination page exists.
    pub archive_source: bool,
    pub marker: String,
}

/// Maps a row onto the destination schema, given the attachment chosen for
/// the link column.
pub fn map_properties(
    row: &Row,
    schema: &DestinationSchema,
    link: Option<&ResolvedAttachment>,
    config: &MigrationConfig,
) -> NewRowProperties {
    let mut properties = NewRowProperties::new();

    for (name, entry) in &row.properties {
        if row.upload_column.as_deref() == Some(name.as_str()) {
            continue;
        }
        if name == &config.submitted_at_column {
            continue;
        }
        let value = &entry.value;
        if value.kind().is_system_timestamp() || matches!(value, PropertyValue::Unsupported { .. })
        {
            continue;
        }

        let aliased = config
            .aliases
            .iter()
            .filter(|alias| &alias.source == name)
            .map(|alias| alias.destination.as_str());
        for target in std::iter::once(name.as_str()).chain(aliased) {
            copy_value(&mut properties, schema, target, value, config);
        }
    }

    if let Some(title) = schema.title_column() {
        properties.insert(
            title,
            PropertyValue::Title(vec![RichTextItem::plain_text(row.id.as_str())]),
        );
    }

    if schema.column_type(&config.submitted_at_column) == Some(&ColumnType::Date) {
        if let Some(created) = row.created_time {
            properties.insert(
                config.submitted_at_column.clone(),
                PropertyValue::Date(Some(DateValue {
                    start: created.to_rfc3339(),
                    end: None,
                    time_zone: None,
                })),
            );
        }
    }

    if let Some(resolved) = link {
        if let Some(value) = link_value(schema, &config.link_column, resolved) {
            properties.insert(config.link_column.clone(), value);
        }
    }

    properties
}

fn copy_value(
    properties: &mut NewRowProperties,
    schema: &DestinationSchema,
    target: &str,
    value: &PropertyValue,
    config: &MigrationConfig,
) {
    let Some(column_type) = schema.column_type(target) else {
        log::debug!("Destination has no column '{}', dropping", target);
        return;
    };
    if *column_type == ColumnType::Title
        || column_type.is_system_timestamp()
        || target == config.link_column
        || target == config.submitted_at_column
    {
        return;
    }
    if value.kind() != *column_type {
        log::warn!(
            "Column '{}' is {} in the destination but {} in the source, dropping",
            target,
            column_type,
            value.kind()
        );
        return;
    }
    properties.insert(target, value.clone());
}

fn link_value(
    schema: &DestinationSchema,
    link_column: &str,
    resolved: &ResolvedAttachment,
) -> Option<PropertyValue> {
    let url = resolved.durable_url().to_string();
    match schema.column_type(link_column) {
        Some(ColumnType::Url) => Some(PropertyValue::Url(Some(url))),
        Some(ColumnType::Files) => Some(PropertyValue::Files(vec![FileRef::external(
            resolved.attachment().name(),
            url,
        )])),
        Some(ColumnType::RichText) => Some(PropertyValue::RichText(vec![RichTextItem {
            plain_text: url.clone(),
            href: Some(url),
        }])),
        Some(other) => {
            log::warn!(
                "Link column '{}' is {}, which cannot hold a URL",
                link_column,
                other
            );
            None
        }
        None => {
            log::warn!("Destination has no link column '{}'", link_column);
            None
        }
    }
}

/// Index of the attachment that fills the link column.
pub fn select_link_attachment(
    row: &Row,
    tie_break: LinkTieBreak,
) -> Result<Option<usize>, AppError> {
    let count = row.attachments.len();
    if count == 0 {
        return Ok(None);
    }
    match tie_break {
        LinkTieBreak::First => Ok(Some(0)),
        LinkTieBreak::Last => Ok(Some(count - 1)),
        LinkTieBreak::RejectIfMultiple if count > 1 => Err(AppError::AmbiguousAttachments {
            row_id: row.id.to_string(),
            count,
        }),
        LinkTieBreak::RejectIfMultiple => Ok(Some(0)),
    }
}

/// Everything needed to create the destination page.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub properties: NewRowProperties,
    pub children: Vec<ContentBlock>,
    pub resolved: Vec<ResolvedAttachment>,
    pub unresolved: Vec<ResolutionError>,
}

/// What migrating one row did.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub created: PageId,
    pub archived_source: bool,
    pub unresolved: Vec<ResolutionError>,
}

pub struct RowMigrator {
    repo: Arc<dyn NotionRepository>,
    resolver: Resolver,
    config: MigrationConfig,
}

impl RowMigrator {
    pub fn new(
        repo: Arc<dyn NotionRepository>,
        resolver: Resolver,
        config: MigrationConfig,
    ) -> Self {
        Self {
            repo,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub async fn destination_schema(&self) -> Result<DestinationSchema, AppError> {
        self.repo.retrieve_schema(&self.config.destination).await
    }

    /// Resolves what the row needs and maps it onto `schema`. Nothing is
    /// written to Notion.
    pub async fn migrate(
        &self,
        row: &Row,
        schema: &DestinationSchema,
    ) -> Result<MigrationPlan, AppError> {
        let chosen = select_link_attachment(row, self.config.tie_break)?;

        let to_resolve = match (self.config.with_blocks, chosen) {
            (true, _) => &row.attachments[..],
            (false, Some(i)) => &row.attachments[i..=i],
            (false, None) => &row.attachments[..0],
        };
        let set = self.resolver.resolve_all(to_resolve).await;

        let link = chosen.and_then(|i| {
            let wanted = &row.attachments[i];
            set.resolved.iter().find(|r| r.attachment() == wanted)
        });
        if chosen.is_some() && link.is_none() {
            log::warn!("Row {}: link column left empty, attachment unresolved", row.id);
        }

        let properties = map_properties(row, schema, link, &self.config);

        let children = if self.config.with_blocks && !set.resolved.is_empty() {
            let groups = set.resolved.iter().map(synthesize).collect();
            compose_embed_section(&self.config.marker, groups)
        } else {
            Vec::new()
        };

        Ok(MigrationPlan {
            properties,
            children,
            resolved: set.resolved,
            unresolved: set.failures,
        })
    }

    /// Creates the destination page from a plan, then archives the source
    /// row if configured.
    ///
    /// Objects uploaded for the plan are removed again when page creation
    /// fails. Archival only happens after the page exists.
    pub async fn commit(
        &self,
        row: &Row,
        plan: MigrationPlan,
    ) -> Result<MigrationOutcome, AppError> {
        let split = plan.children.len().min(APPEND_BATCH_LIMIT);
        let (first, rest) = plan.children.split_at(split);

        let created = match self
            .repo
            .create_page(&self.config.destination, &plan.properties, first)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.resolver.discard(&plan.resolved).await;
                return Err(AppError::write(
                    WriteOperation::CreatePage,
                    &self.config.destination,
                    e,
                ));
            }
        };
        log::info!("Row {}: created destination page {}", row.id, created);

        if !rest.is_empty() {
            append_in_batches(self.repo.as_ref(), &created, rest).await?;
        }

        let mut archived_source = false;
        if self.config.archive_source {
            self.repo
                .archive_page(&row.id)
                .await
                .map_err(|e| AppError::write(WriteOperation::ArchivePage, &row.id, e))?;
            archived_source = true;
            log::info!("Row {}: archived source row", row.id);
        }

        Ok(MigrationOutcome {
            created,
            archived_source,
            unresolved: plan.unresolved,
        })
    }

    pub async fn migrate_row(
        &self,
        row: &Row,
        schema: &DestinationSchema,
    ) -> Result<MigrationOutcome, AppError> {
        let plan = self.migrate(row, schema).await?;
        self.commit(row, plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attachment, PropertyEntry, SelectOption, SourceKind};
    use chrono::{TimeZone, Utc};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn config() -> MigrationConfig {
        MigrationConfig {
            destination: DatabaseId::parse("11111111111111111111111111111111").unwrap(),
            link_column: "ファイル".to_string(),
            submitted_at_column: "提出日時".to_string(),
            aliases: vec!["カテゴリ=アップロード予定のファイル".parse().unwrap()],
            tie_break: LinkTieBreak::First,
            with_blocks: false,
            archive_source: false,
            marker: "アップロードファイル埋め込み".to_string(),
        }
    }

    fn select(name: &str) -> PropertyValue {
        PropertyValue::Select(Some(SelectOption {
            id: None,
            name: name.to_string(),
            color: None,
        }))
    }

    fn row(attachments: usize) -> Row {
        let mut properties = IndexMap::new();
        let mut put = |name: &str, value: PropertyValue| {
            properties.insert(
                name.to_string(),
                PropertyEntry {
                    id: name.to_string(),
                    value,
                },
            );
        };
        put("名前", PropertyValue::Title(vec![RichTextItem::plain_text("応募A")]));
        put("メール", PropertyValue::Email(Some("a@example.com".to_string())));
        put("アップロード予定のファイル", select("動画"));
        put("点数", PropertyValue::RichText(vec![RichTextItem::plain_text("10")]));
        put("提出日時", PropertyValue::CreatedTime(Utc::now()));
        put("アップロード", PropertyValue::Files(vec![]));

        Row {
            id: PageId::parse("550e8400e29b41d4a716446655440000").unwrap(),
            created_time: Some(Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap()),
            properties,
            upload_column: Some("アップロード".to_string()),
            attachments: (0..attachments)
                .map(|i| {
                    Attachment::new(
                        format!("f{}.png", i),
                        format!("https://x.test/f{}.png", i),
                        SourceKind::ExternallyHosted,
                        None,
                    )
                    .unwrap()
                })
                .collect(),
        }
    }

    fn schema(link_type: ColumnType) -> DestinationSchema {
        [
            ("名前".to_string(), ColumnType::Title),
            ("メール".to_string(), ColumnType::Email),
            ("カテゴリ".to_string(), ColumnType::Select),
            ("点数".to_string(), ColumnType::Number),
            ("提出日時".to_string(), ColumnType::Date),
            ("ファイル".to_string(), link_type),
            ("アップロード".to_string(), ColumnType::Files),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn maps_row_onto_destination() {
        let row = row(1);
        let link = ResolvedAttachment::external_link(row.attachments[0].clone());
        let props = map_properties(&row, &schema(ColumnType::Url), Some(&link), &config());

        assert_eq!(
            props.columns().collect::<Vec<_>>(),
            vec!["メール", "カテゴリ", "名前", "提出日時", "ファイル"]
        );
        assert_eq!(
            props.get("名前"),
            Some(&PropertyValue::Title(vec![RichTextItem::plain_text(
                "550e8400e29b41d4a716446655440000"
            )]))
        );
        assert_eq!(props.get("カテゴリ"), Some(&select("動画")));
        assert_eq!(
            props.get("ファイル"),
            Some(&PropertyValue::Url(Some("https://x.test/f0.png".to_string())))
        );
        // Type mismatch (rich_text into number) is dropped.
        assert!(!props.contains("点数"));
        // The upload column never travels as files.
        assert!(!props.contains("アップロード"));
    }

    #[test]
    fn submitted_at_comes_from_created_time() {
        let props = map_properties(&row(0), &schema(ColumnType::Url), None, &config());
        let Some(PropertyValue::Date(Some(date))) = props.get("提出日時") else {
            panic!("expected date");
        };
        assert_eq!(date.start, "2026-10-01T09:30:00+00:00");
    }

    #[test]
    fn files_link_column_gets_external_file() {
        let row = row(1);
        let link = ResolvedAttachment::external_link(row.attachments[0].clone());
        let props = map_properties(&row, &schema(ColumnType::Files), Some(&link), &config());
        assert_eq!(
            props.get("ファイル"),
            Some(&PropertyValue::Files(vec![FileRef::external(
                "f0.png",
                "https://x.test/f0.png"
            )]))
        );
    }

    #[test]
    fn tie_break_selects_attachment() {
        let row3 = row(3);
        assert_eq!(select_link_attachment(&row3, LinkTieBreak::First).unwrap(), Some(0));
        assert_eq!(select_link_attachment(&row3, LinkTieBreak::Last).unwrap(), Some(2));
        let err = select_link_attachment(&row3, LinkTieBreak::RejectIfMultiple).unwrap_err();
        assert!(matches!(err, AppError::AmbiguousAttachments { count: 3, .. }));
        assert_eq!(
            select_link_attachment(&row(1), LinkTieBreak::RejectIfMultiple).unwrap(),
            Some(0)
        );
        assert_eq!(select_link_attachment(&row(0), LinkTieBreak::Last).unwrap(), None);
    }

    #[test]
    fn parses_aliases_and_tie_breaks() {
        let alias: ColumnAlias = "カテゴリ = アップロード予定のファイル".parse().unwrap();
        assert_eq!(alias.destination, "カテゴリ");
        assert_eq!(alias.source, "アップロード予定のファイル");
        assert!("no-equals".parse::<ColumnAlias>().is_err());
        assert_eq!("LAST".parse::<LinkTieBreak>().unwrap(), LinkTieBreak::Last);
        assert!("random".parse::<LinkTieBreak>().is_err());
    }
}
