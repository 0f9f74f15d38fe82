// src/pipeline.rs
//! Batch runner: drains the upload-form table and applies one mode to every
//! row, one row at a time.
//!
//! A failing row is recorded and the run moves on. Configuration errors and
//! failures that affect every row (reading the table, writing the export)
//! end the run.

use crate::api::NotionRepository;
use crate::config::RunMode;
use crate::embed::PageEmbedder;
use crate::error::{AppError, WriteOperation};
use crate::export::{collect_rows, HtmlExporter};
use crate::migrate::{MigrationConfig, RowMigrator};
use crate::model::{Attachment, FileRef, PropertyValue, ResolvedAttachment, Row, UploadColumn};
use crate::resolve::Resolver;
use crate::types::{DatabaseId, PageId};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A row the run gave up on.
#[derive(Debug)]
pub struct RowFailure {
    pub row_id: PageId,
    pub error: AppError,
}

/// Tally of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: usize,
    /// Rows with nothing to do.
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
    /// Attachments left out because they could not be resolved.
    pub unresolved_attachments: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }

    fn record_failure(&mut self, row_id: &PageId, error: AppError) -> Result<(), AppError> {
        if error.is_configuration() {
            return Err(error);
        }
        log::error!("Row {} failed: {}", row_id, error);
        self.failed.push(RowFailure {
            row_id: row_id.clone(),
            error,
        });
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: {} succeeded, {} skipped, {} failed",
            self.total(),
            self.succeeded,
            self.skipped,
            self.failed.len()
        )?;
        if self.unresolved_attachments > 0 {
            write!(
                f,
                " ({} attachments could not be resolved)",
                self.unresolved_attachments
            )?;
        }
        Ok(())
    }
}

/// What rehosting one row did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehostOutcome {
    pub rehosted: usize,
    pub kept: usize,
    pub unresolved: usize,
}

/// Replaces time-limited files in the row's upload column with durable
/// external links. Files that are already durable, or that fail to resolve,
/// keep their original file object.
pub async fn rehost_row(
    repo: &dyn NotionRepository,
    resolver: &Resolver,
    row: &Row,
) -> Result<RehostOutcome, AppError> {
    let mut outcome = RehostOutcome::default();
    let Some(column) = row.upload_column.as_deref() else {
        return Ok(outcome);
    };
    let Some(PropertyValue::Files(files)) = row.property(column) else {
        return Ok(outcome);
    };

    let mut updated = Vec::with_capacity(files.len());
    let mut rehosted: Vec<ResolvedAttachment> = Vec::new();
    for file in files {
        let attachment = match Attachment::from_file_ref(file) {
            Ok(attachment) if resolver.needs_rehosting(&attachment) => attachment,
            _ => {
                outcome.kept += 1;
                updated.push(file.clone());
                continue;
            }
        };
        match resolver.resolve(&attachment).await {
            Ok(resolved) => {
                updated.push(FileRef::external(file.name.clone(), resolved.durable_url()));
                rehosted.push(resolved);
            }
            Err(e) => {
                log::warn!("{}", e);
                outcome.unresolved += 1;
                updated.push(file.clone());
            }
        }
    }

    if rehosted.is_empty() {
        return Ok(outcome);
    }

    if let Err(e) = repo.update_files(&row.id, column, &updated).await {
        resolver.discard(&rehosted).await;
        return Err(AppError::write(WriteOperation::UpdateProperties, &row.id, e));
    }
    outcome.rehosted = rehosted.len();
    log::info!(
        "Row {}: rehosted {} of {} files in '{}'",
        row.id,
        outcome.rehosted,
        files.len(),
        column
    );
    Ok(outcome)
}

pub struct BatchRunner {
    repo: Arc<dyn NotionRepository>,
    resolver: Resolver,
    source: DatabaseId,
    upload_column: UploadColumn,
    page_filter: Option<PageId>,
}

impl BatchRunner {
    pub fn new(
        repo: Arc<dyn NotionRepository>,
        resolver: Resolver,
        source: DatabaseId,
        upload_column: UploadColumn,
    ) -> Self {
        Self {
            repo,
            resolver,
            source,
            upload_column,
            page_filter: None,
        }
    }

    /// Restricts the run to a single row.
    pub fn with_page_filter(mut self, page: Option<PageId>) -> Self {
        self.page_filter = page;
        self
    }

    /// Reads every row before any is processed, so writes made by the run
    /// cannot disturb pagination.
    pub async fn load_rows(&self) -> Result<Vec<Row>, AppError> {
        let pages = self.repo.query_rows(&self.source).await?;
        let total = pages.len();
        let rows: Vec<Row> = pages
            .into_iter()
            .filter(|page| !page.archived)
            .filter(|page| self.page_filter.as_ref().map_or(true, |wanted| &page.id == wanted))
            .map(|page| Row::from_page(page, &self.upload_column))
            .collect();

        if let Some(wanted) = &self.page_filter {
            if rows.is_empty() {
                log::warn!("Row {} is not in table {}", wanted, self.source);
            }
        }
        log::info!("Loaded {} of {} rows from {}", rows.len(), total, self.source);
        Ok(rows)
    }

    pub async fn run(&self, mode: &RunMode, marker: &str) -> Result<RunReport, AppError> {
        log::info!("Starting {} run over table {}", mode.name(), self.source);
        let rows = self.load_rows().await?;
        let report = match mode {
            RunMode::Export { output } => self.export(&rows, output).await?,
            RunMode::Embed => self.embed(&rows, marker).await?,
            RunMode::Migrate(config) => self.migrate(&rows, config).await?,
            RunMode::Rehost => self.rehost(&rows).await?,
        };
        log::info!("Finished {} run: {}", mode.name(), report);
        Ok(report)
    }

    async fn export(&self, rows: &[Row], output: &Path) -> Result<RunReport, AppError> {
        let collected = collect_rows(rows, &self.resolver).await;
        let html = HtmlExporter::new()?.render(&collected)?;
        std::fs::write(output, html)?;
        log::info!("Wrote {}", output.display());

        let mut report = RunReport::default();
        for (row, exported) in rows.iter().zip(&collected) {
            if exported.files.is_empty() {
                report.skipped += 1;
            } else {
                report.succeeded += 1;
            }
            report.unresolved_attachments += row.attachments.len() - exported.files.len();
        }
        Ok(report)
    }

    async fn embed(&self, rows: &[Row], marker: &str) -> Result<RunReport, AppError> {
        let embedder = PageEmbedder::new(Arc::clone(&self.repo), self.resolver.clone(), marker);
        let mut report = RunReport::default();
        for row in rows {
            match embedder.embed_row(row).await {
                Ok(outcome) => {
                    report.unresolved_attachments += outcome.unresolved.len();
                    if outcome.embedded_attachments > 0 {
                        report.succeeded += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(e) => report.record_failure(&row.id, e)?,
            }
        }
        Ok(report)
    }

    async fn migrate(&self, rows: &[Row], config: &MigrationConfig) -> Result<RunReport, AppError> {
        let migrator = RowMigrator::new(
            Arc::clone(&self.repo),
            self.resolver.clone(),
            config.clone(),
        );
        let schema = migrator.destination_schema().await?;
        log::info!(
            "Destination {} has {} columns",
            config.destination,
            schema.len()
        );

        let mut report = RunReport::default();
        for row in rows {
            match migrator.migrate_row(row, &schema).await {
                Ok(outcome) => {
                    report.unresolved_attachments += outcome.unresolved.len();
                    report.succeeded += 1;
                }
                Err(e) => report.record_failure(&row.id, e)?,
            }
        }
        Ok(report)
    }

    async fn rehost(&self, rows: &[Row]) -> Result<RunReport, AppError> {
        let mut report = RunReport::default();
        for row in rows {
            match rehost_row(self.repo.as_ref(), &self.resolver, row).await {
                Ok(outcome) => {
                    report.unresolved_attachments += outcome.unresolved;
                    if outcome.rehosted > 0 {
                        report.succeeded += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(e) => report.record_failure(&row.id, e)?,
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_summary_counts_rows() {
        let mut report = RunReport {
            succeeded: 2,
            skipped: 1,
            ..Default::default()
        };
        let row_id = PageId::parse("550e8400e29b41d4a716446655440000").unwrap();
        report
            .record_failure(&row_id, AppError::MalformedResponse("bad".to_string()))
            .unwrap();

        assert_eq!(report.total(), 4);
        assert!(!report.is_success());
        assert_eq!(
            report.to_string(),
            "4 rows: 2 succeeded, 1 skipped, 1 failed"
        );
    }

    #[test]
    fn configuration_errors_abort_the_run() {
        let mut report = RunReport::default();
        let row_id = PageId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let err = report
            .record_failure(&row_id, AppError::MissingConfiguration("x".to_string()))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(report.failed.is_empty());
    }
}
