// src/main.rs

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use notion_attachments::{
    AccessTokenSource, AppError, BatchRunner, CommandLineInput, DriveConfig, DriveCredentials,
    GoogleDriveStore, HttpFileFetcher, NotionHttpClient, NotionRepository, ObjectStore, Resolver,
    RunConfig, RunMode, RunReport,
};
use std::fs;
use std::sync::Arc;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let log_file_path = std::env::temp_dir().join("notion_attachments.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)
        .with_context(|| format!("cannot open log file {}", log_file_path.display()))?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config).context("logger already initialized")?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Builds the object store from Drive settings, if any were given.
fn build_object_store(config: &RunConfig) -> Result<Option<Arc<dyn ObjectStore>>, AppError> {
    let Some(drive) = &config.drive else {
        log::info!("No Drive credentials; time-limited files cannot be re-hosted");
        return Ok(None);
    };

    let auth = match &drive.credentials {
        DriveCredentials::ServiceAccount(key) => {
            log::info!("Using service account {}", key.client_email());
            let http = reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()?;
            AccessTokenSource::service_account(key.clone(), http)
        }
        DriveCredentials::AccessToken(token) => AccessTokenSource::fixed(token.clone()),
    };

    let drive_config = DriveConfig::new()?
        .with_root_folder(drive.root_folder_id.clone())
        .with_timeout(config.http_timeout);
    Ok(Some(Arc::new(GoogleDriveStore::new(drive_config, auth)?)))
}

/// Wires the collaborators and runs the configured mode over the table.
async fn execute_run(config: &RunConfig) -> Result<RunReport, AppError> {
    let repo: Arc<dyn NotionRepository> =
        Arc::new(NotionHttpClient::new(&config.api_key, config.http_timeout)?);
    let fetcher = Arc::new(HttpFileFetcher::new(config.download_timeout)?);
    let resolver = Resolver::new(
        fetcher,
        build_object_store(config)?,
        config.temporary_urls.clone(),
    );

    let runner = BatchRunner::new(
        repo,
        resolver,
        config.source.database_id.clone(),
        config.upload_column.clone(),
    )
    .with_page_filter(config.page_filter.clone());

    runner.run(&config.mode, &config.marker).await
}

fn report_completion(config: &RunConfig, report: &RunReport) {
    if let RunMode::Export { output } = &config.mode {
        println!("✓ HTML saved to {}", output.display());
    }
    for failure in &report.failed {
        eprintln!("✗ Row {}: {}", failure.row_id, failure.error);
    }
    if report.is_success() {
        println!("✓ {}", report);
    } else {
        eprintln!("⚠️  {}", report);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose)?;

    let config = RunConfig::resolve(cli).context("invalid configuration")?;

    let report = execute_run(&config)
        .await
        .with_context(|| format!("{} run aborted", config.mode.name()))?;
    report_completion(&config, &report);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
