//! Forecast and extraction command handlers.

use std::path::{Path, PathBuf};

use finsight_analysis::ForecastContext;
use finsight_core::{AppConfig, DocumentRef};

use crate::optional_pool;

/// Parse `<path>` or `<path>@<url>`.
///
/// Only an `@` that starts an `http://` or `https://` URL separates the two
/// parts, so paths containing `@` are kept intact.
pub(crate) fn parse_document_arg(arg: &str) -> DocumentRef {
    let split = ["@https://", "@http://"]
        .iter()
        .filter_map(|marker| arg.find(marker))
        .min();

    match split {
        Some(at) => DocumentRef::new(&arg[..at]).with_url(&arg[at + 1..]),
        None => DocumentRef::new(arg),
    }
}

/// Run one forecast over local documents and print the record.
///
/// # Errors
///
/// Returns an error if the transcripts cannot be loaded, the database is
/// configured but unreachable, or the pipeline hits a hard failure.
pub(crate) async fn run_forecast(
    config: &AppConfig,
    query: &str,
    documents: &[String],
    transcripts_path: Option<&Path>,
) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("--query must not be empty");
    }

    let transcripts = match transcripts_path {
        Some(path) => finsight_core::load_transcripts(path)?,
        None => finsight_core::load_transcripts_or_default(&config.transcripts_path)?,
    };
    let documents: Vec<DocumentRef> = documents.iter().map(|d| parse_document_arg(d)).collect();

    let context = ForecastContext::build(config, optional_pool(config).await?)?;
    let record = context
        .orchestrator()
        .generate(query.trim(), &documents, &transcripts)
        .await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Extract metrics from a single document and print them with the method used.
///
/// # Errors
///
/// Returns an error if the database is configured but unreachable.
pub(crate) async fn run_extract(
    config: &AppConfig,
    path: PathBuf,
    url: Option<String>,
) -> anyhow::Result<()> {
    let mut document = DocumentRef::new(path);
    document.url = url;

    let context = ForecastContext::build(config, optional_pool(config).await?)?;
    let result = context
        .orchestrator()
        .extractor()
        .extract_document(&document)
        .await;

    println!("method: {}", result.extraction_method);
    for name in finsight_core::forecast::METRIC_NAMES {
        println!(
            "{:<18}{}",
            name,
            result.metrics.get(name).unwrap_or("-")
        );
    }
    Ok(())
}
