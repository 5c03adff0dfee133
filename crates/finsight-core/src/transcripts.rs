use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::forecast::Transcript;
use crate::ConfigError;

#[derive(Debug, Deserialize)]
struct TranscriptsFile {
    transcripts: Vec<Transcript>,
}

/// Load and validate earnings-call transcripts from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_transcripts(path: &Path) -> Result<Vec<Transcript>, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::TranscriptsFileIo {
            path: path.display().to_string(),
            source: e,
        })?;

    parse_transcripts(&content)
}

/// Load transcripts from `path`, falling back to [`default_transcripts`] when
/// the file does not exist.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or is invalid.
pub fn load_transcripts_or_default(path: &Path) -> Result<Vec<Transcript>, ConfigError> {
    if path.exists() {
        load_transcripts(path)
    } else {
        Ok(default_transcripts())
    }
}

fn parse_transcripts(content: &str) -> Result<Vec<Transcript>, ConfigError> {
    let file: TranscriptsFile = serde_yaml::from_str(content)?;
    validate_transcripts(&file.transcripts)?;
    Ok(file.transcripts)
}

fn validate_transcripts(transcripts: &[Transcript]) -> Result<(), ConfigError> {
    let mut seen_titles = HashSet::new();

    for transcript in transcripts {
        if transcript.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "transcript title must be non-empty".to_string(),
            ));
        }

        if transcript.text.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "transcript '{}' has empty text",
                transcript.title
            )));
        }

        if !seen_titles.insert(transcript.title.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate transcript title: '{}'",
                transcript.title
            )));
        }
    }

    Ok(())
}

/// Sample earnings-call excerpts used when no transcript file is configured.
#[must_use]
pub fn default_transcripts() -> Vec<Transcript> {
    [
        (
            "Earnings Call Q1",
            "Management is focused on growth in digital services and operating margin discipline. \
             We are cautious about wage inflation and macro.",
        ),
        (
            "Earnings Call Q2",
            "Strong deal wins in Europe. Management sees demand for cloud transformation. \
             Potential margin pressure due to INR depreciation.",
        ),
        (
            "Earnings Call Q3",
            "Hiring ramp and investments will continue. Management expects moderate revenue \
             growth next quarter.",
        ),
    ]
    .into_iter()
    .map(|(title, text)| Transcript {
        title: title.to_string(),
        text: text.to_string(),
    })
    .collect()
}
