use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// The part of a Teachable Machine `metadata.json` we need
#[derive(Debug, Deserialize)]
struct Metadata {
    labels: Vec<String>,
}

/// Load class labels, in model output order
///
/// `.json` files are read as Teachable Machine metadata (`{"labels": [...]}`),
/// anything else as plain text with one label per line.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels from {}", path.display()))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let labels = if is_json {
        parse_metadata(&content)
            .with_context(|| format!("Invalid label metadata in {}", path.display()))?
    } else {
        parse_lines(&content)
    };

    if labels.is_empty() {
        bail!("No labels found in {}", path.display());
    }

    tracing::info!("Loaded {} labels: {}", labels.len(), labels.join(", "));
    Ok(labels)
}

fn parse_metadata(content: &str) -> Result<Vec<String>> {
    let metadata: Metadata = serde_json::from_str(content)?;
    Ok(metadata.labels)
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
