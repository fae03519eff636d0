//! File export of generated text.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CoreError;

/// Column / key name used by the CSV and JSON exports.
const FIELD_NAME: &str = "Generated Text";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Csv,
    Json,
    Markdown,
}

impl ExportFormat {
    /// Conventional file extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(CoreError::Config(format!(
                "unknown export format '{other}' (expected txt, csv, json or md)"
            ))),
        }
    }
}

/// Render `text` in the given format.
pub fn render_export(text: &str, format: ExportFormat) -> Result<String, CoreError> {
    let rendered = match format {
        ExportFormat::Text => text.to_owned(),
        ExportFormat::Csv => format!("{FIELD_NAME}\n{}\n", csv_field(text)),
        ExportFormat::Json => {
            let mut map = serde_json::Map::new();
            map.insert(FIELD_NAME.to_owned(), serde_json::Value::from(text));
            serde_json::to_string_pretty(&map)?
        }
        ExportFormat::Markdown => format!("# Generated Content\n\n{text}\n"),
    };
    Ok(rendered)
}

/// Write `text` to `path`.
///
/// When `format` is `None` it is inferred from the file extension.
///
/// # Errors
///
/// Returns `CoreError::Config` if the format cannot be inferred.
/// Returns `CoreError::Io` if the file cannot be written.
pub fn export_to_file(
    text: &str,
    path: &Path,
    format: Option<ExportFormat>,
) -> Result<ExportFormat, CoreError> {
    let format = format
        .or_else(|| ExportFormat::from_path(path))
        .ok_or_else(|| {
            CoreError::Config(format!(
                "cannot infer export format from {}; pass --format",
                path.display()
            ))
        })?;
    std::fs::write(path, render_export(text, format)?)?;
    info!(path = %path.display(), ?format, "exported generated text");
    Ok(format)
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
