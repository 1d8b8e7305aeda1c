//! File intake for the CLI: size ceiling, format sniffing, directory walks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_UPLOAD_BYTES;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too large: {size_mb:.1}MB (max {max_mb}MB)")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File is not valid UTF-8 text: {0}")]
    InvalidUtf8(String),
}

/// Which parser a file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFormat {
    /// C-CDA XML
    Structured,
    /// Markdown or plain text
    Narrative,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Narrative => "narrative",
        }
    }
}

/// A file read into memory and classified.
#[derive(Debug, Clone)]
pub struct Input {
    pub path: PathBuf,
    pub filename: String,
    pub format: InputFormat,
    pub bytes: Vec<u8>,
}

impl Input {
    pub fn text(&self) -> Result<&str, IntakeError> {
        std::str::from_utf8(&self.bytes).map_err(|e| {
            IntakeError::InvalidUtf8(format!("{}: {e}", self.filename))
        })
    }
}

/// Extensions picked up when a directory is ingested.
const NARRATIVE_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];
const STRUCTURED_EXTENSIONS: &[&str] = &["xml", "cda", "ccd", "ccda"];

/// Bytes inspected when sniffing content.
const SNIFF_BYTES: usize = 4096;

/// Read a file, enforcing the upload ceiling, and decide its format from
/// content first and extension second.
pub fn read_input(path: &Path) -> Result<Input, IntakeError> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(IntakeError::FileTooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            max_mb: MAX_UPLOAD_BYTES / (1024 * 1024),
        });
    }

    let bytes = std::fs::read(path)?;
    let filename = display_name(path);
    let format = detect_format(&filename, &bytes)?;

    tracing::debug!(
        file = %filename,
        format = format.as_str(),
        size_bytes = size,
        "Read input file"
    );
    Ok(Input {
        path: path.to_path_buf(),
        filename,
        format,
        bytes,
    })
}

/// Classify file content. XML carrying a `ClinicalDocument` root is
/// structured whatever its name; other text is narrative.
pub fn detect_format(filename: &str, bytes: &[u8]) -> Result<InputFormat, IntakeError> {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];

    if head.starts_with(b"%PDF") {
        return Err(IntakeError::UnsupportedFormat(format!(
            "{filename}: PDF files must be converted to text first"
        )));
    }

    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('<') && trimmed.contains("ClinicalDocument") {
        return Ok(InputFormat::Structured);
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if STRUCTURED_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(InputFormat::Structured);
    }

    if is_likely_text(head) {
        Ok(InputFormat::Narrative)
    } else {
        Err(IntakeError::UnsupportedFormat(format!("{filename}: binary content")))
    }
}

/// A single file, or the supported files directly inside a directory in
/// name order.
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>, IntakeError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        let supported = entry_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| {
                NARRATIVE_EXTENSIONS.contains(&ext.as_str())
                    || STRUCTURED_EXTENSIONS.contains(&ext.as_str())
            });
        if entry_path.is_file() && supported {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Valid UTF-8 (allowing a cut multi-byte tail) and mostly printable.
fn is_likely_text(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => {
            // Sniff window ended inside a character.
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(t) => t,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

/// Final path component, without control characters and capped at 255
/// characters; `document` when nothing usable is left.
pub fn display_name(path: &Path) -> String {
    let raw = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let name: String = raw.chars().filter(|c| !c.is_control()).take(255).collect();
    match name.trim() {
        "" => "document".to_string(),
        trimmed => trimmed.to_string(),
    }
}
