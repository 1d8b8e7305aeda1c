//! Document-level facts: type, title, date, patient, provider.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::enums::DocumentType;
use crate::models::Provider;

/// Leading characters inspected for content-based type sniffing.
const SNIFF_CHARS: usize = 500;

static PATIENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?m)^#\s*([A-Z][a-z]+\s+[A-Z][a-z]+)\s*[-–—]").unwrap(),
        Regex::new(r"(?i:patient|name|prepared for)[:*\s]+([A-Z][a-z]+\s+[A-Z][a-z]+)").unwrap(),
        Regex::new(r"\b(?:for|of)\s+([A-Z][a-z]+\s+[A-Z][a-z]+)").unwrap(),
    ]
});

static PROVIDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?:Physician|Doctor|Provider)[:*\s]+(?:Dr\.?\s+)?([A-Z][a-z]+(?:\s+[A-Z]\.?)?\s+[A-Z][a-z]+)").unwrap(),
        Regex::new(r"Dr\.?\s+([A-Z][a-z]+(?:\s+[A-Z]\.?)?\s+[A-Z][a-z]+)").unwrap(),
    ]
});

static FACILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:[A-Z][\w'&.-]*\s+){0,4}(?i:VA\s+Hospital|VA\s+Medical\s+Center|VA\s+Medical|Hospital|Clinic))\b").unwrap()
});

static DATE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#_-]*(?:date|report date|collection date|date of service|visit date)[\s*_]*:[\s*_]*(.+)$").unwrap()
});

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}|[A-Za-z]{3,9}\.?\s+\d{1,2},\s*\d{4}|\d{1,2}/\d{1,2}/\d{4}").unwrap()
});

/// Guess the document type from its filename and opening text.
pub fn detect_document_type(filename: &str, text: &str) -> DocumentType {
    let name = filename.to_lowercase();
    let head: String = text.chars().take(SNIFF_CHARS).collect::<String>().to_lowercase();

    if name.contains("lab") || head.contains("result") {
        DocumentType::LabResult
    } else if name.contains("interpretation") || head.contains("interpretation") {
        DocumentType::Interpretation
    } else if name.contains("prescription") || name.contains("rx") {
        DocumentType::Prescription
    } else {
        DocumentType::MedicalRecord
    }
}

/// First `# ` heading.
pub fn extract_title(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn extract_document_date(text: &str) -> Option<NaiveDate> {
    DATE_LABEL
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|rest| DATE_TOKEN.find(rest.as_str()).and_then(|m| parse_loose_date(m.as_str())))
}

/// ISO, `March 5, 2024`, `Mar 5, 2024`, `Mar. 5, 2024` or `03/05/2024`.
pub fn parse_loose_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim().replace('.', "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
}

pub fn extract_patient_name(text: &str) -> Option<String> {
    PATIENT_PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .map(|c| c[1].trim().to_string())
}

pub fn extract_provider(text: &str) -> Option<Provider> {
    let name = PROVIDER_PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .map(|c| c[1].trim().to_string())?;
    let facility = FACILITY
        .captures(text)
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "));
    Some(Provider { name, facility })
}
