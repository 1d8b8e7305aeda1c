//! Lab rows from markdown tables.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::LabFlag;
use crate::models::LabResult;

static VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([<>]=?\s*\d+(?:\.\d+)?|\d+(?:\.\d+)?)\s*([A-Za-zµμ%°/][A-Za-z0-9µμ%°₂/^.]*)?").unwrap()
});

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*[-–]\s*\d+|[<>]=?\s*\d+").unwrap());

static NUMERIC_LEAD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[<>]?=?\s*\d").unwrap());

static BOLD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*([A-Za-z][A-Za-z0-9 &/()-]*?)\*\*:?$").unwrap());

static CRITICAL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bcritical\b").unwrap());
static HIGH_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:high|elevated)\b").unwrap());
static LOW_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\blow\b").unwrap());
static NORMAL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bnormal\b").unwrap());

/// Column titles that look like bold headers but are not categories.
const HEADER_WORDS: &[&str] = &["test", "result", "results", "reference", "interpretation"];

/// Line-fed scan over a document's tables. The last bold header seen is the
/// category of every row after it.
#[derive(Debug, Default)]
pub struct LabScan {
    category: Option<String>,
    results: Vec<LabResult>,
}

impl LabScan {
    pub fn feed(&mut self, line: &str) {
        let line = line.trim();

        if let Some(category) = bold_header(line) {
            if !HEADER_WORDS.contains(&category.to_lowercase().as_str()) {
                self.category = Some(category);
            }
            return;
        }

        if line.contains('|') && line.chars().any(|c| c.is_ascii_digit()) {
            if let Some(result) = parse_lab_row(line, self.category.as_deref()) {
                self.results.push(result);
            }
        }
    }

    pub fn finish(self) -> Vec<LabResult> {
        self.results
    }
}

/// `**Lipids**` on its own line, or as the only filled cell of a table row.
fn bold_header(line: &str) -> Option<String> {
    let candidate = if line.starts_with('|') {
        let cells: Vec<&str> = line.split('|').map(str::trim).filter(|c| !c.is_empty()).collect();
        match cells.as_slice() {
            [only] => *only,
            _ => return None,
        }
    } else {
        line
    };
    BOLD_LINE
        .captures(candidate)
        .map(|c| c[1].trim().to_string())
}

/// One table row into a result. Rows without a test name or a value give `None`.
pub fn parse_lab_row(line: &str, category: Option<&str>) -> Option<LabResult> {
    let cells: Vec<&str> = line.split('|').map(str::trim).filter(|c| !c.is_empty()).collect();
    if cells.len() < 3 {
        return None;
    }

    let mut test_name: Option<String> = None;
    let mut value: Option<(String, Option<String>)> = None;
    let mut reference: Option<String> = None;
    let mut flag = LabFlag::Normal;

    for raw in cells {
        let clean = raw.replace('*', "");
        let clean = clean.trim();

        if test_name.is_none()
            && clean.starts_with(|c: char| c.is_alphabetic())
            && !NUMERIC_LEAD.is_match(clean)
        {
            test_name = Some(clean.to_string());
            continue;
        }
        if value.is_none() {
            if let Some(caps) = VALUE.captures(clean) {
                let number = caps[1].split_whitespace().collect::<String>();
                value = Some((number, caps.get(2).map(|u| u.as_str().to_string())));
                continue;
            }
        }
        if reference.is_none() && RANGE.is_match(clean) {
            reference = Some(clean.to_string());
            continue;
        }
        if let Some(marked) = marker_flag(raw) {
            flag = marked;
        }
    }

    let test_name = test_name?;
    let (value, unit) = value?;
    Some(LabResult {
        test_name,
        value,
        unit,
        reference_range: reference,
        flag,
        category: category.map(str::to_string),
    })
}

/// Flag from emoji or keyword markers in an interpretation cell. Keywords
/// match as whole words, so "Follow-up" is not read as low.
fn marker_flag(cell: &str) -> Option<LabFlag> {
    let low = LOW_WORD.is_match(cell);

    if cell.contains('🚨') || CRITICAL_WORD.is_match(cell) {
        return Some(if low {
            LabFlag::CriticalLow
        } else {
            LabFlag::CriticalHigh
        });
    }
    if cell.contains('⚠') || HIGH_WORD.is_match(cell) {
        Some(LabFlag::High)
    } else if low {
        Some(LabFlag::Low)
    } else if cell.contains('✅') || NORMAL_WORD.is_match(cell) {
        Some(LabFlag::Normal)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glucose_row() {
        let r = parse_lab_row("| Glucose | 105 mg/dL | 70-99 | ⚠️ High |", Some("Metabolic")).unwrap();
        assert_eq!(r.test_name, "Glucose");
        assert_eq!(r.value, "105");
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.reference_range.as_deref(), Some("70-99"));
        assert_eq!(r.flag, LabFlag::High);
        assert_eq!(r.category.as_deref(), Some("Metabolic"));
    }

    #[test]
    fn bold_name_with_unit_range_and_no_marker() {
        let r = parse_lab_row("| **Glucose** | 105 mg/dL | 70-99 mg/dL |", None).unwrap();
        assert_eq!(r.test_name, "Glucose");
        assert_eq!(r.value, "105");
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.reference_range.as_deref(), Some("70-99 mg/dL"));
        assert_eq!(r.flag, LabFlag::Normal);
        assert_eq!(r.category, None);
    }

    #[test]
    fn markers_match_whole_words_only() {
        let r = parse_lab_row("| Glucose | 92 mg/dL | 70-99 | Follow-up in 6 months |", None).unwrap();
        assert_eq!(r.flag, LabFlag::Normal);

        assert_eq!(marker_flag("Yellow tint, allow retest"), None);
        assert_eq!(marker_flag("Highlighted"), None);
        assert_eq!(marker_flag("LOW"), Some(LabFlag::Low));
        assert_eq!(marker_flag("Elevated"), Some(LabFlag::High));
        assert_eq!(marker_flag("🚨 critical"), Some(LabFlag::CriticalHigh));
        assert_eq!(marker_flag("✅"), Some(LabFlag::Normal));
    }

    #[test]
    fn bold_cells_and_comparator_values() {
        let r = parse_lab_row("| **Vitamin D** | **<10** ng/mL | 30-100 | Critical low |", None).unwrap();
        assert_eq!(r.test_name, "Vitamin D");
        assert_eq!(r.value, "<10");
        assert_eq!(r.unit.as_deref(), Some("ng/mL"));
        assert_eq!(r.flag, LabFlag::CriticalLow);
    }

    #[test]
    fn rows_missing_name_or_value_are_dropped() {
        assert!(parse_lab_row("| 12 | 14 | 16 |", None).is_none());
        assert!(parse_lab_row("| Glucose | pending | see note 2 |", None).is_none());
        assert!(parse_lab_row("| Glucose | 105 |", None).is_none());
    }

    #[test]
    fn categories_follow_bold_headers() {
        let mut scan = LabScan::default();
        for line in [
            "**Liver Panel**",
            "| Test | Result | Range |",
            "|---|---|---|",
            "| ALT | 52 U/L | 7-56 | ✅ Normal |",
            "| **Kidney** | | |",
            "| Creatinine | 0.9 mg/dL | 0.6-1.2 | Normal |",
            "**Results**",
            "| eGFR | 95 | >60 | Normal |",
        ] {
            scan.feed(line);
        }
        let results = scan.finish();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].category.as_deref(), Some("Liver Panel"));
        assert_eq!(results[1].category.as_deref(), Some("Kidney"));
        assert_eq!(results[2].category.as_deref(), Some("Kidney"));
        assert_eq!(results[2].reference_range.as_deref(), Some(">60"));
    }
}
