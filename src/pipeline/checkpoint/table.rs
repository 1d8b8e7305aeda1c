//! Markdown table cells: escaping on the way out, splitting on the way in.

/// Placeholder for an absent value.
pub const EMPTY_CELL: &str = "-";

/// Render an optional value as a single-line cell.
pub fn cell(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => escape(v),
        None => EMPTY_CELL.to_string(),
    }
}

/// Escape pipes and flatten newlines so a value cannot break the row.
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace(['\r', '\n'], " ")
}

/// `| a | b | c |`
pub fn row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

/// Header row plus its `|---|` separator.
pub fn header(columns: &[&str]) -> [String; 2] {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let rule: Vec<String> = columns.iter().map(|c| "-".repeat(c.len().max(3))).collect();
    [row(&names), format!("|{}|", rule.iter().map(|r| format!("-{r}-")).collect::<Vec<_>>().join("|"))]
}

/// Split a table line into unescaped, trimmed cells. Returns `None` for
/// lines that are not table rows.
pub fn split_row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') {
        return None;
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed[1..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('|' | '\\')) => current.push(next),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    // Text after the last pipe is only a cell when the row was not closed.
    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }
    Some(cells)
}

/// `|---|:---:|` alignment rows.
pub fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| {
            let inner = c.trim_matches(':');
            inner.len() >= 3 && inner.chars().all(|ch| ch == '-')
        })
}

/// Cell text back to an optional value: `-` and blanks are absent.
pub fn value(cell: &str) -> Option<String> {
    let v = cell.trim();
    if v.is_empty() || v == EMPTY_CELL {
        None
    } else {
        Some(v.to_string())
    }
}

/// Strip `**bold**` and `` `code` `` wrappers from a cell.
pub fn unwrap_marks(cell: &str) -> String {
    cell.trim()
        .trim_start_matches("**")
        .trim_end_matches("**")
        .trim_matches('`')
        .trim()
        .to_string()
}
