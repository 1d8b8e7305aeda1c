pub mod enums;
pub mod allergy;
pub mod appointment;
pub mod condition;
pub mod lab;
pub mod medication;
pub mod person;
pub mod procedure;
pub mod record;
pub mod vital_sign;

pub use allergy::*;
pub use appointment::*;
pub use condition::*;
pub use lab::*;
pub use medication::*;
pub use person::*;
pub use procedure::*;
pub use record::*;
pub use vital_sign::*;

/// Natural-key form of a display name: trimmed, inner whitespace collapsed,
/// lower-cased.
pub fn normalize_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lower-case, ASCII-alphanumeric words joined by `-`.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_key_collapses_and_lowercases() {
        assert_eq!(normalize_key("  Metformin   HCl 500mg "), "metformin hcl 500mg");
        assert_eq!(normalize_key("METFORMIN HCL 500MG"), "metformin hcl 500mg");
    }

    #[test]
    fn slugify_strips_punctuation() {
        assert_eq!(slugify("Flu Vaccine (2023-24)"), "flu-vaccine-2023-24");
        assert_eq!(slugify("  "), "");
    }
}
