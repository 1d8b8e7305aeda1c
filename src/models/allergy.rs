use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: String,
    pub code: Option<String>,
    pub reaction: Option<String>,
    pub severity: Option<String>,
}

impl Allergy {
    pub fn new(allergen: impl Into<String>) -> Self {
        Self {
            allergen: allergen.into(),
            code: None,
            reaction: None,
            severity: None,
        }
    }
}
