use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{AliasSource, RelationshipKind};
use super::slugify;

/// Graph-resident person. Never produced by a document parser; built from
/// operator input or a checkpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: Option<String>,
    pub preferred_name: Option<String>,
    pub full_legal_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub role: Option<String>,
    pub address: Option<String>,
    pub birth_place: Option<BirthPlace>,
}

impl Person {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Preferred name when known, else canonical name, else the id.
    pub fn display_name(&self) -> &str {
        self.preferred_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.full_legal_name.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthPlace {
    pub city: String,
    pub country: String,
    pub country_code: Option<String>,
}

impl BirthPlace {
    /// `{city-slug}-{country code}`; falls back to the first two letters of
    /// the country when no code is known.
    pub fn location_id(&self) -> String {
        let code = match &self.country_code {
            Some(code) if !code.trim().is_empty() => code.trim().to_lowercase(),
            _ => self.country.chars().take(2).collect::<String>().to_lowercase(),
        };
        format!("{}-{}", slugify(&self.city), code)
    }
}

/// Demographics as recorded in a source document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub source: AliasSource,
    pub is_primary: bool,
}

impl Alias {
    pub fn new(name: impl Into<String>, source: AliasSource) -> Self {
        Self {
            name: name.into(),
            source,
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub facility: Option<String>,
}

/// A direct family edge as seen from one member. `reverse` means the edge
/// points at this member rather than away from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub reverse: bool,
    pub name: Option<String>,
    pub member_id: String,
}

/// Insurance plan and its primary facility (checkpoint export only).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Insurance {
    pub name: String,
    pub plan_type: Option<String>,
    pub member_number: Option<String>,
    pub group_number: Option<String>,
    pub facility_name: Option<String>,
    pub facility_address: Option<String>,
    pub facility_phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_id_uses_country_code() {
        let place = BirthPlace {
            city: "Manila City".into(),
            country: "Philippines".into(),
            country_code: Some("PH".into()),
        };
        assert_eq!(place.location_id(), "manila-city-ph");
    }

    #[test]
    fn location_id_falls_back_to_country_prefix() {
        let place = BirthPlace {
            city: "Denver".into(),
            country: "United States".into(),
            country_code: None,
        };
        assert_eq!(place.location_id(), "denver-un");
    }

    #[test]
    fn display_name_prefers_preferred() {
        let mut person = Person::new("m-1");
        assert_eq!(person.display_name(), "m-1");
        person.name = Some("Philip Paran".into());
        assert_eq!(person.display_name(), "Philip Paran");
        person.preferred_name = Some("Collin".into());
        assert_eq!(person.display_name(), "Collin");
    }
}
