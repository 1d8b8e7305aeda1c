use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same strings so JSON and checkpoints agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentType {
    LabResult => "lab_result",
    Interpretation => "interpretation",
    Prescription => "prescription",
    MedicalRecord => "medical_record",
    ClinicalDocument => "ccd",
});

str_enum!(MedicationStatus {
    Active => "active",
    Completed => "completed",
    Discontinued => "discontinued",
    Unknown => "unknown",
});

impl MedicationStatus {
    /// Map an HL7 `statusCode@code` onto the medication lifecycle.
    pub fn from_status_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "active" | "new" | "held" => Self::Active,
            "completed" => Self::Completed,
            "aborted" | "cancelled" | "suspended" | "nullified" | "obsolete" => {
                Self::Discontinued
            }
            _ => Self::Unknown,
        }
    }
}

str_enum!(LabFlag {
    Normal => "normal",
    High => "high",
    Low => "low",
    CriticalHigh => "critical_high",
    CriticalLow => "critical_low",
});

impl LabFlag {
    /// Map an HL7 `interpretationCode@code` (H, HH, L, LL, N, ...)
    pub fn from_interpretation_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "N" => Some(Self::Normal),
            "H" | "HU" | "A" | "AA" => Some(Self::High),
            "HH" | "H>" => Some(Self::CriticalHigh),
            "L" | "LU" => Some(Self::Low),
            "LL" | "L<" => Some(Self::CriticalLow),
            _ => None,
        }
    }

    /// Column text used in checkpoint lab tables: "Normal" or the upper-case flag.
    pub fn display_status(&self) -> String {
        match self {
            Self::Normal => "Normal".to_string(),
            other => other.as_str().to_uppercase(),
        }
    }

    /// Inverse of [`LabFlag::display_status`]; unknown text is treated as normal.
    pub fn from_display_status(text: &str) -> Self {
        let lowered = text.trim().to_lowercase();
        lowered.parse().unwrap_or(Self::Normal)
    }

    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

str_enum!(ConditionStatus {
    Active => "active",
    Suspected => "suspected",
    Resolved => "resolved",
    Inactive => "inactive",
});

impl ConditionStatus {
    /// Map an HL7 problem `statusCode@code`.
    pub fn from_status_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "completed" | "resolved" => Self::Resolved,
            "aborted" | "suspended" | "inactive" => Self::Inactive,
            _ => Self::Active,
        }
    }
}

str_enum!(AliasSource {
    FormTruncation => "form_truncation",
    Preferred => "preferred",
    Formal => "formal",
    MiddleNameUsed => "middle_name_used",
    Nickname => "nickname",
    Unknown => "unknown",
});

str_enum!(RelationshipKind {
    ParentOf => "PARENT_OF",
    ChildOf => "CHILD_OF",
    SiblingOf => "SIBLING_OF",
    SpouseOf => "SPOUSE_OF",
});

impl RelationshipKind {
    /// Title-cased label ("Parent Of", "Spouse Of Reverse") used in checkpoints.
    pub fn display_label(&self, reverse: bool) -> String {
        let raw = if reverse {
            format!("{}_REVERSE", self.as_str())
        } else {
            self.as_str().to_string()
        };
        raw.split('_')
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    /// Parse a checkpoint label back into (kind, reverse).
    pub fn from_display_label(label: &str) -> Option<(Self, bool)> {
        let upper = label.trim().to_uppercase().replace(' ', "_");
        let (base, reverse) = match upper.strip_suffix("_REVERSE") {
            Some(base) => (base.to_string(), true),
            None => (upper, false),
        };
        base.parse().ok().map(|kind| (kind, reverse))
    }
}

/// Record sections. Used for parser skip tallies, CCD section selection and
/// per-section write accounting.
str_enum!(Section {
    Person => "person",
    Aliases => "aliases",
    Provider => "provider",
    Medications => "medications",
    Allergies => "allergies",
    Conditions => "conditions",
    Procedures => "procedures",
    Labs => "labs",
    Immunizations => "immunizations",
    Vitals => "vitals",
    Appointments => "appointments",
    HealthRisks => "health_risks",
    Relationships => "relationships",
});

// ═══════════════════════════════════════════
// Graph vocabulary
// ═══════════════════════════════════════════

str_enum!(NodeLabel {
    Person => "Person",
    Alias => "Alias",
    Location => "Location",
    Provider => "Provider",
    Medication => "Medication",
    Allergy => "Allergy",
    Condition => "Condition",
    Procedure => "Procedure",
    LabEvent => "LabEvent",
    LabResult => "LabResult",
    Immunization => "Immunization",
    VitalSigns => "VitalSigns",
    Appointment => "Appointment",
    HealthRisk => "HealthRisk",
    Insurance => "Insurance",
    Facility => "Facility",
});

impl NodeLabel {
    /// Property that holds the natural key for nodes of this label.
    pub fn key_field(&self) -> &'static str {
        match self {
            Self::Person
            | Self::Location
            | Self::LabEvent
            | Self::LabResult
            | Self::Immunization
            | Self::VitalSigns
            | Self::Appointment => "id",
            Self::Medication => "name_key",
            Self::Alias
            | Self::Provider
            | Self::Allergy
            | Self::Condition
            | Self::Procedure
            | Self::HealthRisk
            | Self::Insurance
            | Self::Facility => "name",
        }
    }
}

str_enum!(RelType {
    HasAlias => "HAS_ALIAS",
    BornIn => "BORN_IN",
    TakesMedication => "TAKES_MEDICATION",
    HasAllergy => "HAS_ALLERGY",
    HasCondition => "HAS_CONDITION",
    HadProcedure => "HAD_PROCEDURE",
    HadLabEvent => "HAD_LAB_EVENT",
    Includes => "INCLUDES",
    PerformedBy => "PERFORMED_BY",
    Received => "RECEIVED",
    HadVitals => "HAD_VITALS",
    HasAppointment => "HAS_APPOINTMENT",
    AtRiskFor => "AT_RISK_FOR",
    HasInsurance => "HAS_INSURANCE",
    ProvidedBy => "PROVIDED_BY",
    ParentOf => "PARENT_OF",
    ChildOf => "CHILD_OF",
    SiblingOf => "SIBLING_OF",
    SpouseOf => "SPOUSE_OF",
});

impl From<RelationshipKind> for RelType {
    fn from(kind: RelationshipKind) -> Self {
        match kind {
            RelationshipKind::ParentOf => Self::ParentOf,
            RelationshipKind::ChildOf => Self::ChildOf,
            RelationshipKind::SiblingOf => Self::SiblingOf,
            RelationshipKind::SpouseOf => Self::SpouseOf,
        }
    }
}

impl RelType {
    /// Family edge kind, if this is one.
    pub fn family_kind(&self) -> Option<RelationshipKind> {
        match self {
            Self::ParentOf => Some(RelationshipKind::ParentOf),
            Self::ChildOf => Some(RelationshipKind::ChildOf),
            Self::SiblingOf => Some(RelationshipKind::SiblingOf),
            Self::SpouseOf => Some(RelationshipKind::SpouseOf),
            _ => None,
        }
    }
}
