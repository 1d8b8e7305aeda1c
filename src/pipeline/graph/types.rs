use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::DatabaseError;
use crate::models::enums::{NodeLabel, RelType, Section};
use crate::models::{Alias, HealthRisk, Person, Relationship};

/// A node addressed by its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeKey {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }

    pub fn person(member_id: &str) -> Self {
        Self::new(NodeLabel::Person, member_id)
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Date(NaiveDate),
    Text(String),
}

impl PropValue {
    /// JSON form handed to stores; dates become ISO strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for PropValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<NaiveDate> for PropValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Ordered property list. Absent values are never inserted, so an upsert
/// can only add or overwrite, never blank out a stored attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Props(Vec<(String, PropValue)>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<PropValue>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn maybe<V: Into<PropValue>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(field, v),
            None => self,
        }
    }

    /// Like [`Props::maybe`] but also skips blank text.
    pub fn maybe_text(self, field: &str, value: Option<&str>) -> Self {
        self.maybe(field, value.map(str::trim).filter(|v| !v.is_empty()))
    }

    fn insert(&mut self, field: &str, value: PropValue) {
        match self.0.iter_mut().find(|(k, _)| k == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&PropValue> {
        self.0.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// Idempotent merge-by-key command.
///
/// Locate by natural key, create if absent (applying `on_create`), then
/// overwrite every `set` attribute. Replaying a sequence never duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    MergeNode {
        section: Section,
        node: NodeKey,
        on_create: Props,
        set: Props,
    },
    MergeEdge {
        section: Section,
        from: NodeKey,
        rel: RelType,
        to: NodeKey,
        set: Props,
    },
}

impl Operation {
    pub fn node(section: Section, node: NodeKey, set: Props) -> Self {
        Self::MergeNode {
            section,
            node,
            on_create: Props::new(),
            set,
        }
    }

    pub fn edge(section: Section, from: NodeKey, rel: RelType, to: NodeKey) -> Self {
        Self::MergeEdge {
            section,
            from,
            rel,
            to,
            set: Props::new(),
        }
    }

    pub fn section(&self) -> Section {
        match self {
            Self::MergeNode { section, .. } | Self::MergeEdge { section, .. } => *section,
        }
    }

    /// Human name of the entity an operation writes, for warnings.
    pub fn entity_name(&self) -> String {
        match self {
            Self::MergeNode { node, .. } => node.to_string(),
            Self::MergeEdge { from, rel, to, .. } => format!("{from}-[{rel}]->{to}"),
        }
    }
}

/// Anything that can apply one upsert.
pub trait MutationSink {
    fn apply(&self, op: &Operation) -> Result<(), DatabaseError>;
}

impl<T: MutationSink + ?Sized> MutationSink for &T {
    fn apply(&self, op: &Operation) -> Result<(), DatabaseError> {
        (**self).apply(op)
    }
}

/// Where aliases for the person come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AliasPlan {
    /// Derive from the full legal name; extra names are stored as nicknames.
    Derive { extra: Vec<String> },
    /// Use exactly these aliases (checkpoint import).
    Explicit(Vec<Alias>),
}

impl Default for AliasPlan {
    fn default() -> Self {
        Self::Derive { extra: Vec::new() }
    }
}

/// Who a record belongs to, plus the person-level facts the operator knows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonContext {
    pub person: Person,
    pub aliases: AliasPlan,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub health_risks: Vec<HealthRisk>,
}

impl PersonContext {
    pub fn new(member_id: impl Into<String>) -> Self {
        Self {
            person: Person::new(member_id),
            ..Self::default()
        }
    }

    pub fn member_id(&self) -> &str {
        &self.person.id
    }
}

/// One upsert that failed; the sequence kept going.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphWriteWarning {
    pub section: Section,
    pub entity: String,
    pub error: String,
}

/// Per-section outcome of applying a mutation sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    pub applied: BTreeMap<Section, usize>,
    pub failed: BTreeMap<Section, usize>,
    pub warnings: Vec<GraphWriteWarning>,
}

impl ApplyReport {
    pub fn total_applied(&self) -> usize {
        self.applied.values().sum()
    }

    pub fn total_failed(&self) -> usize {
        self.failed.values().sum()
    }

    pub fn applied_in(&self, section: Section) -> usize {
        self.applied.get(&section).copied().unwrap_or(0)
    }

    pub fn failed_in(&self, section: Section) -> usize {
        self.failed.get(&section).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maybe_skips_absent_values() {
        let props = Props::new()
            .with("name", "Metformin")
            .maybe::<String>("dosage", None)
            .maybe_text("frequency", Some("   "))
            .maybe("start_date", NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(props.len(), 2);
        assert!(props.get("dosage").is_none());
        assert!(props.get("frequency").is_none());
    }

    #[test]
    fn with_overwrites_existing_field() {
        let props = Props::new().with("status", "active").with("status", "resolved");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("status"), Some(&PropValue::from("resolved")));
    }

    #[test]
    fn dates_serialize_as_iso_text() {
        let props = Props::new().with("date", NaiveDate::from_ymd_opt(2023, 8, 15).unwrap());
        let json = props.to_json();
        assert_eq!(json["date"], Value::String("2023-08-15".into()));
    }

    #[test]
    fn entity_name_describes_edge() {
        let op = Operation::edge(
            Section::Medications,
            NodeKey::person("m-1"),
            RelType::TakesMedication,
            NodeKey::new(NodeLabel::Medication, "metformin"),
        );
        assert_eq!(
            op.entity_name(),
            "Person(m-1)-[TAKES_MEDICATION]->Medication(metformin)"
        );
        assert_eq!(op.section(), Section::Medications);
    }

    #[test]
    fn report_totals() {
        let mut report = ApplyReport::default();
        report.applied.insert(Section::Person, 1);
        report.applied.insert(Section::Conditions, 4);
        report.failed.insert(Section::Conditions, 1);
        assert_eq!(report.total_applied(), 5);
        assert_eq!(report.total_failed(), 1);
        assert_eq!(report.failed_in(Section::Medications), 0);
    }
}
