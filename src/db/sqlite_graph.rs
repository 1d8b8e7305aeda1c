//! File-backed property graph on SQLite.
//!
//! Nodes are unique on `(label, key)`, edges on
//! `(src_label, src_key, rel, dst_label, dst_key)`. Properties live in a JSON
//! object and are merged with `json_patch`, which gives the same
//! create-then-overwrite semantics as a Cypher `MERGE … ON CREATE SET … SET`.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::rows::{self, Row};
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::enums::{NodeLabel, RelType, RelationshipKind};
use crate::models::*;
use crate::pipeline::checkpoint::CheckpointSource;
use crate::pipeline::graph::{ApplyReport, MutationSink, NodeKey, Operation, Props};

pub struct SqliteGraph {
    conn: Connection,
}

/// A neighbour reached over one edge: its key, its properties, the edge's properties.
struct Neighbour {
    key: String,
    node: Row,
    rel: Row,
}

impl SqliteGraph {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: open_database(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: open_memory_database()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn merge_node(&self, node: &NodeKey, on_create: &Props, set: &Props) -> Result<(), DatabaseError> {
        let mut create = on_create.to_json();
        create.insert(
            node.label.key_field().to_string(),
            Value::String(node.key.clone()),
        );
        let create = serde_json::to_string(&create)?;
        let set = serde_json::to_string(&set.to_json())?;

        self.conn.execute(
            "INSERT INTO nodes (label, key, props) VALUES (?1, ?2, json_patch(?3, ?4))
             ON CONFLICT(label, key) DO UPDATE
             SET props = json_patch(nodes.props, ?4), updated_at = datetime('now')",
            params![node.label.as_str(), node.key, create, set],
        )?;
        Ok(())
    }

    pub fn merge_edge(
        &self,
        from: &NodeKey,
        rel: RelType,
        to: &NodeKey,
        set: &Props,
    ) -> Result<(), DatabaseError> {
        for endpoint in [from, to] {
            if !self.node_exists(endpoint)? {
                return Err(DatabaseError::NotFound {
                    entity_type: endpoint.label.to_string(),
                    id: endpoint.key.clone(),
                });
            }
        }
        let set = serde_json::to_string(&set.to_json())?;

        self.conn.execute(
            "INSERT INTO edges (src_label, src_key, rel, dst_label, dst_key, props)
             VALUES (?1, ?2, ?3, ?4, ?5, json(?6))
             ON CONFLICT(src_label, src_key, rel, dst_label, dst_key) DO UPDATE
             SET props = json_patch(edges.props, ?6)",
            params![
                from.label.as_str(),
                from.key,
                rel.as_str(),
                to.label.as_str(),
                to.key,
                set,
            ],
        )?;
        Ok(())
    }

    pub fn node_exists(&self, node: &NodeKey) -> Result<bool, DatabaseError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM nodes WHERE label = ?1 AND key = ?2",
                params![node.label.as_str(), node.key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Stored properties of one node.
    pub fn node_props(&self, node: &NodeKey) -> Result<Option<Row>, DatabaseError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT props FROM nodes WHERE label = ?1 AND key = ?2",
                params![node.label.as_str(), node.key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| parse_props(&s)).transpose()
    }

    pub fn count_nodes(&self, label: NodeLabel) -> Result<i64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE label = ?1",
            params![label.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_edges(&self, rel: RelType) -> Result<i64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE rel = ?1",
            params![rel.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Log one applied sequence (document ingest or checkpoint import).
    pub fn record_ingestion(
        &self,
        member_id: &str,
        source: &str,
        document_id: Option<&str>,
        report: &ApplyReport,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO ingestion_log (member_id, source, document_id, applied, failed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                member_id,
                source,
                document_id,
                report.total_applied() as i64,
                report.total_failed() as i64,
            ],
        )?;
        Ok(())
    }

    pub fn ingestion_count(&self, member_id: &str) -> Result<i64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM ingestion_log WHERE member_id = ?1",
            params![member_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn outgoing(&self, from: &NodeKey, rel: RelType) -> Result<Vec<Neighbour>, DatabaseError> {
        self.neighbours(
            "SELECT n.key, n.props, e.props FROM edges e
             JOIN nodes n ON n.label = e.dst_label AND n.key = e.dst_key
             WHERE e.src_label = ?1 AND e.src_key = ?2 AND e.rel = ?3
             ORDER BY n.key",
            from,
            rel,
        )
    }

    fn incoming(&self, to: &NodeKey, rel: RelType) -> Result<Vec<Neighbour>, DatabaseError> {
        self.neighbours(
            "SELECT n.key, n.props, e.props FROM edges e
             JOIN nodes n ON n.label = e.src_label AND n.key = e.src_key
             WHERE e.dst_label = ?1 AND e.dst_key = ?2 AND e.rel = ?3
             ORDER BY n.key",
            to,
            rel,
        )
    }

    fn neighbours(&self, sql: &str, anchor: &NodeKey, rel: RelType) -> Result<Vec<Neighbour>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map(params![anchor.label.as_str(), anchor.key, rel.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(key, node, rel)| {
                Ok(Neighbour {
                    key,
                    node: parse_props(&node)?,
                    rel: parse_props(&rel)?,
                })
            })
            .collect()
    }
}

fn parse_props(raw: &str) -> Result<Row, DatabaseError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::ConstraintViolation(format!(
            "properties must be a JSON object, got {other}"
        ))),
    }
}

impl MutationSink for SqliteGraph {
    fn apply(&self, op: &Operation) -> Result<(), DatabaseError> {
        match op {
            Operation::MergeNode {
                node,
                on_create,
                set,
                ..
            } => self.merge_node(node, on_create, set),
            Operation::MergeEdge {
                from, rel, to, set, ..
            } => self.merge_edge(from, *rel, to, set),
        }
    }
}

impl CheckpointSource for SqliteGraph {
    fn person(&self, member_id: &str) -> Result<Option<Person>, DatabaseError> {
        let key = NodeKey::person(member_id);
        let Some(node) = self.node_props(&key)? else {
            return Ok(None);
        };
        let location = self.outgoing(&key, RelType::BornIn)?.into_iter().next();
        Ok(rows::person_from(&node, location.as_ref().map(|l| &l.node)))
    }

    fn insurance(&self, member_id: &str) -> Result<Vec<Insurance>, DatabaseError> {
        let mut plans = Vec::new();
        for plan in self.outgoing(&NodeKey::person(member_id), RelType::HasInsurance)? {
            let plan_key = NodeKey::new(NodeLabel::Insurance, plan.key.as_str());
            let facility = self.outgoing(&plan_key, RelType::ProvidedBy)?.into_iter().next();
            plans.extend(rows::insurance_from(&plan.node, facility.as_ref().map(|f| &f.node)));
        }
        Ok(plans)
    }

    fn aliases(&self, member_id: &str) -> Result<Vec<Alias>, DatabaseError> {
        Ok(self
            .outgoing(&NodeKey::person(member_id), RelType::HasAlias)?
            .iter()
            .filter_map(|n| rows::alias_from(&n.node))
            .collect())
    }

    fn allergies(&self, member_id: &str) -> Result<Vec<Allergy>, DatabaseError> {
        Ok(self
            .outgoing(&NodeKey::person(member_id), RelType::HasAllergy)?
            .iter()
            .filter_map(|n| rows::allergy_from(&n.node, &n.rel))
            .collect())
    }

    fn conditions(&self, member_id: &str) -> Result<Vec<Condition>, DatabaseError> {
        Ok(self
            .outgoing(&NodeKey::person(member_id), RelType::HasCondition)?
            .iter()
            .filter_map(|n| rows::condition_from(&n.node, &n.rel))
            .collect())
    }

    fn medications(&self, member_id: &str) -> Result<Vec<Medication>, DatabaseError> {
        Ok(self
            .outgoing(&NodeKey::person(member_id), RelType::TakesMedication)?
            .iter()
            .filter_map(|n| rows::medication_from(&n.node, &n.rel))
            .collect())
    }

    fn appointments_since(
        &self,
        member_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        Ok(self
            .outgoing(&NodeKey::person(member_id), RelType::HasAppointment)?
            .iter()
            .filter_map(|n| rows::appointment_from(&n.node))
            .filter(|a| a.date >= since)
            .collect())
    }

    fn lab_history(&self, member_id: &str) -> Result<Vec<LabPanel>, DatabaseError> {
        let mut panels = Vec::new();
        for event in self.outgoing(&NodeKey::person(member_id), RelType::HadLabEvent)? {
            let event_key = NodeKey::new(NodeLabel::LabEvent, event.key.as_str());
            let results: Vec<Row> = self
                .outgoing(&event_key, RelType::Includes)?
                .into_iter()
                .map(|n| n.node)
                .collect();
            panels.push(rows::lab_panel_from(&event.node, &results));
        }
        Ok(panels)
    }

    fn health_risks(&self, member_id: &str) -> Result<Vec<HealthRisk>, DatabaseError> {
        Ok(self
            .outgoing(&NodeKey::person(member_id), RelType::AtRiskFor)?
            .iter()
            .filter_map(|n| rows::health_risk_from(&n.node, &n.rel))
            .collect())
    }

    fn relationships(&self, member_id: &str) -> Result<Vec<Relationship>, DatabaseError> {
        let person = NodeKey::person(member_id);
        let mut out = Vec::new();
        for kind in RelationshipKind::all() {
            let rel = RelType::from(*kind);
            for (reverse, neighbours) in [
                (false, self.outgoing(&person, rel)?),
                (true, self.incoming(&person, rel)?),
            ] {
                out.extend(neighbours.into_iter().map(|n| Relationship {
                    kind: *kind,
                    reverse,
                    name: rows::text(&n.node, "name"),
                    member_id: n.key,
                }));
            }
        }
        Ok(out)
    }

    fn member_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM nodes WHERE label = ?1 ORDER BY key")?;
        let ids = stmt
            .query_map(params![NodeLabel::Person.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ConditionStatus, DocumentType, Section};
    use crate::pipeline::graph::{apply_operations, generate_operations, PersonContext};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record() -> MedicalRecord {
        let mut record = MedicalRecord::new("doc-1", DocumentType::MedicalRecord);
        record.document_date = Some(date(2024, 2, 1));
        let mut med = Medication::new("Metformin");
        med.dosage = Some("500 mg".into());
        record.medications.push(med);
        let mut cond = Condition::new("Prediabetes", ConditionStatus::Active);
        cond.code = Some("R73.03".into());
        record.conditions.push(cond);
        record
    }

    #[test]
    fn on_create_only_applies_once() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        let key = NodeKey::person("m-1");
        graph
            .merge_node(&key, &Props::new().with("name", "First"), &Props::new())
            .unwrap();
        graph
            .merge_node(&key, &Props::new().with("name", "Second"), &Props::new().with("role", "member"))
            .unwrap();

        let props = graph.node_props(&key).unwrap().unwrap();
        assert_eq!(props["name"], Value::String("First".into()));
        assert_eq!(props["role"], Value::String("member".into()));
        assert_eq!(props["id"], Value::String("m-1".into()));
        assert_eq!(graph.count_nodes(NodeLabel::Person).unwrap(), 1);
    }

    #[test]
    fn set_overwrites_but_absent_fields_survive() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        let key = NodeKey::new(NodeLabel::Medication, "metformin");
        graph
            .merge_node(&key, &Props::new(), &Props::new().with("dosage", "500 mg").with("frequency", "daily"))
            .unwrap();
        graph
            .merge_node(&key, &Props::new(), &Props::new().with("dosage", "1000 mg"))
            .unwrap();

        let props = graph.node_props(&key).unwrap().unwrap();
        assert_eq!(props["dosage"], Value::String("1000 mg".into()));
        assert_eq!(props["frequency"], Value::String("daily".into()));
    }

    #[test]
    fn edge_to_missing_node_fails() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        graph
            .merge_node(&NodeKey::person("m-1"), &Props::new(), &Props::new())
            .unwrap();
        let err = graph
            .merge_edge(
                &NodeKey::person("m-1"),
                RelType::HasCondition,
                &NodeKey::new(NodeLabel::Condition, "Nope"),
                &Props::new(),
            )
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn reapplying_sequence_is_idempotent() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        let ops = generate_operations(&record(), &PersonContext::new("m-1"));

        let first = apply_operations(&graph, &ops);
        assert_eq!(first.total_failed(), 0);
        let counts = |g: &SqliteGraph| {
            (
                g.count_nodes(NodeLabel::Medication).unwrap(),
                g.count_nodes(NodeLabel::Condition).unwrap(),
                g.count_edges(RelType::HasCondition).unwrap(),
            )
        };
        let before = counts(&graph);
        let second = apply_operations(&graph, &ops);
        assert_eq!(second.total_failed(), 0);
        assert_eq!(before, counts(&graph));
        assert_eq!(before, (1, 1, 1));
    }

    #[test]
    fn reads_back_edge_attributes() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        apply_operations(&graph, &generate_operations(&record(), &PersonContext::new("m-1")));

        let conditions = graph.conditions("m-1").unwrap();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].code.as_deref(), Some("R73.03"));
        assert_eq!(conditions[0].diagnosed_date, Some(date(2024, 2, 1)));

        let meds = graph.medications("m-1").unwrap();
        assert_eq!(meds[0].name, "Metformin");
        assert_eq!(meds[0].dosage.as_deref(), Some("500 mg"));
    }

    #[test]
    fn shared_medication_keeps_each_persons_dose() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        apply_operations(&graph, &generate_operations(&record(), &PersonContext::new("m-1")));

        let mut other = MedicalRecord::new("doc-2", DocumentType::MedicalRecord);
        let mut med = Medication::new("Metformin");
        med.dosage = Some("1000 mg".into());
        med.frequency = Some("twice daily".into());
        other.medications.push(med);
        apply_operations(&graph, &generate_operations(&other, &PersonContext::new("m-2")));

        assert_eq!(graph.count_nodes(NodeLabel::Medication).unwrap(), 1);
        let first = graph.medications("m-1").unwrap();
        assert_eq!(first[0].dosage.as_deref(), Some("500 mg"));
        assert_eq!(first[0].frequency, None);
        let second = graph.medications("m-2").unwrap();
        assert_eq!(second[0].dosage.as_deref(), Some("1000 mg"));
        assert_eq!(second[0].frequency.as_deref(), Some("twice daily"));

        let now = date(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap();
        let text = crate::pipeline::checkpoint::export_checkpoint(&graph, "m-1", now).unwrap();
        assert!(text.contains("| Metformin | 500 mg |"));
        assert!(!text.contains("1000 mg"));
    }

    #[test]
    fn unknown_person_reads_none() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        assert!(graph.person("ghost").unwrap().is_none());
        assert!(graph.aliases("ghost").unwrap().is_empty());
    }

    #[test]
    fn relationships_both_directions() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        for id in ["m-0", "m-1", "m-2"] {
            graph
                .merge_node(&NodeKey::person(id), &Props::new().with("name", id.to_uppercase()), &Props::new())
                .unwrap();
        }
        graph
            .merge_edge(&NodeKey::person("m-0"), RelType::ParentOf, &NodeKey::person("m-1"), &Props::new())
            .unwrap();
        graph
            .merge_edge(&NodeKey::person("m-1"), RelType::SiblingOf, &NodeKey::person("m-2"), &Props::new())
            .unwrap();

        let rels = graph.relationships("m-1").unwrap();
        assert_eq!(rels.len(), 2);
        let parent = rels.iter().find(|r| r.kind == RelationshipKind::ParentOf).unwrap();
        assert!(parent.reverse);
        assert_eq!(parent.member_id, "m-0");
        assert_eq!(parent.name.as_deref(), Some("M-0"));
        let sibling = rels.iter().find(|r| r.kind == RelationshipKind::SiblingOf).unwrap();
        assert!(!sibling.reverse);
    }

    #[test]
    fn insurance_with_facility() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        let person = NodeKey::person("m-1");
        let plan = NodeKey::new(NodeLabel::Insurance, "VA Health Benefits");
        let facility = NodeKey::new(NodeLabel::Facility, "Denver VA");
        let ops = vec![
            Operation::node(Section::Person, person.clone(), Props::new()),
            Operation::node(Section::Person, plan.clone(), Props::new().with("type", "Federal")),
            Operation::node(Section::Person, facility.clone(), Props::new().with("phone", "555-0100")),
            Operation::edge(Section::Person, person, RelType::HasInsurance, plan.clone()),
            Operation::edge(Section::Person, plan, RelType::ProvidedBy, facility),
        ];
        assert_eq!(apply_operations(&graph, &ops).total_failed(), 0);

        let plans = graph.insurance("m-1").unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].plan_type.as_deref(), Some("Federal"));
        assert_eq!(plans[0].facility_name.as_deref(), Some("Denver VA"));
        assert_eq!(plans[0].facility_phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn ingestion_log_records_runs() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        let report = apply_operations(&graph, &generate_operations(&record(), &PersonContext::new("m-1")));
        graph
            .record_ingestion("m-1", "narrative", Some("doc-1"), &report)
            .unwrap();
        assert_eq!(graph.ingestion_count("m-1").unwrap(), 1);
        assert_eq!(graph.ingestion_count("m-2").unwrap(), 0);
    }
}
