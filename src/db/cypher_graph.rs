//! Adapter for an external Cypher-speaking graph engine.
//!
//! The engine is consumed through a single primitive: run a parameterized
//! statement, get back rows of named values. Read queries return whole
//! property maps (`properties(x) AS node`) so they decode with the same
//! helpers as the SQLite store. Date values are expected back as ISO text.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::rows::{self, Row};
use super::DatabaseError;
use crate::models::enums::RelationshipKind;
use crate::models::*;
use crate::pipeline::checkpoint::CheckpointSource;
use crate::pipeline::graph::{render_cypher, MutationSink, Operation};

/// The statement interface of an external graph store.
pub trait GraphStore {
    fn run(&self, statement: &str, params: &Map<String, Value>) -> Result<Vec<Row>, DatabaseError>;
}

impl GraphStore for Box<dyn GraphStore> {
    fn run(&self, statement: &str, params: &Map<String, Value>) -> Result<Vec<Row>, DatabaseError> {
        (**self).run(statement, params)
    }
}

const PERSON_QUERY: &str = "MATCH (p:Person {id: $id})
OPTIONAL MATCH (p)-[:BORN_IN]->(loc:Location)
RETURN properties(p) AS node, properties(loc) AS location";

const INSURANCE_QUERY: &str = "MATCH (p:Person {id: $id})-[:HAS_INSURANCE]->(ins:Insurance)
OPTIONAL MATCH (ins)-[:PROVIDED_BY]->(fac:Facility)
RETURN properties(ins) AS node, properties(fac) AS facility";

const ALIASES_QUERY: &str = "MATCH (p:Person {id: $id})-[r:HAS_ALIAS]->(a:Alias)
RETURN properties(a) AS node, properties(r) AS rel";

const ALLERGIES_QUERY: &str = "MATCH (p:Person {id: $id})-[r:HAS_ALLERGY]->(a:Allergy)
RETURN properties(a) AS node, properties(r) AS rel";

const CONDITIONS_QUERY: &str = "MATCH (p:Person {id: $id})-[r:HAS_CONDITION]->(c:Condition)
RETURN properties(c) AS node, properties(r) AS rel";

const MEDICATIONS_QUERY: &str = "MATCH (p:Person {id: $id})-[r:TAKES_MEDICATION]->(m:Medication)
RETURN properties(m) AS node, properties(r) AS rel";

const APPOINTMENTS_QUERY: &str = "MATCH (p:Person {id: $id})-[r:HAS_APPOINTMENT]->(a:Appointment)
WHERE a.date >= date($since)
RETURN properties(a) AS node, properties(r) AS rel";

const LAB_HISTORY_QUERY: &str = "MATCH (p:Person {id: $id})-[:HAD_LAB_EVENT]->(le:LabEvent)
OPTIONAL MATCH (le)-[:INCLUDES]->(lr:LabResult)
RETURN properties(le) AS node, collect(properties(lr)) AS results";

const HEALTH_RISKS_QUERY: &str = "MATCH (p:Person {id: $id})-[r:AT_RISK_FOR]->(h:HealthRisk)
RETURN properties(h) AS node, properties(r) AS rel";

const RELATIONSHIPS_QUERY: &str = "MATCH (p:Person {id: $id})-[r]->(other:Person)
WHERE type(r) IN ['PARENT_OF', 'CHILD_OF', 'SIBLING_OF', 'SPOUSE_OF']
RETURN type(r) AS relationship, false AS reverse, properties(other) AS node
UNION
MATCH (other:Person)-[r]->(p:Person {id: $id})
WHERE type(r) IN ['PARENT_OF', 'CHILD_OF', 'SIBLING_OF', 'SPOUSE_OF']
RETURN type(r) AS relationship, true AS reverse, properties(other) AS node";

const MEMBERS_QUERY: &str = "MATCH (p:Person) RETURN p.id AS id ORDER BY id";

/// Mutation sink and checkpoint source over any [`GraphStore`].
pub struct CypherGraph<S> {
    store: S,
}

impl<S: GraphStore> CypherGraph<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn query(&self, statement: &str, member_id: &str) -> Result<Vec<Row>, DatabaseError> {
        let mut params = Map::new();
        params.insert("id".into(), Value::String(member_id.to_string()));
        self.store.run(statement, &params)
    }

    /// Decode `node`/`rel` pairs with one of the shared row decoders.
    fn pairs<T>(
        &self,
        statement: &str,
        member_id: &str,
        decode: impl Fn(&Row, &Row) -> Option<T>,
    ) -> Result<Vec<T>, DatabaseError> {
        let empty = Row::new();
        Ok(self
            .query(statement, member_id)?
            .iter()
            .filter_map(|row| {
                let node = rows::object(row, "node")?;
                let rel = rows::object(row, "rel").unwrap_or(&empty);
                decode(node, rel)
            })
            .collect())
    }
}

impl<S: GraphStore> MutationSink for CypherGraph<S> {
    fn apply(&self, op: &Operation) -> Result<(), DatabaseError> {
        let statement = render_cypher(op);
        self.store.run(&statement.text, &statement.params)?;
        Ok(())
    }
}

impl<S: GraphStore> CheckpointSource for CypherGraph<S> {
    fn person(&self, member_id: &str) -> Result<Option<Person>, DatabaseError> {
        let found = self.query(PERSON_QUERY, member_id)?;
        Ok(found.first().and_then(|row| {
            let node = rows::object(row, "node")?;
            rows::person_from(node, rows::object(row, "location"))
        }))
    }

    fn insurance(&self, member_id: &str) -> Result<Vec<Insurance>, DatabaseError> {
        Ok(self
            .query(INSURANCE_QUERY, member_id)?
            .iter()
            .filter_map(|row| rows::insurance_from(rows::object(row, "node")?, rows::object(row, "facility")))
            .collect())
    }

    fn aliases(&self, member_id: &str) -> Result<Vec<Alias>, DatabaseError> {
        self.pairs(ALIASES_QUERY, member_id, |node, _| rows::alias_from(node))
    }

    fn allergies(&self, member_id: &str) -> Result<Vec<Allergy>, DatabaseError> {
        self.pairs(ALLERGIES_QUERY, member_id, rows::allergy_from)
    }

    fn conditions(&self, member_id: &str) -> Result<Vec<Condition>, DatabaseError> {
        self.pairs(CONDITIONS_QUERY, member_id, rows::condition_from)
    }

    fn medications(&self, member_id: &str) -> Result<Vec<Medication>, DatabaseError> {
        self.pairs(MEDICATIONS_QUERY, member_id, rows::medication_from)
    }

    fn appointments_since(
        &self,
        member_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut params = Map::new();
        params.insert("id".into(), Value::String(member_id.to_string()));
        params.insert("since".into(), Value::String(since.to_string()));
        Ok(self
            .store
            .run(APPOINTMENTS_QUERY, &params)?
            .iter()
            .filter_map(|row| rows::appointment_from(rows::object(row, "node")?))
            .filter(|a| a.date >= since)
            .collect())
    }

    fn lab_history(&self, member_id: &str) -> Result<Vec<LabPanel>, DatabaseError> {
        Ok(self
            .query(LAB_HISTORY_QUERY, member_id)?
            .iter()
            .filter_map(|row| {
                let node = rows::object(row, "node")?;
                let results: Vec<Row> = row
                    .get("results")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(|v| v.as_object().cloned()).collect())
                    .unwrap_or_default();
                Some(rows::lab_panel_from(node, &results))
            })
            .collect())
    }

    fn health_risks(&self, member_id: &str) -> Result<Vec<HealthRisk>, DatabaseError> {
        self.pairs(HEALTH_RISKS_QUERY, member_id, rows::health_risk_from)
    }

    fn relationships(&self, member_id: &str) -> Result<Vec<Relationship>, DatabaseError> {
        Ok(self
            .query(RELATIONSHIPS_QUERY, member_id)?
            .iter()
            .filter_map(|row| {
                let kind: RelationshipKind = rows::text(row, "relationship")?.parse().ok()?;
                let node = rows::object(row, "node")?;
                Some(Relationship {
                    kind,
                    reverse: rows::flag(row, "reverse"),
                    name: rows::text(node, "name"),
                    member_id: rows::text(node, "id")?,
                })
            })
            .collect())
    }

    fn member_ids(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self
            .store
            .run(MEMBERS_QUERY, &Map::new())?
            .iter()
            .filter_map(|row| rows::text(row, "id"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ConditionStatus, DocumentType};
    use crate::pipeline::graph::{apply_operations, generate_operations, PersonContext};
    use serde_json::json;
    use std::cell::RefCell;

    /// Records every statement; answers reads from canned rows keyed by a
    /// fragment of the statement text.
    #[derive(Default)]
    struct ScriptedStore {
        calls: RefCell<Vec<(String, Map<String, Value>)>>,
        answers: Vec<(&'static str, Vec<Row>)>,
    }

    impl GraphStore for ScriptedStore {
        fn run(&self, statement: &str, params: &Map<String, Value>) -> Result<Vec<Row>, DatabaseError> {
            self.calls
                .borrow_mut()
                .push((statement.to_string(), params.clone()));
            if statement.contains("Condition {name: $to_key}") && params["to_key"] == "Broken" {
                return Err(DatabaseError::Store("constraint".into()));
            }
            Ok(self
                .answers
                .iter()
                .find(|(fragment, _)| statement.contains(fragment))
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn mutations_render_one_statement_each() {
        let mut record = MedicalRecord::new("doc-1", DocumentType::MedicalRecord);
        record
            .conditions
            .push(Condition::new("Prediabetes", ConditionStatus::Active));
        record
            .conditions
            .push(Condition::new("Broken", ConditionStatus::Active));
        let ops = generate_operations(&record, &PersonContext::new("m-1"));

        let graph = CypherGraph::new(ScriptedStore::default());
        let report = apply_operations(&graph, &ops);

        let calls = graph.store().calls.borrow();
        assert_eq!(calls.len(), ops.len());
        assert!(calls[0].0.starts_with("MERGE (n:Person {id: $key})"));
        assert_eq!(report.total_failed(), 1);
        assert_eq!(report.warnings[0].entity, "Person(m-1)-[HAS_CONDITION]->Condition(Broken)");
    }

    #[test]
    fn reads_decode_property_maps() {
        let store = ScriptedStore {
            answers: vec![
                (
                    "BORN_IN",
                    vec![row(json!({
                        "node": {"id": "m-1", "name": "Collin Paran", "date_of_birth": "1990-05-01"},
                        "location": {"city": "Manila", "country": "Philippines", "country_code": "PH"}
                    }))],
                ),
                (
                    "HAS_CONDITION",
                    vec![row(json!({
                        "node": {"name": "Fatty Liver", "icd10_code": "K76.0"},
                        "rel": {"status": "suspected", "severity": "mild"}
                    }))],
                ),
                (
                    "HAD_LAB_EVENT",
                    vec![row(json!({
                        "node": {"id": "lab_1", "label": "lab_result", "date": "2024-02-01"},
                        "results": [{"test_name": "ALT", "value": "62", "unit": "U/L", "flag": "high"}]
                    }))],
                ),
                (
                    "SPOUSE_OF",
                    vec![row(json!({
                        "relationship": "SPOUSE_OF", "reverse": true,
                        "node": {"id": "m-2", "name": "Ana"}
                    }))],
                ),
            ],
            ..ScriptedStore::default()
        };
        let graph = CypherGraph::new(store);

        let person = graph.person("m-1").unwrap().unwrap();
        assert_eq!(person.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 1));
        assert_eq!(person.birth_place.unwrap().country_code.as_deref(), Some("PH"));

        let conditions = graph.conditions("m-1").unwrap();
        assert_eq!(conditions[0].status, ConditionStatus::Suspected);

        let labs = graph.lab_history("m-1").unwrap();
        assert_eq!(labs[0].results[0].test_name, "ALT");
        assert_eq!(labs[0].date, NaiveDate::from_ymd_opt(2024, 2, 1));

        let rels = graph.relationships("m-1").unwrap();
        assert_eq!(rels.len(), 1);
        assert!(rels[0].reverse);
        assert_eq!(rels[0].member_id, "m-2");

        let calls = graph.store().calls.borrow();
        assert!(calls.iter().all(|(_, p)| p.get("id") == Some(&json!("m-1"))));
    }

    #[test]
    fn unknown_member_reads_none() {
        let graph = CypherGraph::new(ScriptedStore::default());
        assert!(graph.person("ghost").unwrap().is_none());
        assert!(graph.member_ids().unwrap().is_empty());
    }
}
