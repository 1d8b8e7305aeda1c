use serde_json::{Map, Value};

use super::types::{NodeKey, Operation, PropValue, Props};

/// A parameterized statement for a Cypher-speaking store.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Map<String, Value>,
}

/// Render one upsert as `MERGE … ON CREATE SET … SET …`.
///
/// Labels, relationship types and property names come from closed
/// vocabularies or slugs, so only values travel as parameters.
pub fn render_cypher(op: &Operation) -> Statement {
    let mut params = Map::new();
    let mut lines = Vec::new();

    match op {
        Operation::MergeNode {
            node,
            on_create,
            set,
            ..
        } => {
            lines.push(format!("MERGE (n:{})", key_pattern(node, "key", &mut params)));
            if let Some(clause) = assignments("n", "c", on_create, &mut params) {
                lines.push(format!("ON CREATE SET {clause}"));
            }
            if let Some(clause) = assignments("n", "s", set, &mut params) {
                lines.push(format!("SET {clause}"));
            }
        }
        Operation::MergeEdge {
            from, rel, to, set, ..
        } => {
            lines.push(format!("MATCH (a:{})", key_pattern(from, "from_key", &mut params)));
            lines.push(format!("MATCH (b:{})", key_pattern(to, "to_key", &mut params)));
            lines.push(format!("MERGE (a)-[r:{rel}]->(b)"));
            if let Some(clause) = assignments("r", "s", set, &mut params) {
                lines.push(format!("SET {clause}"));
            }
        }
    }

    Statement {
        text: lines.join("\n"),
        params,
    }
}

fn key_pattern(node: &NodeKey, param: &str, params: &mut Map<String, Value>) -> String {
    params.insert(param.to_string(), Value::String(node.key.clone()));
    format!("{} {{{}: ${param}}}", node.label, node.label.key_field())
}

fn assignments(
    var: &str,
    prefix: &str,
    props: &Props,
    params: &mut Map<String, Value>,
) -> Option<String> {
    if props.is_empty() {
        return None;
    }
    let parts: Vec<String> = props
        .iter()
        .map(|(field, value)| {
            let param = format!("{prefix}_{field}");
            params.insert(param.clone(), value.to_json());
            match value {
                PropValue::Date(_) => format!("{var}.{field} = date(${param})"),
                _ => format!("{var}.{field} = ${param}"),
            }
        })
        .collect();
    Some(parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{NodeLabel, RelType, Section};
    use chrono::NaiveDate;

    #[test]
    fn node_with_create_and_set() {
        let op = Operation::MergeNode {
            section: Section::Medications,
            node: NodeKey::new(NodeLabel::Medication, "metformin"),
            on_create: Props::new().with("name", "Metformin"),
            set: Props::new().with("dosage", "500 mg"),
        };
        let stmt = render_cypher(&op);
        assert_eq!(
            stmt.text,
            "MERGE (n:Medication {name_key: $key})\n\
             ON CREATE SET n.name = $c_name\n\
             SET n.dosage = $s_dosage"
        );
        assert_eq!(stmt.params["key"], Value::String("metformin".into()));
        assert_eq!(stmt.params["s_dosage"], Value::String("500 mg".into()));
    }

    #[test]
    fn node_without_props_is_bare_merge() {
        let op = Operation::node(
            Section::Aliases,
            NodeKey::new(NodeLabel::Alias, "Collin Paran"),
            Props::new(),
        );
        assert_eq!(render_cypher(&op).text, "MERGE (n:Alias {name: $key})");
    }

    #[test]
    fn edge_dates_wrapped() {
        let op = Operation::MergeEdge {
            section: Section::Conditions,
            from: NodeKey::person("m-1"),
            rel: RelType::HasCondition,
            to: NodeKey::new(NodeLabel::Condition, "Prediabetes"),
            set: Props::new()
                .with("status", "active")
                .with("diagnosed_date", NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
        };
        let stmt = render_cypher(&op);
        assert_eq!(
            stmt.text,
            "MATCH (a:Person {id: $from_key})\n\
             MATCH (b:Condition {name: $to_key})\n\
             MERGE (a)-[r:HAS_CONDITION]->(b)\n\
             SET r.status = $s_status, r.diagnosed_date = date($s_diagnosed_date)"
        );
        assert_eq!(stmt.params["s_diagnosed_date"], Value::String("2024-03-05".into()));
        assert_eq!(stmt.params.len(), 4);
    }
}
