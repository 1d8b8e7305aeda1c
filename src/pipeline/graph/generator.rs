//! Entity model → ordered upsert sequence.
//!
//! Operations are emitted so that every edge references nodes merged earlier
//! in the same sequence: the person first, each lab event before its results,
//! the provider before `PERFORMED_BY`.

use chrono::NaiveDate;
use uuid::Uuid;

use super::aliases::{generate_aliases, nickname_aliases};
use super::types::{AliasPlan, NodeKey, Operation, PersonContext, Props};
use crate::models::enums::{AliasSource, MedicationStatus, NodeLabel, RelType, Section};
use crate::models::*;

/// Namespace for deterministic graph identifiers.
const GRAPH_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d79_6176_6965_7700_8000_0000_0000_0001);

/// Turn one parsed record into the upserts that merge it into the person's graph.
pub fn generate_operations(record: &MedicalRecord, ctx: &PersonContext) -> Vec<Operation> {
    let person = NodeKey::person(ctx.member_id());
    let mut ops = Vec::new();

    person_ops(record, ctx, &person, &mut ops);
    alias_ops(ctx, &person, &mut ops);

    let provider = record.provider.as_ref().map(|prov| {
        let key = NodeKey::new(NodeLabel::Provider, prov.name.trim());
        ops.push(Operation::node(
            Section::Provider,
            key.clone(),
            Props::new().maybe_text("facility", prov.facility.as_deref()),
        ));
        key
    });

    medication_ops(&record.medications, &person, &mut ops);
    allergy_ops(&record.allergies, &person, &mut ops);
    condition_ops(&record.conditions, record.document_date, &person, &mut ops);
    procedure_ops(&record.procedures, &person, &mut ops);
    lab_ops(record, ctx.member_id(), &person, provider.as_ref(), &mut ops);
    immunization_ops(&record.immunizations, &person, &mut ops);
    vital_ops(&record.vitals, ctx.member_id(), &person, &mut ops);
    appointment_ops(&record.appointments, &person, &mut ops);
    health_risk_ops(&ctx.health_risks, &person, &mut ops);
    relationship_ops(&ctx.relationships, &person, &mut ops);

    tracing::debug!(
        member_id = %ctx.member_id(),
        document_id = %record.document_id,
        operations = ops.len(),
        "Generated graph operations"
    );
    ops
}

/// Deterministic lab event id: the same panel re-imported lands on the same node.
pub fn lab_event_id(member_id: &str, date: Option<NaiveDate>, label: &str) -> String {
    let date = date.map(|d| d.to_string()).unwrap_or_else(|| "undated".into());
    let seed = format!("{member_id}|{date}|{}", normalize_key(label));
    format!("lab_{}", Uuid::new_v5(&GRAPH_ID_NAMESPACE, seed.as_bytes()))
}

pub fn lab_result_id(event_id: &str, test_name: &str) -> String {
    format!("{event_id}:{}", slugify(test_name))
}

pub fn immunization_id(vaccine: &str, date: Option<NaiveDate>) -> String {
    let date = date.map(|d| d.to_string()).unwrap_or_else(|| "undated".into());
    format!("imm_{}_{date}", slugify(vaccine))
}

pub fn vitals_id(member_id: &str, date: Option<NaiveDate>) -> String {
    let date = date.map(|d| d.to_string()).unwrap_or_else(|| "undated".into());
    format!("vitals_{member_id}_{date}")
}

// ═══════════════════════════════════════════
// Person, aliases
// ═══════════════════════════════════════════

fn person_ops(record: &MedicalRecord, ctx: &PersonContext, person: &NodeKey, ops: &mut Vec<Operation>) {
    let p = &ctx.person;
    let demo = record.demographics.as_ref();

    // Document-derived facts only seed a new node; operator facts always win.
    let extracted_name = p
        .full_legal_name
        .clone()
        .or_else(|| record.patient_name.clone())
        .or_else(|| demo.and_then(|d| d.full_name.clone()))
        .unwrap_or_else(|| "Unknown".to_string());

    let on_create = Props::new()
        .with("name", extracted_name)
        .maybe("date_of_birth", demo.and_then(|d| d.birth_date))
        .maybe_text("gender", demo.and_then(|d| d.gender.as_deref()))
        .maybe_text("address", demo.and_then(|d| d.address.as_deref()));

    let set = Props::new()
        .maybe_text("name", p.name.as_deref().or(p.full_legal_name.as_deref()))
        .maybe_text("full_legal_name", p.full_legal_name.as_deref())
        .maybe_text("preferred_name", p.preferred_name.as_deref())
        .maybe("date_of_birth", p.date_of_birth)
        .maybe_text("gender", p.gender.as_deref())
        .maybe_text("blood_type", p.blood_type.as_deref())
        .maybe_text("role", p.role.as_deref())
        .maybe_text("address", p.address.as_deref());

    ops.push(Operation::MergeNode {
        section: Section::Person,
        node: person.clone(),
        on_create,
        set,
    });

    if let Some(place) = &p.birth_place {
        let location = NodeKey::new(NodeLabel::Location, place.location_id());
        ops.push(Operation::node(
            Section::Person,
            location.clone(),
            Props::new()
                .with("city", place.city.as_str())
                .with("country", place.country.as_str())
                .maybe_text("country_code", place.country_code.as_deref()),
        ));
        ops.push(Operation::edge(
            Section::Person,
            person.clone(),
            RelType::BornIn,
            location,
        ));
    }
}

fn alias_ops(ctx: &PersonContext, person: &NodeKey, ops: &mut Vec<Operation>) {
    let aliases = match &ctx.aliases {
        AliasPlan::Explicit(list) => list.clone(),
        AliasPlan::Derive { extra } => {
            let mut list = match ctx.person.full_legal_name.as_deref() {
                Some(full) => generate_aliases(full, ctx.person.preferred_name.as_deref()),
                None => Vec::new(),
            };
            for nick in nickname_aliases(extra) {
                if !list.iter().any(|a| a.name == nick.name) {
                    list.push(nick);
                }
            }
            list
        }
    };

    for alias in aliases {
        let set = match alias.source {
            // Nicknames never demote an alias already marked primary.
            AliasSource::Nickname => Props::new().with("source", alias.source.as_str()),
            _ => Props::new()
                .with("source", alias.source.as_str())
                .with("is_primary", alias.is_primary),
        };
        let key = NodeKey::new(NodeLabel::Alias, alias.name.as_str());
        ops.push(Operation::node(Section::Aliases, key.clone(), set));
        ops.push(Operation::edge(Section::Aliases, person.clone(), RelType::HasAlias, key));
    }
}

// ═══════════════════════════════════════════
// Clinical entities
// ═══════════════════════════════════════════

fn medication_ops(meds: &[Medication], person: &NodeKey, ops: &mut Vec<Operation>) {
    for med in meds {
        if med.name.trim().is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::Medication, med.name_key());
        ops.push(Operation::node(
            Section::Medications,
            key.clone(),
            Props::new()
                .with("name", med.name.trim())
                .maybe_text("rxnorm_code", med.code.as_deref()),
        ));

        let status = (med.status != MedicationStatus::Unknown).then(|| med.status.as_str());
        ops.push(Operation::MergeEdge {
            section: Section::Medications,
            from: person.clone(),
            rel: RelType::TakesMedication,
            to: key,
            set: Props::new()
                .maybe_text("dosage", med.dosage.as_deref())
                .maybe_text("frequency", med.frequency.as_deref())
                .maybe("start_date", med.start_date)
                .maybe("end_date", med.end_date)
                .maybe("status", status)
                .maybe_text("prescriber", med.prescriber.as_deref()),
        });
    }
}

fn allergy_ops(allergies: &[Allergy], person: &NodeKey, ops: &mut Vec<Operation>) {
    for allergy in allergies {
        if allergy.allergen.trim().is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::Allergy, allergy.allergen.trim());
        ops.push(Operation::node(
            Section::Allergies,
            key.clone(),
            Props::new().maybe_text("code", allergy.code.as_deref()),
        ));
        ops.push(Operation::MergeEdge {
            section: Section::Allergies,
            from: person.clone(),
            rel: RelType::HasAllergy,
            to: key,
            set: Props::new()
                .maybe_text("reaction", allergy.reaction.as_deref())
                .maybe_text("severity", allergy.severity.as_deref()),
        });
    }
}

fn condition_ops(
    conditions: &[Condition],
    document_date: Option<NaiveDate>,
    person: &NodeKey,
    ops: &mut Vec<Operation>,
) {
    for condition in conditions {
        if condition.name.trim().is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::Condition, condition.name.trim());
        ops.push(Operation::node(
            Section::Conditions,
            key.clone(),
            Props::new().maybe_text("icd10_code", condition.code.as_deref()),
        ));
        ops.push(Operation::MergeEdge {
            section: Section::Conditions,
            from: person.clone(),
            rel: RelType::HasCondition,
            to: key,
            set: Props::new()
                .with("status", condition.status.as_str())
                .maybe_text("severity", condition.severity.as_deref())
                .maybe("diagnosed_date", condition.diagnosed_date.or(document_date))
                .maybe("resolved_date", condition.resolved_date)
                .maybe_text("notes", condition.notes.as_deref()),
        });
    }
}

fn procedure_ops(procedures: &[Procedure], person: &NodeKey, ops: &mut Vec<Operation>) {
    for procedure in procedures {
        if procedure.name.trim().is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::Procedure, procedure.name.trim());
        ops.push(Operation::node(
            Section::Procedures,
            key.clone(),
            Props::new().maybe_text("cpt_code", procedure.code.as_deref()),
        ));
        ops.push(Operation::MergeEdge {
            section: Section::Procedures,
            from: person.clone(),
            rel: RelType::HadProcedure,
            to: key,
            set: Props::new().maybe("date", procedure.date),
        });
    }
}

fn lab_ops(
    record: &MedicalRecord,
    member_id: &str,
    person: &NodeKey,
    provider: Option<&NodeKey>,
    ops: &mut Vec<Operation>,
) {
    for panel in &record.lab_panels {
        if panel.results.is_empty() {
            continue;
        }
        let date = panel.date.or(record.document_date);
        let event_id = lab_event_id(member_id, date, &panel.label);
        let event = NodeKey::new(NodeLabel::LabEvent, event_id.as_str());

        ops.push(Operation::MergeNode {
            section: Section::Labs,
            node: event.clone(),
            on_create: Props::new().with("document_type", record.document_type.as_str()),
            set: Props::new()
                .with("label", panel.label.as_str())
                .maybe("date", date)
                .maybe_text("summary", panel.summary.as_deref()),
        });
        ops.push(Operation::edge(Section::Labs, person.clone(), RelType::HadLabEvent, event.clone()));
        if let Some(provider) = provider {
            ops.push(Operation::edge(
                Section::Labs,
                event.clone(),
                RelType::PerformedBy,
                provider.clone(),
            ));
        }

        for result in &panel.results {
            let key = NodeKey::new(NodeLabel::LabResult, lab_result_id(&event_id, &result.test_name));
            ops.push(Operation::node(
                Section::Labs,
                key.clone(),
                Props::new()
                    .with("test_name", result.test_name.as_str())
                    .with("value", result.value.as_str())
                    .maybe_text("unit", result.unit.as_deref())
                    .maybe_text("reference_range", result.reference_range.as_deref())
                    .with("flag", result.flag.as_str())
                    .maybe_text("category", result.category.as_deref()),
            ));
            ops.push(Operation::edge(Section::Labs, event.clone(), RelType::Includes, key));
        }
    }
}

fn immunization_ops(immunizations: &[Immunization], person: &NodeKey, ops: &mut Vec<Operation>) {
    for imm in immunizations {
        if imm.vaccine.trim().is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::Immunization, immunization_id(&imm.vaccine, imm.date));
        ops.push(Operation::node(
            Section::Immunizations,
            key.clone(),
            Props::new()
                .with("vaccine", imm.vaccine.trim())
                .maybe_text("cvx_code", imm.code.as_deref())
                .maybe("date", imm.date),
        ));
        ops.push(Operation::edge(Section::Immunizations, person.clone(), RelType::Received, key));
    }
}

fn vital_ops(vitals: &[VitalSet], member_id: &str, person: &NodeKey, ops: &mut Vec<Operation>) {
    for set in vitals {
        if set.measurements.is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::VitalSigns, vitals_id(member_id, set.date));
        let mut props = Props::new().maybe("date", set.date);
        for m in &set.measurements {
            let field = slugify(&m.name).replace('-', "_");
            if !field.is_empty() {
                props = props.with(&field, m.value.as_str());
            }
        }
        ops.push(Operation::node(Section::Vitals, key.clone(), props));
        ops.push(Operation::edge(Section::Vitals, person.clone(), RelType::HadVitals, key));
    }
}

fn appointment_ops(appointments: &[Appointment], person: &NodeKey, ops: &mut Vec<Operation>) {
    for appt in appointments {
        let key = NodeKey::new(NodeLabel::Appointment, appt.key());
        ops.push(Operation::node(
            Section::Appointments,
            key.clone(),
            Props::new()
                .with("date", appt.date)
                .maybe_text("time", appt.time.as_deref())
                .maybe_text("appointment_type", appt.appointment_type.as_deref())
                .maybe_text("facility", appt.facility.as_deref())
                .maybe_text("clinic", appt.clinic.as_deref())
                .maybe_text("location", appt.location.as_deref()),
        ));
        ops.push(Operation::edge(
            Section::Appointments,
            person.clone(),
            RelType::HasAppointment,
            key,
        ));
    }
}

// ═══════════════════════════════════════════
// Person-level facts
// ═══════════════════════════════════════════

fn health_risk_ops(risks: &[HealthRisk], person: &NodeKey, ops: &mut Vec<Operation>) {
    for risk in risks {
        if risk.name.trim().is_empty() {
            continue;
        }
        let key = NodeKey::new(NodeLabel::HealthRisk, risk.name.trim());
        ops.push(Operation::node(
            Section::HealthRisks,
            key.clone(),
            Props::new().maybe_text("screening", risk.screening.as_deref()),
        ));
        ops.push(Operation::MergeEdge {
            section: Section::HealthRisks,
            from: person.clone(),
            rel: RelType::AtRiskFor,
            to: key,
            set: Props::new().maybe_text("reason", risk.reason.as_deref()),
        });
    }
}

fn relationship_ops(relationships: &[Relationship], person: &NodeKey, ops: &mut Vec<Operation>) {
    for rel in relationships {
        if rel.member_id.trim().is_empty() || rel.member_id == person.key {
            continue;
        }
        let other = NodeKey::person(rel.member_id.trim());
        ops.push(Operation::MergeNode {
            section: Section::Relationships,
            node: other.clone(),
            on_create: Props::new().maybe_text("name", rel.name.as_deref()),
            set: Props::new(),
        });
        let (from, to) = if rel.reverse {
            (other, person.clone())
        } else {
            (person.clone(), other)
        };
        ops.push(Operation::edge(Section::Relationships, from, rel.kind.into(), to));
    }
}
