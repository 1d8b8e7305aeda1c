use chrono::NaiveDate;
use uuid::Uuid;

use super::sections::CATALOG;
use super::xml::{parse_document, XmlElement};
use super::CcdError;
use crate::config::DOCUMENT_ID_NAMESPACE;
use crate::models::enums::DocumentType;
use crate::models::*;

/// Parse a C-CDA document into one record.
///
/// Only malformed XML fails the parse. Missing sections come back empty and
/// unreadable entries are skipped with a warning on the record.
pub fn parse_ccd(bytes: &[u8]) -> Result<MedicalRecord, CcdError> {
    let root = parse_document(bytes)?;

    let document_id = format!("ccd_{}", Uuid::new_v5(&DOCUMENT_ID_NAMESPACE, bytes));
    let mut record = MedicalRecord::new(document_id, DocumentType::ClinicalDocument);

    read_metadata(&root, &mut record);
    record.demographics = read_demographics(&root);
    record.patient_name = record
        .demographics
        .as_ref()
        .and_then(|d| d.full_name.clone());

    for spec in CATALOG {
        match find_section(&root, spec.template_id) {
            Some(section) => spec.extract(section, &mut record),
            None => tracing::debug!(section = %spec.section, "CCD section not present"),
        }
    }

    tracing::info!(
        document_id = %record.document_id,
        medications = record.medications.len(),
        allergies = record.allergies.len(),
        conditions = record.conditions.len(),
        lab_panels = record.lab_panels.len(),
        skipped = record.warnings.len(),
        "Parsed CCD document"
    );
    Ok(record)
}

/// HL7 timestamp (`YYYYMMDD[hhmm[ss]][±zone]`) to a calendar date.
///
/// The zone is dropped and the first eight digits are read. Shorter values
/// and impossible dates give `None`.
pub fn format_hl7_date(raw: &str) -> Option<NaiveDate> {
    let stamp = raw.trim().split(['+', '-']).next()?;
    let digits = stamp.get(..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

fn find_section<'a>(root: &'a XmlElement, template_id: &str) -> Option<&'a XmlElement> {
    root.find_all("section").into_iter().find(|section| {
        section
            .children_named("templateId")
            .any(|t| t.attr("root") == Some(template_id))
    })
}

fn read_metadata(root: &XmlElement, record: &mut MedicalRecord) {
    record.title = root.child("title").and_then(|t| t.text()).map(str::to_string);
    record.document_date = root
        .child("effectiveTime")
        .and_then(|t| t.attr("value"))
        .and_then(format_hl7_date);

    let author = root.find_path(&["author", "assignedAuthor"]);
    record.source_organization = author
        .and_then(|a| a.find_path(&["representedOrganization", "name"]))
        .and_then(|n| n.text())
        .map(str::to_string);

    record.provider = author
        .and_then(|a| a.path(&["assignedPerson", "name"]))
        .and_then(person_name)
        .map(|name| Provider {
            name,
            facility: record.source_organization.clone(),
        });
}

/// `given family` from an HL7 name element, or its plain text.
fn person_name(name: &XmlElement) -> Option<String> {
    let parts: Vec<&str> = name
        .children
        .iter()
        .filter(|c| matches!(c.name.as_str(), "given" | "family"))
        .filter_map(|c| c.text())
        .collect();
    if parts.is_empty() {
        name.text().map(str::to_string)
    } else {
        Some(parts.join(" "))
    }
}

fn read_demographics(root: &XmlElement) -> Option<Demographics> {
    let role = root.find_path(&["recordTarget", "patientRole"])?;
    let patient = role.child("patient")?;

    let name = patient.child("name");
    let text_of = |el: Option<&XmlElement>, child: &str| {
        el.and_then(|e| e.child(child))
            .and_then(|c| c.text())
            .map(str::to_string)
    };
    let given_name = text_of(name, "given");
    let family_name = text_of(name, "family");
    let full_name = match (&given_name, &family_name) {
        (Some(g), Some(f)) => Some(format!("{g} {f}")),
        _ => name.and_then(person_name),
    };

    let address = role.child("addr").and_then(|addr| {
        let part = |n: &str| text_of(Some(addr), n);
        let mut pieces = Vec::new();
        if let Some(street) = part("streetAddressLine") {
            pieces.push(street);
        }
        if let (Some(city), Some(state)) = (part("city"), part("state")) {
            let zip = part("postalCode").unwrap_or_default();
            pieces.push(format!("{city}, {state} {zip}").trim_end().to_string());
        }
        (!pieces.is_empty()).then(|| pieces.join(" "))
    });

    Some(Demographics {
        given_name,
        family_name,
        full_name,
        birth_date: patient
            .child("birthTime")
            .and_then(|b| b.attr("value"))
            .and_then(format_hl7_date),
        gender: patient
            .child("administrativeGenderCode")
            .and_then(|g| g.attr("displayName").or_else(|| g.attr("code")))
            .map(str::to_string),
        address,
    })
}
