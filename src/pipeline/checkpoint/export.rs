use chrono::{Months, NaiveDate, NaiveDateTime};

use super::table::{cell, header, row};
use super::types::CheckpointSource;
use super::CheckpointError;
use crate::config::CHECKPOINT_FORMAT_VERSION;
use crate::models::*;

/// Render the canonical checkpoint document for one member.
///
/// Sections with no rows are left out. `now` drives the header timestamps,
/// the trailing comment and the one-year appointment window.
pub fn export_checkpoint(
    source: &impl CheckpointSource,
    member_id: &str,
    now: NaiveDateTime,
) -> Result<String, CheckpointError> {
    let person = source
        .person(member_id)?
        .ok_or_else(|| CheckpointError::MemberNotFound(member_id.to_string()))?;

    let since = now
        .date()
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);

    let mut out = Vec::new();
    let stamp = now.format("%Y-%m-%d %H:%M").to_string();

    out.push(format!("# Medical Checkpoint: {}", person.display_name()));
    out.push(String::new());
    out.push(format!("**Generated:** {stamp}"));
    out.push(format!("**Member ID:** `{member_id}`"));
    out.push(String::new());

    personal_section(&person, &mut out);
    insurance_section(&source.insurance(member_id)?, &mut out);
    alias_section(source.aliases(member_id)?, &mut out);
    allergy_section(source.allergies(member_id)?, &mut out);
    condition_section(source.conditions(member_id)?, &mut out);
    medication_section(source.medications(member_id)?, &mut out);
    appointment_section(source.appointments_since(member_id, since)?, &mut out);
    health_risk_section(source.health_risks(member_id)?, &mut out);
    lab_section(source.lab_history(member_id)?, &mut out);
    relationship_section(source.relationships(member_id)?, &mut out);

    out.push("---".into());
    out.push(String::new());
    out.push(format!("*Document generated: {stamp}*"));
    out.push(String::new());
    out.push("---".into());
    out.push(String::new());
    out.push("<!-- CHECKPOINT_DATA".into());
    out.push(format!("member_id: {member_id}"));
    out.push(format!("export_version: {CHECKPOINT_FORMAT_VERSION}"));
    out.push(format!("exported_at: {}", now.format("%Y-%m-%dT%H:%M:%S")));
    out.push("-->".into());

    tracing::info!(member_id = %member_id, lines = out.len(), "Exported checkpoint");
    Ok(out.join("\n") + "\n")
}

fn iso(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn table(title: &str, columns: &[&str], rows: Vec<Vec<String>>, out: &mut Vec<String>) {
    if rows.is_empty() {
        return;
    }
    out.push(format!("## {title}"));
    out.push(String::new());
    out.extend(header(columns));
    out.extend(rows.iter().map(|cells| row(cells)));
    out.push(String::new());
}

fn personal_section(person: &Person, out: &mut Vec<String>) {
    let field = |name: &str, value: Option<&str>| row(&[format!("**{name}**"), cell(value)]);

    out.push("## Personal Information".into());
    out.push(String::new());
    out.extend(header(&["Field", "Value"]));
    out.push(field("Name", person.name.as_deref()));
    out.push(field("Full Legal Name", person.full_legal_name.as_deref()));
    out.push(field("Preferred Name", person.preferred_name.as_deref()));
    out.push(field("Date of Birth", iso(person.date_of_birth).as_deref()));
    out.push(field("Gender", person.gender.as_deref()));
    out.push(field("Blood Type", person.blood_type.as_deref()));
    out.push(field("Role", person.role.as_deref()));
    if let Some(place) = &person.birth_place {
        out.push(field("Birth City", Some(place.city.as_str())));
        out.push(field("Birth Country", Some(place.country.as_str())));
        out.push(field("Country Code", place.country_code.as_deref()));
    }
    if person.address.is_some() {
        out.push(field("Current Address", person.address.as_deref()));
    }
    out.push(String::new());
}

fn insurance_section(plans: &[Insurance], out: &mut Vec<String>) {
    if plans.is_empty() {
        return;
    }
    let mut plans = plans.to_vec();
    plans.sort_by(|a, b| a.name.cmp(&b.name));

    out.push("## Healthcare Providers & Insurance".into());
    out.push(String::new());
    for plan in plans {
        out.push(format!("### {}", plan.name));
        out.push(String::new());
        let bullets = [
            ("Type", plan.plan_type),
            ("Member ID", plan.member_number),
            ("Group Number", plan.group_number),
            ("Primary Facility", plan.facility_name),
            ("Facility Address", plan.facility_address),
            ("Phone", plan.facility_phone),
        ];
        for (label, value) in bullets {
            if let Some(value) = value {
                out.push(format!("- **{label}:** {value}"));
            }
        }
        out.push(String::new());
    }
}

fn alias_section(mut aliases: Vec<Alias>, out: &mut Vec<String>) {
    aliases.sort_by(|a, b| b.is_primary.cmp(&a.is_primary).then_with(|| a.name.cmp(&b.name)));
    let rows = aliases
        .into_iter()
        .map(|a| {
            vec![
                cell(Some(a.name.as_str())),
                a.source.as_str().to_string(),
                if a.is_primary { "Yes".into() } else { "-".into() },
            ]
        })
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        out.push("## Name Aliases".into());
        out.push(String::new());
        out.push("These names may appear on medical records and should be linked to this person:".into());
        out.push(String::new());
        out.extend(header(&["Alias", "Source", "Primary"]));
        out.extend(rows.iter().map(|cells| row(cells)));
        out.push(String::new());
    }
}

fn allergy_section(mut allergies: Vec<Allergy>, out: &mut Vec<String>) {
    allergies.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.allergen.cmp(&b.allergen))
    });
    let rows = allergies
        .iter()
        .map(|a| {
            vec![
                cell(Some(a.allergen.as_str())),
                cell(a.severity.as_deref()),
                cell(a.reaction.as_deref()),
            ]
        })
        .collect();
    table("Allergies", &["Allergen", "Severity", "Reaction"], rows, out);
}

fn condition_section(mut conditions: Vec<Condition>, out: &mut Vec<String>) {
    conditions.sort_by(|a, b| {
        a.status
            .as_str()
            .cmp(b.status.as_str())
            .then_with(|| a.name.cmp(&b.name))
    });
    let rows = conditions
        .iter()
        .map(|c| {
            vec![
                cell(Some(c.name.as_str())),
                cell(c.code.as_deref()),
                c.status.as_str().to_string(),
                cell(c.severity.as_deref()),
                cell(iso(c.diagnosed_date).as_deref()),
                cell(c.notes.as_deref()),
            ]
        })
        .collect();
    table(
        "Current Conditions",
        &["Condition", "ICD-10", "Status", "Severity", "Diagnosed", "Notes"],
        rows,
        out,
    );
}

fn medication_section(mut meds: Vec<Medication>, out: &mut Vec<String>) {
    meds.sort_by_key(|m| m.name_key());
    let rows = meds
        .iter()
        .map(|m| {
            vec![
                cell(Some(m.name.as_str())),
                cell(m.dosage.as_deref()),
                cell(m.frequency.as_deref()),
                cell(iso(m.start_date).as_deref()),
                cell(m.prescriber.as_deref()),
            ]
        })
        .collect();
    table(
        "Current Medications",
        &["Medication", "Dosage", "Frequency", "Started", "Prescriber"],
        rows,
        out,
    );
}

fn appointment_section(mut appts: Vec<Appointment>, out: &mut Vec<String>) {
    appts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.time.cmp(&b.time)));
    let rows = appts
        .iter()
        .map(|a| {
            vec![
                a.date.format("%Y-%m-%d").to_string(),
                cell(a.time.as_deref()),
                cell(a.appointment_type.as_deref()),
                cell(a.facility.as_deref()),
                cell(a.clinic.as_deref()),
                cell(a.location.as_deref()),
            ]
        })
        .collect();
    table(
        "Recent Appointments (Past Year)",
        &["Date", "Time", "Type", "Facility", "Clinic", "Location"],
        rows,
        out,
    );
}

fn health_risk_section(mut risks: Vec<HealthRisk>, out: &mut Vec<String>) {
    if risks.is_empty() {
        return;
    }
    risks.sort_by(|a, b| a.name.cmp(&b.name));
    out.push("## Health Risks".into());
    out.push(String::new());
    for risk in risks {
        out.push(format!("### {}", risk.name));
        if let Some(reason) = &risk.reason {
            out.push(format!("- **Reason:** {reason}"));
        }
        if let Some(screening) = &risk.screening {
            out.push(format!("- **Screening:** {screening}"));
        }
        out.push(String::new());
    }
}

fn lab_section(mut panels: Vec<LabPanel>, out: &mut Vec<String>) {
    panels.retain(|p| !p.results.is_empty());
    if panels.is_empty() {
        return;
    }
    // Most recent first; undated panels last.
    panels.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.label.cmp(&b.label)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.label.cmp(&b.label),
    });

    out.push("## Lab Results History".into());
    out.push(String::new());
    for panel in panels {
        let date = iso(panel.date).unwrap_or_else(|| "Undated".into());
        out.push(format!("### {date} - {}", panel.label));
        out.push(String::new());
        out.extend(header(&["Test", "Result", "Reference Range", "Status", "Category"]));
        let mut results = panel.results;
        results.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.test_name.cmp(&b.test_name))
        });
        for r in results {
            out.push(row(&[
                cell(Some(r.test_name.as_str())),
                cell(Some(r.value_with_unit().as_str())),
                cell(r.reference_range.as_deref()),
                r.flag.display_status(),
                cell(r.category.as_deref()),
            ]));
        }
        out.push(String::new());
    }
}

fn relationship_section(mut rels: Vec<Relationship>, out: &mut Vec<String>) {
    rels.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.reverse.cmp(&b.reverse))
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    let rows = rels
        .iter()
        .map(|r| {
            vec![
                r.kind.display_label(r.reverse),
                cell(r.name.as_deref()),
                format!("`{}`", r.member_id),
            ]
        })
        .collect();
    table(
        "Family Relationships",
        &["Relationship", "Name", "Member ID"],
        rows,
        out,
    );
}
