use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::table::{is_separator, split_row, unwrap_marks, value};
use super::types::CheckpointData;
use super::CheckpointError;
use crate::config::CHECKPOINT_FORMAT_VERSION;
use crate::models::enums::{
    AliasSource, ConditionStatus, DocumentType, LabFlag, MedicationStatus, RelationshipKind,
    Section,
};
use crate::models::*;
use crate::pipeline::graph::{
    apply_operations, generate_operations, AliasPlan, ApplyReport, MutationSink, Operation,
    PersonContext,
};

static DATA_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--\s*CHECKPOINT_DATA(.*?)-->").unwrap());

static DATA_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(member_id|export_version|exported_at):\s*(\S+)\s*$").unwrap()
});

static MEMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Member ID:\*\*\s*`([A-Za-z0-9_.\-]+)`").unwrap());

/// `<number> <unit>` as written by export; text results stay whole.
static NUMERIC_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([<>]=?\d+(?:\.\d+)?)\s+(\S.*)$").unwrap());

static MEMBER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap());

/// Which `## ` block the reader is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Preamble,
    Personal,
    Insurance,
    Aliases,
    Allergies,
    Conditions,
    Medications,
    Appointments,
    HealthRisks,
    Labs,
    Relationships,
    Other,
}

impl Block {
    fn from_heading(heading: &str) -> Self {
        let h = heading.trim().to_lowercase();
        match h.as_str() {
            "personal information" => Self::Personal,
            "healthcare providers & insurance" => Self::Insurance,
            "name aliases" => Self::Aliases,
            "allergies" => Self::Allergies,
            "current conditions" => Self::Conditions,
            "current medications" => Self::Medications,
            "health risks" => Self::HealthRisks,
            "lab results history" => Self::Labs,
            "family relationships" => Self::Relationships,
            _ if h.starts_with("recent appointments") => Self::Appointments,
            _ => Self::Other,
        }
    }

    /// Fewest cells a data row needs before it is read.
    fn min_cells(self) -> usize {
        match self {
            Self::Personal | Self::Aliases | Self::Labs => 2,
            Self::Conditions | Self::Relationships => 3,
            _ => 1,
        }
    }

    fn section(self) -> Option<Section> {
        Some(match self {
            Self::Personal => Section::Person,
            Self::Aliases => Section::Aliases,
            Self::Allergies => Section::Allergies,
            Self::Conditions => Section::Conditions,
            Self::Medications => Section::Medications,
            Self::Appointments => Section::Appointments,
            Self::HealthRisks => Section::HealthRisks,
            Self::Labs => Section::Labs,
            Self::Relationships => Section::Relationships,
            Self::Preamble | Self::Insurance | Self::Other => return None,
        })
    }
}

/// Read a checkpoint document back into entity form.
///
/// The member id in the trailing `CHECKPOINT_DATA` comment wins over the
/// `**Member ID:**` line. Rows too short for their section are skipped and
/// tallied on the record; unknown sections are ignored.
pub fn parse_checkpoint(text: &str) -> Result<CheckpointData, CheckpointError> {
    let (member_id, export_version, exported_at) = read_identity(text)?;

    if let Some(version) = &export_version {
        if version != CHECKPOINT_FORMAT_VERSION {
            tracing::warn!(
                member_id = %member_id,
                version = %version,
                expected = CHECKPOINT_FORMAT_VERSION,
                "Checkpoint written by a different format version"
            );
        }
    }

    let mut reader = Reader::new(&member_id);
    for (line_no, line) in text.lines().enumerate() {
        reader.line(line_no + 1, line);
    }
    let Reader {
        person,
        aliases,
        health_risks,
        relationships,
        mut record,
        panel,
        ..
    } = reader;
    if let Some(panel) = panel {
        record.lab_panels.push(panel);
    }

    tracing::info!(
        member_id = %member_id,
        conditions = record.conditions.len(),
        medications = record.medications.len(),
        lab_panels = record.lab_panels.len(),
        skipped = record.warnings.len(),
        "Parsed checkpoint"
    );

    Ok(CheckpointData {
        member_id,
        export_version,
        exported_at,
        person,
        aliases,
        health_risks,
        relationships,
        record,
    })
}

/// Upserts that merge a parsed checkpoint into the graph. Aliases are taken
/// as written, never re-derived.
pub fn checkpoint_operations(data: &CheckpointData) -> Vec<Operation> {
    let ctx = PersonContext {
        person: data.person.clone(),
        aliases: AliasPlan::Explicit(data.aliases.clone()),
        relationships: data.relationships.clone(),
        health_risks: data.health_risks.clone(),
    };
    generate_operations(&data.record, &ctx)
}

/// Parse and apply in one step.
pub fn import_checkpoint(
    sink: &impl MutationSink,
    text: &str,
) -> Result<(CheckpointData, ApplyReport), CheckpointError> {
    let data = parse_checkpoint(text)?;
    let report = apply_operations(sink, &checkpoint_operations(&data));
    Ok((data, report))
}

fn read_identity(
    text: &str,
) -> Result<(String, Option<String>, Option<String>), CheckpointError> {
    let mut member_id = None;
    let mut export_version = None;
    let mut exported_at = None;

    if let Some(block) = DATA_BLOCK.captures(text).and_then(|c| c.get(1)) {
        for field in DATA_FIELD.captures_iter(block.as_str()) {
            let v = field[2].to_string();
            match &field[1] {
                "member_id" if MEMBER_ID.is_match(&v) => member_id = Some(v),
                "export_version" => export_version = Some(v),
                "exported_at" => exported_at = Some(v),
                _ => {}
            }
        }
    }

    let member_id = member_id
        .or_else(|| MEMBER_LINE.captures(text).map(|c| c[1].to_string()))
        .ok_or(CheckpointError::MissingIdentity)?;
    Ok((member_id, export_version, exported_at))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%B %d, %Y"))
        .ok()
}

struct Reader {
    block: Block,
    in_table: bool,
    person: Person,
    aliases: Vec<Alias>,
    health_risks: Vec<HealthRisk>,
    relationships: Vec<Relationship>,
    record: MedicalRecord,
    panel: Option<LabPanel>,
    birth_city: Option<String>,
    birth_country: Option<String>,
    birth_code: Option<String>,
}

impl Reader {
    fn new(member_id: &str) -> Self {
        Self {
            block: Block::Preamble,
            in_table: false,
            person: Person::new(member_id),
            aliases: Vec::new(),
            health_risks: Vec::new(),
            relationships: Vec::new(),
            record: MedicalRecord::new(
                format!("checkpoint:{member_id}"),
                DocumentType::MedicalRecord,
            ),
            panel: None,
            birth_city: None,
            birth_country: None,
            birth_code: None,
        }
    }

    fn line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();

        if let Some(heading) = trimmed.strip_prefix("## ") {
            self.close_panel();
            self.block = Block::from_heading(heading);
            self.in_table = false;
            return;
        }

        if let Some(heading) = trimmed.strip_prefix("### ") {
            self.in_table = false;
            match self.block {
                Block::Labs => self.open_panel(heading),
                Block::HealthRisks => self.health_risks.push(HealthRisk {
                    name: heading.trim().to_string(),
                    reason: None,
                    screening: None,
                }),
                _ => {}
            }
            return;
        }

        if self.block == Block::HealthRisks {
            if let Some(risk) = self.health_risks.last_mut() {
                if let Some(reason) = trimmed.strip_prefix("- **Reason:**") {
                    risk.reason = value(reason);
                } else if let Some(screening) = trimmed.strip_prefix("- **Screening:**") {
                    risk.screening = value(screening);
                }
            }
            return;
        }

        let Some(cells) = split_row(trimmed) else {
            self.in_table = false;
            return;
        };
        if !self.in_table {
            // First row of a table is its header.
            self.in_table = true;
            return;
        }
        if is_separator(&cells) {
            return;
        }

        if cells.len() < self.block.min_cells() {
            self.skip(line_no, format!("expected at least {} cells", self.block.min_cells()));
            return;
        }
        if let Err(reason) = self.row(&cells) {
            self.skip(line_no, reason);
        }
    }

    fn skip(&mut self, line_no: usize, reason: String) {
        let Some(section) = self.block.section() else {
            return;
        };
        tracing::debug!(section = %section, line = line_no, reason = %reason, "Skipped checkpoint row");
        self.record.record_skip(EntryWarning {
            section,
            index: line_no,
            reason,
        });
    }

    fn row(&mut self, cells: &[String]) -> Result<(), String> {
        let cell = |i: usize| cells.get(i).and_then(|c| value(c));

        match self.block {
            Block::Personal => self.personal_field(&unwrap_marks(&cells[0]), cell(1)),
            Block::Aliases => {
                let name = cell(0).ok_or("alias without a name")?;
                let source = cell(1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(AliasSource::Unknown);
                let mut alias = Alias::new(name, source);
                alias.is_primary = cell(2).is_some_and(|p| p.eq_ignore_ascii_case("yes"));
                self.aliases.push(alias);
            }
            Block::Allergies => {
                let mut allergy = Allergy::new(cell(0).ok_or("allergy without an allergen")?);
                allergy.severity = cell(1);
                allergy.reaction = cell(2);
                self.record.allergies.push(allergy);
            }
            Block::Conditions => {
                let status = cell(2)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(ConditionStatus::Active);
                let mut condition =
                    Condition::new(cell(0).ok_or("condition without a name")?, status);
                condition.code = cell(1);
                condition.severity = cell(3);
                condition.diagnosed_date = cell(4).as_deref().and_then(parse_date);
                condition.notes = cell(5);
                self.record.conditions.push(condition);
            }
            Block::Medications => {
                let mut med = Medication::new(cell(0).ok_or("medication without a name")?);
                med.dosage = cell(1);
                med.frequency = cell(2);
                med.start_date = cell(3).as_deref().and_then(parse_date);
                med.prescriber = cell(4);
                med.status = MedicationStatus::Unknown;
                self.record.medications.push(med);
            }
            Block::Appointments => {
                let date = cell(0)
                    .as_deref()
                    .and_then(parse_date)
                    .ok_or("appointment without a readable date")?;
                let mut appt = Appointment::new(date);
                appt.time = cell(1);
                appt.appointment_type = cell(2);
                appt.facility = cell(3);
                appt.clinic = cell(4);
                appt.location = cell(5);
                self.record.appointments.push(appt);
            }
            Block::Labs => {
                let panel = self.panel.as_mut().ok_or("lab row outside a dated panel")?;
                let test_name = cell(0).ok_or("lab row without a test name")?;
                let result = cell(1).ok_or("lab row without a result")?;
                let (value, unit) = split_result(&result);
                panel.results.push(LabResult {
                    test_name,
                    value,
                    unit,
                    reference_range: cell(2),
                    flag: cell(3)
                        .map(|s| LabFlag::from_display_status(&s))
                        .unwrap_or(LabFlag::Normal),
                    category: cell(4),
                });
            }
            Block::Relationships => {
                let label = cell(0).ok_or("relationship without a type")?;
                let (kind, reverse) = RelationshipKind::from_display_label(&label)
                    .ok_or_else(|| format!("unknown relationship '{label}'"))?;
                let member_id = value(&unwrap_marks(&cells[2]))
                    .filter(|id| MEMBER_ID.is_match(id))
                    .ok_or("relationship without a member id")?;
                self.relationships.push(Relationship {
                    kind,
                    reverse,
                    name: cell(1),
                    member_id,
                });
            }
            Block::Preamble | Block::Insurance | Block::HealthRisks | Block::Other => {}
        }
        Ok(())
    }

    fn personal_field(&mut self, field: &str, value: Option<String>) {
        let p = &mut self.person;
        match field.to_lowercase().as_str() {
            "name" => p.name = value,
            "full legal name" => p.full_legal_name = value,
            "preferred name" => p.preferred_name = value,
            "date of birth" => p.date_of_birth = value.as_deref().and_then(parse_date),
            "gender" => p.gender = value,
            "blood type" => p.blood_type = value,
            "role" => p.role = value,
            "current address" => p.address = value,
            "birth city" => self.birth_city = value,
            "birth country" => self.birth_country = value,
            "country code" => self.birth_code = value,
            _ => return,
        }
        if let (Some(city), Some(country)) = (&self.birth_city, &self.birth_country) {
            self.person.birth_place = Some(BirthPlace {
                city: city.clone(),
                country: country.clone(),
                country_code: self.birth_code.clone(),
            });
        }
    }

    fn open_panel(&mut self, heading: &str) {
        self.close_panel();
        let (date, label) = match heading.split_once(" - ") {
            Some((date, label)) => (parse_date(date), label.trim()),
            None => (None, heading.trim()),
        };
        self.panel = Some(LabPanel::new(label, date));
    }

    fn close_panel(&mut self) {
        if let Some(panel) = self.panel.take() {
            self.record.lab_panels.push(panel);
        }
    }
}

/// Undo `LabResult::value_with_unit`. The unit is split off only behind a
/// number, so text results such as "Not detected" keep their spaces.
fn split_result(cell: &str) -> (String, Option<String>) {
    match NUMERIC_RESULT.captures(cell) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].trim().to_string())),
        None => (cell.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGraph;
    use crate::models::enums::{NodeLabel, RelType};
    use crate::pipeline::checkpoint::export_checkpoint;
    use crate::pipeline::graph::{apply_operations, NodeKey};
    use chrono::NaiveDateTime;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded_graph() -> SqliteGraph {
        let graph = SqliteGraph::open_in_memory().unwrap();

        let mut record = MedicalRecord::new("doc-1", DocumentType::LabResult);
        record.document_date = Some(d(2024, 3, 15));

        let mut prediabetes = Condition::new("Prediabetes", ConditionStatus::Active);
        prediabetes.code = Some("R73.03".into());
        prediabetes.diagnosed_date = Some(d(2024, 3, 15));
        prediabetes.notes = Some("Diet | exercise first".into());
        record.conditions.push(prediabetes);

        let mut metformin = Medication::new("Metformin");
        metformin.dosage = Some("500 mg".into());
        metformin.frequency = Some("twice daily".into());
        metformin.start_date = Some(d(2024, 3, 20));
        metformin.status = MedicationStatus::Active;
        record.medications.push(metformin);

        let mut allergy = Allergy::new("Penicillin");
        allergy.severity = Some("severe".into());
        allergy.reaction = Some("Hives".into());
        record.allergies.push(allergy);

        let mut appt = Appointment::new(d(2024, 4, 2));
        appt.time = Some("10:30 AM".into());
        appt.appointment_type = Some("Follow-up".into());
        appt.facility = Some("Valley Clinic".into());
        record.appointments.push(appt);

        let mut panel = LabPanel::new("lab_result", Some(d(2024, 3, 15)));
        panel.results.push(LabResult {
            test_name: "Glucose".into(),
            value: "105".into(),
            unit: Some("mg/dL".into()),
            reference_range: Some("70-99".into()),
            flag: LabFlag::High,
            category: Some("Chemistry".into()),
        });
        record.lab_panels.push(panel);

        let mut ctx = PersonContext::new("m-1");
        ctx.person.full_legal_name = Some("Alexandra Marie Smith".into());
        ctx.person.preferred_name = Some("Alex".into());
        ctx.person.date_of_birth = Some(d(1980, 2, 14));
        ctx.person.birth_place = Some(BirthPlace {
            city: "Lyon".into(),
            country: "France".into(),
            country_code: Some("FR".into()),
        });
        ctx.health_risks.push(HealthRisk {
            name: "Type 2 Diabetes".into(),
            reason: Some("Elevated fasting glucose".into()),
            screening: Some("A1C yearly".into()),
        });
        ctx.relationships.push(Relationship {
            kind: RelationshipKind::ParentOf,
            reverse: false,
            name: Some("Sam Smith".into()),
            member_id: "m-2".into(),
        });

        let report = apply_operations(&graph, &generate_operations(&record, &ctx));
        assert_eq!(report.total_failed(), 0);
        graph
    }

    #[test]
    fn export_lists_sections_and_escapes_pipes() {
        let graph = seeded_graph();
        let text = export_checkpoint(&graph, "m-1", now()).unwrap();

        assert!(text.starts_with("# Medical Checkpoint: Alex"));
        assert!(text.contains("**Member ID:** `m-1`"));
        for heading in [
            "## Personal Information",
            "## Name Aliases",
            "## Allergies",
            "## Current Conditions",
            "## Current Medications",
            "## Recent Appointments (Past Year)",
            "## Health Risks",
            "## Lab Results History",
            "## Family Relationships",
        ] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("Diet \\| exercise first"));
        assert!(text.contains("### 2024-03-15 - lab_result"));
        assert!(text.contains("| Glucose | 105 mg/dL | 70-99 | HIGH | Chemistry |"));
        assert!(text.contains("| Parent Of | Sam Smith | `m-2` |"));
        assert!(text.trim_end().ends_with("-->"));
    }

    #[test]
    fn export_unknown_member_fails() {
        let graph = SqliteGraph::open_in_memory().unwrap();
        let err = export_checkpoint(&graph, "ghost", now()).unwrap_err();
        assert!(matches!(err, CheckpointError::MemberNotFound(id) if id == "ghost"));
    }

    #[test]
    fn round_trip_into_fresh_graph() {
        let source = seeded_graph();
        let text = export_checkpoint(&source, "m-1", now()).unwrap();

        let target = SqliteGraph::open_in_memory().unwrap();
        let (data, report) = import_checkpoint(&target, &text).unwrap();
        assert_eq!(data.member_id, "m-1");
        assert_eq!(data.export_version.as_deref(), Some(CHECKPOINT_FORMAT_VERSION));
        assert_eq!(report.total_failed(), 0);

        let again = export_checkpoint(&target, "m-1", now()).unwrap();
        let body = |t: &str| {
            t.lines()
                .filter(|l| !l.contains("Generated") && !l.contains("exported_at"))
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(body(&text), body(&again));

        use crate::pipeline::checkpoint::CheckpointSource;
        assert_eq!(source.conditions("m-1").unwrap(), target.conditions("m-1").unwrap());
        assert_eq!(source.appointments_since("m-1", d(2023, 6, 1)).unwrap().len(), 1);
        assert_eq!(
            target.appointments_since("m-1", d(2023, 6, 1)).unwrap(),
            source.appointments_since("m-1", d(2023, 6, 1)).unwrap()
        );
        let meds = target.medications("m-1").unwrap();
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].dosage.as_deref(), Some("500 mg"));
    }

    #[test]
    fn importing_twice_is_idempotent() {
        let text = export_checkpoint(&seeded_graph(), "m-1", now()).unwrap();
        let target = SqliteGraph::open_in_memory().unwrap();

        import_checkpoint(&target, &text).unwrap();
        let counts = |g: &SqliteGraph| {
            (
                g.count_nodes(NodeLabel::Condition).unwrap(),
                g.count_nodes(NodeLabel::LabResult).unwrap(),
                g.count_nodes(NodeLabel::Alias).unwrap(),
                g.count_edges(RelType::TakesMedication).unwrap(),
                g.count_edges(RelType::Includes).unwrap(),
            )
        };
        let first = counts(&target);
        import_checkpoint(&target, &text).unwrap();
        assert_eq!(first, counts(&target));
        assert_eq!(first.1, 1);
    }

    #[test]
    fn missing_identity_is_rejected() {
        let err = parse_checkpoint("# Medical Checkpoint: Nobody\n\n## Allergies\n").unwrap_err();
        assert!(matches!(err, CheckpointError::MissingIdentity));
    }

    #[test]
    fn comment_block_wins_over_header_line() {
        let text = "# Medical Checkpoint: X\n\n**Member ID:** `from-header`\n\n\
                    <!-- CHECKPOINT_DATA\nmember_id: from-comment\nexport_version: 1.0\n-->\n";
        let data = parse_checkpoint(text).unwrap();
        assert_eq!(data.member_id, "from-comment");
        assert_eq!(data.person.id, "from-comment");

        let data = parse_checkpoint("**Member ID:** `only-header`\n").unwrap();
        assert_eq!(data.member_id, "only-header");
        assert_eq!(data.export_version, None);
    }

    #[test]
    fn short_rows_are_skipped_and_counted() {
        let text = "**Member ID:** `m-9`\n\n\
                    ## Current Conditions\n\n\
                    | Condition | ICD-10 | Status |\n\
                    |---|---|---|\n\
                    | Asthma | J45 | active |\n\
                    | Truncated | J99 |\n\n\
                    ## Current Medications\n\n\
                    | Medication | Dosage |\n\
                    |---|---|\n\
                    | Albuterol | 90 mcg |\n";
        let data = parse_checkpoint(text).unwrap();
        assert_eq!(data.record.conditions.len(), 1);
        assert_eq!(data.record.conditions[0].code.as_deref(), Some("J45"));
        assert_eq!(data.record.skipped_in(Section::Conditions), 1);
        assert_eq!(data.record.medications.len(), 1);
        assert_eq!(data.record.medications[0].status, MedicationStatus::Unknown);
    }

    #[test]
    fn placeholders_stay_absent() {
        let text = "**Member ID:** `m-3`\n\n## Allergies\n\n\
                    | Allergen | Severity | Reaction |\n|---|---|---|\n\
                    | Latex | - | - |\n\n\
                    ## Current Conditions\n\n\
                    | Condition | ICD-10 | Status | Severity | Diagnosed | Notes |\n\
                    |---|---|---|---|---|---|\n\
                    | Migraine | - | - | - | - | - |\n";
        let data = parse_checkpoint(text).unwrap();
        assert_eq!(data.record.allergies[0].severity, None);
        assert_eq!(data.record.conditions[0].status, ConditionStatus::Active);
        assert_eq!(data.record.conditions[0].diagnosed_date, None);
    }

    #[test]
    fn lab_panels_and_risks_read_back() {
        let text = "**Member ID:** `m-4`\n\n## Health Risks\n\n### Heart Disease\n\
                    - **Reason:** Family history\n\n## Lab Results History\n\n\
                    ### Undated - Annual Panel\n\n\
                    | Test | Result | Reference Range | Status | Category |\n\
                    |---|---|---|---|---|\n\
                    | LDL | 160 mg/dL | <100 | HIGH | Lipids |\n\
                    | Note | Positive | - | Normal | - |\n";
        let data = parse_checkpoint(text).unwrap();
        assert_eq!(data.health_risks.len(), 1);
        assert_eq!(data.health_risks[0].reason.as_deref(), Some("Family history"));
        assert_eq!(data.health_risks[0].screening, None);

        let panel = &data.record.lab_panels[0];
        assert_eq!(panel.date, None);
        assert_eq!(panel.label, "Annual Panel");
        assert_eq!(panel.results[0].value, "160");
        assert_eq!(panel.results[0].unit.as_deref(), Some("mg/dL"));
        assert_eq!(panel.results[0].flag, LabFlag::High);
        assert_eq!(panel.results[1].unit, None);

        let ops = checkpoint_operations(&data);
        let risk = NodeKey::new(NodeLabel::HealthRisk, "Heart Disease");
        assert!(ops
            .iter()
            .any(|op| matches!(op, Operation::MergeNode { node, .. } if *node == risk)));
    }

    #[test]
    fn lab_text_results_survive_round_trip() {
        use crate::pipeline::checkpoint::CheckpointSource;

        let graph = SqliteGraph::open_in_memory().unwrap();
        let mut record = MedicalRecord::new("ccd-1", DocumentType::ClinicalDocument);
        let mut panel = LabPanel::new("Urinalysis", Some(d(2024, 2, 10)));
        for (name, value, unit) in [
            ("Protein", "Not detected", None),
            ("Specific Gravity", "1.020", None),
            ("WBC", ">=5", Some("/hpf")),
            ("Creatinine", "0.9", Some("mg/dL")),
        ] {
            panel.results.push(LabResult {
                test_name: name.into(),
                value: value.into(),
                unit: unit.map(String::from),
                reference_range: None,
                flag: LabFlag::Normal,
                category: None,
            });
        }
        record.lab_panels.push(panel);
        apply_operations(&graph, &generate_operations(&record, &PersonContext::new("m-5")));

        let text = export_checkpoint(&graph, "m-5", now()).unwrap();
        let fresh = SqliteGraph::open_in_memory().unwrap();
        import_checkpoint(&fresh, &text).unwrap();

        let mut results = fresh.lab_history("m-5").unwrap().remove(0).results;
        results.sort_by(|a, b| a.test_name.cmp(&b.test_name));
        let read: Vec<_> = results
            .iter()
            .map(|r| (r.test_name.as_str(), r.value.as_str(), r.unit.as_deref()))
            .collect();
        assert_eq!(
            read,
            vec![
                ("Creatinine", "0.9", Some("mg/dL")),
                ("Protein", "Not detected", None),
                ("Specific Gravity", "1.020", None),
                ("WBC", ">=5", Some("/hpf")),
            ]
        );
    }

    #[test]
    fn result_cell_splits_only_behind_a_number() {
        assert_eq!(split_result("160 mg/dL"), ("160".into(), Some("mg/dL".into())));
        assert_eq!(split_result("<0.5 x10^3/uL"), ("<0.5".into(), Some("x10^3/uL".into())));
        assert_eq!(split_result("Not detected"), ("Not detected".into(), None));
        assert_eq!(split_result("1+ trace"), ("1+ trace".into(), None));
        assert_eq!(split_result("Positive"), ("Positive".into(), None));
    }
}
