use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::json;

use myaview_lib::config;
use myaview_lib::db::SqliteGraph;
use myaview_lib::models::enums::Section;
use myaview_lib::models::{BirthPlace, MedicalRecord};
use myaview_lib::pipeline::ccd::parse_ccd;
use myaview_lib::pipeline::checkpoint::{
    checkpoint_operations, export_checkpoint, parse_checkpoint, CheckpointSource,
};
use myaview_lib::pipeline::graph::{
    apply_operations, generate_operations, AliasPlan, ApplyReport, PersonContext,
};
use myaview_lib::pipeline::intake::{collect_inputs, read_input, InputFormat};
use myaview_lib::pipeline::narrative::NarrativeParser;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "myaview")]
#[command(about = "Clinical documents into a person-centric medical graph")]
#[command(version)]
struct Cli {
    /// Graph database file (defaults to the app data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse narrative or C-CDA files and merge them into a member's graph
    Ingest {
        /// File or directory
        path: PathBuf,
        #[arg(long)]
        member_id: String,
        /// Full legal name; aliases are derived from it
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        preferred_name: Option<String>,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        birth_city: Option<String>,
        #[arg(long)]
        birth_country: Option<String>,
        #[arg(long)]
        birth_country_code: Option<String>,
        /// Extra names stored as nicknames (repeatable)
        #[arg(long = "alias")]
        aliases: Vec<String>,
        /// Document date when the file does not state one (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print the parsed record and operations instead of writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Import selected sections of one C-CDA document
    Ccd {
        file: PathBuf,
        #[arg(long)]
        member_id: String,
        /// Sections to keep (medications, allergies, conditions, procedures,
        /// labs, immunizations, vitals); all when omitted
        #[arg(long, value_delimiter = ',')]
        sections: Vec<Section>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Write checkpoint markdown for one member or everyone
    Export {
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        member_id: Option<String>,
        #[arg(long)]
        all: bool,
        /// Output file for a single member (stdout when omitted)
        #[arg(long, conflicts_with = "all")]
        output: Option<PathBuf>,
        /// Output directory for --all (defaults to the checkpoints directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Merge checkpoint files back into the graph
    Import {
        /// Checkpoint file
        #[arg(required_unless_present = "dir")]
        file: Option<PathBuf>,
        /// Import every .md checkpoint in a directory
        #[arg(long, conflicts_with = "file")]
        dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> CliResult {
    config::init_tracing();
    let cli = Cli::parse();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = cli.db.clone().unwrap_or_else(config::graph_db_path);

    match cli.command {
        Commands::Ingest {
            path,
            member_id,
            full_name,
            preferred_name,
            dob,
            birth_city,
            birth_country,
            birth_country_code,
            aliases,
            date,
            dry_run,
        } => {
            let mut ctx = PersonContext::new(member_id);
            ctx.person.full_legal_name = full_name;
            ctx.person.preferred_name = preferred_name;
            ctx.person.date_of_birth = dob;
            if let (Some(city), Some(country)) = (birth_city, birth_country) {
                ctx.person.birth_place = Some(BirthPlace {
                    city,
                    country,
                    country_code: birth_country_code,
                });
            }
            ctx.aliases = AliasPlan::Derive { extra: aliases };

            let graph = if dry_run { None } else { Some(SqliteGraph::open(&db_path)?) };
            for file in collect_inputs(&path)? {
                let mut record = match parse_file(&file) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(file = %file.display(), error = %e, "Skipping file");
                        continue;
                    }
                };
                if record.document_date.is_none() {
                    record.document_date = date;
                }
                let source = file.display().to_string();
                ingest_record(graph.as_ref(), &ctx, &record, &source)?;
            }
        }
        Commands::Ccd {
            file,
            member_id,
            sections,
            dry_run,
        } => {
            let input = read_input(&file)?;
            let mut record = parse_ccd(&input.bytes)?;
            if !sections.is_empty() {
                record.retain_sections(&sections);
            }
            let ctx = PersonContext::new(member_id);
            let graph = if dry_run { None } else { Some(SqliteGraph::open(&db_path)?) };
            ingest_record(graph.as_ref(), &ctx, &record, &input.filename)?;
        }
        Commands::Export {
            member_id,
            all,
            output,
            output_dir,
        } => {
            let graph = SqliteGraph::open(&db_path)?;
            let now = Local::now().naive_local();

            if all {
                let dir = output_dir.unwrap_or_else(config::checkpoints_dir);
                std::fs::create_dir_all(&dir)?;
                for id in graph.member_ids()? {
                    let text = export_checkpoint(&graph, &id, now)?;
                    let path = dir.join(format!("checkpoint_{id}_{}.md", now.format("%Y%m%d")));
                    std::fs::write(&path, text)?;
                    println!("{}", path.display());
                }
            } else if let Some(id) = member_id {
                let text = export_checkpoint(&graph, &id, now)?;
                match output {
                    Some(path) => {
                        write_file(&path, &text)?;
                        println!("{}", path.display());
                    }
                    None => print!("{text}"),
                }
            }
        }
        Commands::Import { file, dir, dry_run } => {
            let files = match (file, dir) {
                (_, Some(dir)) => collect_inputs(&dir)?
                    .into_iter()
                    .filter(|p| p.extension().is_some_and(|e| e == "md"))
                    .collect(),
                (Some(file), None) => vec![file],
                (None, None) => Vec::new(),
            };
            let graph = if dry_run { None } else { Some(SqliteGraph::open(&db_path)?) };

            for path in files {
                let text = read_input(&path)?.text()?.to_string();
                let data = parse_checkpoint(&text)?;
                let ops = checkpoint_operations(&data);

                match &graph {
                    None => println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "file": path.display().to_string(),
                            "checkpoint": data,
                            "operations": ops,
                        }))?
                    ),
                    Some(graph) => {
                        let report = apply_operations(graph, &ops);
                        let source = path.display().to_string();
                        graph.record_ingestion(&data.member_id, &source, None, &report)?;
                        print_report(&data.member_id, &source, &data.record.skipped, &report);
                    }
                }
            }
        }
    }
    Ok(())
}

fn parse_file(path: &Path) -> CliResult<MedicalRecord> {
    let input = read_input(path)?;
    let record = match input.format {
        InputFormat::Structured => parse_ccd(&input.bytes)?,
        InputFormat::Narrative => NarrativeParser::new().parse(input.text()?, &input.filename),
    };
    Ok(record)
}

/// Apply one record, or print it with its operations when `graph` is `None`.
fn ingest_record(
    graph: Option<&SqliteGraph>,
    ctx: &PersonContext,
    record: &MedicalRecord,
    source: &str,
) -> CliResult {
    let ops = generate_operations(record, ctx);

    let Some(graph) = graph else {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "source": source,
                "sections": record.section_counts(),
                "record": record,
                "operations": ops,
            }))?
        );
        return Ok(());
    };

    let report = apply_operations(graph, &ops);
    graph.record_ingestion(ctx.member_id(), source, Some(&record.document_id), &report)?;
    print_report(ctx.member_id(), source, &record.skipped, &report);
    Ok(())
}

fn print_report(
    member_id: &str,
    source: &str,
    skipped: &BTreeMap<Section, usize>,
    report: &ApplyReport,
) {
    for line in report_lines(member_id, source, skipped, report) {
        println!("{line}");
    }
}

/// Apply outcome plus the entries the parser had to skip, per section.
fn report_lines(
    member_id: &str,
    source: &str,
    skipped: &BTreeMap<Section, usize>,
    report: &ApplyReport,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{source}: {} applied, {} failed for {member_id}",
        report.total_applied(),
        report.total_failed()
    )];
    for (section, count) in skipped.iter().filter(|(_, n)| **n > 0) {
        lines.push(format!("  skipped {count} {section} entries"));
    }
    for warning in &report.warnings {
        lines.push(format!("  {} {}: {}", warning.section, warning.entity, warning.error));
    }
    lines
}

fn write_file(path: &Path, text: &str) -> CliResult {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}
