use super::types::{ApplyReport, GraphWriteWarning, MutationSink, Operation};

/// Apply a mutation sequence in order.
///
/// A failed upsert is logged and counted against its section; the rest of the
/// sequence still runs. Callers serialize sequences per person.
pub fn apply_operations(sink: &impl MutationSink, ops: &[Operation]) -> ApplyReport {
    let mut report = ApplyReport::default();

    for op in ops {
        let section = op.section();
        match sink.apply(op) {
            Ok(()) => *report.applied.entry(section).or_insert(0) += 1,
            Err(e) => {
                let entity = op.entity_name();
                tracing::warn!(
                    section = %section,
                    entity = %entity,
                    error = %e,
                    "Graph upsert failed, continuing"
                );
                *report.failed.entry(section).or_insert(0) += 1;
                report.warnings.push(GraphWriteWarning {
                    section,
                    entity,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        applied = report.total_applied(),
        failed = report.total_failed(),
        "Applied graph operations"
    );
    report
}
