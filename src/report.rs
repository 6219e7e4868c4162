use tracing::warn;

use crate::lookup;
use crate::models::{Evaluation, Lookups, RecordId, Report, ReportRow, StudentDetail};
use crate::session::{Role, Session};

pub const NO_RECORDS: &str = "No records found";

/// Report card for one student: their evaluations in input order, joined
/// and graded. Never returns an empty row set.
pub fn build_report(
    evaluations: &[Evaluation],
    student_id: RecordId,
    lookups: &Lookups,
    student_meta: Option<StudentDetail>,
) -> Report {
    let own: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|evaluation| evaluation.student_id == Some(student_id))
        .collect();

    Report {
        student_meta,
        rows: join_rows(own, lookups),
    }
}

/// A missing student detail only blanks the report header; the grades still render.
pub fn student_meta_or_none(
    student_id: RecordId,
    detail: anyhow::Result<StudentDetail>,
) -> Option<StudentDetail> {
    match detail {
        Ok(detail) => Some(detail),
        Err(err) => {
            warn!(student_id, error = %format!("{err:#}"), "student detail unavailable");
            None
        }
    }
}

/// Every evaluation joined, unfiltered. Used for the evaluation listing.
pub fn build_listing<'a>(
    evaluations: impl IntoIterator<Item = &'a Evaluation>,
    lookups: &Lookups,
) -> Vec<ReportRow> {
    join_rows(evaluations, lookups)
}

/// A student session only sees its own evaluations.
pub fn visible_evaluations<'a>(
    session: &Session,
    evaluations: &'a [Evaluation],
) -> Vec<&'a Evaluation> {
    evaluations
        .iter()
        .filter(|evaluation| match session.role {
            Role::Student => evaluation.student_id == Some(session.user_id),
            Role::Admin | Role::Teacher => true,
        })
        .collect()
}

fn join_rows<'a>(
    evaluations: impl IntoIterator<Item = &'a Evaluation>,
    lookups: &Lookups,
) -> Vec<ReportRow> {
    let rows: Vec<ReportRow> = evaluations
        .into_iter()
        .map(|evaluation| {
            ReportRow::Record(lookup::resolve_evaluation_display(
                evaluation,
                &lookups.students,
                &lookups.classes,
                &lookups.teachers,
            ))
        })
        .collect();

    if rows.is_empty() {
        vec![ReportRow::Placeholder {
            message: NO_RECORDS.to_string(),
        }]
    } else {
        rows
    }
}
