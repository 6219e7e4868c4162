use std::collections::HashMap;

use crate::grades;
use crate::models::{
    ClassGroup, DisplayRow, Evaluation, NestedRef, RecordId, Student, Subject, Teacher,
};

pub const PLACEHOLDER: &str = "—";

/// Joins one evaluation against the reference tables.
///
/// Each name is taken from the id-indexed table first, then from the nested
/// object embedded in the record, and falls back to [`PLACEHOLDER`]. Missing
/// references never fail the join.
pub fn resolve_evaluation_display(
    evaluation: &Evaluation,
    students_by_id: &HashMap<RecordId, Student>,
    classes_by_id: &HashMap<RecordId, ClassGroup>,
    teachers_by_id: &HashMap<RecordId, Teacher>,
) -> DisplayRow {
    let teacher = lookup(teachers_by_id, evaluation.teacher_id);

    let student_name = resolve_name([
        lookup(students_by_id, evaluation.student_id).map(|s| s.name.as_str()),
        nested_name(&evaluation.student),
    ]);
    let class_name = resolve_name([
        lookup(classes_by_id, evaluation.class_id).map(|c| c.name.as_str()),
        nested_name(&evaluation.class),
    ]);
    let teacher_name = resolve_name([
        teacher.map(|t| t.name.as_str()),
        nested_name(&evaluation.teacher),
    ]);
    let subject_name = resolve_subject_name(evaluation, teacher);

    let (average, status) = grades::grade(evaluation.exam, evaluation.assignment);

    DisplayRow {
        id: evaluation.id,
        student_name,
        class_name,
        subject_name,
        teacher_name,
        kind: evaluation.kind.clone(),
        exam: grades::coerce_score(evaluation.exam),
        assignment: grades::coerce_score(evaluation.assignment),
        weight: evaluation.weight,
        date: evaluation.date,
        final_score: evaluation.final_score,
        average,
        status,
    }
}

/// Subject name through the teacher's own subject list, then the record's
/// embedded subject (object or free-text label).
pub fn resolve_subject_name(evaluation: &Evaluation, teacher: Option<&Teacher>) -> String {
    let from_teacher = teacher.and_then(|t| find_subject(&t.subjects, evaluation));
    resolve_name([
        from_teacher.map(|s| s.name.as_str()),
        evaluation.subject.as_ref().and_then(NestedRef::name),
    ])
}

/// Id match wins over a type-label match.
fn find_subject<'a>(subjects: &'a [Subject], evaluation: &Evaluation) -> Option<&'a Subject> {
    let by_id = evaluation
        .subject_id
        .and_then(|id| subjects.iter().find(|s| s.id == Some(id)));

    by_id.or_else(|| {
        let kind = evaluation.kind.as_deref()?;
        subjects.iter().find(|s| s.kind.as_deref() == Some(kind))
    })
}

fn lookup<T>(map: &HashMap<RecordId, T>, id: Option<RecordId>) -> Option<&T> {
    id.and_then(|id| map.get(&id))
}

fn nested_name(nested: &Option<NestedRef>) -> Option<&str> {
    nested.as_ref().and_then(NestedRef::name)
}

fn resolve_name<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|name| !name.trim().is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}
