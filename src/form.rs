use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Args;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::models::RecordId;
use crate::session::Session;

/// Whether the evaluation form is read-only, creating a record, or editing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Viewing,
    Creating,
    Editing(RecordId),
}

impl EditMode {
    pub fn for_record(id: Option<RecordId>) -> Self {
        match id {
            Some(id) => EditMode::Editing(id),
            None => EditMode::Creating,
        }
    }

    /// Sessions that cannot change evaluations only ever view them.
    pub fn for_session(session: &Session, id: Option<RecordId>) -> Self {
        if session.can_manage_evaluations() {
            Self::for_record(id)
        } else {
            EditMode::Viewing
        }
    }

    /// Method and path on the evaluation service for saving in this mode.
    pub fn route(&self) -> anyhow::Result<(Method, String)> {
        match self {
            EditMode::Viewing => bail!("evaluation is open read-only; nothing to save"),
            EditMode::Creating => Ok((Method::POST, "/avaliacoes".to_string())),
            EditMode::Editing(id) => Ok((Method::PUT, format!("/avaliacoes/{id}"))),
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            EditMode::Viewing => "viewed",
            EditMode::Creating => "created",
            EditMode::Editing(_) => "updated",
        }
    }
}

/// Raw evaluation input, from command-line flags or one CSV row.
#[derive(Debug, Clone, Default, Args, Deserialize)]
pub struct EvaluationForm {
    #[arg(long)]
    pub student: String,
    #[arg(long)]
    pub class: String,
    #[arg(long)]
    pub teacher: String,
    #[arg(long)]
    pub subject: String,
    /// Category label, e.g. Exam, Assignment, Test
    #[arg(long)]
    pub kind: String,
    /// Date as YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub weight: String,
    #[arg(long)]
    #[serde(default)]
    pub exam: Option<String>,
    #[arg(long)]
    #[serde(default)]
    pub assignment: Option<String>,
    #[arg(long)]
    #[serde(default)]
    pub final_score: Option<String>,
}

/// Body sent to the evaluation service on create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationPayload {
    #[serde(rename = "aluno_id")]
    pub student_id: RecordId,
    #[serde(rename = "turma_id")]
    pub class_id: RecordId,
    #[serde(rename = "professor_id")]
    pub teacher_id: RecordId,
    #[serde(rename = "disciplina_id")]
    pub subject_id: RecordId,
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "peso")]
    pub weight: f64,
    #[serde(rename = "prova")]
    pub exam: f64,
    #[serde(rename = "trabalho")]
    pub assignment: f64,
    #[serde(rename = "nota")]
    pub final_score: f64,
}

impl EvaluationForm {
    pub fn validate(&self) -> anyhow::Result<EvaluationPayload> {
        let subject_id = parse_id(&self.subject).context("select a valid subject")?;
        let kind = self.kind.trim();
        if kind.is_empty() {
            bail!("evaluation type is required");
        }
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date {:?}, expected YYYY-MM-DD", self.date))?;

        Ok(EvaluationPayload {
            student_id: parse_id(&self.student).context("invalid student id")?,
            class_id: parse_id(&self.class).context("invalid class id")?,
            teacher_id: parse_id(&self.teacher).context("invalid teacher id")?,
            subject_id,
            kind: kind.to_string(),
            date,
            weight: parse_bounded("weight", Some(self.weight.as_str()), 1.0, 10.0)?
                .context("weight is required")?,
            exam: parse_score("exam", self.exam.as_deref())?,
            assignment: parse_score("assignment", self.assignment.as_deref())?,
            final_score: parse_score("final score", self.final_score.as_deref())?,
        })
    }
}

fn parse_id(raw: &str) -> anyhow::Result<RecordId> {
    let raw = raw.trim();
    raw.parse()
        .with_context(|| format!("{raw:?} is not a numeric id"))
}

/// Blank scores are sent as zero.
fn parse_score(field: &str, raw: Option<&str>) -> anyhow::Result<f64> {
    Ok(parse_bounded(field, raw, 0.0, 10.0)?.unwrap_or(0.0))
}

fn parse_bounded(
    field: &str,
    raw: Option<&str>,
    min: f64,
    max: f64,
) -> anyhow::Result<Option<f64>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let value: f64 = raw
        .replace(',', ".")
        .parse()
        .with_context(|| format!("{field} {raw:?} is not a number"))?;
    if !(min..=max).contains(&value) {
        bail!("{field} must be between {min} and {max}, got {value}");
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn form() -> EvaluationForm {
        EvaluationForm {
            student: "7".to_string(),
            class: "2".to_string(),
            teacher: "3".to_string(),
            subject: "11".to_string(),
            kind: "Exam".to_string(),
            date: "2025-03-14".to_string(),
            weight: "2".to_string(),
            exam: Some("8,5".to_string()),
            assignment: None,
            final_score: Some(String::new()),
        }
    }

    #[test]
    fn valid_form_builds_payload() {
        let payload = form().validate().unwrap();
        assert_eq!(payload.student_id, 7);
        assert_eq!(payload.subject_id, 11);
        assert_eq!(payload.exam, 8.5);
        assert_eq!(payload.assignment, 0.0);
        assert_eq!(payload.final_score, 0.0);

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["aluno_id"], 7);
        assert_eq!(body["data"], "2025-03-14");
        assert_eq!(body["peso"], 2.0);
    }

    #[test]
    fn subject_is_required() {
        let mut input = form();
        input.subject = String::new();
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut heavy = form();
        heavy.weight = "0.5".to_string();
        assert!(heavy.validate().is_err());

        let mut high = form();
        high.exam = Some("10.5".to_string());
        assert!(high.validate().is_err());

        let mut blank_weight = form();
        blank_weight.weight = " ".to_string();
        assert!(blank_weight.validate().is_err());
    }

    #[test]
    fn bad_date_is_rejected() {
        let mut input = form();
        input.date = "14/03/2025".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn edit_mode_routes_to_create_or_update() {
        assert_eq!(EditMode::for_record(None), EditMode::Creating);
        assert_eq!(EditMode::for_record(Some(5)), EditMode::Editing(5));

        let (method, path) = EditMode::Creating.route().unwrap();
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/avaliacoes");

        let (method, path) = EditMode::Editing(5).route().unwrap();
        assert_eq!(method, Method::PUT);
        assert_eq!(path, "/avaliacoes/5");

        assert!(EditMode::Viewing.route().is_err());
    }

    #[test]
    fn student_sessions_are_read_only() {
        let mut session = Session {
            user_id: 7,
            name: "Ana".to_string(),
            email: None,
            role: Role::Student,
            must_change_password: false,
        };
        assert_eq!(EditMode::for_session(&session, Some(5)), EditMode::Viewing);

        session.role = Role::Teacher;
        assert_eq!(EditMode::for_session(&session, Some(5)), EditMode::Editing(5));
        assert_eq!(EditMode::for_session(&session, None), EditMode::Creating);
    }
}
