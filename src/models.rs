use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type RecordId = i64;

/// One graded assessment as served by the evaluation service.
///
/// Depending on the backend version a record carries only foreign keys, or
/// foreign keys plus already-joined nested objects, or a free-text subject.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Evaluation {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<RecordId>,
    #[serde(rename = "aluno_id", default, deserialize_with = "lenient_id")]
    pub student_id: Option<RecordId>,
    #[serde(rename = "turma_id", default, deserialize_with = "lenient_id")]
    pub class_id: Option<RecordId>,
    #[serde(rename = "professor_id", default, deserialize_with = "lenient_id")]
    pub teacher_id: Option<RecordId>,
    #[serde(rename = "disciplina_id", default, deserialize_with = "lenient_id")]
    pub subject_id: Option<RecordId>,
    #[serde(rename = "tipo", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(rename = "data", default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "peso", default, deserialize_with = "lenient_score")]
    pub weight: Option<f64>,
    #[serde(rename = "prova", default, deserialize_with = "lenient_score")]
    pub exam: Option<f64>,
    #[serde(rename = "trabalho", default, deserialize_with = "lenient_score")]
    pub assignment: Option<f64>,
    #[serde(rename = "nota", default, deserialize_with = "lenient_score")]
    pub final_score: Option<f64>,
    #[serde(rename = "aluno", default, deserialize_with = "lenient_nested")]
    pub student: Option<NestedRef>,
    #[serde(rename = "turma", default, deserialize_with = "lenient_nested")]
    pub class: Option<NestedRef>,
    #[serde(rename = "professor", default, deserialize_with = "lenient_nested")]
    pub teacher: Option<NestedRef>,
    #[serde(rename = "disciplina", default, deserialize_with = "lenient_nested")]
    pub subject: Option<NestedRef>,
}

/// A nested, already-joined object; only its display name is used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NamedRef {
    #[serde(rename = "nome", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
}

/// Embedded reference: either a joined object or a bare free-text label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NestedRef {
    Label(String),
    Object(NamedRef),
}

impl NestedRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            NestedRef::Label(label) => Some(label.as_str()),
            NestedRef::Object(object) => object.name.as_deref(),
        }
    }
}

#[cfg(test)]
impl NestedRef {
    pub fn named(name: &str) -> Self {
        NestedRef::Object(NamedRef {
            name: Some(name.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Student {
    #[serde(deserialize_with = "required_id")]
    pub id: RecordId,
    #[serde(rename = "nome", default, deserialize_with = "lenient_name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassGroup {
    #[serde(deserialize_with = "required_id")]
    pub id: RecordId,
    #[serde(rename = "nome", default, deserialize_with = "lenient_name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subject {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<RecordId>,
    #[serde(rename = "nome", default, deserialize_with = "lenient_name")]
    pub name: String,
    #[serde(rename = "tipo", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Teacher {
    #[serde(deserialize_with = "required_id")]
    pub id: RecordId,
    #[serde(rename = "nome", default, deserialize_with = "lenient_name")]
    pub name: String,
    #[serde(rename = "disciplinas", default, deserialize_with = "nullable_vec")]
    pub subjects: Vec<Subject>,
}

/// Student detail shown in the report header. Passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentDetail {
    #[serde(rename = "nome", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(rename = "matricula", default, deserialize_with = "lenient_text")]
    pub enrollment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(rename = "telefone", default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
}

/// Reference tables indexed by id, read-only for the duration of a render.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub students: HashMap<RecordId, Student>,
    pub classes: HashMap<RecordId, ClassGroup>,
    pub teachers: HashMap<RecordId, Teacher>,
}

impl Lookups {
    pub fn index(students: Vec<Student>, classes: Vec<ClassGroup>, teachers: Vec<Teacher>) -> Self {
        Self {
            students: students.into_iter().map(|s| (s.id, s)).collect(),
            classes: classes.into_iter().map(|c| (c.id, c)).collect(),
            teachers: teachers.into_iter().map(|t| (t.id, t)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Passed,
    Warning,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Passed => "Passed",
            Status::Warning => "Warning",
            Status::Failed => "Failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub id: Option<RecordId>,
    pub student_name: String,
    pub class_name: String,
    pub subject_name: String,
    pub teacher_name: String,
    pub kind: Option<String>,
    pub exam: f64,
    pub assignment: f64,
    pub weight: Option<f64>,
    pub date: Option<NaiveDate>,
    pub final_score: Option<f64>,
    pub average: f64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum ReportRow {
    Record(DisplayRow),
    Placeholder { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub student_meta: Option<StudentDetail>,
    pub rows: Vec<ReportRow>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<RecordId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn required_id<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_id(deserializer)?.ok_or_else(|| D::Error::custom("missing or non-numeric id"))
}

/// Absent, null, blank and non-numeric scores all decode as `None`.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Null or non-text names decode as empty and fall through to the next source.
fn lenient_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Shapes other than a string or an object are dropped rather than failing the record.
fn lenient_nested<'de, D>(deserializer: D) -> Result<Option<NestedRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| NestedRef::deserialize(value).ok()))
}

/// Accepts `YYYY-MM-DD` as well as full timestamps; only the date is kept.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()),
        _ => None,
    })
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
