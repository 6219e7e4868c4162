use std::path::PathBuf;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "professor")]
    Teacher,
    #[serde(rename = "aluno")]
    Student,
}

/// The logged-in user. Passed explicitly to whatever needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: RecordId,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub must_change_password: bool,
}

impl Session {
    pub fn can_manage_evaluations(&self) -> bool {
        !matches!(self.role, Role::Student)
    }

    /// Student whose report this session may see. Students only get their own.
    pub fn report_student(&self, requested: Option<RecordId>) -> anyhow::Result<RecordId> {
        match (self.role, requested) {
            (Role::Student, Some(id)) if id != self.user_id => {
                bail!("students can only view their own report")
            }
            (Role::Student, _) => Ok(self.user_id),
            (_, Some(id)) => Ok(id),
            (_, None) => bail!("--student is required for {:?} sessions", self.role),
        }
    }

    pub fn require_manager(&self) -> anyhow::Result<()> {
        if !self.can_manage_evaluations() {
            bail!("{} is not allowed to change evaluations", self.name);
        }
        Ok(())
    }
}

/// User object returned by the auth service under `usuario`.
#[derive(Debug, Deserialize)]
pub struct UserPayload {
    usuario_id: Option<Value>,
    id: Option<Value>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    tipo_usuario: Option<Role>,
    #[serde(default)]
    primeira_senha: Option<Value>,
}

impl TryFrom<UserPayload> for Session {
    type Error = anyhow::Error;

    fn try_from(user: UserPayload) -> anyhow::Result<Self> {
        let user_id = user
            .usuario_id
            .as_ref()
            .or(user.id.as_ref())
            .and_then(value_as_id)
            .context("login response has no user id")?;
        let role = user
            .role
            .or(user.tipo_usuario)
            .context("login response has no role")?;
        let must_change_password = match user.primeira_senha {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        };

        Ok(Session {
            user_id,
            name: user.nome.unwrap_or_default(),
            email: user.email,
            role,
            must_change_password,
        })
    }
}

fn value_as_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Session persisted as JSON between invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` when nobody is logged in.
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file {}", self.path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt session file {}", self.path.display()))?;
        Ok(Some(session))
    }

    pub fn require(&self) -> anyhow::Result<Session> {
        self.load()?
            .context("not logged in; run `boletim login` first")
    }

    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write session file {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: 7,
            name: "Ana Lima".to_string(),
            email: Some("ana@escola.com".to_string()),
            role,
            must_change_password: false,
        }
    }

    #[test]
    fn login_payload_accepts_either_role_field() {
        let with_role: UserPayload = serde_json::from_str(
            r#"{"usuario_id": 7, "nome": "Ana", "role": "aluno", "primeira_senha": 1}"#,
        )
        .unwrap();
        let session = Session::try_from(with_role).unwrap();
        assert_eq!(session.role, Role::Student);
        assert!(session.must_change_password);

        let with_type: UserPayload = serde_json::from_str(
            r#"{"usuario_id": "3", "nome": "Marta", "role": null, "tipo_usuario": "professor"}"#,
        )
        .unwrap();
        let session = Session::try_from(with_type).unwrap();
        assert_eq!(session.user_id, 3);
        assert_eq!(session.role, Role::Teacher);
        assert!(!session.must_change_password);
    }

    #[test]
    fn login_payload_without_role_is_rejected() {
        let payload: UserPayload = serde_json::from_str(r#"{"usuario_id": 1}"#).unwrap();
        assert!(Session::try_from(payload).is_err());
    }

    #[test]
    fn store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        assert_eq!(store.load().unwrap(), None);
        assert!(store.require().is_err());

        let saved = session(Role::Admin);
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn students_only_see_their_own_report() {
        let student = session(Role::Student);
        assert_eq!(student.report_student(None).unwrap(), 7);
        assert_eq!(student.report_student(Some(7)).unwrap(), 7);
        assert!(student.report_student(Some(8)).is_err());
        assert!(!student.can_manage_evaluations());
        assert!(student.require_manager().is_err());

        let teacher = session(Role::Teacher);
        assert_eq!(teacher.report_student(Some(8)).unwrap(), 8);
        assert!(teacher.report_student(None).is_err());
        assert!(teacher.can_manage_evaluations());
    }
}
