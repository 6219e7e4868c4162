use anyhow::{bail, Context};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, ServiceUrls};
use crate::form::{EditMode, EvaluationPayload};
use crate::models::{ClassGroup, Evaluation, Lookups, RecordId, Student, StudentDetail, Teacher};
use crate::session::{Session, UserPayload};

/// Thin client over the school backends. Each resource lives on its own
/// service; see [`ServiceUrls`].
pub struct ApiClient {
    http: reqwest::Client,
    urls: ServiceUrls,
}

#[derive(Deserialize)]
struct ErrorBody {
    erro: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    usuario: UserPayload,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    senha: &'a str,
}

#[derive(Serialize)]
struct PasswordChange<'a> {
    usuario_id: RecordId,
    nova_senha: &'a str,
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.http_timeout)
            .timeout(config.http_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            urls: config.urls.clone(),
        })
    }

    pub async fn fetch_evaluations(&self) -> anyhow::Result<Vec<Evaluation>> {
        self.get_json(&self.urls.evaluations, "/avaliacoes").await
    }

    pub async fn fetch_students(&self) -> anyhow::Result<Vec<Student>> {
        self.get_json(&self.urls.students, "/alunos").await
    }

    pub async fn fetch_classes(&self) -> anyhow::Result<Vec<ClassGroup>> {
        self.get_json(&self.urls.classes, "/turmas").await
    }

    pub async fn fetch_teachers(&self) -> anyhow::Result<Vec<Teacher>> {
        self.get_json(&self.urls.teachers, "/professores").await
    }

    pub async fn fetch_student_detail(&self, id: RecordId) -> anyhow::Result<StudentDetail> {
        self.get_json(&self.urls.students, &format!("/alunos/{id}"))
            .await
    }

    /// All three reference tables, fetched concurrently and indexed by id.
    pub async fn fetch_lookups(&self) -> anyhow::Result<Lookups> {
        let (students, classes, teachers) = tokio::try_join!(
            self.fetch_students(),
            self.fetch_classes(),
            self.fetch_teachers()
        )?;
        debug!(
            students = students.len(),
            classes = classes.len(),
            teachers = teachers.len(),
            "lookup tables loaded"
        );
        Ok(Lookups::index(students, classes, teachers))
    }

    pub async fn save_evaluation(
        &self,
        mode: EditMode,
        payload: &EvaluationPayload,
    ) -> anyhow::Result<Evaluation> {
        let (method, path) = mode.route()?;
        let url = endpoint(&self.urls.evaluations, &path);
        debug!(%method, %url, "saving evaluation");

        let response = self
            .http
            .request(method, &url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        let response = ensure_success(response, "save evaluation").await?;
        response
            .json()
            .await
            .context("evaluation service returned an unreadable record")
    }

    pub async fn delete_evaluation(&self, id: RecordId) -> anyhow::Result<()> {
        let url = endpoint(&self.urls.evaluations, &format!("/avaliacoes/{id}"));
        debug!(%url, "deleting evaluation");

        let response = self
            .http
            .request(Method::DELETE, &url)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        ensure_success(response, "delete evaluation").await?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let url = endpoint(&self.urls.auth, "/auth/login");
        debug!(%url, email, "logging in");

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                email,
                senha: password,
            })
            .send()
            .await
            .context("failed to reach the login service")?;
        let response = ensure_success(response, "login").await?;
        let body: LoginResponse = response
            .json()
            .await
            .context("login service returned an unreadable user")?;
        Session::try_from(body.usuario)
    }

    pub async fn change_password(&self, user_id: RecordId, new_password: &str) -> anyhow::Result<()> {
        let url = endpoint(&self.urls.auth, "/auth/alterar-senha");
        debug!(%url, user_id, "changing password");

        let response = self
            .http
            .post(&url)
            .json(&PasswordChange {
                usuario_id: user_id,
                nova_senha: new_password,
            })
            .send()
            .await
            .context("failed to reach the login service")?;
        ensure_success(response, "change password").await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, base: &str, path: &str) -> anyhow::Result<T> {
        let url = endpoint(base, path);
        debug!(%url, "fetching");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        let response = ensure_success(response, &format!("GET {path}")).await?;
        response
            .json()
            .await
            .with_context(|| format!("unexpected payload from {url}"))
    }
}

async fn ensure_success(response: Response, action: &str) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{action} failed ({status}): {}", error_message(&body));
}

/// The services report failures as `{"erro": "..."}`; anything else is shown raw.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.erro)
        .unwrap_or_else(|| body.trim().to_string())
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:4000/", "/avaliacoes"),
            "http://localhost:4000/avaliacoes"
        );
        assert_eq!(
            endpoint("http://localhost:4001", "/alunos/7"),
            "http://localhost:4001/alunos/7"
        );
    }

    #[test]
    fn error_message_prefers_service_message() {
        assert_eq!(error_message(r#"{"erro": "Senha incorreta"}"#), "Senha incorreta");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(r#"{"detail": "x"}"#), r#"{"detail": "x"}"#);
    }

    #[test]
    fn login_response_maps_to_session() {
        let body: LoginResponse = serde_json::from_str(
            r#"{"usuario": {"usuario_id": 12, "nome": "Marta", "email": "marta@escola.com", "role": "admin"}}"#,
        )
        .unwrap();
        let session = Session::try_from(body.usuario).unwrap();
        assert_eq!(session.user_id, 12);
        assert_eq!(session.email.as_deref(), Some("marta@escola.com"));
    }

    #[test]
    fn client_builds_from_config() {
        let config = Config {
            urls: ServiceUrls {
                evaluations: "http://localhost:4000".to_string(),
                students: "http://localhost:4001".to_string(),
                teachers: "http://localhost:4002".to_string(),
                classes: "http://localhost:4004".to_string(),
                auth: "http://localhost:4005".to_string(),
            },
            session_path: ".boletim-session.json".into(),
            http_timeout: std::time::Duration::from_secs(5),
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.urls, config.urls);
    }
}
