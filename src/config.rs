//! Service locations and local paths, read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub mod defaults {
    pub const EVALUATIONS_URL: &str = "http://localhost:4000";
    pub const STUDENTS_URL: &str = "http://localhost:4001";
    pub const TEACHERS_URL: &str = "http://localhost:4002";
    pub const CLASSES_URL: &str = "http://localhost:4004";
    pub const AUTH_URL: &str = "http://localhost:4005";
    pub const SESSION_PATH: &str = ".boletim-session.json";
    pub const HTTP_TIMEOUT_SECS: u64 = 10;
}

/// Base URL of each backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub evaluations: String,
    pub students: String,
    pub teachers: String,
    pub classes: String,
    pub auth: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub urls: ServiceUrls,
    pub session_path: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let timeout_secs = match lookup("BOLETIM_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("BOLETIM_HTTP_TIMEOUT_SECS must be whole seconds, got {raw:?}"))?,
            None => defaults::HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            urls: ServiceUrls {
                evaluations: var("BOLETIM_EVALUATIONS_URL", defaults::EVALUATIONS_URL),
                students: var("BOLETIM_STUDENTS_URL", defaults::STUDENTS_URL),
                teachers: var("BOLETIM_TEACHERS_URL", defaults::TEACHERS_URL),
                classes: var("BOLETIM_CLASSES_URL", defaults::CLASSES_URL),
                auth: var("BOLETIM_AUTH_URL", defaults::AUTH_URL),
            },
            session_path: PathBuf::from(var("BOLETIM_SESSION_PATH", defaults::SESSION_PATH)),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_point_at_local_services() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.urls.evaluations, defaults::EVALUATIONS_URL);
        assert_eq!(config.urls.auth, defaults::AUTH_URL);
        assert_eq!(config.session_path, PathBuf::from(defaults::SESSION_PATH));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = config_from(&[
            ("BOLETIM_STUDENTS_URL", "https://alunos.escola.com"),
            ("BOLETIM_CLASSES_URL", ""),
            ("BOLETIM_HTTP_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.urls.students, "https://alunos.escola.com");
        assert_eq!(config.urls.classes, defaults::CLASSES_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_timeout_is_an_error() {
        assert!(config_from(&[("BOLETIM_HTTP_TIMEOUT_SECS", "soon")]).is_err());
    }
}
