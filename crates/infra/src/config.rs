//! Backend connection settings.
//!
//! The export subsystem has no settings of its own; it reuses the application's
//! API base URL and bearer token.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

const BASE_URL_VAR: &str = "API_BASE_URL";
const TOKEN_VAR: &str = "API_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL without a trailing slash, e.g. `https://erp.example.com/api`.
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read `API_BASE_URL` and `API_TOKEN` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`], with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("API_BASE_URL not set; using {}", DEFAULT_BASE_URL);
                DEFAULT_BASE_URL.to_string()
            });

        let mut config = Self::new(base_url);
        config.token = lookup(TOKEN_VAR).filter(|v| !v.trim().is_empty());
        config
    }

    /// Absolute URL for an API path (`export-status/t-1/` → `{base}/export-status/t-1/`).
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn falls_back_to_local_api() {
        let config = ApiConfig::from_lookup(lookup(&[]));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token, None);
    }

    #[test]
    fn reads_base_url_and_token() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "https://erp.example.com/api/"),
            ("API_TOKEN", "secret"),
        ]));
        assert_eq!(config.base_url, "https://erp.example.com/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = ApiConfig::from_lookup(lookup(&[("API_TOKEN", "  ")]));
        assert_eq!(config.token, None);
    }

    #[test]
    fn endpoint_joins_paths() {
        let config = ApiConfig::new("http://h/api/");
        assert_eq!(config.endpoint("/export-transactions/"), "http://h/api/export-transactions/");
        assert_eq!(config.endpoint("transactions/"), "http://h/api/transactions/");
    }
}
