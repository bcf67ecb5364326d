//! Process configuration read from environment variables.
//!
//! `Config::from_env` reads the real environment; `Config::from_lookup` takes any
//! key lookup so tests can build a config without touching process state.

use thiserror::Error;

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("unknown store backend '{0}' (expected: memory)")]
    UnknownStore(String),
}

/// Which relational store backend to construct at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres { dsn: String },
    SupabaseRest,
    None,
}

impl StoreBackend {
    /// Name safe to log; the Postgres DSN may carry a password.
    pub fn label(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Postgres { .. } => "postgres",
            StoreBackend::SupabaseRest => "supabase",
            StoreBackend::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_service_key: Option<String>,
    pub database_url: Option<String>,
    pub store_override: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty strings count as unset
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_port = match get("STUDYHALL_HTTP_PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::Invalid { key: "STUDYHALL_HTTP_PORT", value: v.clone() })?,
            None => DEFAULT_HTTP_PORT,
        };
        let store_override = get("STUDYHALL_STORE");
        if let Some(s) = &store_override {
            if !s.eq_ignore_ascii_case("memory") {
                return Err(ConfigError::UnknownStore(s.clone()));
            }
        }

        Ok(Config {
            http_port,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            supabase_url: get("SUPABASE_URL"),
            supabase_anon_key: get("SUPABASE_KEY"),
            supabase_service_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            database_url: get("DATABASE_URL"),
            store_override,
        })
    }

    /// Key used for Supabase calls: service-role (bypasses row-level security) when present.
    pub fn supabase_key(&self) -> Option<&str> {
        self.supabase_service_key.as_deref().or(self.supabase_anon_key.as_deref())
    }

    pub fn uses_service_role(&self) -> bool {
        self.supabase_service_key.is_some()
    }

    pub fn supabase_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_key().is_some()
    }

    pub fn store_backend(&self) -> StoreBackend {
        if self.store_override.is_some() {
            return StoreBackend::Memory;
        }
        if let Some(dsn) = &self.database_url {
            return StoreBackend::Postgres { dsn: dsn.clone() };
        }
        if self.supabase_configured() {
            return StoreBackend::SupabaseRest;
        }
        StoreBackend::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(c.openai_model, "gpt-3.5-turbo");
        assert!(c.openai_api_key.is_none());
        assert_eq!(c.store_backend(), StoreBackend::None);
    }

    #[test]
    fn service_role_key_is_preferred() {
        let c = cfg(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "anon"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ]).unwrap();
        assert_eq!(c.supabase_key(), Some("service"));
        assert!(c.uses_service_role());
        assert_eq!(c.store_backend(), StoreBackend::SupabaseRest);

        let anon = cfg(&[("SUPABASE_URL", "https://x.supabase.co"), ("SUPABASE_KEY", "anon"), ("SUPABASE_SERVICE_ROLE_KEY", " ")]).unwrap();
        assert_eq!(anon.supabase_key(), Some("anon"));
        assert!(!anon.uses_service_role());
    }

    #[test]
    fn store_selection_precedence() {
        let c = cfg(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "anon"),
            ("DATABASE_URL", "postgres://localhost/study"),
        ]).unwrap();
        assert_eq!(c.store_backend(), StoreBackend::Postgres { dsn: "postgres://localhost/study".into() });

        let m = cfg(&[("DATABASE_URL", "postgres://localhost/study"), ("STUDYHALL_STORE", "Memory")]).unwrap();
        assert_eq!(m.store_backend(), StoreBackend::Memory);
    }

    #[test]
    fn rejects_bad_port_and_unknown_store() {
        assert_eq!(
            cfg(&[("STUDYHALL_HTTP_PORT", "eighty")]).unwrap_err(),
            ConfigError::Invalid { key: "STUDYHALL_HTTP_PORT", value: "eighty".into() }
        );
        assert!(matches!(cfg(&[("STUDYHALL_STORE", "sqlite")]), Err(ConfigError::UnknownStore(_))));
    }
}
