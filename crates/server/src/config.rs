//! Runtime configuration read from the environment.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use api::{auth::AuthConfig, schema::GraphCredentials};
use products_overtime::inactivity::DEFAULT_TIMEOUT;
use tracing::warn;

const DEV_SECRET: &str = "dev-secret";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 8 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub auth: AuthConfig,
    /// Browser origins allowed to call the API with credentials. Empty means
    /// any origin, without cookies.
    pub cors_origins: Vec<String>,
    pub graphiql: bool,
    pub graph: GraphCredentials,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = match get("AUTH_SECRET").filter(|v| !v.trim().is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("AUTH_SECRET is not set; using the development secret");
                DEV_SECRET.to_string()
            }
        };
        let session_ttl_minutes = match get("SESSION_TTL_MINUTES") {
            Some(raw) => {
                let minutes = raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("SESSION_TTL_MINUTES must be a number, got {raw:?}"))?
                    .max(1);
                // Token expiry and cookie Max-Age are computed from this in seconds.
                TimeDelta::try_minutes(minutes).with_context(|| {
                    format!("SESSION_TTL_MINUTES is too large: {minutes}")
                })?;
                minutes
            }
            None => DEFAULT_SESSION_TTL_MINUTES,
        };
        let inactivity_timeout = match get("INACTIVITY_TIMEOUT_MINUTES") {
            Some(raw) => {
                let minutes = raw.trim().parse::<u64>().with_context(|| {
                    format!("INACTIVITY_TIMEOUT_MINUTES must be a number, got {raw:?}")
                })?;
                let seconds = minutes
                    .max(1)
                    .checked_mul(60)
                    .with_context(|| {
                        format!("INACTIVITY_TIMEOUT_MINUTES is too large: {minutes}")
                    })?;
                Duration::from_secs(seconds)
            }
            None => DEFAULT_TIMEOUT,
        };
        let cors_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            auth: AuthConfig {
                jwt_secret,
                session_ttl_minutes,
                inactivity_timeout,
            },
            cors_origins,
            graphiql: env_bool(get("GRAPHIQL_ENABLED"), true),
            graph: GraphCredentials {
                client_secret: get("MS_GRAPH_CLIENT_SECRET"),
            },
        })
    }
}

fn env_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.auth.jwt_secret, DEV_SECRET);
        assert_eq!(cfg.auth.session_ttl_minutes, DEFAULT_SESSION_TTL_MINUTES);
        assert_eq!(cfg.auth.inactivity_timeout, Duration::from_secs(15 * 60));
        assert!(cfg.cors_origins.is_empty());
        assert!(cfg.graphiql);
        assert!(!cfg.graph.is_configured());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("AUTH_SECRET", "prod-secret"),
            ("SESSION_TTL_MINUTES", "60"),
            ("INACTIVITY_TIMEOUT_MINUTES", "5"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("GRAPHIQL_ENABLED", "false"),
            ("MS_GRAPH_CLIENT_SECRET", "abc"),
        ])
        .unwrap();
        assert_eq!(cfg.auth.jwt_secret, "prod-secret");
        assert_eq!(cfg.auth.session_ttl_minutes, 60);
        assert_eq!(cfg.auth.inactivity_timeout, Duration::from_secs(300));
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert!(!cfg.graphiql);
        assert!(cfg.graph.is_configured());
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(config(&[("SESSION_TTL_MINUTES", "soon")]).is_err());
        assert!(config(&[("INACTIVITY_TIMEOUT_MINUTES", "-1")]).is_err());
        let ttl = i64::MAX.to_string();
        let err = config(&[("SESSION_TTL_MINUTES", ttl.as_str())]).unwrap_err();
        assert!(err.to_string().contains("too large"));
        let huge = u64::MAX.to_string();
        let err = config(&[("INACTIVITY_TIMEOUT_MINUTES", huge.as_str())]).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
