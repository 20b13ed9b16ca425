//! Host application configuration loaded from environment variables

use std::env;

use anyhow::{Context, Result};

use super::ConfigOverrides;

/// Configuration of the host server the adapter is mounted on.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host (for generating URLs)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    /// SQLite URL of the user store
    pub database_url: String,

    /// Development mode (explorer on, debug error logging)
    pub development: bool,

    /// How long an issued login token stays valid
    pub login_expiration_days: i64,

    /// Adapter options read from `GRAPHQL_*` variables
    pub graphql: ConfigOverrides,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let development = match lookup("APP_ENV").as_deref() {
            Some("development") | Some("dev") => true,
            Some(_) => false,
            None => cfg!(debug_assertions),
        };

        let graphql = ConfigOverrides {
            path: lookup("GRAPHQL_PATH"),
            explorer_enabled: lookup("GRAPHQL_EXPLORER").map(|v| parse_flag(&v)),
            explorer_path: lookup("GRAPHQL_EXPLORER_PATH"),
            use_subscription: lookup("GRAPHQL_USE_SUBSCRIPTION").map(|v| parse_flag(&v)),
            subscription_port: lookup("GRAPHQL_SUBSCRIPTION_PORT")
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("Invalid GRAPHQL_SUBSCRIPTION_PORT")?,
            development: Some(development),
            ..Default::default()
        };

        Ok(Self {
            host: lookup("HOST"),

            port: lookup("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:graphql-mount.db".to_string()),

            development,

            login_expiration_days: lookup("LOGIN_EXPIRATION_DAYS")
                .unwrap_or_else(|| "90".to_string())
                .parse()
                .context("Invalid LOGIN_EXPIRATION_DAYS")?,

            graphql,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("APP_ENV", "production")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.login_expiration_days, 90);
        assert!(!config.development);
        assert_eq!(config.graphql.development, Some(false));
        assert!(config.graphql.path.is_none());
    }

    #[test]
    fn test_graphql_overrides() {
        let config = load(&[
            ("APP_ENV", "development"),
            ("GRAPHQL_PATH", "/gql"),
            ("GRAPHQL_EXPLORER", "0"),
            ("GRAPHQL_USE_SUBSCRIPTION", "true"),
            ("GRAPHQL_SUBSCRIPTION_PORT", "9100"),
        ])
        .unwrap();
        assert!(config.development);
        assert_eq!(config.graphql.path.as_deref(), Some("/gql"));
        assert_eq!(config.graphql.explorer_enabled, Some(false));
        assert_eq!(config.graphql.use_subscription, Some(true));
        assert_eq!(config.graphql.subscription_port, Some(9100));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(load(&[("PORT", "not-a-port")]).is_err());
        assert!(load(&[("GRAPHQL_SUBSCRIPTION_PORT", "70000")]).is_err());
    }
}
