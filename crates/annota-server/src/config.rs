use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use annota_types::models::SubmitMode;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub submit_mode: SubmitMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("ANNOTA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ANNOTA_JWT_SECRET is unset or still a placeholder; it must match the account service's secret");
        }

        let port = match get("ANNOTA_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("ANNOTA_PORT is not a port number: {}", raw))?,
            None => 3000,
        };

        let submit_mode = match get("ANNOTA_CLASSIFICATION_MODE") {
            Some(raw) => SubmitMode::parse(&raw)
                .with_context(|| format!("ANNOTA_CLASSIFICATION_MODE must be replace or append, got {}", raw))?,
            None => SubmitMode::default(),
        };

        Ok(Self {
            jwt_secret,
            db_path: get("ANNOTA_DB_PATH").unwrap_or_else(|| "annota.db".into()).into(),
            host: get("ANNOTA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            submit_mode,
        })
    }
}
