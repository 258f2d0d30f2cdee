//! Application configuration loaded from environment variables.

use relief_engine::FundingPolicy;

use crate::errors::{GatewayError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Whether funded incidents keep accepting donations
    pub funding_policy: FundingPolicy,
    /// Load the demo incidents and donations into an empty database
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./relief_ledger.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| GatewayError::Config("Invalid API_PORT".to_string()))?,
            funding_policy: env_var("FUNDING_POLICY")
                .unwrap_or_else(|_| "permissive".to_string())
                .parse()
                .map_err(|_| GatewayError::Config("Invalid FUNDING_POLICY".to_string()))?,
            seed_demo_data: parse_bool(
                "SEED_DEMO_DATA",
                &env_var("SEED_DEMO_DATA").unwrap_or_else(|_| "false".to_string()),
            )?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| GatewayError::Config(format!("Missing env var: {key}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(GatewayError::Config(format!("Invalid {key}"))),
    }
}
