//! Environment-derived server configuration.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use forge_ai::backend::DEFAULT_OPENROUTER_BASE_URL;
use forge_ai::{Capability, PipelineConfig};
use secrecy::SecretString;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingKey(&'static str),
    Invalid {
        key: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingKey(key) => {
                write!(f, "missing required environment variable {key}")
            }
            ConfigError::Invalid { key, reason } => {
                write!(f, "invalid value for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub base_url: String,
    pub api_key: SecretString,
    pub planner_model: String,
    pub coder_model: String,
    pub reviewer_model: String,
    pub retry_budget: usize,
    pub review: bool,
    pub spool_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENROUTER_API_KEY")
            .map(SecretString::new)
            .map_err(|_| ConfigError::MissingKey("OPENROUTER_API_KEY"))?;

        let defaults = PipelineConfig::default();

        Ok(Self {
            bind_addr: parse_var("FORGE_BIND_ADDR", "0.0.0.0:8000")?,
            base_url: var_or("OPENROUTER_BASE_URL", DEFAULT_OPENROUTER_BASE_URL),
            api_key,
            planner_model: var_or("FORGE_PLANNER_MODEL", &defaults.planner.model),
            coder_model: var_or("FORGE_CODER_MODEL", &defaults.coder.model),
            reviewer_model: var_or("FORGE_REVIEWER_MODEL", &defaults.reviewer.model),
            retry_budget: parse_var("FORGE_RETRY_BUDGET", "3")?,
            review: parse_bool(&var_or("FORGE_REVIEW", "false")),
            spool_dir: PathBuf::from(var_or(
                "FORGE_SPOOL_DIR",
                env::temp_dir().to_string_lossy().as_ref(),
            )),
            static_dir: PathBuf::from(var_or("FORGE_STATIC_DIR", "static")),
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            retry_budget: self.retry_budget,
            review: self.review,
            planner: Capability {
                model: self.planner_model.clone(),
                ..defaults.planner
            },
            coder: Capability {
                model: self.coder_model.clone(),
                ..defaults.coder
            },
            reviewer: Capability {
                model: self.reviewer_model.clone(),
                ..defaults.reviewer
            },
            eval_limits: defaults.eval_limits,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    var_or(key, default)
        .parse()
        .map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: err.to_string(),
        })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
