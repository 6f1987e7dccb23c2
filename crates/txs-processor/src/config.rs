use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_PREFIX: &str = "TXS_PROCESSOR_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Blocks buffered between the background receiver and the processor.
    pub queue_capacity: usize,
    /// Attempts per block after the first one, for retryable failures only.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_retries: 5,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 10_000,
            database_url: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::ConfigInvalid(
                "queue_capacity must be >= 1".to_string(),
            ));
        }
        if self.retry_base_delay_ms == 0 {
            return Err(Error::ConfigInvalid(
                "retry_base_delay_ms must be >= 1".to_string(),
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(Error::ConfigInvalid(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        if let Some(url) = &self.database_url
            && url.trim().is_empty()
        {
            return Err(Error::ConfigInvalid(
                "database_url must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigInvalid(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigInvalid(format!("parse {}: {e}", path.display())))
    }

    /// Overlays `TXS_PROCESSOR_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(std::env::vars())
    }

    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "QUEUE_CAPACITY" => self.queue_capacity = parse_var(&key, &value)?,
                "MAX_RETRIES" => self.max_retries = parse_var(&key, &value)?,
                "RETRY_BASE_DELAY_MS" => self.retry_base_delay_ms = parse_var(&key, &value)?,
                "RETRY_MAX_DELAY_MS" => self.retry_max_delay_ms = parse_var(&key, &value)?,
                "DATABASE_URL" => self.database_url = Some(value),
                _ => {}
            }
        }
        Ok(self)
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        self.retry_base_delay_ms
            .saturating_mul(factor)
            .min(self.retry_max_delay_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigInvalid(format!("{key}={value:?}: {e}")))
}
