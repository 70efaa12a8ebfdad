//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const ENV_CANCEL_GRACE_MS: &str = "JOB_BRIDGE_CANCEL_GRACE_MS";
const ENV_RESCHEDULE_ON_CANCEL: &str = "JOB_BRIDGE_RESCHEDULE_ON_CANCEL";
const ENV_RESCHEDULE_ON_FAULT: &str = "JOB_BRIDGE_RESCHEDULE_ON_FAULT";
const ENV_MAX_ACTIVE_JOBS: &str = "JOB_BRIDGE_MAX_ACTIVE_JOBS";

/// Dispatch bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How long a cancelled job may keep running before the bridge gives up
    /// waiting and reports it finished anyway.
    pub cancel_grace_period: Duration,
    /// Ask the external scheduler to reschedule jobs that were stopped.
    pub reschedule_on_cancel: bool,
    /// Ask the external scheduler to reschedule jobs whose delegate errored
    /// or panicked.
    pub reschedule_on_fault: bool,
    /// Maximum number of concurrently running jobs (0 = unlimited).
    pub max_active_jobs: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cancel_grace_period: Duration::from_secs(5),
            reschedule_on_cancel: true,
            reschedule_on_fault: true,
            max_active_jobs: 0,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `JOB_BRIDGE_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CANCEL_GRACE_MS) {
            let ms: u64 = parse_value(ENV_CANCEL_GRACE_MS, &raw)?;
            config.cancel_grace_period = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_RESCHEDULE_ON_CANCEL) {
            config.reschedule_on_cancel = parse_bool(ENV_RESCHEDULE_ON_CANCEL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RESCHEDULE_ON_FAULT) {
            config.reschedule_on_fault = parse_bool(ENV_RESCHEDULE_ON_FAULT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ACTIVE_JOBS) {
            config.max_active_jobs = parse_value(ENV_MAX_ACTIVE_JOBS, &raw)?;
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
