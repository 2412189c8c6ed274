//! Configuration file for the `respawn` binary.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs,
    path::Path,
    sync::LazyLock,
    time::Duration,
};

use crate::error::ConfigError;

/// File read when no `--config` is given. Its absence is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "respawn.yaml";

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("environment variable pattern is valid")
});

/// Represents the structure of the configuration file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of workers to keep alive.
    pub workers: Option<usize>,
    /// Log filter directive (e.g. `info`, `respawn=debug`).
    pub log_level: Option<String>,
    /// Settings for the `tick` worker.
    pub tick: TickConfig,
    /// Settings for the `serve` worker.
    pub serve: ServeConfig,
}

/// Settings for the periodic timestamp worker.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TickConfig {
    /// Interval between ticks, e.g. `"10s"` or `"500ms"`.
    pub interval: Option<String>,
}

/// Settings for the shared listener HTTP worker.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// Address the orchestrator binds once and shares with every worker.
    pub addr: Option<String>,
}

/// Expands `${VAR}` and `$VAR` references from the environment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_VAR.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let value = env::var(name).map_err(|_| ConfigError::MissingEnv(name.to_string()))?;
        output.push_str(&input[last..whole.start()]);
        output.push_str(&value);
        last = whole.end();
    }

    output.push_str(&input[last..]);
    Ok(output)
}

/// Loads and parses the configuration file, expanding environment variables.
///
/// With `None`, [`DEFAULT_CONFIG_FILE`] is read when present and defaults are used
/// otherwise. An explicitly named file must exist.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(Config::default());
            }
            fallback
        }
    };

    let content = fs::read_to_string(config_path).map_err(|e| {
        ConfigError::Read(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let expanded = expand_env_vars(&content)?;
    let config: Config = serde_yaml::from_str(&expanded)?;
    Ok(config)
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
///
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    let invalid = |reason: &str| ConfigError::Invalid {
        field: "interval",
        reason: format!("{reason}: '{raw}'"),
    };

    if value.is_empty() {
        return Err(invalid("duration value cannot be empty"));
    }

    if let Some(stripped) = value.strip_suffix("ms") {
        let amount: u64 = stripped
            .trim()
            .parse()
            .map_err(|_| invalid("invalid duration value"))?;
        return Ok(Duration::from_millis(amount));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str
        .parse()
        .map_err(|_| invalid("invalid duration value"))?;

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}
