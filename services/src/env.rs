//! Environment readers with errors that name the offending variable.

use std::str::FromStr;

use thiserror::Error;

/// Failure to interpret an environment variable.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Variable is present but does not parse into the expected type.
    #[error("failed to parse env variable: {key} = '{value}'")]
    Parse { key: String, value: String },
}

/// Read a trimmed, non-empty string variable.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an optional variable. Missing or blank → `Ok(None)`.
pub fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, EnvError> {
    match env_string(key) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| EnvError::Parse {
                key: key.into(),
                value: v,
            }),
        None => Ok(None),
    }
}

/// Read and parse a variable, falling back to `default` when it is not set.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, EnvError> {
    Ok(parse_env(key)?.unwrap_or(default))
}

/// Read a comma-separated list. Blank items are dropped; an empty list is `None`.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = env_string(key)?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}
