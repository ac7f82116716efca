use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading configuration from the process environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but could not be parsed into the requested type.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Raw value as found in the environment.
        value: String,
    },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated as missing so `FOO=` in a `.env` file does not
/// silently produce an empty credential.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EnvError::Missing(name.to_string())),
    }
}

/// Reads an optional environment variable. Unset and empty both map to `None`.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when unset, and an error when set to something unparsable.
pub fn get_env_parsed<T: FromStr>(name: &str) -> Result<Option<T>, EnvError> {
    match get_env_var_opt(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| EnvError::Invalid {
            name: name.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_is_reported_by_name() {
        let err = get_env_var("SHARED_UTILS_SURELY_UNSET_VAR").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_SURELY_UNSET_VAR"
        );
    }

    #[test]
    fn unset_parsed_var_is_none() {
        let got: Option<u32> = get_env_parsed("SHARED_UTILS_SURELY_UNSET_VAR").unwrap();
        assert!(got.is_none());
    }
}
