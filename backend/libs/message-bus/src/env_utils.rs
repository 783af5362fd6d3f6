//! Environment variable parsing for bus settings
//!
//! Services read their broker settings through a lookup function so tests can
//! feed variables without touching the process environment.

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("{name} environment variable not set")]
    Missing { name: String },

    #[error("{name} has an invalid value: {value:?} ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Read a variable that has no default
///
/// # Example
/// ```ignore
/// let brokers = required(&|name| std::env::var(name).ok(), "KAFKA_BROKERS")?;
/// ```
pub fn required<F>(lookup: &F, name: &str) -> Result<String, EnvError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| EnvError::Missing {
        name: name.to_string(),
    })
}

/// Parse an optional variable, falling back to `default` only when it is unset.
/// A value that is present but does not parse is an error.
pub fn parse_or<F, T>(lookup: &F, name: &str, default: fn() -> T) -> Result<T, EnvError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| EnvError::Invalid {
            name: name.to_string(),
            value: raw.clone(),
            reason: err.to_string(),
        }),
        None => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn vars(name: &str) -> Option<String> {
        match name {
            "KAFKA_BROKERS" => Some("kafka:9092".to_string()),
            "KAFKA_MAX_RETRIES" => Some(" 5 ".to_string()),
            "KAFKA_RETRY_DELAY_MS" => Some("soon".to_string()),
            _ => None,
        }
    }

    fn three() -> u32 {
        3
    }

    #[test]
    fn test_required() {
        assert_eq!(assert_ok!(required(&vars, "KAFKA_BROKERS")), "kafka:9092");

        let err = assert_err!(required(&vars, "DATABASE_URL"));
        assert_eq!(err.to_string(), "DATABASE_URL environment variable not set");
    }

    #[test]
    fn test_parse_or_trims_and_defaults() {
        assert_eq!(assert_ok!(parse_or(&vars, "KAFKA_MAX_RETRIES", three)), 5);
        assert_eq!(assert_ok!(parse_or(&vars, "KAFKA_MAX_DLQ_RETRIES", three)), 3);
    }

    #[test]
    fn test_parse_or_rejects_invalid_value() {
        let err = assert_err!(parse_or::<_, u64>(&vars, "KAFKA_RETRY_DELAY_MS", || 1000));

        assert!(matches!(err, EnvError::Invalid { ref value, .. } if value == "soon"));
        assert!(err.to_string().contains("KAFKA_RETRY_DELAY_MS"));
    }
}
