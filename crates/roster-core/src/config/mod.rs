//! Runtime configuration.
//!
//! Every endpoint and path the collaborators need is read once into a
//! `RosterConfig` and handed to their constructors.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::diff::DiffStrategy;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Connection settings for the HTTP shadow API
#[derive(Clone, PartialEq, Eq)]
pub struct ShadowHttpConfig {
    /// Base URL without trailing slash
    pub endpoint: String,
    /// Thing that owns the reservation shadows
    pub thing_name: String,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ShadowHttpConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ShadowHttpConfig")
            .field("endpoint", &self.endpoint)
            .field("thing_name", &self.thing_name)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where remote documents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowSource {
    Http(ShadowHttpConfig),
    /// `<dir>/<reservation_code>.json`
    Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterConfig {
    pub listing_id: String,
    pub source: ShadowSource,
    /// Local database path; callers pick a default when unset
    pub db_path: Option<PathBuf>,
    pub diff_strategy: DiffStrategy,
    /// Post `state.reported.syncedVersion` after a successful sync
    pub report_synced_version: bool,
}

impl RosterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listing_id = required_trimmed(&lookup, "ROSTER_LISTING_ID")?;
        let source = parse_source(&lookup)?;
        let db_path = optional_trimmed(&lookup, "ROSTER_DB_PATH").map(PathBuf::from);

        let diff_strategy = match optional_trimmed(&lookup, "ROSTER_DIFF_STRATEGY") {
            Some(value) => value
                .parse::<DiffStrategy>()
                .map_err(|error| ConfigError::Invalid(format!("ROSTER_DIFF_STRATEGY: {error}")))?,
            None => DiffStrategy::default(),
        };

        let report_synced_version =
            match optional_trimmed(&lookup, "ROSTER_REPORT_SYNCED_VERSION") {
                Some(value) => parse_flag(&value).ok_or_else(|| {
                    ConfigError::Invalid(
                        "ROSTER_REPORT_SYNCED_VERSION must be true/false".to_string(),
                    )
                })?,
                None => false,
            };

        if report_synced_version && matches!(source, ShadowSource::Directory(_)) {
            return Err(ConfigError::Invalid(
                "ROSTER_REPORT_SYNCED_VERSION requires ROSTER_SHADOW_ENDPOINT".to_string(),
            ));
        }

        Ok(Self {
            listing_id,
            source,
            db_path,
            diff_strategy,
            report_synced_version,
        })
    }
}

fn parse_source(lookup: impl Fn(&str) -> Option<String>) -> Result<ShadowSource, ConfigError> {
    let endpoint = optional_trimmed(&lookup, "ROSTER_SHADOW_ENDPOINT");
    let directory = optional_trimmed(&lookup, "ROSTER_SHADOW_DIR");

    match (endpoint, directory) {
        (Some(_), Some(_)) => Err(ConfigError::Invalid(
            "set only one of ROSTER_SHADOW_ENDPOINT and ROSTER_SHADOW_DIR".to_string(),
        )),
        (None, None) => Err(ConfigError::MissingVar("ROSTER_SHADOW_ENDPOINT")),
        (None, Some(directory)) => Ok(ShadowSource::Directory(PathBuf::from(directory))),
        (Some(endpoint), None) => {
            if !is_http_url(&endpoint) {
                return Err(ConfigError::Invalid(
                    "ROSTER_SHADOW_ENDPOINT must start with http:// or https://".to_string(),
                ));
            }

            let thing_name = required_trimmed(&lookup, "ROSTER_THING_NAME")?;
            let bearer_token = optional_trimmed(&lookup, "ROSTER_SHADOW_TOKEN");

            let timeout_secs = match optional_trimmed(&lookup, "ROSTER_HTTP_TIMEOUT_SECS") {
                Some(value) => value.parse::<u64>().map_err(|_| {
                    ConfigError::Invalid(
                        "ROSTER_HTTP_TIMEOUT_SECS must be an integer in [1, 120]".to_string(),
                    )
                })?,
                None => DEFAULT_HTTP_TIMEOUT_SECS,
            };
            if !(1..=120).contains(&timeout_secs) {
                return Err(ConfigError::Invalid(
                    "ROSTER_HTTP_TIMEOUT_SECS must be in [1, 120]".to_string(),
                ));
            }

            Ok(ShadowSource::Http(ShadowHttpConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                thing_name,
                bearer_token,
                timeout: Duration::from_secs(timeout_secs),
            }))
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<RosterConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        RosterConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_listing_id() {
        let err = config_from(&[("ROSTER_SHADOW_DIR", "/tmp/shadows")]).unwrap_err();
        assert!(err.to_string().contains("ROSTER_LISTING_ID"));
    }

    #[test]
    fn config_requires_exactly_one_source() {
        let err = config_from(&[("ROSTER_LISTING_ID", "L-1")]).unwrap_err();
        assert!(err.to_string().contains("ROSTER_SHADOW_ENDPOINT"));

        let err = config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_DIR", "/tmp/shadows"),
            ("ROSTER_SHADOW_ENDPOINT", "https://shadow.example.com"),
            ("ROSTER_THING_NAME", "gate-1"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("only one"));
    }

    #[test]
    fn http_source_defaults() {
        let config = config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_ENDPOINT", "https://shadow.example.com/"),
            ("ROSTER_THING_NAME", "gate-1"),
        ])
        .unwrap();

        assert_eq!(config.diff_strategy, DiffStrategy::Positional);
        assert!(!config.report_synced_version);
        let ShadowSource::Http(http) = config.source else {
            panic!("expected http source");
        };
        assert_eq!(http.endpoint, "https://shadow.example.com");
        assert_eq!(http.timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    }

    #[test]
    fn http_source_validates_endpoint_thing_and_timeout() {
        let base = [
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_ENDPOINT", "https://shadow.example.com"),
        ];
        assert!(config_from(&base)
            .unwrap_err()
            .to_string()
            .contains("ROSTER_THING_NAME"));

        assert!(config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_ENDPOINT", "shadow.example.com"),
            ("ROSTER_THING_NAME", "gate-1"),
        ])
        .is_err());

        assert!(config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_ENDPOINT", "https://shadow.example.com"),
            ("ROSTER_THING_NAME", "gate-1"),
            ("ROSTER_HTTP_TIMEOUT_SECS", "0"),
        ])
        .is_err());
    }

    #[test]
    fn strategy_and_flag_are_parsed() {
        let config = config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_ENDPOINT", "https://shadow.example.com"),
            ("ROSTER_THING_NAME", "gate-1"),
            ("ROSTER_DIFF_STRATEGY", "keyed"),
            ("ROSTER_REPORT_SYNCED_VERSION", "yes"),
        ])
        .unwrap();
        assert_eq!(config.diff_strategy, DiffStrategy::Keyed);
        assert!(config.report_synced_version);

        assert!(config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_DIR", "/tmp/shadows"),
            ("ROSTER_DIFF_STRATEGY", "by-index"),
        ])
        .is_err());
    }

    #[test]
    fn reporting_needs_http_source() {
        let err = config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_DIR", "/tmp/shadows"),
            ("ROSTER_REPORT_SYNCED_VERSION", "true"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("ROSTER_SHADOW_ENDPOINT"));
    }

    #[test]
    fn config_redacts_bearer_token() {
        let config = config_from(&[
            ("ROSTER_LISTING_ID", "L-1"),
            ("ROSTER_SHADOW_ENDPOINT", "https://shadow.example.com"),
            ("ROSTER_THING_NAME", "gate-1"),
            ("ROSTER_SHADOW_TOKEN", "sensitive-shadow-token"),
        ])
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-shadow-token"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
