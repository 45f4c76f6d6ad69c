//! # Validator Configuration Module
//!
//! Switches that shape how requests and responses are validated.
//!
//! ## Environment Variables
//!
//! Each variable overrides one field; unset or unparseable values leave the
//! default in place. Booleans accept `true`/`false`, `on`/`off`, `1`/`0`,
//! `yes`/`no`.
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `BRRTR_VALIDATE_REQUESTS` | `validate_requests` | `true` |
//! | `BRRTR_VALIDATE_RESPONSES` | `validate_responses` | `false` |
//! | `BRRTR_ALLOW_UNKNOWN_QUERY_PARAMETERS` | `allow_unknown_query_parameters` | `false` |
//! | `BRRTR_COERCE_TYPES` | `coerce_types` | `true` |
//! | `BRRTR_VALIDATE_FORMATS` | `validate_formats` | `true` |
//! | `BRRTR_SCHEMA_CACHE` | `schema_cache` | `true` |
//!
//! ## Usage
//!
//! ```rust
//! use brrtguard::config::ValidatorConfig;
//!
//! let config = ValidatorConfig::from_env();
//! println!("unknown query parameters allowed: {}", config.allow_unknown_query_parameters);
//! ```
//!
//! ## YAML
//!
//! A service `config.yaml` carries the same fields under `validation:`:
//!
//! ```yaml
//! validation:
//!   validate_responses: true
//!   allow_unknown_query_parameters: true
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::env;

/// Validation switches. Every field has a default, so partial YAML works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Validate incoming requests
    pub validate_requests: bool,
    /// Validate outgoing response bodies
    pub validate_responses: bool,
    /// Accept query keys the route does not declare
    pub allow_unknown_query_parameters: bool,
    /// Convert string parameters to their declared scalar types before validation
    pub coerce_types: bool,
    /// Enforce `format` keywords (`date-time`, `email`, `uuid`, ...)
    pub validate_formats: bool,
    /// Memoize compiled validators
    pub schema_cache: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            validate_requests: true,
            validate_responses: false,
            allow_unknown_query_parameters: false,
            coerce_types: true,
            validate_formats: true,
            schema_cache: true,
        }
    }
}

#[derive(Deserialize)]
struct ServiceConfig {
    validation: ValidatorConfig,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn env_flag(name: &str, current: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(current)
}

impl ValidatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        Self {
            validate_requests: env_flag("BRRTR_VALIDATE_REQUESTS", self.validate_requests),
            validate_responses: env_flag("BRRTR_VALIDATE_RESPONSES", self.validate_responses),
            allow_unknown_query_parameters: env_flag(
                "BRRTR_ALLOW_UNKNOWN_QUERY_PARAMETERS",
                self.allow_unknown_query_parameters,
            ),
            coerce_types: env_flag("BRRTR_COERCE_TYPES", self.coerce_types),
            validate_formats: env_flag("BRRTR_VALIDATE_FORMATS", self.validate_formats),
            schema_cache: env_flag("BRRTR_SCHEMA_CACHE", self.schema_cache),
        }
    }

    /// Parse a YAML document: either a service config with a `validation:`
    /// section or a bare mapping of the fields.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or mistyped fields.
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).context("failed to parse validator config")?;
        let has_section = value
            .as_mapping()
            .is_some_and(|m| m.contains_key(serde_yaml::Value::from("validation")));
        if has_section {
            let service: ServiceConfig =
                serde_yaml::from_value(value).context("invalid 'validation' section")?;
            Ok(service.validation)
        } else if value.is_null() {
            Ok(Self::default())
        } else {
            serde_yaml::from_value(value).context("invalid validator config")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert!(config.validate_requests);
        assert!(!config.validate_responses);
        assert!(!config.allow_unknown_query_parameters);
        assert!(config.coerce_types);
        assert!(config.validate_formats);
        assert!(config.schema_cache);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_yaml_section_and_bare() {
        let nested = ValidatorConfig::from_yaml_str(
            "server:\n  port: 8080\nvalidation:\n  validate_responses: true\n",
        )
        .unwrap();
        assert!(nested.validate_responses);
        assert!(nested.validate_requests);

        let bare = ValidatorConfig::from_yaml_str("allow_unknown_query_parameters: true\n").unwrap();
        assert!(bare.allow_unknown_query_parameters);

        assert_eq!(ValidatorConfig::from_yaml_str("").unwrap(), ValidatorConfig::default());
        assert!(ValidatorConfig::from_yaml_str("coerce_types: [1]\n").is_err());
    }
}
