//! Guardrail configuration loaded from TOML.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Guardrail configuration.
///
/// All lists are fully overridable; the defaults target a requirements
/// management assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Master switch. When false both screens pass everything through.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Terms that hard-block an input message (case-insensitive substring).
    #[serde(default)]
    pub blocked_terms: Vec<String>,

    /// Keywords that mark an input as on-topic.
    #[serde(default = "default_valid_topics")]
    pub valid_topics: Vec<String>,

    /// Keywords that mark an input as off-topic.
    #[serde(default = "default_invalid_topics")]
    pub invalid_topics: Vec<String>,

    /// PII entity names the output screen redacts. Unknown names are ignored.
    #[serde(default = "default_pii_entities")]
    pub pii_entities: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            blocked_terms: Vec::new(),
            valid_topics: default_valid_topics(),
            invalid_topics: default_invalid_topics(),
            pii_entities: default_pii_entities(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_valid_topics() -> Vec<String> {
    [
        "requirements management",
        "requirements engineering",
        "traceability",
        "jama software",
        "jama connect",
        "incose",
        "ears notation",
        "system requirements",
        "software requirements",
        "verification",
        "validation",
        "requirements analysis",
        "requirements specification",
        "requirements elicitation",
        "stakeholder requirements",
        "functional requirements",
        "non-functional requirements",
        "requirements review",
        "requirements baseline",
        "change management",
        "impact analysis",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_invalid_topics() -> Vec<String> {
    [
        "politics",
        "religion",
        "sports",
        "entertainment",
        "cooking",
        "travel",
        "fashion",
        "gaming",
        "cryptocurrency",
        "stock trading",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_pii_entities() -> Vec<String> {
    [
        "EMAIL_ADDRESS",
        "PHONE_NUMBER",
        "US_SSN",
        "CREDIT_CARD",
        "IP_ADDRESS",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl GuardrailConfig {
    /// Load config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Disabled config: both screens become pass-through.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_requirements_domain() {
        let config = GuardrailConfig::default();
        assert!(config.enabled);
        assert!(config.valid_topics.iter().any(|t| t == "traceability"));
        assert!(config.pii_entities.iter().any(|e| e == "EMAIL_ADDRESS"));
        assert!(config.blocked_terms.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = GuardrailConfig::parse(
            r#"
            blocked_terms = ["rm -rf"]
            "#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.blocked_terms, vec!["rm -rf"]);
        assert!(!config.valid_topics.is_empty());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            GuardrailConfig::parse("enabled = \"maybe\""),
            Err(Error::Parse(_))
        ));
    }
}
