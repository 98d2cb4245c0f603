//! Output screening: PII redaction and blocked-term masking.

use crate::GuardrailConfig;
use regex::Regex;

/// A PII pattern and the placeholder that replaces its matches.
struct Entity {
    name: &'static str,
    pattern: Regex,
}

/// Result of screening one model response.
#[derive(Debug, Clone)]
pub struct Redaction {
    /// The sanitized text.
    pub text: String,
    /// Entity names that matched, in detection order, deduplicated.
    pub entities: Vec<String>,
}

impl Redaction {
    pub fn pii_detected(&self) -> bool {
        !self.entities.is_empty()
    }
}

/// Sanitizes model output before it reaches the user.
///
/// Matches are replaced with `<ENTITY_NAME>` placeholders rather than
/// blocking the whole response.
pub struct OutputScreen {
    enabled: bool,
    entities: Vec<Entity>,
    blocked_terms: Vec<String>,
}

impl OutputScreen {
    pub fn new(config: GuardrailConfig) -> Self {
        let mut entities: Vec<Entity> = config
            .pii_entities
            .iter()
            .filter_map(|name| compile_entity(name))
            .collect();
        // Most-specific patterns run first, whatever order the config lists
        // them in. PHONE_NUMBER must go last or it chews a 3-3-4 chunk out
        // of card numbers before CREDIT_CARD ever sees them.
        entities.sort_by_key(|entity| entity_rank(entity.name));
        Self {
            enabled: config.enabled,
            entities,
            blocked_terms: config.blocked_terms,
        }
    }

    /// Redact PII and mask blocked terms.
    pub fn screen(&self, output: &str) -> Redaction {
        if !self.enabled {
            return Redaction {
                text: output.to_string(),
                entities: Vec::new(),
            };
        }

        let mut text = output.to_string();
        let mut detected: Vec<String> = Vec::new();

        for entity in &self.entities {
            if entity.pattern.is_match(&text) {
                let placeholder = format!("<{}>", entity.name);
                text = entity.pattern.replace_all(&text, placeholder.as_str()).into_owned();
                detected.push(entity.name.to_string());
            }
        }

        for term in &self.blocked_terms {
            if let Some(masked) = mask_term(&text, term) {
                text = masked;
                if !detected.iter().any(|e| e == "BLOCKED_TERM") {
                    detected.push("BLOCKED_TERM".to_string());
                }
            }
        }

        if !detected.is_empty() {
            tracing::info!(entities = ?detected, "output content redacted");
        }

        Redaction {
            text,
            entities: detected,
        }
    }
}

/// Case-insensitive replacement of `term` with asterisks; `None` if absent.
fn mask_term(text: &str, term: &str) -> Option<String> {
    if term.is_empty() {
        return None;
    }
    // A literal regex rather than offsets into a lowercased copy: lowercasing
    // can change byte lengths (e.g. 'İ' maps to two chars), so offsets from
    // the copy do not index safely into the original text.
    let pattern = regex::RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()?;
    if !pattern.is_match(text) {
        return None;
    }
    let masked = pattern.replace_all(text, |m: &regex::Captures<'_>| {
        "*".repeat(m[0].chars().count())
    });
    Some(masked.into_owned())
}

/// Fixed precedence for running redaction patterns. Lower runs first.
fn entity_rank(name: &str) -> usize {
    match name {
        "EMAIL_ADDRESS" => 0,
        "CREDIT_CARD" => 1,
        "US_SSN" => 2,
        "IP_ADDRESS" => 3,
        "PHONE_NUMBER" => 4,
        _ => 5,
    }
}

fn compile_entity(name: &str) -> Option<Entity> {
    // Patterns follow common US-centric formats. Known-good at compile time.
    let (name, pattern) = match name {
        "EMAIL_ADDRESS" => (
            "EMAIL_ADDRESS",
            r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
        ),
        "PHONE_NUMBER" => (
            "PHONE_NUMBER",
            r"(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
        ),
        "US_SSN" => ("US_SSN", r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b"),
        "CREDIT_CARD" => (
            "CREDIT_CARD",
            r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
        ),
        "IP_ADDRESS" => (
            "IP_ADDRESS",
            r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
        ),
        _ => {
            tracing::warn!(entity = %name, "unknown PII entity ignored");
            return None;
        }
    };
    let pattern = Regex::new(pattern).ok()?;
    Some(Entity { name, pattern })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> OutputScreen {
        OutputScreen::new(GuardrailConfig::default())
    }

    #[test]
    fn email_is_redacted() {
        let redaction = screen().screen("Contact john@email.com for info.");
        assert_eq!(redaction.text, "Contact <EMAIL_ADDRESS> for info.");
        assert!(redaction.pii_detected());
        assert_eq!(redaction.entities, vec!["EMAIL_ADDRESS"]);
    }

    #[test]
    fn ssn_and_phone_are_redacted() {
        let redaction = screen().screen("SSN 123-45-6789, call 555-123-4567.");
        assert!(redaction.text.contains("<US_SSN>"));
        assert!(redaction.text.contains("<PHONE_NUMBER>"));
        assert!(!redaction.text.contains("6789"));
    }

    #[test]
    fn credit_card_is_redacted() {
        let redaction = screen().screen("Card: 4111111111111111");
        assert_eq!(redaction.text, "Card: <CREDIT_CARD>");
    }

    #[test]
    fn card_redaction_survives_config_order() {
        // Listing PHONE_NUMBER ahead of CREDIT_CARD must not let the phone
        // pattern consume part of the card number first.
        let mut config = GuardrailConfig::default();
        config.pii_entities = vec!["PHONE_NUMBER".into(), "CREDIT_CARD".into()];
        let screen = OutputScreen::new(config);
        let redaction = screen.screen("Card: 4111111111111111, call 555-123-4567.");
        assert_eq!(redaction.text, "Card: <CREDIT_CARD>, call <PHONE_NUMBER>.");
    }

    #[test]
    fn clean_output_passes_unchanged() {
        let redaction = screen().screen("Traceability links requirements to tests.");
        assert_eq!(redaction.text, "Traceability links requirements to tests.");
        assert!(!redaction.pii_detected());
    }

    #[test]
    fn blocked_terms_are_masked() {
        let mut config = GuardrailConfig::default();
        config.blocked_terms = vec!["secret".into()];
        let screen = OutputScreen::new(config);
        let redaction = screen.screen("The Secret is safe.");
        assert_eq!(redaction.text, "The ****** is safe.");
        assert!(redaction.entities.iter().any(|e| e == "BLOCKED_TERM"));
    }

    #[test]
    fn masking_handles_multibyte_neighbors() {
        // 'İ' lowercases to two chars, so byte offsets computed against a
        // lowercased copy would slice the original mid-character.
        let mut config = GuardrailConfig::default();
        config.blocked_terms = vec!["secret".into()];
        let screen = OutputScreen::new(config);
        let redaction = screen.screen("İstanbul Secret plan");
        assert_eq!(redaction.text, "İstanbul ****** plan");
    }

    #[test]
    fn entity_list_controls_what_runs() {
        let mut config = GuardrailConfig::default();
        config.pii_entities = vec!["US_SSN".into()];
        let screen = OutputScreen::new(config);
        let redaction = screen.screen("john@email.com and 123-45-6789");
        assert!(redaction.text.contains("john@email.com"));
        assert!(redaction.text.contains("<US_SSN>"));
    }

    #[test]
    fn disabled_screen_is_pass_through() {
        let screen = OutputScreen::new(GuardrailConfig::disabled());
        let redaction = screen.screen("john@email.com");
        assert_eq!(redaction.text, "john@email.com");
    }
}
