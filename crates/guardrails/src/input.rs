//! Input screening: blocked-term rejection and topic restriction.

use crate::{Error, GuardrailConfig, Result};

/// System prompt the caller swaps in for off-topic questions. The assistant
/// answers without tools and steers the user back on topic.
pub const REDIRECT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant specializing in requirements management.
The user has asked a question that appears to be outside your area of expertise.

Your role is to:
1. Acknowledge their question politely
2. Explain that you specialize in requirements management topics
3. Gently redirect them back to topics you can help with
4. Offer specific suggestions related to requirements management

Topics you can help with include:
- Requirements management best practices
- Jama Software and Jama Connect
- Requirements traceability
- INCOSE guidelines
- EARS notation
- Verification and validation
- Requirements analysis and specification
- Change management and impact analysis

Be warm, helpful, and encouraging while steering the conversation back to your expertise.";

const BLOCKED_MESSAGE: &str = "Your message contains content that violates our usage policy. \
Please rephrase your question.";

/// The screen's judgment on one input message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputVerdict {
    /// Off-topic inputs are flagged, never blocked; the caller decides how
    /// to respond (typically via [`REDIRECT_SYSTEM_PROMPT`]).
    pub on_topic: bool,
}

/// Validates user input before it reaches the model.
#[derive(Debug, Clone)]
pub struct InputScreen {
    config: GuardrailConfig,
}

impl InputScreen {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// Screen one user message.
    ///
    /// A blocked term rejects the message with [`Error::Blocked`]. Topic
    /// matching is case-insensitive keyword search; an input matching no
    /// topic list at all gets the benefit of the doubt.
    pub fn screen(&self, input: &str) -> Result<InputVerdict> {
        if !self.config.enabled {
            return Ok(InputVerdict { on_topic: true });
        }

        let lowered = input.to_lowercase();

        if let Some(term) = self
            .config
            .blocked_terms
            .iter()
            .find(|term| lowered.contains(&term.to_lowercase()))
        {
            tracing::warn!(term = %term, "blocked term in user input");
            return Err(Error::Blocked(BLOCKED_MESSAGE.to_string()));
        }

        let matches_any = |topics: &[String]| {
            topics
                .iter()
                .any(|topic| lowered.contains(&topic.to_lowercase()))
        };

        let on_topic = if matches_any(&self.config.valid_topics) {
            true
        } else if matches_any(&self.config.invalid_topics) {
            tracing::info!("off-topic input flagged");
            false
        } else {
            true
        };

        Ok(InputVerdict { on_topic })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> InputScreen {
        InputScreen::new(GuardrailConfig::default())
    }

    #[test]
    fn domain_question_is_on_topic() {
        let verdict = screen().screen("What is EARS notation?").unwrap();
        assert!(verdict.on_topic);
    }

    #[test]
    fn invalid_topic_is_flagged_not_blocked() {
        let verdict = screen().screen("Who will win the sports game?").unwrap();
        assert!(!verdict.on_topic);
    }

    #[test]
    fn valid_topic_outranks_invalid() {
        let verdict = screen()
            .screen("How does traceability apply to gaming software?")
            .unwrap();
        assert!(verdict.on_topic);
    }

    #[test]
    fn unclassified_input_is_assumed_on_topic() {
        let verdict = screen().screen("hello there").unwrap();
        assert!(verdict.on_topic);
    }

    #[test]
    fn blocked_term_is_a_hard_block() {
        let mut config = GuardrailConfig::default();
        config.blocked_terms = vec!["forbidden phrase".into()];
        let screen = InputScreen::new(config);
        let err = screen.screen("say the Forbidden Phrase now").unwrap_err();
        assert!(matches!(err, Error::Blocked(_)));
        assert!(err.to_string().contains("usage policy"));
    }

    #[test]
    fn disabled_config_passes_everything() {
        let mut config = GuardrailConfig::disabled();
        config.blocked_terms = vec!["anything".into()];
        let screen = InputScreen::new(config);
        assert!(screen.screen("anything goes, even sports").unwrap().on_topic);
    }
}
