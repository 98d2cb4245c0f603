//! Content screening for chat input and model output.
//!
//! Keyword- and pattern-based, pure and deterministic: no network calls, no
//! classifier models. Input screening hard-blocks configured terms and flags
//! off-topic questions; output screening redacts PII before anything reaches
//! the user.

mod config;
mod error;
mod input;
mod output;

pub use config::GuardrailConfig;
pub use error::{Error, Result};
pub use input::{InputScreen, InputVerdict, REDIRECT_SYSTEM_PROMPT};
pub use output::{OutputScreen, Redaction};
