//! Lightweight intent parsing
//!
//! Scores text against a fixed keyword table, extracts entities, and reports
//! which required fields are still missing. Used when the brain loop is not
//! in play.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub mod clarify;
pub mod entities;
pub mod patterns;

pub use clarify::clarifying_question;
pub use entities::EntityExtractor;
pub use patterns::{IntentPattern, FALLBACK_INTENT, LOW_CONFIDENCE_THRESHOLD, PATTERNS};

#[derive(Error, Debug)]
pub enum IntentError {
    #[error("invalid entity pattern: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, IntentError>;

/// Parser output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub intent: String,
    pub action: String,
    pub confidence: f64,
    pub parameters: Map<String, Value>,
    pub missing_fields: Vec<String>,
}

impl ParsedIntent {
    /// Question for the first missing field
    pub fn clarifying_question(&self) -> Option<String> {
        self.missing_fields.first().map(|f| clarifying_question(f))
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

pub struct IntentParser {
    extractor: EntityExtractor,
}

impl IntentParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            extractor: EntityExtractor::new()?,
        })
    }

    /// Parse `text` with caller-supplied `context` entities.
    ///
    /// Context values win over extracted values with the same key.
    pub fn parse(&self, text: &str, context: &Map<String, Value>) -> ParsedIntent {
        let lowered = text.to_lowercase();

        let (pattern, score) = match patterns::best_match(&lowered) {
            Some((p, s)) if s >= LOW_CONFIDENCE_THRESHOLD => (Some(p), s),
            Some((_, s)) => (None, s),
            None => (None, 0.0),
        };

        let mut parameters = self.extractor.extract(text);
        for (key, value) in context {
            parameters.insert(key.clone(), value.clone());
        }

        let (intent, action, required) = match pattern {
            Some(p) => (p.intent, p.action, p.required_fields),
            None => (FALLBACK_INTENT, FALLBACK_INTENT, &[][..]),
        };

        let missing_fields: Vec<String> = required
            .iter()
            .filter(|field| !has_value(parameters.get(**field)))
            .map(|field| field.to_string())
            .collect();

        debug!("Parsed intent {} (score {:.2}), missing {:?}", intent, score, missing_fields);

        ParsedIntent {
            intent: intent.to_string(),
            action: action.to_string(),
            confidence: patterns::confidence(score),
            parameters,
            missing_fields,
        }
    }
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}
