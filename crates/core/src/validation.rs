//! Contribution validation.
//!
//! This module checks a raw submission against the word and name limits and produces the
//! normalised [`Contribution`] that the store and relay work with. Validation is pure: a
//! rejected submission never reaches the store.

use crate::config::NamePolicy;
use crate::constants::{COLOR_PALETTE, MAX_NAME_TOKENS, MAX_WORD_TOKENS};

/// Why a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no word provided")]
    EmptyWord,
    #[error("too many words: {count} (maximum {max})")]
    TooManyWords { count: usize, max: usize },
    #[error("name too long: {count} words (maximum {max})")]
    NameTooLong { count: usize, max: usize },
}

/// A validated, normalised contribution.
///
/// `words` is lowercase and single-space separated, `name` is uppercase and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub words: String,
    pub name: String,
    pub color: String,
}

impl Contribution {
    /// Number of word tokens in this contribution.
    pub fn word_count(&self) -> usize {
        self.words.split(' ').count()
    }
}

/// Validates and normalises a raw submission.
///
/// # Arguments
///
/// * `raw_word` - The submitted word(s); 1 to 4 whitespace-separated tokens.
/// * `raw_name` - The submitted display name; may be empty.
/// * `raw_color` - The client's colour; empty falls back to the first palette entry.
/// * `name_policy` - Whether the name token limit is enforced.
///
/// # Errors
///
/// Returns a `ValidationError` if the word has no tokens or too many, or if the name has too
/// many tokens under [`NamePolicy::Enforced`].
pub fn validate_contribution(
    raw_word: &str,
    raw_name: &str,
    raw_color: &str,
    name_policy: NamePolicy,
) -> Result<Contribution, ValidationError> {
    let words: Vec<&str> = raw_word.split_whitespace().collect();
    if words.is_empty() {
        return Err(ValidationError::EmptyWord);
    }
    if words.len() > MAX_WORD_TOKENS {
        return Err(ValidationError::TooManyWords {
            count: words.len(),
            max: MAX_WORD_TOKENS,
        });
    }

    let names: Vec<&str> = raw_name.split_whitespace().collect();
    if name_policy == NamePolicy::Enforced && names.len() > MAX_NAME_TOKENS {
        return Err(ValidationError::NameTooLong {
            count: names.len(),
            max: MAX_NAME_TOKENS,
        });
    }

    let color = match raw_color.trim() {
        "" => COLOR_PALETTE[0].to_string(),
        c => c.to_string(),
    };

    Ok(Contribution {
        words: words
            .iter()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" "),
        name: names
            .iter()
            .map(|n| n.to_uppercase())
            .collect::<Vec<_>>()
            .join(" "),
        color,
    })
}
