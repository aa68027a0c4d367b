//! Cache key derivation
//!
//! A matching rule emits one token per matched attribute. Tokens are grouped by
//! category, concatenated as `<label>-<token>` and fingerprinted.

use crate::rules::rule::Category;
use xxhash_rust::xxh3::xxh3_128;

/// Fingerprint an arbitrary string into a fixed-size key.
///
/// 128-bit XXH3 rendered as 32 lowercase hex characters. Not collision
/// resistant against an adversary; suitable as a lookup index only.
pub fn fingerprint(input: &str) -> String {
    format!("{:032x}", xxh3_128(input.as_bytes()))
}

/// Accumulates key tokens while a rule is being evaluated
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    tokens: Vec<(Category, String)>,
}

impl KeyBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token for `category`
    pub fn push(&mut self, category: Category, token: impl Into<String>) {
        self.tokens.push((category, token.into()));
    }

    /// Number of accumulated tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token has been accumulated
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The pre-hash key material.
    ///
    /// Tokens are ordered by category, then by insertion order within a
    /// category, regardless of the order in which categories were pushed.
    pub fn canonical(&self) -> String {
        let mut ordered: Vec<&(Category, String)> = self.tokens.iter().collect();
        ordered.sort_by_key(|(category, _)| category.position());

        ordered
            .into_iter()
            .map(|(category, token)| format!("{}-{}", category.key_label(), token))
            .collect()
    }

    /// Fingerprint of [`canonical`](Self::canonical)
    pub fn build(&self) -> String {
        fingerprint(&self.canonical())
    }
}
