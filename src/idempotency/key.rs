//! Idempotency tokens and composite keys.

use axum::http::HeaderValue;
use thiserror::Error;

/// Why a client token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("key must not be empty")]
    Empty,
    #[error("key exceeds {max} characters")]
    TooLong { max: usize },
    #[error("key must contain only visible ASCII characters")]
    InvalidCharacters,
}

/// A client-supplied idempotency token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    /// Validate a raw header value.
    pub fn parse(value: &HeaderValue, max_len: usize) -> Result<Self, TokenError> {
        let raw = value.as_bytes();
        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Err(TokenError::Empty);
        }
        if trimmed.len() > max_len {
            return Err(TokenError::TooLong { max: max_len });
        }
        if !trimmed.iter().all(|b| b.is_ascii_graphic()) {
            return Err(TokenError::InvalidCharacters);
        }
        // ASCII only, so the conversion is lossless.
        let token = String::from_utf8_lossy(trimmed).into_owned();
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The deduplication unit: who is asking, and which logical attempt.
///
/// Kept as two fields so identities and tokens containing separators
/// can never be confused with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    identity: String,
    token: IdempotencyToken,
}

impl CompositeKey {
    pub fn new(identity: impl Into<String>, token: IdempotencyToken) -> Self {
        Self {
            identity: identity.into(),
            token,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn token(&self) -> &IdempotencyToken {
        &self.token
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.identity, self.token.0)
    }
}
