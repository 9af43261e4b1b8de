//! Payment-provider webhook signatures.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`.
//! The signed payload is `"<t>." + raw body`, so verification only works
//! against the exact bytes received, never a re-serialized body.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "v1";

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    MissingHeader,
    #[error("signature header malformed")]
    MalformedHeader,
    #[error("no v1 signature present")]
    NoSignatures,
    #[error("timestamp outside the tolerance window")]
    TimestampOutsideTolerance,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// Verifies HMAC-SHA256 webhook signatures with a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("SignatureVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify `header` against `payload` using the current wall clock.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        self.verify_at(payload, header, now)
    }

    /// Verify `header` against `payload` as of `now` (unix seconds).
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let parsed = ParsedHeader::parse(header)?;

        if parsed.signatures.is_empty() {
            return Err(SignatureError::NoSignatures);
        }

        let expected = self
            .compute(parsed.timestamp, payload)
            .ok_or(SignatureError::Mismatch)?;
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| candidate.as_slice().ct_eq(expected.as_slice()).into());
        if !matched {
            return Err(SignatureError::Mismatch);
        }

        if now.abs_diff(parsed.timestamp) > self.tolerance.as_secs() {
            return Err(SignatureError::TimestampOutsideTolerance);
        }
        Ok(())
    }

    /// Produce a header value signing `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Option<String> {
        let mac = self.compute(timestamp, payload)?;
        Some(format!("t={},{}={}", timestamp, SCHEME, hex::encode(mac)))
    }

    fn compute(&self, timestamp: i64, payload: &[u8]) -> Option<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Some(mac.finalize().into_bytes().to_vec())
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let (name, value) = item
                .trim()
                .split_once('=')
                .ok_or(SignatureError::MalformedHeader)?;
            match name {
                "t" => {
                    let ts = value.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?;
                    timestamp = Some(ts);
                }
                SCHEME => {
                    // Undecodable entries cannot match; skip them like unknown schemes.
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureError::MalformedHeader)?,
            signatures,
        })
    }
}
