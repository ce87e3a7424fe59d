//! One-time numeric codes.
//!
//! Generation is pure and stateless. Every stored code carries the
//! [`OtpPurpose`] it was issued for, so a code issued for one flow can never
//! satisfy another.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CODE_LENGTH: usize = 6;

pub const DEFAULT_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtpPurpose {
    AccountVerification,
    PasswordReset,
    OrderVerification,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("Code length must be at least 1")]
    ZeroLength,
}

/// Returns `length` decimal digits drawn uniformly from the OS random source.
pub fn generate(length: usize) -> Result<String, OtpError> {
    if length == 0 {
        return Err(OtpError::ZeroLength);
    }
    let mut rng = OsRng;
    Ok((0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect())
}

pub fn expiry_at(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(minutes)
}

/// A code bound to a purpose and an expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    pub purpose: OtpPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeCode {
    pub fn issue(
        purpose: OtpPurpose,
        length: usize,
        ttl_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, OtpError> {
        Ok(Self {
            purpose,
            code: generate(length)?,
            expires_at: expiry_at(now, ttl_minutes),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Exact match, same purpose, strictly before expiry.
    pub fn verify(&self, purpose: OtpPurpose, candidate: &str, now: DateTime<Utc>) -> bool {
        self.purpose == purpose && self.code == candidate && !self.is_expired(now)
    }
}
