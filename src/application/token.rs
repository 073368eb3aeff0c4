//! Opaque secrets for magic links and access credentials.
//!
//! A secret is 32 bytes from the OS CSPRNG, base64url encoded without padding.
//! Only its SHA-256 digest is ever persisted; redemption recomputes the digest
//! from the secret the caller presents.

use std::fmt;

use base64::Engine;
use rand::RngCore;
use secrecy::SecretString;
use sha2::{Digest, Sha256};

use crate::app_error::{AppError, AppResult};

pub const TOKEN_BYTES: usize = 32;
pub const DIGEST_BYTES: usize = 32;

/// SHA-256 of an encoded secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; DIGEST_BYTES]);

impl TokenDigest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TokenDigest {
    // A prefix is enough to correlate log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({}..)", hex::encode(&self.0[..4]))
    }
}

pub struct GeneratedToken {
    pub secret: SecretString,
    pub digest: TokenDigest,
}

pub fn generate() -> AppResult<GeneratedToken> {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(format!("entropy unavailable: {e}")))?;
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let digest = digest(&encoded);
    Ok(GeneratedToken {
        secret: SecretString::from(encoded),
        digest,
    })
}

pub fn digest(secret: &str) -> TokenDigest {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    TokenDigest(hasher.finalize().into())
}
