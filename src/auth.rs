//! Passphrase access gate.
//!
//! Only an HMAC-SHA256 digest of the passphrase (keyed by `[access] salt`)
//! is kept in configuration. `opsdesk hash-passphrase` prints the digest to
//! paste into `[access] passphrase_digest`.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use opsdesk_core::auth::{AccessGate, OpenGate};

use crate::config::AccessConfig;

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(salt: &str, passphrase: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC can take key of any size");
    mac.update(passphrase.as_bytes());
    mac
}

/// Hex digest of `passphrase` keyed by `salt`.
pub fn passphrase_digest(salt: &str, passphrase: &str) -> String {
    hex::encode(keyed_mac(salt, passphrase).finalize().into_bytes())
}

pub struct PassphraseGate {
    salt: String,
    digest: Vec<u8>,
}

impl PassphraseGate {
    pub fn from_hex(salt: &str, digest_hex: &str) -> Result<Self> {
        let digest = hex::decode(digest_hex.trim())
            .with_context(|| "access.passphrase_digest is not valid hex")?;
        Ok(Self {
            salt: salt.to_string(),
            digest,
        })
    }
}

impl AccessGate for PassphraseGate {
    fn verify(&self, attempt: &str) -> bool {
        // verify_slice compares in constant time
        keyed_mac(&self.salt, attempt)
            .verify_slice(&self.digest)
            .is_ok()
    }
}

/// The configured gate; an open gate (with a warning) when no digest is set.
pub fn build_gate(config: &AccessConfig) -> Result<Arc<dyn AccessGate>> {
    match &config.passphrase_digest {
        Some(digest) => Ok(Arc::new(PassphraseGate::from_hex(&config.salt, digest)?)),
        None => {
            tracing::warn!("no access.passphrase_digest configured, access gate is open");
            Ok(Arc::new(OpenGate))
        }
    }
}
