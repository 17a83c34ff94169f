//! Salted credential digests.
//!
//! Each account carries its own random salt, generated at creation and
//! stored next to the digest. Digests are hex-encoded SHA-256 over
//! `salt || password` and compared in constant time, so a mismatch reveals
//! nothing about where it occurred and identical passwords never share a
//! digest across accounts.

use sha2::{Digest, Sha256};

/// Generate a fresh random salt for a new account.
#[must_use]
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Compute the digest stored for a password.
#[must_use]
pub fn digest(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Verify a password attempt against a stored digest.
#[must_use]
pub fn verify(password: &str, salt: &str, stored_digest: &str) -> bool {
    let attempt = digest(password, salt);
    constant_time_eq::constant_time_eq(attempt.as_bytes(), stored_digest.as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}
