//! PBKDF2-HMAC-SHA256 password hashes, stored as
//! `pbkdf2-sha256${iterations}${salt}${hash}` with base64 fields.

use std::num::NonZeroU32;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use tasklane_common::{Error, Result};

pub const DEFAULT_ITERATIONS: u32 = 100_000;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub fn hash_password(password: &str, iterations: u32) -> Result<String> {
    let rounds = NonZeroU32::new(iterations)
        .ok_or_else(|| Error::InvalidInput("iterations must be at least 1".into()))?;

    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| Error::Other("failed to generate password salt".into()))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Whether `password` matches a hash produced by [`hash_password`].
pub fn verify_password(password: &str, encoded: &str) -> Result<bool> {
    let malformed = || Error::InvalidInput("malformed password hash".into());

    let mut parts = encoded.split('$');
    if parts.next() != Some(SCHEME) {
        return Err(malformed());
    }
    let iterations = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .and_then(NonZeroU32::new)
        .ok_or_else(malformed)?;
    let salt = parts
        .next()
        .and_then(|s| STANDARD_NO_PAD.decode(s).ok())
        .ok_or_else(malformed)?;
    let hash = parts
        .next()
        .and_then(|s| STANDARD_NO_PAD.decode(s).ok())
        .ok_or_else(malformed)?;
    if parts.next().is_some() {
        return Err(malformed());
    }

    Ok(pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_the_right_password_only() {
        let encoded = hash_password("admin123", 10).unwrap();
        assert!(encoded.starts_with("pbkdf2-sha256$10$"));
        assert!(verify_password("admin123", &encoded).unwrap());
        assert!(!verify_password("admin124", &encoded).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(
            hash_password("same", 1).unwrap(),
            hash_password("same", 1).unwrap()
        );
    }

    #[test]
    fn rejects_malformed_hashes_and_zero_iterations() {
        assert!(hash_password("x", 0).is_err());
        assert!(verify_password("x", "bcrypt$10$abc").is_err());
        assert!(verify_password("x", "pbkdf2-sha256$0$AAAA$AAAA").is_err());
        assert!(verify_password("x", "pbkdf2-sha256$1$AAAA$AAAA$extra").is_err());
    }
}
