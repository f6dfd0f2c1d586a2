//! One-way password derivation.
//!
//! Hashes are Argon2id PHC strings with a fresh random salt. Verification reads
//! the cost parameters back from the stored string, so changing the configured
//! parameters only affects newly registered users.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{Error, Result};

const SALT_LEN: usize = 16;

#[derive(Clone, Debug)]
pub struct Hasher {
    params: Params,
}

impl Default for Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Hasher {
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Derive a storable hash from `plaintext`.
    ///
    /// # Errors
    /// Returns `Error::Password` if the OS RNG or the hasher fails.
    pub fn derive(&self, plaintext: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|err| Error::Password(format!("failed to generate salt: {err}")))?;
        let salt = SaltString::encode_b64(&salt)
            .map_err(|err| Error::Password(format!("failed to encode salt: {err}")))?;
        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|err| Error::Password(err.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Check `plaintext` against a stored hash. Unparseable hashes never verify.
    #[must_use]
    pub fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cheap() -> Hasher {
        Hasher::new(Params::new(8, 1, 1, None).unwrap())
    }

    #[test]
    fn derive_never_returns_plaintext() {
        let hash = cheap().derive("pw1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("pw1"));
    }

    #[test]
    fn derive_and_verify() {
        let hasher = cheap();
        let hash = hasher.derive("correct horse").unwrap();
        assert!(hasher.verify(&hash, "correct horse"));
        assert!(!hasher.verify(&hash, "battery staple"));
    }

    #[test]
    fn salts_differ_per_hash() {
        let hasher = cheap();
        let first = hasher.derive("same").unwrap();
        let second = hasher.derive("same").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify(&first, "same"));
        assert!(hasher.verify(&second, "same"));
    }

    #[test]
    fn verify_uses_params_from_stored_hash() {
        let hash = cheap().derive("pw").unwrap();
        assert!(Hasher::default().verify(&hash, "pw"));
    }

    #[test]
    fn garbage_hash_does_not_verify() {
        assert!(!cheap().verify("not-a-phc-string", "pw"));
        assert!(!cheap().verify("", ""));
    }
}
