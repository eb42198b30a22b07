//! Room password hashing
//!
//! Passwords guard private rooms only; they are stored as a salted SHA-256
//! digest and never leave the process.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Salted digest of a room password.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    salt: [u8; SALT_LEN],
    digest: [u8; 32],
}

impl PasswordHash {
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::digest(&salt, password);
        Self { salt, digest }
    }

    pub fn verify(&self, attempt: &str) -> bool {
        Self::digest(&self.salt, attempt) == self.digest
    }

    fn digest(salt: &[u8], password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}
