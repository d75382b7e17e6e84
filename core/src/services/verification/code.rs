//! Code generation and salted hashing

use constant_time_eq::constant_time_eq;
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::{DomainResult, ValidationError};

/// Bytes of randomness in a per-record salt
pub const SALT_BYTES: usize = 16;

/// Produces fixed-length numeric codes from the OS CSPRNG
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    length: usize,
}

impl CodeGenerator {
    /// Longest code whose numeric range still fits in a `u64`
    pub const MAX_LENGTH: usize = 19;

    pub fn new(length: usize) -> DomainResult<Self> {
        if length == 0 || length > Self::MAX_LENGTH {
            return Err(ValidationError::InvalidConfig {
                message: format!(
                    "code length must be between 1 and {}, got {}",
                    Self::MAX_LENGTH,
                    length
                ),
            }
            .into());
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draws uniformly from `[10^(L-1), 10^L - 1]`, so a code never has a
    /// leading zero and every code of the configured length is equally likely.
    pub fn generate(&self) -> String {
        let exponent = self.length as u32;
        let low = 10u64.pow(exponent - 1);
        let high = 10u64.pow(exponent) - 1;
        let value = OsRng.gen_range(low..=high);
        format!("{:0width$}", value, width = self.length)
    }

    /// Whether `code` has the shape this generator produces
    pub fn is_well_formed(&self, code: &str) -> bool {
        code.len() == self.length && code.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Fresh hex-encoded salt
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex-encoded SHA-256 of `salt:code`
pub fn hash_code(code: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares the hash of `code` with `expected_hash` in constant time
pub fn verify_code_hash(code: &str, salt: &str, expected_hash: &str) -> bool {
    let computed = hash_code(code, salt);
    if computed.len() != expected_hash.len() {
        return false;
    }
    constant_time_eq(computed.as_bytes(), expected_hash.as_bytes())
}
