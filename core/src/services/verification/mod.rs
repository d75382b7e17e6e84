//! Passcode issuance and verification
//!
//! - code generation and salted hashing
//! - issuance with rate windows, cooldown and supersession
//! - validation with attempt accounting and single use

pub mod code;
mod service;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use code::{generate_salt, hash_code, verify_code_hash, CodeGenerator};
pub use service::VerificationEngine;
pub use traits::Notifier;
pub use types::{IssuedOtp, ValidationOutcome};
