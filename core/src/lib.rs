//! # Veriflow Core
//!
//! Core business logic for one-time passcode issuance and verification.
//! This crate contains the passcode record model, the verification engine,
//! store interfaces with in-memory implementations, retention sweeping,
//! health reporting and error types.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::{IssueMetadata, OtpPurpose, OtpRecord, OtpStatus, RateKind, RateWindow};
pub use errors::{DomainError, DomainResult, OtpError, ValidationError};
pub use repositories::{
    AttemptUpdate, CounterEntry, CounterStore, InMemoryCounterStore, InMemoryRecordStore,
    RecordStore,
};
pub use services::{
    CodeGenerator, HealthReport, HealthReporter, HealthStatus, IssuedOtp, Notifier, ProbeResult,
    RetentionSweeper, SweepReport, ValidationOutcome, VerificationEngine,
};
