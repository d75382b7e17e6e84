//! Business services for passcode issuance, validation and upkeep.

pub mod health;
pub mod retention;
pub(crate) mod store_call;
pub mod verification;

// Re-export commonly used types
pub use health::{HealthReport, HealthReporter, HealthStatus, ProbeResult};
pub use retention::{RetentionSweeper, SweepReport};
pub use verification::{
    CodeGenerator, IssuedOtp, Notifier, ValidationOutcome, VerificationEngine,
};
