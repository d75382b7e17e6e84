//! Store health reporting

mod reporter;

pub use reporter::{HealthReport, HealthReporter, HealthStatus, ProbeResult};
