//! Removal of records past their retention horizon

mod sweeper;

pub use sweeper::{RetentionSweeper, SweepReport};
