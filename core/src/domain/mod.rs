//! Domain layer containing passcode records and rate windows.

pub mod entities;

pub use entities::*;
