//! Common utility functions

pub mod identity;

pub use identity::{identity_kind, mask_identity, normalize_identity, IdentityKind};
