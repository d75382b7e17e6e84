pub mod r#trait {
    pub use super::trait_::*;
}
#[path = "trait.rs"]
mod trait_;
pub mod memory;

pub use memory::InMemoryRecordStore;
pub use r#trait::{AttemptUpdate, RecordStore};

#[cfg(test)]
mod tests;
