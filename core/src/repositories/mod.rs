pub mod counter;
pub mod otp_record;

pub use counter::{CounterEntry, CounterStore, InMemoryCounterStore};
pub use otp_record::{AttemptUpdate, InMemoryRecordStore, RecordStore};
