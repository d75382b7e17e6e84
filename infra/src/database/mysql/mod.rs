//! MySQL store implementations

pub mod otp_record_store;

pub use otp_record_store::{MySqlRecordStore, OTP_RECORDS_DDL};
