//! Cache module for Redis-backed rate window counters

pub mod counter_store;
pub mod redis_client;


pub use counter_store::RedisCounterStore;
pub use redis_client::RedisClient;
