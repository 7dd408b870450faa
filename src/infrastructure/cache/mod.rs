pub mod database;
pub mod memory;
pub mod redis;

pub use database::DatabaseLockCache;
pub use memory::InMemoryLockCache;
pub use self::redis::RedisLockCache;
