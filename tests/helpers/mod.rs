#![allow(dead_code, unused_imports)]
pub mod counting_cache;
pub mod test_db;

pub use counting_cache::*;
pub use test_db::*;
