pub mod resource_lock;

pub use resource_lock::*;
