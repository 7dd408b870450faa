pub mod clock;
pub mod lock_cache;
pub mod post_repository;
