pub mod identity;
pub mod lock;
pub mod post;

pub use identity::*;
pub use lock::*;
pub use post::*;
