pub mod identity;
pub mod record;

pub use identity::*;
pub use record::*;
