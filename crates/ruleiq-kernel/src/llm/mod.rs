pub mod types;
pub mod provider;
pub mod streaming;

pub use types::*;
pub use provider::*;
pub use streaming::*;
