pub mod agent;
pub mod door;
pub mod logic;
pub mod notify;
pub mod security;
pub mod utils;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
