// Port Layer - Interfaces for external dependencies

pub mod load_hint;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use load_hint::{LoadHint, NoLoad, SharedLoad};
pub use time_provider::{SystemTimeProvider, TimeProvider};
