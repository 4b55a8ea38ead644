//! Name → address cache implementations.
//!
//! The chain stays the source of truth; these stores only remember which
//! address a product name was registered under so it can be found again.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRegistry;
pub use postgres::{PostgresConfig, PostgresRegistry};
