//! Test utilities and mock implementations.
//!
//! Reusable mocks of the domain ports for unit and integration tests.

pub mod mocks;

pub use mocks::{MOCK_PROGRAM_ID, MockConfig, MockNotifier, MockProgram, MockRegistry};
