//! Disposable containers for integration tests.
//!
//! Everything here needs a running Docker daemon.

pub mod error;
pub mod mysql;

pub use error::{Result, TestInfraError};
