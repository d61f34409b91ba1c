//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the record model, the short code and owner identity
//! types, the error taxonomy and the [`Storage`] contract implemented by
//! every storage backend.

pub mod context;
pub mod error;
pub mod record;
pub mod shortcode;
pub mod storage;

pub use context::{OwnerId, RequestContext};
pub use error::{Result, StorageError};
pub use record::{BatchOutcome, Incoming, Output, ShortLinkRecord, UserUrls};
pub use shortcode::ShortCode;
pub use storage::Storage;
