//! Storage backends for Burrow.
//!
//! Three interchangeable implementations of [`Storage`]:
//!
//! * [`InMemoryRepository`]: volatile, lock-sharded maps,
//! * [`FileRepository`]: an in-memory repository persisted as a JSON snapshot,
//! * [`MySqlRepository`]: rows in a MySQL table.
//!
//! [`StorageEngine`] picks one of them from a [`StorageConfig`] and
//! [`Sweeper`] periodically purges soft-deleted records.

pub mod engine;
pub mod file;
pub mod memory;
pub mod mysql;
pub mod sweeper;

pub use burrow_core::{Result, Storage, StorageError};
pub use engine::{StorageConfig, StorageEngine};
pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use sweeper::{Sweeper, SweeperSettings};
