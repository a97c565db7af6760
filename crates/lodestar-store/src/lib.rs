//! # lodestar-store
//!
//! Document storage for the Lodestar directory backend.
//!
//! The [`RecordStore`] trait is the optimistic-concurrency contract every
//! backend must satisfy: reads hand out an opaque revision token, writes
//! present it back and fail with [`StorageError::StaleRevision`] when it no
//! longer matches. No locks are held between read and write.
//!
//! On top of the document contract, [`RecordProvider`] offers typed access
//! to the domain models with brief/full decode strategies, discriminator
//! and soft-deletion checks, and identifier resolution.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod codec;
pub mod config;
pub mod counter;
pub mod document;
pub mod error;
pub mod memory;
pub mod provider;
pub mod store;

pub use codec::StoredRecord;
pub use config::StoreConfig;
pub use counter::PersistentCounter;
pub use document::{Document, IndexQuery};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use provider::RecordProvider;
pub use store::{index, RecordStore};
