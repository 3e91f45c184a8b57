//! lifecycle-storage: the state-change lock coordinator and callout
//! definition store used by the life cycle engine.
//!
//! Both are async traits so that database-backed implementations can slot
//! in next to the in-memory ones. [`conformance`] checks any implementation
//! against the contract the engine relies on.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{InMemoryCalloutDefinitionStore, InMemoryLockStore};
pub use record::StateChangeLockRecord;
pub use traits::{CalloutDefinitionStore, StateChangeLockStore};
