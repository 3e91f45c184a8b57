//! lifecycle-core: transition tables, callout definitions and entity types
//! shared by the life cycle engine.
//!
//! Everything in this crate is pure: no I/O, no async. The orchestration
//! that talks to entity endpoints, callout endpoints and the lock store lives
//! in `lifecycle-engine`.
//!
//! # Public API
//!
//! - [`StateMachine`] -- holds one [`TransitionTable`] and evaluates
//!   `(state, condition)` lookups against it
//! - [`CalloutDefinition`], [`CalloutType`], [`CalloutData`] -- configured
//!   pre/post callouts and their payload
//! - [`EntityUri`] -- an entity URI with its derived entity id
//! - [`JobState`], [`Job`] -- the entity the built-in table is written for

pub mod callout;
pub mod entity_uri;
pub mod error;
pub mod job;
pub mod state_machine;

pub use callout::{CalloutData, CalloutDefinition, CalloutPhase, CalloutType};
pub use entity_uri::EntityUri;
pub use error::{ConfigurationError, EntityUriError, TransitionNotFound, UnknownVariant};
pub use job::{Job, JobState};
pub use state_machine::{conditions, StateMachine, TransitionKey, TransitionTable};
