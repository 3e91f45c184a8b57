//! lifecycle-engine: drives lock-coordinated state transitions for entities
//! reachable by URI.
//!
//! A [`LifeCycleManagerFactory`] produces a [`LifeCycleManager`] per entity
//! type and caller. The manager's `change_state` takes the entity lock,
//! fetches the entity through an [`EntityController`], runs pre callouts,
//! evaluates the transition, persists the new state, runs post callouts and
//! releases the lock.
//!
//! Collaborators are traits with compile-time implementations, selected from
//! an [`EngineConfig`] at startup:
//!
//! - [`StateMachineConfigLoader`] -- [`DefaultConfigLoader`],
//!   [`StaticConfigLoader`], [`DirectoryConfigLoader`]
//! - [`EntityController`] -- [`HttpEntityController`],
//!   [`InMemoryEntityController`]
//! - [`CalloutExecutor`] -- [`HttpCalloutExecutor`],
//!   [`DisabledCalloutExecutor`]
//! - lock and callout definition stores from `lifecycle-storage`

pub mod callout;
pub mod config;
pub mod config_loader;
pub mod entity;
pub mod error;
pub mod manager;

pub use callout::http::HttpCalloutExecutor;
pub use callout::{parse_callout_url, CalloutError, CalloutExecutor, DisabledCalloutExecutor};
pub use config::{ConfigError, EngineConfig};
pub use config_loader::{
    ConfigLoaderError, DefaultConfigLoader, DirectoryConfigLoader, StateMachineConfigLoader,
    StaticConfigLoader,
};
pub use entity::http::HttpEntityController;
pub use entity::memory::InMemoryEntityController;
pub use entity::{EntityController, EntityError};
pub use error::LifeCycleError;
pub use manager::{
    load_state_machine, CalloutContext, Collaborators, LifeCycleManager, LifeCycleManagerFactory,
    TransitionOutcome,
};
