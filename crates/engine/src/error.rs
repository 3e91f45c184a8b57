use std::time::Duration;

use lifecycle_core::{CalloutPhase, ConfigurationError, TransitionNotFound};
use lifecycle_storage::StorageError;

use crate::callout::CalloutError;
use crate::config_loader::ConfigLoaderError;
use crate::entity::EntityError;

/// Failure of manager construction or of one `change_state` attempt.
///
/// Every variant returned from `change_state` is produced after the entity
/// lock has been released.
#[derive(Debug, thiserror::Error)]
pub enum LifeCycleError {
    /// A required input is missing or malformed. Raised before any lock is
    /// taken.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The configuration loaded for an entity type is not a transition table.
    #[error("invalid state machine configuration for entity type '{entity_type}'")]
    InvalidConfiguration {
        entity_type: String,
        #[source]
        source: ConfigurationError,
    },

    /// The configuration loader itself failed.
    #[error("cannot load state machine configuration for entity type '{entity_type}'")]
    ConfigLoad {
        entity_type: String,
        #[source]
        source: ConfigLoaderError,
    },

    #[error(transparent)]
    TransitionNotFound(#[from] TransitionNotFound),

    /// Another transition holds the lock for this entity.
    #[error("entity '{entity_id}' of type '{entity_type}' is locked by another state change")]
    ConcurrentModification {
        entity_id: String,
        entity_type: String,
    },

    #[error("cannot fetch entity")]
    Fetch(#[source] EntityError),

    /// The fetched representation is not a JSON object with a string `state`.
    #[error("entity at '{uri}' is invalid: {message}")]
    InvalidEntity { uri: String, message: String },

    #[error("cannot persist entity")]
    Persist(#[source] EntityError),

    /// A callout failed. For post callouts `committed_state` holds the state
    /// that was persisted before the failure; the transition stands.
    #[error("{phase} callout {definition_id} failed")]
    Callout {
        phase: CalloutPhase,
        definition_id: i64,
        committed_state: Option<String>,
        #[source]
        source: CalloutError,
    },

    #[error("state change lock store failed")]
    Lock(#[source] StorageError),

    #[error("cannot look up callout definitions")]
    CalloutLookup(#[source] StorageError),

    /// The attempt exceeded the manager's timeout. When it ran out during the
    /// post callouts `committed_state` holds the state already persisted.
    #[error("state change timed out after {elapsed:?}")]
    Timeout {
        elapsed: Duration,
        committed_state: Option<String>,
    },
}

impl LifeCycleError {
    /// Whether the caller may reasonably retry the same request later.
    ///
    /// Refused locks, timeouts and transport-level failures are retryable;
    /// argument, configuration and transition errors are not. Nothing that
    /// happens after the new state was persisted is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LifeCycleError::ConcurrentModification { .. } => true,
            LifeCycleError::Timeout {
                committed_state, ..
            } => committed_state.is_none(),
            LifeCycleError::Fetch(e) | LifeCycleError::Persist(e) => matches!(
                e,
                EntityError::Transport { .. } | EntityError::Status { .. }
            ),
            LifeCycleError::Callout {
                committed_state,
                source,
                ..
            } => committed_state.is_none() && source.is_transport(),
            LifeCycleError::Lock(_) | LifeCycleError::CalloutLookup(_) => true,
            _ => false,
        }
    }

    /// The state persisted by this attempt, if the transition was committed
    /// before the error occurred.
    pub fn committed_state(&self) -> Option<&str> {
        match self {
            LifeCycleError::Callout {
                committed_state, ..
            }
            | LifeCycleError::Timeout {
                committed_state, ..
            } => committed_state.as_deref(),
            _ => None,
        }
    }
}
