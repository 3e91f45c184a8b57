//! Lock-coordinated state transitions.
//!
//! A [`LifeCycleManager`] is bound to one entity type and one caller context.
//! Its transition table is fixed at construction. Each
//! [`change_state`](LifeCycleManager::change_state) call runs one attempt:
//!
//! ```text
//! lock → fetch → pre callouts → evaluate → persist → post callouts → unlock
//! ```
//!
//! The lock is released on every exit path, including errors, timeouts and
//! the caller dropping the future. It is never released while the entity
//! write may still land: the optional timeout does not cover persist.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lifecycle_core::{CalloutData, CalloutDefinition, CalloutPhase, EntityUri, StateMachine};
use lifecycle_storage::{CalloutDefinitionStore, StateChangeLockStore};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::callout::CalloutExecutor;
use crate::config_loader::StateMachineConfigLoader;
use crate::entity::{EntityController, EntityError};
use crate::error::LifeCycleError;

/// Field of the entity representation that carries its current state.
pub const STATE_FIELD: &str = "state";

/// Who is changing state, and on behalf of which tenant.
///
/// `user` is recorded as the lock holder; `tenant_id` selects the callout
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalloutContext {
    pub user: String,
    pub tenant_id: String,
}

impl CalloutContext {
    pub fn new(user: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        CalloutContext {
            user: user.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// External services a manager drives during a transition.
#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityController>,
    pub callouts: Arc<dyn CalloutExecutor>,
    pub definitions: Arc<dyn CalloutDefinitionStore>,
    pub locks: Arc<dyn StateChangeLockStore>,
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub entity_uri: String,
    pub entity_id: String,
    pub entity_type: String,
    pub condition: String,
    pub from_state: String,
    pub to_state: String,
}

// ──────────────────────────────────────────────
// LifeCycleManager
// ──────────────────────────────────────────────

pub struct LifeCycleManager {
    entity_type: String,
    context: CalloutContext,
    state_machine: StateMachine,
    collaborators: Collaborators,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for LifeCycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifeCycleManager")
            .field("entity_type", &self.entity_type)
            .field("context", &self.context)
            .field("state_machine", &self.state_machine)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LifeCycleManager {
    /// Build a manager for `entity_type`.
    ///
    /// Starts from the built-in table and replaces it with the loader's table
    /// when the loader returns one. A table that does not parse fails
    /// construction with [`LifeCycleError::InvalidConfiguration`].
    pub async fn create(
        config_loader: &dyn StateMachineConfigLoader,
        entity_type: &str,
        context: CalloutContext,
        collaborators: Collaborators,
    ) -> Result<Self, LifeCycleError> {
        if entity_type.trim().is_empty() {
            return Err(LifeCycleError::InvalidArgument(
                "entity type must not be empty".to_string(),
            ));
        }

        let state_machine = load_state_machine(config_loader, entity_type).await?;

        Ok(LifeCycleManager {
            entity_type: entity_type.to_string(),
            context,
            state_machine,
            collaborators,
            timeout: None,
        })
    }

    /// Bound every `change_state` attempt by `timeout`. The entity write is
    /// exempt: once issued it completes before the lock is released.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn context(&self) -> &CalloutContext {
        &self.context
    }

    /// The effective transition table for this manager's entity type.
    pub fn state_machine(&self) -> &StateMachine {
        &self.state_machine
    }

    /// Apply `condition` to the entity at `entity_uri`.
    ///
    /// Returns the committed transition, or the error of the first step that
    /// failed. A refused lock is [`LifeCycleError::ConcurrentModification`];
    /// the attempt is not queued. A post callout failure is reported after the
    /// new state has been persisted and does not undo it; the same holds for a
    /// timeout that expires during the post callouts.
    #[tracing::instrument(
        name = "change_state",
        skip(self),
        fields(entity_type = %self.entity_type, user = %self.context.user)
    )]
    pub async fn change_state(
        &self,
        entity_uri: &str,
        condition: &str,
    ) -> Result<TransitionOutcome, LifeCycleError> {
        let uri = EntityUri::parse(entity_uri)
            .map_err(|e| LifeCycleError::InvalidArgument(e.to_string()))?;
        if condition.trim().is_empty() {
            return Err(LifeCycleError::InvalidArgument(
                "condition must not be empty".to_string(),
            ));
        }

        let locks = &self.collaborators.locks;
        let acquired = locks
            .try_acquire(uri.entity_id(), &self.entity_type, &self.context.user)
            .await
            .map_err(LifeCycleError::Lock)?;
        if !acquired {
            tracing::warn!(entity_id = uri.entity_id(), "state change refused: entity is locked");
            return Err(LifeCycleError::ConcurrentModification {
                entity_id: uri.entity_id().to_string(),
                entity_type: self.entity_type.clone(),
            });
        }
        let mut guard = LockGuard::new(Arc::clone(locks), uri.entity_id(), &self.entity_type);

        let deadline = self.timeout.map(|limit| Instant::now() + limit);
        let result = self
            .transition_locked(&uri, condition, deadline, &mut guard)
            .await;

        guard.release().await;
        result
    }

    /// Everything between lock acquisition and release.
    ///
    /// The deadline bounds the steps before persist and the post callouts.
    /// The write itself always runs to completion before the lock goes.
    async fn transition_locked(
        &self,
        uri: &EntityUri,
        condition: &str,
        deadline: Option<Instant>,
        guard: &mut LockGuard,
    ) -> Result<TransitionOutcome, LifeCycleError> {
        let Prepared {
            mut data,
            definitions,
            to_state,
            body,
        } = self
            .within(deadline, None, self.prepare(uri, condition))
            .await?;

        tracing::debug!(uri = %uri, to_state = %to_state, "persisting entity");
        self.persist(uri, body, guard).await?;
        tracing::info!(
            entity_id = uri.entity_id(),
            from_state = %data.from_state,
            condition,
            to_state = %to_state,
            "state changed"
        );

        data.phase = CalloutPhase::Post;
        data.to_state = Some(to_state.clone());
        self.within(
            deadline,
            Some(to_state.as_str()),
            self.run_post_callouts(&definitions, &data, &to_state),
        )
        .await?;

        Ok(TransitionOutcome {
            entity_uri: uri.to_string(),
            entity_id: uri.entity_id().to_string(),
            entity_type: self.entity_type.clone(),
            condition: condition.to_string(),
            from_state: data.from_state,
            to_state,
        })
    }

    /// Fetch, pre callouts and evaluation. Nothing is written.
    async fn prepare(&self, uri: &EntityUri, condition: &str) -> Result<Prepared, LifeCycleError> {
        tracing::debug!(uri = %uri, "fetching entity");
        let body = self
            .collaborators
            .entities
            .load_entity(uri.as_str())
            .await
            .map_err(LifeCycleError::Fetch)?;
        let fetched: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| LifeCycleError::InvalidEntity {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;
        let from_state = fetched
            .get(STATE_FIELD)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| LifeCycleError::InvalidEntity {
                uri: uri.to_string(),
                message: format!("expected an object with a string '{}' field", STATE_FIELD),
            })?
            .to_string();

        let definitions = self
            .collaborators
            .definitions
            .find_definitions(
                &self.context.tenant_id,
                &self.entity_type,
                uri.entity_id(),
                condition,
            )
            .await
            .map_err(LifeCycleError::CalloutLookup)?;

        let data = CalloutData {
            phase: CalloutPhase::Pre,
            entity_uri: uri.to_string(),
            entity_type: self.entity_type.clone(),
            entity_id: uri.entity_id().to_string(),
            condition: condition.to_string(),
            from_state: from_state.clone(),
            to_state: None,
            user: self.context.user.clone(),
            tenant_id: self.context.tenant_id.clone(),
            entity: fetched.clone(),
        };

        for definition in phase_definitions(&definitions, CalloutPhase::Pre) {
            self.collaborators
                .callouts
                .execute_callout(&definition.parameters, Some(&data))
                .await
                .map_err(|source| {
                    tracing::warn!(definition_id = definition.id, error = %source, "pre callout failed, transition aborted");
                    LifeCycleError::Callout {
                        phase: CalloutPhase::Pre,
                        definition_id: definition.id,
                        committed_state: None,
                        source,
                    }
                })?;
        }

        let to_state = self
            .state_machine
            .evaluate(&from_state, condition)?
            .to_string();

        let mut updated = fetched;
        if let Some(object) = updated.as_object_mut() {
            object.insert(
                STATE_FIELD.to_string(),
                serde_json::Value::String(to_state.clone()),
            );
        }
        let body = serde_json::to_string(&updated).map_err(|e| LifeCycleError::InvalidEntity {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        Ok(Prepared {
            data,
            definitions,
            to_state,
            body,
        })
    }

    /// Write the new representation on a task of its own. The guard tracks
    /// the task, so a dropped attempt releases the lock only after the write
    /// has finished.
    async fn persist(
        &self,
        uri: &EntityUri,
        body: String,
        guard: &mut LockGuard,
    ) -> Result<(), LifeCycleError> {
        let entities = Arc::clone(&self.collaborators.entities);
        let target = uri.as_str().to_string();
        let (tx, rx) = oneshot::channel();
        guard.pending_write = Some(tokio::spawn(async move {
            let _ = tx.send(entities.update_entity(&target, &body).await);
        }));

        let written = rx.await;
        guard.pending_write = None;
        written
            .map_err(|_| {
                LifeCycleError::Persist(EntityError::Transport {
                    uri: uri.to_string(),
                    message: "entity update ended without a result".to_string(),
                })
            })?
            .map_err(LifeCycleError::Persist)
    }

    /// Runs every post callout. The first failure is returned once all have
    /// run.
    async fn run_post_callouts(
        &self,
        definitions: &[CalloutDefinition],
        data: &CalloutData,
        to_state: &str,
    ) -> Result<(), LifeCycleError> {
        let mut first_failure = None;
        for definition in phase_definitions(definitions, CalloutPhase::Post) {
            if let Err(source) = self
                .collaborators
                .callouts
                .execute_callout(&definition.parameters, Some(data))
                .await
            {
                tracing::warn!(definition_id = definition.id, error = %source, "post callout failed, transition kept");
                if first_failure.is_none() {
                    first_failure = Some(LifeCycleError::Callout {
                        phase: CalloutPhase::Post,
                        definition_id: definition.id,
                        committed_state: Some(to_state.to_string()),
                        source,
                    });
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Run `step` until `deadline`. `committed_state` is the state already
    /// persisted when the step starts, if any.
    async fn within<T>(
        &self,
        deadline: Option<Instant>,
        committed_state: Option<&str>,
        step: impl Future<Output = Result<T, LifeCycleError>>,
    ) -> Result<T, LifeCycleError> {
        let Some(deadline) = deadline else {
            return step.await;
        };
        match tokio::time::timeout_at(deadline, step).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed = self.timeout.unwrap_or_default();
                tracing::warn!(timeout = ?elapsed, committed_state = ?committed_state, "state change timed out");
                Err(LifeCycleError::Timeout {
                    elapsed,
                    committed_state: committed_state.map(str::to_string),
                })
            }
        }
    }
}

/// Outcome of the steps before persist.
struct Prepared {
    data: CalloutData,
    definitions: Vec<CalloutDefinition>,
    to_state: String,
    body: String,
}

/// The effective transition table for `entity_type`: the loader's table when
/// it supplies one, otherwise the built-in table.
pub async fn load_state_machine(
    config_loader: &dyn StateMachineConfigLoader,
    entity_type: &str,
) -> Result<StateMachine, LifeCycleError> {
    let mut state_machine = StateMachine::new();
    let configuration = config_loader
        .load_configuration(entity_type)
        .await
        .map_err(|source| LifeCycleError::ConfigLoad {
            entity_type: entity_type.to_string(),
            source,
        })?;

    match configuration {
        Some(json) => {
            state_machine
                .setup(&json)
                .map_err(|source| LifeCycleError::InvalidConfiguration {
                    entity_type: entity_type.to_string(),
                    source,
                })?;
            tracing::debug!(
                entity_type,
                transitions = state_machine.table().len(),
                "loaded custom state machine"
            );
        }
        None => tracing::debug!(entity_type, "using built-in state machine"),
    }
    Ok(state_machine)
}

fn phase_definitions(
    definitions: &[CalloutDefinition],
    phase: CalloutPhase,
) -> impl Iterator<Item = &CalloutDefinition> {
    definitions
        .iter()
        .filter(move |d| d.callout_type.fires_in(phase))
}

// ──────────────────────────────────────────────
// LockGuard
// ──────────────────────────────────────────────

/// Holds an acquired entity lock until released.
///
/// [`release`](LockGuard::release) is the normal exit. If the guard is dropped
/// without it (the `change_state` future was cancelled) the release is
/// spawned onto the current runtime, after any entity write still in flight.
struct LockGuard {
    locks: Arc<dyn StateChangeLockStore>,
    entity_id: String,
    entity_type: String,
    pending_write: Option<JoinHandle<()>>,
    released: bool,
}

impl LockGuard {
    fn new(locks: Arc<dyn StateChangeLockStore>, entity_id: &str, entity_type: &str) -> Self {
        LockGuard {
            locks,
            entity_id: entity_id.to_string(),
            entity_type: entity_type.to_string(),
            pending_write: None,
            released: false,
        }
    }

    async fn release(mut self) {
        release_lock(self.locks.as_ref(), &self.entity_id, &self.entity_type).await;
        self.released = true;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let locks = Arc::clone(&self.locks);
        let entity_id = std::mem::take(&mut self.entity_id);
        let entity_type = std::mem::take(&mut self.entity_type);
        let pending_write = self.pending_write.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Some(write) = pending_write {
                        let _ = write.await;
                    }
                    release_lock(locks.as_ref(), &entity_id, &entity_type).await;
                });
            }
            Err(_) => tracing::error!(
                entity_id = %entity_id,
                entity_type = %entity_type,
                "no runtime to release state change lock, entity stays locked"
            ),
        }
    }
}

/// Release failures never change the outcome of the attempt; they are logged
/// because the entity stays locked until an operator intervenes.
async fn release_lock(locks: &dyn StateChangeLockStore, entity_id: &str, entity_type: &str) {
    match locks.release(entity_id, entity_type).await {
        Ok(()) => tracing::debug!(entity_id, entity_type, "state change lock released"),
        Err(e) => tracing::error!(
            entity_id,
            entity_type,
            error = %e,
            "failed to release state change lock"
        ),
    }
}

// ──────────────────────────────────────────────
// LifeCycleManagerFactory
// ──────────────────────────────────────────────

/// Produces managers that share one config loader and one set of
/// collaborators.
#[derive(Clone)]
pub struct LifeCycleManagerFactory {
    config_loader: Arc<dyn StateMachineConfigLoader>,
    collaborators: Collaborators,
    timeout: Option<Duration>,
}

impl LifeCycleManagerFactory {
    pub fn new(
        config_loader: Arc<dyn StateMachineConfigLoader>,
        collaborators: Collaborators,
    ) -> Self {
        LifeCycleManagerFactory {
            config_loader,
            collaborators,
            timeout: None,
        }
    }

    /// Apply `timeout` to every manager this factory creates.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// A manager for `entity_type` acting for `context`. The table is loaded
    /// on every call; managers are not cached.
    pub async fn create(
        &self,
        entity_type: &str,
        context: CalloutContext,
    ) -> Result<LifeCycleManager, LifeCycleError> {
        let manager = LifeCycleManager::create(
            self.config_loader.as_ref(),
            entity_type,
            context,
            self.collaborators.clone(),
        )
        .await?;
        Ok(match self.timeout {
            Some(timeout) => manager.with_timeout(timeout),
            None => manager,
        })
    }
}
