use async_trait::async_trait;
use lifecycle_core::CalloutDefinition;

use crate::error::StorageError;
use crate::record::StateChangeLockRecord;

/// Coordinator for per-entity state-change locks.
///
/// ## Test-and-set
///
/// `try_acquire` never waits: it either creates the lock and returns `true`,
/// or finds a lock already held and returns `false`. Two concurrent calls for
/// the same `(entity_id, entity_type)` must never both return `true`.
///
/// ## Release
///
/// `release` is idempotent. Releasing a lock that is not held is a no-op, so
/// callers can release unconditionally on every exit path.
///
/// ## Expiry
///
/// Locks never expire. A holder that dies without releasing leaves the entity
/// locked until an operator releases it.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared by every manager and spawned task.
#[async_trait]
pub trait StateChangeLockStore: Send + Sync + 'static {
    /// Claim the lock for an entity. Returns `false` if it is already held.
    async fn try_acquire(
        &self,
        entity_id: &str,
        entity_type: &str,
        created_by: &str,
    ) -> Result<bool, StorageError>;

    /// Drop the lock for an entity, held or not.
    async fn release(&self, entity_id: &str, entity_type: &str) -> Result<(), StorageError>;

    async fn is_locked(&self, entity_id: &str, entity_type: &str) -> Result<bool, StorageError>;

    /// The active lock for an entity, if any.
    async fn get_lock(
        &self,
        entity_id: &str,
        entity_type: &str,
    ) -> Result<Option<StateChangeLockRecord>, StorageError>;

    /// Every active lock, oldest first.
    async fn list_locks(&self) -> Result<Vec<StateChangeLockRecord>, StorageError>;
}

/// Read access to configured callout definitions.
#[async_trait]
pub trait CalloutDefinitionStore: Send + Sync + 'static {
    /// Definitions attached to one transition attempt, ordered by id.
    ///
    /// A definition matches when tenant, entity type and condition are equal
    /// and its entity id is either unset or equal to `entity_id`.
    async fn find_definitions(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
        condition: &str,
    ) -> Result<Vec<CalloutDefinition>, StorageError>;
}
