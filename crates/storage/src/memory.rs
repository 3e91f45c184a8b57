//! Process-local store implementations.
//!
//! The lock store only excludes callers sharing the same process (and the
//! same store instance). Deployments with several engine processes need a
//! shared backend implementing [`StateChangeLockStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use lifecycle_core::CalloutDefinition;

use crate::error::StorageError;
use crate::record::StateChangeLockRecord;
use crate::traits::{CalloutDefinitionStore, StateChangeLockStore};

type LockKey = (String, String);

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("in-memory store mutex poisoned".to_string())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

// ──────────────────────────────────────────────
// InMemoryLockStore
// ──────────────────────────────────────────────

/// Lock store backed by a mutex-guarded map keyed by `(entity_id, entity_type)`.
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    locks: Mutex<HashMap<LockKey, StateChangeLockRecord>>,
    next_id: AtomicI64,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateChangeLockStore for InMemoryLockStore {
    async fn try_acquire(
        &self,
        entity_id: &str,
        entity_type: &str,
        created_by: &str,
    ) -> Result<bool, StorageError> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        let key = (entity_id.to_string(), entity_type.to_string());
        if let Some(held) = locks.get(&key) {
            tracing::debug!(
                entity_id,
                entity_type,
                holder = %held.created_by,
                "state-change lock already held"
            );
            return Ok(false);
        }
        let record = StateChangeLockRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            entity_id: entity_id.to_string(),
            entity_type: entity_type.to_string(),
            created_by: created_by.to_string(),
            created: now_rfc3339(),
        };
        locks.insert(key, record);
        tracing::debug!(entity_id, entity_type, created_by, "state-change lock acquired");
        Ok(true)
    }

    async fn release(&self, entity_id: &str, entity_type: &str) -> Result<(), StorageError> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        if locks
            .remove(&(entity_id.to_string(), entity_type.to_string()))
            .is_some()
        {
            tracing::debug!(entity_id, entity_type, "state-change lock released");
        }
        Ok(())
    }

    async fn is_locked(&self, entity_id: &str, entity_type: &str) -> Result<bool, StorageError> {
        let locks = self.locks.lock().map_err(poisoned)?;
        Ok(locks.contains_key(&(entity_id.to_string(), entity_type.to_string())))
    }

    async fn get_lock(
        &self,
        entity_id: &str,
        entity_type: &str,
    ) -> Result<Option<StateChangeLockRecord>, StorageError> {
        let locks = self.locks.lock().map_err(poisoned)?;
        Ok(locks
            .get(&(entity_id.to_string(), entity_type.to_string()))
            .cloned())
    }

    async fn list_locks(&self) -> Result<Vec<StateChangeLockRecord>, StorageError> {
        let locks = self.locks.lock().map_err(poisoned)?;
        let mut records: Vec<_> = locks.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

// ──────────────────────────────────────────────
// InMemoryCalloutDefinitionStore
// ──────────────────────────────────────────────

/// Callout definitions held in memory, typically loaded once from a JSON
/// array at startup.
#[derive(Debug, Default)]
pub struct InMemoryCalloutDefinitionStore {
    definitions: RwLock<Vec<CalloutDefinition>>,
}

impl InMemoryCalloutDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON array of definitions.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let definitions: Vec<CalloutDefinition> = serde_json::from_str(json)?;
        let store = Self::new();
        for definition in definitions {
            store.insert(definition)?;
        }
        Ok(store)
    }

    /// Add a definition. Ids must be unique within the store.
    pub fn insert(&self, definition: CalloutDefinition) -> Result<(), StorageError> {
        let mut definitions = self.definitions.write().map_err(poisoned)?;
        if definitions.iter().any(|d| d.id == definition.id) {
            return Err(StorageError::DuplicateDefinition { id: definition.id });
        }
        definitions.push(definition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CalloutDefinitionStore for InMemoryCalloutDefinitionStore {
    async fn find_definitions(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
        condition: &str,
    ) -> Result<Vec<CalloutDefinition>, StorageError> {
        let definitions = self.definitions.read().map_err(poisoned)?;
        let mut matching: Vec<_> = definitions
            .iter()
            .filter(|d| d.applies_to(tenant_id, entity_type, entity_id, condition))
            .cloned()
            .collect();
        matching.sort_by_key(|d| d.id);
        Ok(matching)
    }
}
