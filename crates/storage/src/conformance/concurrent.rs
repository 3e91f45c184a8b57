use std::future::Future;
use std::sync::Arc;

use super::TestResult;
use crate::{StateChangeLockStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_acquire_exactly_one_wins",
        concurrent_acquire_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_acquire_different_entities_all_succeed",
        concurrent_acquire_different_entities_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "release_then_concurrent_acquire_exactly_one_wins",
        release_then_concurrent_acquire_exactly_one_wins(factory).await,
    ));

    results
}

/// Spawn N tasks racing to acquire Job/`entity_id`; returns the winner count.
async fn race_for_lock<S>(storage: &Arc<S>, entity_id: &str) -> Result<usize, String>
where
    S: StateChangeLockStore,
{
    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let entity_id = entity_id.to_string();
        handles.push(tokio::spawn(async move {
            s.try_acquire(&entity_id, "Job", &format!("worker-{i}"))
                .await
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    Ok(winners)
}

// ── Concurrent acquire: exactly one wins ────────────────────────────────────

/// N tasks race to lock the same entity. Exactly one acquires it; the rest
/// are refused without error.
async fn concurrent_acquire_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let winners = race_for_lock(&storage, "job-1").await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent acquire on different entities: all succeed ───────────────────

/// N tasks each lock a different entity. All should succeed: no false
/// conflicts when there is no contention.
async fn concurrent_acquire_different_entities_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.try_acquire(&format!("job-{i}"), "Job", "worker").await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let won = handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
        if !won {
            return Err(format!("job-{i}: uncontended acquire was refused"));
        }
    }

    let locks = storage.list_locks().await.map_err(|e| e.to_string())?;
    if locks.len() != N {
        return Err(format!("expected {N} active locks, got {}", locks.len()));
    }
    Ok(())
}

// ── Release then race again ─────────────────────────────────────────────────

/// After the winner of a race releases, a second race again has exactly one
/// winner.
async fn release_then_concurrent_acquire_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let first = race_for_lock(&storage, "job-1").await?;
    if first != 1 {
        return Err(format!("first race: expected 1 winner, got {first}"));
    }
    storage
        .release("job-1", "Job")
        .await
        .map_err(|e| format!("release: {e}"))?;

    let second = race_for_lock(&storage, "job-1").await?;
    if second != 1 {
        return Err(format!("second race: expected 1 winner, got {second}"));
    }
    Ok(())
}
