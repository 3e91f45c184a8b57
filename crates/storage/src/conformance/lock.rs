use std::future::Future;

use super::TestResult;
use crate::StateChangeLockStore;

pub(super) async fn run_lock_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "lock",
        "fresh_store_has_no_locks",
        fresh_store_has_no_locks(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "acquire_marks_entity_locked",
        acquire_marks_entity_locked(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "second_acquire_is_refused",
        second_acquire_is_refused(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "refused_acquire_keeps_original_holder",
        refused_acquire_keeps_original_holder(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "release_allows_reacquire",
        release_allows_reacquire(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "release_without_lock_is_noop",
        release_without_lock_is_noop(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "double_release_is_noop",
        double_release_is_noop(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "entity_type_is_part_of_the_key",
        entity_type_is_part_of_the_key(factory).await,
    ));
    results.push(TestResult::from_result(
        "lock",
        "list_locks_reports_active_locks",
        list_locks_reports_active_locks(factory).await,
    ));

    results
}

// ── 1. No locks on a fresh store ─────────────────────────────────────────────

async fn fresh_store_has_no_locks<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    if s.is_locked("1", "Job").await.map_err(|e| e.to_string())? {
        return Err("fresh store reports Job/1 as locked".to_string());
    }
    let locks = s.list_locks().await.map_err(|e| e.to_string())?;
    if !locks.is_empty() {
        return Err(format!("expected no locks, got {}", locks.len()));
    }
    Ok(())
}

// ── 2. Acquire creates a lock record ─────────────────────────────────────────

async fn acquire_marks_entity_locked<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let acquired = s
        .try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    if !acquired {
        return Err("first acquire on an unlocked entity was refused".to_string());
    }
    if !s.is_locked("1", "Job").await.map_err(|e| e.to_string())? {
        return Err("entity not reported locked after acquire".to_string());
    }
    let record = s
        .get_lock("1", "Job")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("no lock record after acquire")?;
    if record.entity_id != "1" || record.entity_type != "Job" || record.created_by != "alice" {
        return Err(format!("lock record has wrong fields: {:?}", record));
    }
    Ok(())
}

// ── 3. Test-and-set: a held lock cannot be acquired again ────────────────────

async fn second_acquire_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    if second {
        return Err("second acquire of a held lock succeeded".to_string());
    }
    Ok(())
}

// ── 4. A refused acquire does not overwrite the holder ───────────────────────

async fn refused_acquire_keeps_original_holder<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.try_acquire("1", "Job", "bob")
        .await
        .map_err(|e| e.to_string())?;
    let record = s
        .get_lock("1", "Job")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("lock record disappeared")?;
    if record.created_by != "alice" {
        return Err(format!(
            "expected holder \"alice\", got \"{}\"",
            record.created_by
        ));
    }
    Ok(())
}

// ── 5. Release frees the entity ──────────────────────────────────────────────

async fn release_allows_reacquire<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.release("1", "Job").await.map_err(|e| e.to_string())?;
    if s.is_locked("1", "Job").await.map_err(|e| e.to_string())? {
        return Err("entity still locked after release".to_string());
    }
    let again = s
        .try_acquire("1", "Job", "bob")
        .await
        .map_err(|e| e.to_string())?;
    if !again {
        return Err("acquire after release was refused".to_string());
    }
    Ok(())
}

// ── 6. Releasing a lock that was never taken succeeds ────────────────────────

async fn release_without_lock_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.release("never", "Job")
        .await
        .map_err(|e| format!("release of unheld lock failed: {e}"))
}

// ── 7. Release twice succeeds ────────────────────────────────────────────────

async fn double_release_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    s.release("1", "Job").await.map_err(|e| e.to_string())?;
    s.release("1", "Job")
        .await
        .map_err(|e| format!("second release failed: {e}"))
}

// ── 8. Same id under another entity type is a different lock ─────────────────

async fn entity_type_is_part_of_the_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.try_acquire("1", "Job", "alice")
        .await
        .map_err(|e| e.to_string())?;
    let other_type = s
        .try_acquire("1", "Order", "alice")
        .await
        .map_err(|e| e.to_string())?;
    if !other_type {
        return Err("lock on Job/1 blocked Order/1".to_string());
    }
    s.release("1", "Job").await.map_err(|e| e.to_string())?;
    if !s.is_locked("1", "Order").await.map_err(|e| e.to_string())? {
        return Err("releasing Job/1 also released Order/1".to_string());
    }
    Ok(())
}

// ── 9. list_locks reflects acquisitions and releases ─────────────────────────

async fn list_locks_reports_active_locks<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["1", "2", "3"] {
        s.try_acquire(id, "Job", "alice")
            .await
            .map_err(|e| e.to_string())?;
    }
    s.release("2", "Job").await.map_err(|e| e.to_string())?;

    let locks = s.list_locks().await.map_err(|e| e.to_string())?;
    let mut ids: Vec<&str> = locks.iter().map(|l| l.entity_id.as_str()).collect();
    ids.sort_unstable();
    if ids != ["1", "3"] {
        return Err(format!("expected locks on [1, 3], got {:?}", ids));
    }
    Ok(())
}
