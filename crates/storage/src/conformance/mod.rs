//! Conformance test suite for lock and callout definition stores.
//!
//! This module provides a backend-agnostic test suite that any
//! [`StateChangeLockStore`] or [`CalloutDefinitionStore`] implementation can
//! run to verify the guarantees the engine relies on:
//!
//! - **Locking**: test-and-set acquisition, idempotent release, lock records
//! - **Concurrency**: exactly one winner per entity under contention, no
//!   false conflicts across entities
//! - **Callout lookup**: tenant / type / condition / instance filtering
//!
//! # Usage
//!
//! ```ignore
//! use lifecycle_storage::conformance::run_lock_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_lock_conformance() {
//!     let report = run_lock_conformance_suite(|| async {
//!         create_test_postgres_lock_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```
//!
//! Callout stores are seeded by the caller: the factory receives the
//! definitions each test needs and returns a store containing exactly those.

mod callout;
mod concurrent;
mod lock;

use std::fmt;
use std::future::Future;

use lifecycle_core::{CalloutDefinition, CalloutType};

use crate::{CalloutDefinitionStore, StateChangeLockStore};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "lock", "concurrent", "callout").
    pub category: String,
    /// Test name (e.g. "second_acquire_is_refused").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ConformanceReport {
    fn from_results(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let total = results.len();
        ConformanceReport {
            results,
            passed,
            failed: total - passed,
            total,
        }
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the lock store suite.
///
/// The `factory` function is called once per test to create a fresh store
/// with no locks held, ensuring test isolation.
pub async fn run_lock_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: StateChangeLockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(lock::run_lock_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    ConformanceReport::from_results(results)
}

/// Run the callout definition store suite.
///
/// The `factory` is called once per test with the definitions that test
/// needs; it must return a store holding exactly those definitions.
pub async fn run_callout_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    ConformanceReport::from_results(callout::run_callout_tests(&factory).await)
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_definition(
    id: i64,
    callout_type: CalloutType,
    entity_type: &str,
    entity_id: Option<&str>,
    condition: &str,
    tenant_id: &str,
) -> CalloutDefinition {
    CalloutDefinition {
        id,
        callout_type,
        entity_type: entity_type.to_string(),
        entity_id: entity_id.map(str::to_string),
        condition: condition.to_string(),
        parameters: format!(r#"{{"callout-url":"http://callouts.test/{id}"}}"#),
        tenant_id: tenant_id.to_string(),
        tid: Some(tenant_id.to_string()),
        created_by: Some("test-user".to_string()),
        created: Some("2025-01-01T00:00:00Z".to_string()),
        modified_by: None,
        modified: None,
    }
}
