use std::future::Future;

use lifecycle_core::{CalloutDefinition, CalloutType};

use super::{make_definition, TestResult};
use crate::CalloutDefinitionStore;

pub(super) async fn run_callout_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "callout",
        "empty_store_finds_nothing",
        empty_store_finds_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "callout",
        "type_wide_definition_matches_any_instance",
        type_wide_definition_matches_any_instance(factory).await,
    ));
    results.push(TestResult::from_result(
        "callout",
        "instance_definition_matches_only_its_instance",
        instance_definition_matches_only_its_instance(factory).await,
    ));
    results.push(TestResult::from_result(
        "callout",
        "other_tenant_is_invisible",
        other_tenant_is_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "callout",
        "condition_and_entity_type_must_match",
        condition_and_entity_type_must_match(factory).await,
    ));
    results.push(TestResult::from_result(
        "callout",
        "results_are_ordered_by_id",
        results_are_ordered_by_id(factory).await,
    ));

    results
}

fn ids(definitions: &[CalloutDefinition]) -> Vec<i64> {
    definitions.iter().map(|d| d.id).collect()
}

async fn empty_store_finds_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    let found = s
        .find_definitions("t1", "Job", "1", "Continue")
        .await
        .map_err(|e| e.to_string())?;
    if !found.is_empty() {
        return Err(format!("expected no definitions, got {:?}", ids(&found)));
    }
    Ok(())
}

async fn type_wide_definition_matches_any_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_definition(
        1,
        CalloutType::Pre,
        "Job",
        None,
        "Continue",
        "t1",
    )])
    .await;
    for entity_id in ["1", "2", "abc"] {
        let found = s
            .find_definitions("t1", "Job", entity_id, "Continue")
            .await
            .map_err(|e| e.to_string())?;
        if ids(&found) != [1] {
            return Err(format!(
                "Job/{entity_id}: expected [1], got {:?}",
                ids(&found)
            ));
        }
    }
    Ok(())
}

async fn instance_definition_matches_only_its_instance<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_definition(
        1,
        CalloutType::Post,
        "Job",
        Some("7"),
        "Continue",
        "t1",
    )])
    .await;
    let hit = s
        .find_definitions("t1", "Job", "7", "Continue")
        .await
        .map_err(|e| e.to_string())?;
    if ids(&hit) != [1] {
        return Err(format!("Job/7: expected [1], got {:?}", ids(&hit)));
    }
    let miss = s
        .find_definitions("t1", "Job", "8", "Continue")
        .await
        .map_err(|e| e.to_string())?;
    if !miss.is_empty() {
        return Err(format!("Job/8: expected [], got {:?}", ids(&miss)));
    }
    Ok(())
}

async fn other_tenant_is_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![make_definition(
        1,
        CalloutType::PreAndPost,
        "Job",
        None,
        "Continue",
        "t1",
    )])
    .await;
    let found = s
        .find_definitions("t2", "Job", "1", "Continue")
        .await
        .map_err(|e| e.to_string())?;
    if !found.is_empty() {
        return Err(format!(
            "tenant t2 saw definitions of t1: {:?}",
            ids(&found)
        ));
    }
    Ok(())
}

async fn condition_and_entity_type_must_match<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![
        make_definition(1, CalloutType::Pre, "Job", None, "Continue", "t1"),
        make_definition(2, CalloutType::Pre, "Job", None, "Cancel", "t1"),
        make_definition(3, CalloutType::Pre, "Order", None, "Continue", "t1"),
    ])
    .await;
    let found = s
        .find_definitions("t1", "Job", "1", "Cancel")
        .await
        .map_err(|e| e.to_string())?;
    if ids(&found) != [2] {
        return Err(format!("expected [2], got {:?}", ids(&found)));
    }
    Ok(())
}

async fn results_are_ordered_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CalloutDefinitionStore,
    F: Fn(Vec<CalloutDefinition>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(vec![
        make_definition(30, CalloutType::Post, "Job", None, "Continue", "t1"),
        make_definition(10, CalloutType::Pre, "Job", Some("1"), "Continue", "t1"),
        make_definition(20, CalloutType::PreAndPost, "Job", None, "Continue", "t1"),
    ])
    .await;
    let found = s
        .find_definitions("t1", "Job", "1", "Continue")
        .await
        .map_err(|e| e.to_string())?;
    if ids(&found) != [10, 20, 30] {
        return Err(format!("expected [10, 20, 30], got {:?}", ids(&found)));
    }
    Ok(())
}
