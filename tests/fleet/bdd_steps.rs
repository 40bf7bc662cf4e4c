//! BDD step definitions for fleet reconciliation.

use proxyfleet::ProxyCount;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{FleetContext, FleetOutcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("an empty Hetzner project")]
fn empty_project(fleet_context: FleetContext) -> FleetContext {
    fleet_context
}

#[given("{count} owned proxies in \"{location}\"")]
fn owned_proxies(mut fleet_context: FleetContext, count: usize, location: String) -> FleetContext {
    let tag = fleet_context.settings.fleet_tag.clone();
    let seeded = fleet_context
        .provider
        .seed_owned(&tag, location.trim(), count);
    fleet_context.owned.extend(seeded);
    fleet_context
}

#[given("a server owned by \"{tag}\"")]
fn foreign_server(fleet_context: FleetContext, tag: String) -> FleetContext {
    fleet_context
        .provider
        .seed_server(&[("owner", tag.trim())], "fsn1");
    fleet_context
}

#[given("create call number {index} fails")]
fn create_call_fails(fleet_context: FleetContext, index: usize) -> FleetContext {
    fleet_context
        .provider
        .fail_create_at(index.saturating_sub(1));
    fleet_context
}

#[given("deleting owned proxy number {index} fails")]
fn delete_fails(fleet_context: FleetContext, index: usize) -> FleetContext {
    let Some(server) = fleet_context.owned.get(index.saturating_sub(1)) else {
        panic!("test setup requires owned proxy number {index}");
    };
    fleet_context.provider.fail_delete_of(server.id);
    fleet_context
}

#[given("the project has no SSH keys")]
fn no_ssh_keys(fleet_context: FleetContext) -> FleetContext {
    fleet_context.provider.clear_ssh_keys();
    fleet_context
}

#[when("I ensure between {min} and {max} proxies")]
fn ensure_once(fleet_context: FleetContext, min: usize, max: usize) -> Result<FleetContext, StepError> {
    run_ensure(fleet_context, min, max, 1)
}

#[when("I ensure exactly {count} proxies twice")]
fn ensure_twice(fleet_context: FleetContext, count: usize) -> Result<FleetContext, StepError> {
    run_ensure(fleet_context, count, count, 2)
}

#[when("I list {count} proxies")]
fn list_some(fleet_context: FleetContext, count: usize) -> Result<FleetContext, StepError> {
    run_get(fleet_context, ProxyCount::Exactly(count))
}

#[when("I list every proxy")]
fn list_all(fleet_context: FleetContext) -> Result<FleetContext, StepError> {
    run_get(fleet_context, ProxyCount::All)
}

#[when("I stop {count} proxies")]
fn stop_some(fleet_context: FleetContext, count: usize) -> Result<FleetContext, StepError> {
    run_despawn(fleet_context, ProxyCount::Exactly(count))
}

#[when("I stop every proxy")]
fn stop_all(fleet_context: FleetContext) -> Result<FleetContext, StepError> {
    run_despawn(fleet_context, ProxyCount::All)
}

#[then("the operation succeeds")]
fn operation_succeeds(fleet_context: &FleetContext) -> Result<(), StepError> {
    match fleet_context.outcome {
        Some(FleetOutcome::Success(_)) => Ok(()),
        Some(FleetOutcome::Failure { ref message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the operation fails")]
fn operation_fails(fleet_context: &FleetContext) -> Result<(), StepError> {
    match fleet_context.outcome {
        Some(FleetOutcome::Failure { .. }) => Ok(()),
        Some(FleetOutcome::Success(ref addresses)) => Err(StepError::Assertion(format!(
            "expected failure, got {} addresses",
            addresses.len()
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("{count} addresses are returned")]
fn addresses_returned(fleet_context: &FleetContext, count: usize) -> Result<(), StepError> {
    let outcome = outcome(fleet_context)?;
    let returned = outcome.addresses().len();
    if returned == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} addresses, got {returned}"
        )))
    }
}

#[then("the error mentions \"{text}\"")]
fn error_mentions(fleet_context: &FleetContext, text: String) -> Result<(), StepError> {
    let Some(FleetOutcome::Failure { message, .. }) = &fleet_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if message.contains(text.trim()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected error to mention '{text}', got: {message}"
        )))
    }
}

#[then("{count} servers were created")]
fn servers_created(fleet_context: &FleetContext, count: usize) -> Result<(), StepError> {
    expect_create_calls(fleet_context, count)
}

#[then("nothing was created")]
fn no_servers_created(fleet_context: &FleetContext) -> Result<(), StepError> {
    expect_create_calls(fleet_context, 0)
}

fn expect_create_calls(fleet_context: &FleetContext, count: usize) -> Result<(), StepError> {
    let created = fleet_context.provider.creates().len();
    if created == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} create calls, got {created}"
        )))
    }
}

#[then("{count} delete calls were issued")]
fn delete_calls_issued(fleet_context: &FleetContext, count: usize) -> Result<(), StepError> {
    expect_delete_calls(fleet_context, count)
}

#[then("nothing was deleted")]
fn no_servers_deleted(fleet_context: &FleetContext) -> Result<(), StepError> {
    expect_delete_calls(fleet_context, 0)
}

fn expect_delete_calls(fleet_context: &FleetContext, count: usize) -> Result<(), StepError> {
    let deleted = fleet_context.provider.deletes().len();
    if deleted == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} delete calls, got {deleted}"
        )))
    }
}

#[then("every created server carries the owner label \"{tag}\"")]
fn created_servers_labelled(fleet_context: &FleetContext, tag: String) -> Result<(), StepError> {
    let expected = tag.trim();
    for request in fleet_context.provider.creates() {
        let label = request.labels.get("owner").map(String::as_str);
        if label != Some(expected) {
            return Err(StepError::Assertion(format!(
                "server {} carries owner label {label:?}",
                request.name
            )));
        }
    }
    Ok(())
}

#[then("created servers are placed in \"{locations}\"")]
fn created_servers_placed(fleet_context: &FleetContext, locations: String) -> Result<(), StepError> {
    let expected: Vec<&str> = locations.split(',').map(str::trim).collect();
    let creates = fleet_context.provider.creates();
    let actual: Vec<&str> = creates
        .iter()
        .map(|request| request.location.as_str())
        .collect();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected placement {expected:?}, got {actual:?}"
        )))
    }
}

#[then("the provider was not queried")]
fn provider_not_queried(fleet_context: &FleetContext) -> Result<(), StepError> {
    let selectors = fleet_context.provider.selectors();
    if selectors.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no list calls, got {selectors:?}"
        )))
    }
}

fn outcome(fleet_context: &FleetContext) -> Result<&FleetOutcome, StepError> {
    fleet_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

fn run_ensure(
    mut fleet_context: FleetContext,
    min: usize,
    max: usize,
    rounds: usize,
) -> Result<FleetContext, StepError> {
    let runtime = runtime()?;
    let mut fleet = fleet_context.fleet();
    let mut outcome = None;
    for _ in 0..rounds {
        let result = runtime.block_on(fleet.ensure_proxies(min, max));
        outcome = Some(FleetOutcome::from_result(result));
    }
    fleet_context.outcome = outcome;
    Ok(fleet_context)
}

fn run_get(mut fleet_context: FleetContext, count: ProxyCount) -> Result<FleetContext, StepError> {
    let runtime = runtime()?;
    let mut fleet = fleet_context.fleet();
    let result = runtime.block_on(fleet.get_proxies(count));
    fleet_context.outcome = Some(FleetOutcome::from_result(result));
    Ok(fleet_context)
}

fn run_despawn(
    mut fleet_context: FleetContext,
    count: ProxyCount,
) -> Result<FleetContext, StepError> {
    let runtime = runtime()?;
    let mut fleet = fleet_context.fleet();
    let result = runtime.block_on(fleet.despawn_proxies(count));
    fleet_context.outcome = Some(FleetOutcome::from_result(result));
    Ok(fleet_context)
}
