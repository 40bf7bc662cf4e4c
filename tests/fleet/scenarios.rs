//! BDD scenarios for fleet reconciliation.

use rstest_bdd_macros::scenario;

use super::test_helpers::{FleetContext, fleet_context};

#[scenario(path = "tests/features/fleet.feature", name = "Fill an empty project")]
fn scenario_fill_empty_project(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Repeating a fixed target does not touch the fleet again"
)]
fn scenario_idempotent_target(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Top up a partially filled fleet on the unused location"
)]
fn scenario_top_up(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(path = "tests/features/fleet.feature", name = "Trim an over-sized fleet")]
fn scenario_trim(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Listing zero proxies skips the provider"
)]
fn scenario_list_zero(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Listing ignores servers owned by other fleets"
)]
fn scenario_list_owned_only(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(path = "tests/features/fleet.feature", name = "Stop every proxy")]
fn scenario_stop_all(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "A failed delete reports the planned survivors"
)]
fn scenario_delete_failure(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "A failed create keeps the proxies created before it"
)]
fn scenario_create_failure(fleet_context: FleetContext) {
    drop(fleet_context);
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Spawning without any SSH key fails before creating"
)]
fn scenario_missing_ssh_key(fleet_context: FleetContext) {
    drop(fleet_context);
}
