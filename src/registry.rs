//! Read-only view of the servers owned by the fleet.

use std::collections::BTreeMap;

use tracing::debug;

use crate::provider::{Provider, Server};
use crate::selector::LocationUsage;

/// Label key marking fleet ownership.
pub const OWNER_LABEL: &str = "owner";

/// Returns the label selector matching servers owned by `fleet_tag`.
#[must_use]
pub fn owner_selector(fleet_tag: &str) -> String {
    format!("{OWNER_LABEL}={fleet_tag}")
}

/// Lists every server owned by `fleet_tag` and folds the observed location
/// distribution into `usage`.
///
/// # Errors
///
/// Returns the provider error when the list call fails. `usage` is left
/// untouched in that case.
pub async fn list_owned<P: Provider>(
    provider: &P,
    fleet_tag: &str,
    usage: &mut LocationUsage,
) -> Result<Vec<Server>, P::Error> {
    let selector = owner_selector(fleet_tag);
    let servers = provider.list_servers(&selector).await?;

    let mut observed: BTreeMap<&str, usize> = BTreeMap::new();
    for server in &servers {
        let count = observed.entry(server.location.name.as_str()).or_insert(0);
        *count = count.saturating_add(1);
    }
    for (location, count) in observed {
        usage.observe(location, count);
    }

    debug!(fleet_tag, count = servers.len(), "listed owned servers");
    Ok(servers)
}
