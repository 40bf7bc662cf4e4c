//! Location and server type selection for new proxy instances.
//!
//! Locations are picked to spread the fleet: a location the fleet has never
//! used wins outright, otherwise the least used one. Server types are picked
//! by the lowest published hourly net price at the chosen location.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::provider::{ARCH_ARM, Location, ServerType};

/// Best-effort count of fleet instances seen per location.
///
/// Counters start empty for every process, are raised by registry reads and
/// incremented on each create. They never decrease.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LocationUsage {
    counts: BTreeMap<String, usize>,
}

impl LocationUsage {
    /// Creates an empty usage table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded usage for `location`, or `None` when the fleet
    /// has never been seen there.
    #[must_use]
    pub fn get(&self, location: &str) -> Option<usize> {
        self.counts.get(location).copied()
    }

    /// Records one more instance at `location`.
    pub fn increment(&mut self, location: &str) {
        let count = self.counts.entry(location.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Raises the counter for `location` to at least `observed`.
    pub fn observe(&mut self, location: &str, observed: usize) {
        let count = self.counts.entry(location.to_owned()).or_insert(0);
        if observed > *count {
            *count = observed;
        }
    }

    /// Returns true when no location has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<const N: usize> From<[(&str, usize); N]> for LocationUsage {
    fn from(entries: [(&str, usize); N]) -> Self {
        Self {
            counts: entries
                .into_iter()
                .map(|(name, count)| (name.to_owned(), count))
                .collect(),
        }
    }
}

/// Picks the location for the next instance.
///
/// Returns the first location without recorded usage, or else the location
/// with the smallest count. Ties keep catalog order.
#[must_use]
pub fn select_location<'a>(
    locations: &'a [Location],
    usage: &LocationUsage,
) -> Option<&'a Location> {
    let mut candidate: Option<(&Location, usize)> = None;
    for location in locations {
        let Some(count) = usage.get(&location.name) else {
            debug!(location = %location.name, "location unused by the fleet");
            return Some(location);
        };
        if candidate.is_none_or(|(_, best)| count < best) {
            candidate = Some((location, count));
        }
    }
    candidate.map(|(location, _)| location)
}

/// Server type chosen for a location with the price it was chosen at.
#[derive(Clone, Debug, PartialEq)]
pub struct PricedServerType<'a> {
    /// The selected server type.
    pub server_type: &'a ServerType,
    /// Net hourly price at the location.
    pub hourly_net: f64,
    /// Currency of the price.
    pub currency: &'a str,
}

/// Picks the cheapest non-ARM server type offered at `location`.
///
/// Types without a price at the location are skipped, as are types whose
/// price does not parse. Comparing prices across currencies is logged but
/// does not stop the selection. Ties keep catalog order.
#[must_use]
pub fn select_server_type<'a>(
    server_types: &'a [ServerType],
    location: &Location,
) -> Option<PricedServerType<'a>> {
    let mut candidate: Option<PricedServerType<'a>> = None;
    for server_type in server_types {
        if server_type.architecture == ARCH_ARM {
            continue;
        }
        let Some(price) = server_type.price_at(&location.name) else {
            continue;
        };
        let hourly_net = match price.hourly_net.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            Ok(_) | Err(_) => {
                warn!(
                    server_type = %server_type.name,
                    location = %location.name,
                    price = %price.hourly_net,
                    "skipping server type with unparsable hourly price"
                );
                continue;
            }
        };

        if let Some(best) = candidate.as_ref()
            && best.currency != price.currency
        {
            warn!(
                server_type = %server_type.name,
                current = %best.currency,
                candidate = %price.currency,
                "comparing server type prices across currencies"
            );
        }

        if candidate
            .as_ref()
            .is_none_or(|best| hourly_net < best.hourly_net)
        {
            candidate = Some(PricedServerType {
                server_type,
                hourly_net,
                currency: price.currency.as_str(),
            });
        }
    }

    if let Some(chosen) = candidate.as_ref() {
        info!(
            server_type = %chosen.server_type.name,
            location = %location.name,
            country = %location.country,
            price = chosen.hourly_net,
            currency = %chosen.currency,
            "selected server type"
        );
    }
    candidate
}
