//! Shared fixtures and helpers for fleet BDD scenarios.

use std::net::Ipv4Addr;

use proxyfleet::test_support::{ScriptedProbe, ScriptedProvider, ScriptedProviderError, fleet_config};
use proxyfleet::{Fleet, FleetResult, FleetSettings, Server, StaticIp};
use rstest::fixture;

pub const CALLER: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 7);

pub type ScriptedFleet = Fleet<ScriptedProvider, StaticIp, ScriptedProbe>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FleetOutcome {
    Success(Vec<Ipv4Addr>),
    Failure {
        addresses: Vec<Ipv4Addr>,
        message: String,
    },
}

impl FleetOutcome {
    pub fn from_result(result: FleetResult<ScriptedProviderError>) -> Self {
        match result {
            Ok(addresses) => Self::Success(addresses),
            Err(failure) => Self::Failure {
                message: failure.to_string(),
                addresses: failure.addresses,
            },
        }
    }

    pub fn addresses(&self) -> &[Ipv4Addr] {
        match self {
            Self::Success(addresses) | Self::Failure { addresses, .. } => addresses,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FleetContext {
    pub provider: ScriptedProvider,
    pub probe: ScriptedProbe,
    pub settings: FleetSettings,
    pub owned: Vec<Server>,
    pub outcome: Option<FleetOutcome>,
}

impl FleetContext {
    pub fn fleet(&self) -> ScriptedFleet {
        Fleet::new(
            self.provider.clone(),
            StaticIp(CALLER),
            self.probe.clone(),
            self.settings.clone(),
        )
    }
}

#[fixture]
pub fn fleet_context() -> FleetContext {
    let settings = FleetSettings::from_config(&fleet_config())
        .unwrap_or_else(|err| panic!("fleet settings should build: {err}"));
    FleetContext {
        provider: ScriptedProvider::with_catalog(),
        probe: ScriptedProbe::new(),
        settings,
        owned: Vec::new(),
        outcome: None,
    }
}
