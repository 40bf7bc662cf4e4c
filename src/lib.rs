//! Core library for the proxyfleet tool.
//!
//! The crate keeps a pool of short-lived proxy servers on Hetzner Cloud
//! within a requested size. [`Fleet`] reconciles the pool through the
//! [`Provider`] abstraction: it picks the least used location and the
//! cheapest server type for each new server, tags every server it creates
//! with an ownership label, and waits until each proxy accepts TCP
//! connections before handing its address back.

pub mod config;
pub mod fleet;
pub mod hetzner;
pub mod provider;
pub mod public_ip;
pub mod readiness;
pub mod registry;
pub mod selector;
pub mod test_support;
pub mod user_data;

pub use config::{ConfigError, FleetConfig};
pub use fleet::{
    Fleet, FleetError, FleetResult, FleetSettings, PartialFailure, ProxyCount,
};
pub use hetzner::{HetznerError, HetznerProvider};
pub use provider::{
    CreateServerRequest, CreateServerRequestBuilder, Image, Location, LocationPrice, Provider,
    ProviderError, Server, ServerType, SshKey,
};
pub use public_ip::{IpifyLookup, PublicIpError, PublicIpLookup, StaticIp};
pub use readiness::{ReadinessError, ReadinessProbe, TcpReadinessGate};
pub use selector::LocationUsage;
pub use user_data::{UserDataError, UserDataTemplates};

/// Fleet wired to the Hetzner Cloud API, ipify and TCP readiness polling.
pub type HetznerFleet = Fleet<HetznerProvider, IpifyLookup, TcpReadinessGate>;
