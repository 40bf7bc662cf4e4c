//! Command-line interface definitions for the `proxyfleet` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `proxyfleet` binary.
#[derive(Debug, Parser)]
#[command(
    name = "proxyfleet",
    version,
    about = "Keep a pool of tinyproxy servers running on Hetzner Cloud",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Ensure exactly COUNT proxies are running and print their URLs.
    #[command(name = "start", about = "Ensure COUNT proxies are running")]
    Start(StartCommand),
    /// Delete COUNT proxies and print the URLs of the survivors.
    #[command(name = "stop", about = "Delete COUNT proxies (-1 deletes all)")]
    Stop(StopCommand),
    /// Print the URLs of running proxies.
    #[command(name = "list", about = "Print the URLs of running proxies")]
    List(ListCommand),
}

/// Arguments for the `proxyfleet start` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct StartCommand {
    /// Number of proxies to keep running.
    #[arg(value_name = "COUNT", value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) count: u16,
}

/// Arguments for the `proxyfleet stop` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct StopCommand {
    /// Number of proxies to delete, oldest listed first. Negative values
    /// delete every proxy.
    #[arg(value_name = "COUNT", allow_negative_numbers = true)]
    pub(crate) count: i64,
}

/// Arguments for the `proxyfleet list` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ListCommand {
    /// Maximum number of proxies to print. Omitted or negative prints all.
    #[arg(value_name = "COUNT", allow_negative_numbers = true)]
    pub(crate) count: Option<i64>,
}
