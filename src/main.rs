//! Binary entry point for the proxyfleet CLI.

use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use proxyfleet::{
    ConfigError, Fleet, FleetConfig, FleetError, FleetSettings, HetznerError, HetznerFleet,
    HetznerProvider, IpifyLookup, ProxyCount, TcpReadinessGate, UserDataError,
};

mod cli;

use cli::Cli;

const DEFAULT_LOG_FILTER: &str = "proxyfleet=info";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provider error: {0}")]
    Provider(#[from] HetznerError),
    #[error("user data error: {0}")]
    UserData(#[from] UserDataError),
    #[error("fleet operation failed: {0}")]
    Fleet(#[from] FleetError<HetznerError>),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = FleetConfig::load_without_cli_args()?;
    let provider = HetznerProvider::from_config(&config)?;
    let settings = FleetSettings::from_config(&config)?;
    let port = settings.proxy_port;
    let mut fleet: HetznerFleet = Fleet::new(
        provider,
        IpifyLookup::new(&config.ip_lookup_url),
        TcpReadinessGate::new(),
        settings,
    );

    let outcome = match cli {
        Cli::Start(command) => {
            let count = usize::from(command.count);
            fleet.ensure_proxies(count, count).await
        }
        Cli::Stop(command) => fleet.despawn_proxies(ProxyCount::from(command.count)).await,
        Cli::List(command) => {
            let count = command.count.map_or(ProxyCount::All, ProxyCount::from);
            fleet.get_proxies(count).await
        }
    };

    match outcome {
        Ok(addresses) => write_urls(io::stdout().lock(), &addresses, port),
        Err(failure) => {
            let (addresses, source) = failure.into_parts();
            write_urls(io::stdout().lock(), &addresses, port)?;
            Err(CliError::Fleet(source))
        }
    }
}

fn write_urls(mut target: impl Write, addresses: &[Ipv4Addr], port: u16) -> Result<(), CliError> {
    for address in addresses {
        writeln!(target, "http://{address}:{port}")?;
    }
    target.flush()?;
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
