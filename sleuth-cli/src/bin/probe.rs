//! sleuth-probe
//!
//! Concurrent username/email existence probe with a JSON report.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::seq::SliceRandom;
use tracing::{info, Level};

use sleuth_cli::{init_tracing, log_level};
use sleuth_core::{SiteFile, TargetKind};
use sleuth_net::{build_client, ClientConfig, ProbeConfig, Prober};

#[derive(Parser)]
#[command(name = "sleuth-probe")]
#[command(author, version, about = "Async username & email OSINT probe", long_about = None)]
struct Cli {
    /// Username or email to investigate
    target: String,

    /// Proxies to route through; one is picked at random (e.g. http://127.0.0.1:8080)
    #[arg(long, num_args = 1.., env = "SLEUTH_PROXIES", value_delimiter = ',')]
    proxies: Vec<String>,

    /// TOML file replacing the built-in site lists
    #[arg(long)]
    sites: Option<PathBuf>,

    /// Maximum probes in flight
    #[arg(long, default_value = "30")]
    max_concurrent: usize,

    /// Wall-clock limit for the whole batch in seconds
    #[arg(long, default_value = "40")]
    timeout: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(log_level(Level::WARN, cli.verbose), true);

    let target = cli.target.trim();
    anyhow::ensure!(!target.is_empty(), "target must not be empty");

    let site_file = match &cli.sites {
        Some(path) => SiteFile::load(path)
            .with_context(|| format!("failed to load sites from {}", path.display()))?,
        None => SiteFile::default(),
    };
    let (usernames, emails) = site_file.into_registries()?;

    let probe_config = ProbeConfig {
        max_concurrent: cli.max_concurrent,
        batch_timeout_secs: cli.timeout,
        ..ProbeConfig::default()
    };
    let mut client_config = ClientConfig::default().with_timeout(probe_config.request_timeout_secs);
    if let Some(proxy) = cli.proxies.choose(&mut rand::thread_rng()) {
        info!("Routing through proxy {}", proxy);
        client_config = client_config.with_proxy(proxy);
    }
    let client = build_client(&client_config)?;

    info!(
        "Investigating {} as {:?}",
        target,
        TargetKind::detect(target)
    );
    let prober = Prober::new(client, probe_config);
    let report = prober.run(target, &usernames, &emails).await;

    let json = report.to_json_pretty()?;
    println!("{}", json);

    let filename = report.filename();
    fs::write(&filename, &json).with_context(|| format!("failed to write {}", filename))?;
    eprintln!("\nFull report saved to {}", filename);

    Ok(())
}
