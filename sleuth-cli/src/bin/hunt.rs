//! sleuth-hunt
//!
//! Sequential username hunt with redirect-trap and stub-page filtering,
//! optionally routed through Tor.

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::Level;

use sleuth_cli::{init_tracing, print_banner};
use sleuth_core::{default_hunt_sites, ProbeResult, SiteKind, SiteRegistry};
use sleuth_net::{
    build_client, check_tor_connection, ClientConfig, HuntConfig, Hunter, DEFAULT_TOR_PORT,
};

#[derive(Parser)]
#[command(name = "sleuth-hunt")]
#[command(author, version, about = "Username recon with optional Tor anonymity", long_about = None)]
struct Cli {
    /// Target username
    username: String,

    /// Show every HEAD/GET step and rejection reason
    #[arg(short, long)]
    verbose: bool,

    /// Route all requests through Tor SOCKS5 (127.0.0.1)
    #[arg(short, long)]
    tor: bool,

    /// Tor SOCKS port (Tor Browser and Orbot often use 9150)
    #[arg(long, env = "TOR_PORT", default_value_t = DEFAULT_TOR_PORT)]
    tor_port: u16,
}

fn print_result(result: &ProbeResult) {
    if result.exists {
        println!(
            "{} {}: {}",
            style("[FOUND]").green().bold(),
            style(format!("{:<12}", result.site)).green(),
            style(&result.url).cyan()
        );
    } else {
        println!(
            "{}  {}: {}",
            style("[MISS]").blue().bold(),
            style(format!("{:<12}", result.site)).blue(),
            style(&result.url).dim()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(level, true);

    let username = cli.username.trim();
    anyhow::ensure!(!username.is_empty(), "username must not be empty");

    print_banner(
        concat!("sleuth-hunt v", env!("CARGO_PKG_VERSION")),
        "sequential username recon",
    );
    if cli.verbose {
        println!("{}", style("VERBOSE MODE ACTIVE").green().bold());
    }

    let client_config = if cli.tor {
        println!(
            "{}",
            style(format!("TOR MODE ACTIVE (port {})", cli.tor_port))
                .green()
                .bold()
        );
        ClientConfig::tor(cli.tor_port)
    } else {
        ClientConfig::default()
    };
    let client = build_client(&client_config)?;

    if cli.tor {
        match check_tor_connection(&client).await {
            Ok(true) => println!("{}", style("✅ Exiting through Tor").green().dim()),
            Ok(false) => println!(
                "{}",
                style("⚠️  Proxy reachable but not a Tor exit (continuing anyway)").yellow()
            ),
            Err(e) => println!(
                "{}",
                style(format!("⚠️  Tor check failed: {} (continuing anyway)", e)).yellow()
            ),
        }
    }

    println!(
        "\n{} {}\n",
        style("Target:").blue().dim(),
        style(username).green().bold()
    );

    let registry = SiteRegistry::new(SiteKind::Username, default_hunt_sites())?;
    let hunter = Hunter::new(client, HuntConfig::for_mode(cli.verbose, cli.tor));
    let results = hunter.hunt(username, &registry, print_result).await;

    let found = results.iter().filter(|r| r.exists).count();
    println!(
        "\n{}",
        style(format!(
            "Operation complete. {}/{} profiles found.",
            found,
            results.len()
        ))
        .green()
        .dim()
    );

    Ok(())
}
