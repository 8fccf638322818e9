//! sleuth-crawl
//!
//! Polite same-origin crawler. Seed, output directory and limits are fixed
//! in `CrawlConfig::default()`.

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::Level;

use sleuth_cli::{init_tracing, print_banner};
use sleuth_net::{build_client, ClientConfig, CrawlConfig, Crawler};

/// Browser-like headers sent with every crawl request
const CRAWL_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Upgrade-Insecure-Requests", "1"),
];

#[derive(Parser)]
#[command(name = "sleuth-crawl")]
#[command(author, version, about = "Same-origin web page scraper", long_about = None)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    let _cli = Cli::parse();
    init_tracing(Level::INFO, false);

    print_banner(
        concat!("sleuth-crawl v", env!("CARGO_PKG_VERSION")),
        "same-origin web scraper",
    );

    let config = CrawlConfig::default();
    let client_config = CRAWL_HEADERS
        .iter()
        .fold(ClientConfig::default().with_timeout(config.fetch_timeout_secs), |c, (k, v)| {
            c.with_header(k, v)
        });
    let client = build_client(&client_config)?;
    let crawler = Crawler::new(client, config)?;

    println!(
        "{}",
        style(format!(
            "Limits → {} pages max | {}s delay",
            crawler.config().max_pages,
            crawler.config().rate_delay.as_secs_f64()
        ))
        .yellow()
    );

    tokio::select! {
        outcome = crawler.run() => {
            let summary = outcome?;
            println!("\n{}", style("🎉 FINISHED !").green().bold());
            println!(
                "Scraped {} page(s) in {:.1} s ({} visited, {} failed)",
                summary.pages_saved,
                summary.elapsed.as_secs_f64(),
                summary.visited,
                summary.failed
            );
            println!(
                "Files → {}\n",
                style(format!("{}/", crawler.config().output_dir.display())).blue()
            );
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", style("⏹ Stopped by user").red());
        }
    }

    Ok(())
}
