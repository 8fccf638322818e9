//! Shared plumbing for the sleuth binaries

use console::style;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Map a `-v` count to a log level, starting from `base`
pub fn log_level(base: Level, verbose: u8) -> Level {
    let levels = [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE];
    let start = levels.iter().position(|l| *l == base).unwrap_or(1);
    levels[(start + verbose as usize).min(levels.len() - 1)]
}

/// Install the global subscriber; `stderr` keeps stdout free for data output
pub fn init_tracing(level: Level, stderr: bool) {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    if stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

/// Boxed title line printed at start-up
pub fn print_banner(title: &str, subtitle: &str) {
    let width = title.chars().count().max(subtitle.chars().count()) + 4;
    let bar = "═".repeat(width);
    eprintln!("{}", style(format!("╔{}╗", bar)).blue().bold());
    eprintln!(
        "{}",
        style(format!("║  {:<w$}  ║", title, w = width - 4)).blue().bold()
    );
    eprintln!(
        "{}",
        style(format!("║  {:<w$}  ║", subtitle, w = width - 4)).blue()
    );
    eprintln!("{}\n", style(format!("╚{}╝", bar)).blue().bold());
}
