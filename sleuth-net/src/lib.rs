//! Sleuth network layer
//!
//! Everything that talks HTTP:
//! - Client construction with optional SOCKS5h/Tor or HTTP proxy
//! - Visible-text and same-origin link extraction
//! - The concurrent username/email prober
//! - The sequential HEAD/GET hunter
//! - The breadth-first same-origin crawler

pub mod client;
pub mod extract;
pub mod probe;
pub mod hunt;
pub mod crawl;

pub use client::*;
pub use extract::*;
pub use probe::*;
pub use hunt::*;
pub use crawl::*;
