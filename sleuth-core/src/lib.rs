//! Sleuth Core - Site registry, existence heuristics and report types
//!
//! This crate holds everything that does not touch the network:
//! - Declarative site descriptors, validated once into a registry
//! - The existence classification heuristic shared by both probers
//! - Probe results and the aggregate JSON report

pub mod sites;
pub mod heuristics;
pub mod report;

pub use sites::*;
pub use heuristics::*;
pub use report::*;
