#![warn(missing_docs)]

//! Rust library for backward-time (coalescent) population
//! genetic simulation with tree sequence recording.
//!
//! # Overview
//!
//! The engine evolves a set of sampled genomes backwards in time,
//! firing coalescence, recombination, migration, and demographic
//! events until every genomic position has a single most recent
//! common ancestor (or an optional time cutoff is reached).  A run
//! may start from scratch or resume from a previously recorded,
//! partially resolved genealogy; see
//! [`SimulationConfig`] and [`simulate`].
//!
//! Currently, this should be viewed as **experimental**.

pub use backrustts_ancestry::*;
pub use backrustts_core::*;
pub use backrustts_genetics::*;
pub use backrustts_tables::*;

/// Get the backrustts version number.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
