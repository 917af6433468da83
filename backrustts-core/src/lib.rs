#![warn(missing_docs)]

//! Core newtypes shared by the `backrustts` workspace.
//!
//! Genomic coordinates come in two flavors that must never be mixed
//! silently: [`Position`] is a physical coordinate on the genome, and
//! [`Locus`] is a discretized recombination-map coordinate.
//! [`Time`] is measured backwards from the present.

use thiserror::Error;

#[macro_use]
mod macros;
mod ids;
mod locus;
mod position;
pub mod prelude;
mod time;

pub use ids::{IndividualId, MigrationId, MutationId, NodeId, PopulationId, SiteId};
pub use locus::Locus;
pub use position::Position;
pub use time::Time;

/// Error type for newtype construction.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// A negative physical position.
    #[error("{0:?}")]
    PositionError(i64),
    /// A negative locus.
    #[error("{0:?}")]
    LocusError(i64),
}
