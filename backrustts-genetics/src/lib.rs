//! Recombination maps.
//!
//! A [`RecombinationMap`] is a piecewise-constant genetic-rate function
//! over physical genome coordinates.  Internally, simulation engines
//! place crossover breakpoints in a discretized coordinate system of
//! [`Locus`](backrustts_core::Locus) values; the map translates between
//! the two systems.
//!
//! Translation is exact for breakpoints generated under the map itself.
//! Two *independently constructed* maps over the same genome are not
//! guaranteed to be mutually invertible: remapping a coordinate written
//! under a finer map through a coarser one may snap it to a nearby
//! locus.  Callers that must represent an existing set of breakpoints
//! should check [`RecombinationMap::can_represent`] up front.

mod recombination_map;

pub use recombination_map::GeneticsError;
pub use recombination_map::RecombinationMap;
