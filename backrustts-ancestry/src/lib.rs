//! The resumable ancestry-construction engine.
//!
//! Generates the genealogical history of a set of sampled genomes
//! backwards in time, under coalescent or discrete-generation models
//! with recombination, population structure, migration, and scheduled
//! demographic events.  A run is seeded either from samples at time
//! zero or from a **checkpoint**: a previously recorded, possibly
//! incomplete genealogy whose tables become an immutable prefix of
//! the output.
//!
//! Runs are single-threaded and deterministic per
//! `(seed, configuration, checkpoint)`.
//!
//! # Known limitation
//!
//! Resuming under a recombination map constructed independently of
//! the one that produced the checkpoint may snap breakpoints to
//! nearby loci.  When the map cannot keep two existing breakpoints
//! apart this is detected up front and reported as
//! [`SimulationError::RecombinationMapTooCoarse`]; when coordinates
//! merely fail to round-trip, the run proceeds best-effort and the
//! result may retain extra roots instead of coalescing fully.

mod checkpoint;
mod config;
mod coverage;
mod demography;
mod error;
mod merge;
mod model;
mod mutate;
mod segment;
mod simulator;
mod store;

pub use checkpoint::{root_intervals, RootInterval};
pub use config::{simulate, simulate_replicates, Replicates, Sample, SimulationConfig};
pub use demography::{DemographicEvent, PopulationConfiguration};
pub use error::{SimulationError, SimulationResult};
pub use model::Model;
