use backrustts_core::{NodeId, PopulationId, Position, Time};
use thiserror::Error;

/// Primary error type of the simulation engine.
///
/// Every variant except the redirections is a configuration error:
/// it is raised synchronously, before any simulation state exists,
/// and is deterministic for a given input.
#[derive(Error, Debug, PartialEq)]
pub enum SimulationError {
    /// A redirection of a [``backrustts_tables::TablesError``].
    ///
    /// Raised when the storage layer rejects a malformed input
    /// collection; the underlying error is reported verbatim.
    #[error("{value:?}")]
    TablesError {
        /// The redirected error
        #[from]
        value: backrustts_tables::TablesError,
    },
    /// A redirection of a [``backrustts_genetics::GeneticsError``].
    #[error("{value:?}")]
    GeneticsError {
        /// The redirected error
        #[from]
        value: backrustts_genetics::GeneticsError,
    },
    /// Neither samples nor a checkpoint were supplied.
    #[error("no samples and no checkpoint were supplied")]
    NoSamples,
    /// A checkpoint fully determines the sample set.
    #[error("explicit samples may not be combined with a checkpoint")]
    SamplesWithCheckpoint,
    /// Sites and mutations in a checkpoint must pass through unchanged.
    #[error("a mutation rate may not be combined with a checkpoint")]
    MutationRateWithCheckpoint,
    /// `start_time` must not precede the checkpoint's newest node.
    #[error("start_time {start_time:?} precedes latest checkpoint node time {node_time:?}")]
    StartTimeBeforeCheckpoint {
        /// The requested start time
        start_time: Time,
        /// The newest node time in the checkpoint
        node_time: Time,
    },
    /// Start times must be finite and non-negative.
    #[error("invalid start time: {found:?}")]
    InvalidStartTime {
        /// The invalid time
        found: Time,
    },
    /// Sequence lengths of the map, the configuration, and any
    /// checkpoint must agree exactly.
    #[error("sequence length {found:?} does not match {expected:?}")]
    SequenceLengthMismatch {
        /// The conflicting length
        found: Position,
        /// The length implied by the rest of the configuration
        expected: Position,
    },
    /// Exactly one of a recombination rate and an explicit map may be
    /// supplied.
    #[error("recombination rate and recombination map are mutually exclusive")]
    RateAndMapBothSupplied,
    /// The number of configured populations must match the number of
    /// populations the initial lineages reference.
    #[error("{found} population configurations supplied, {expected} required")]
    PopulationCountMismatch {
        /// The number of configurations supplied
        found: usize,
        /// The number required by the initial lineage set
        expected: usize,
    },
    /// An initial lineage cannot be placed without a population.
    #[error("initial lineage for node {node:?} has no population")]
    NullLineagePopulation {
        /// The node owning the lineage
        node: NodeId,
    },
    /// The migration matrix must be square, zero on the diagonal, and
    /// finite and non-negative elsewhere.
    #[error("invalid migration matrix")]
    InvalidMigrationMatrix,
    /// Population sizes must be positive and finite.
    #[error("invalid parameters for population {population:?}")]
    InvalidPopulationParameters {
        /// The offending population
        population: PopulationId,
    },
    /// Demographic event times must be finite and non-negative, and
    /// event parameters must be valid.
    #[error("invalid demographic event")]
    InvalidDemographicEvent,
    /// The recombination map cannot separate breakpoints already
    /// present in the checkpoint.
    #[error("the recombination map is too coarse to represent the checkpoint's breakpoints")]
    RecombinationMapTooCoarse,
    /// A sample references a population that is not configured.
    #[error("invalid sample population: {population:?}")]
    InvalidSamplePopulation {
        /// The offending population
        population: PopulationId,
    },
    /// A rate parameter must be finite and non-negative.
    #[error("invalid rate: {found:?}")]
    InvalidRate {
        /// The invalid rate
        found: f64,
    },
    /// Live lineages remain but no event can ever occur.
    #[error("infinite waiting time until next event")]
    InfiniteWaitingTime,
}

/// Result type for simulation operations.
pub type SimulationResult<T> = std::result::Result<T, SimulationError>;
