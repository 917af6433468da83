//! Run configuration and the public entry points.

use backrustts_core::{PopulationId, Position, Time};
use backrustts_genetics::RecombinationMap;
use backrustts_tables::{NodeFlags, TableCollection, TableValidationFlags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::checkpoint::resolve_initial_state;
use crate::demography::{
    DemographicEvent, EventQueue, PopulationConfiguration, PopulationRegistry,
};
use crate::error::{SimulationError, SimulationResult};
use crate::model::Model;
use crate::mutate::overlay_neutral_mutations;
use crate::simulator::{Simulator, SimulatorOptions};

/// A sampled genome, present in its population at time zero.
///
/// Samples taken at older times are expressed by supplying a
/// checkpoint instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// The population the sample is drawn from.
    pub population: PopulationId,
}

impl Sample {
    /// Create a new instance.
    pub fn new(population: PopulationId) -> Self {
        Self { population }
    }
}

/// Everything one run needs.
///
/// A run starts either from explicit `samples` or from a `checkpoint`
/// (a previously recorded, possibly incomplete genealogy); supplying
/// both is an error, as is supplying a `mutation_rate` together with a
/// checkpoint.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// A partially resolved genealogy to resume from.
    pub checkpoint: Option<TableCollection>,
    /// When the simulation starts.  Defaults to the checkpoint's
    /// newest node time, or zero for a from-scratch run.
    pub start_time: Option<Time>,
    /// The sample set for a from-scratch run.
    pub samples: Vec<Sample>,
    /// One entry per population.  Defaults to a single unit-size
    /// population.
    pub population_configurations: Vec<PopulationConfiguration>,
    /// Per-lineage migration rates; entry `[i][j]` moves lineages
    /// from population `i` to `j`.  Defaults to no migration.
    pub migration_matrix: Option<Vec<Vec<f64>>>,
    /// Genome length; must agree exactly with the map and checkpoint.
    pub sequence_length: Option<Position>,
    /// Shorthand for a uniform recombination map.
    pub recombination_rate: Option<f64>,
    /// An explicit recombination map.
    pub recombination_map: Option<RecombinationMap>,
    /// Scheduled structural changes.
    pub demographic_events: Vec<DemographicEvent>,
    /// The initial event-rate model.
    pub model: Model,
    /// Neutral mutation overlay rate (from-scratch runs only).
    pub mutation_rate: Option<f64>,
    /// Record migration rows for migration events.
    pub record_migrations: bool,
    /// Stop at this time, leaving unresolved lineages as same-time
    /// roots.
    pub max_time: Option<Time>,
    /// Seed for the pseudo-random generator.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            checkpoint: None,
            start_time: None,
            samples: vec![],
            population_configurations: vec![],
            migration_matrix: None,
            sequence_length: None,
            recombination_rate: None,
            recombination_map: None,
            demographic_events: vec![],
            model: Model::Hudson,
            mutation_rate: None,
            record_migrations: false,
            max_time: None,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// A single-population configuration with `num_samples` samples.
    pub fn with_sample_size(num_samples: usize) -> Self {
        Self {
            samples: vec![Sample::new(PopulationId::from(0)); num_samples],
            population_configurations: vec![PopulationConfiguration::default()],
            ..Self::default()
        }
    }
}

/// Run one simulation to completion and return the output tables.
///
/// When a checkpoint was supplied, its rows form an immutable prefix
/// of the output: truncating the output tables back to the
/// checkpoint's lengths reproduces the checkpoint exactly, and sites
/// and mutations are carried over unchanged in full.
pub fn simulate(config: &SimulationConfig) -> SimulationResult<TableCollection> {
    run_one(config, config.seed)
}

/// Lazily produce `num_replicates` independent completed results.
///
/// Each replicate re-derives its initial state from the immutable
/// configuration and checkpoint, with its own seed drawn
/// deterministically from `config.seed`.
pub fn simulate_replicates(config: &SimulationConfig, num_replicates: usize) -> Replicates<'_> {
    Replicates {
        config,
        seed_rng: StdRng::seed_from_u64(config.seed),
        remaining: num_replicates,
    }
}

/// Iterator over independent replicate results.
pub struct Replicates<'a> {
    config: &'a SimulationConfig,
    seed_rng: StdRng,
    remaining: usize,
}

impl Iterator for Replicates<'_> {
    type Item = SimulationResult<TableCollection>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let seed = self.seed_rng.gen::<u64>();
        Some(run_one(self.config, seed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

fn resolve_map(config: &SimulationConfig) -> SimulationResult<RecombinationMap> {
    match (&config.recombination_map, config.recombination_rate) {
        (Some(_), Some(_)) => Err(SimulationError::RateAndMapBothSupplied),
        (Some(map), None) => Ok(map.clone()),
        (None, rate) => {
            let rate = rate.unwrap_or(0.0);
            if !rate.is_finite() || rate < 0.0 {
                return Err(SimulationError::InvalidRate { found: rate });
            }
            let length = config
                .sequence_length
                .or_else(|| config.checkpoint.as_ref().map(|t| t.sequence_length()))
                .unwrap_or_else(|| Position::new_valid(1));
            Ok(RecombinationMap::uniform(i64::from(length), rate)?)
        }
    }
}

fn run_one(config: &SimulationConfig, seed: u64) -> SimulationResult<TableCollection> {
    let map = resolve_map(config)?;
    let sequence_length = map.sequence_length();
    if let Some(length) = config.sequence_length {
        if length != sequence_length {
            return Err(SimulationError::SequenceLengthMismatch {
                found: length,
                expected: sequence_length,
            });
        }
    }

    let mut population_configurations = config.population_configurations.clone();
    if population_configurations.is_empty() {
        population_configurations.push(PopulationConfiguration::default());
    }

    let (mut tables, start_time, from_checkpoint) = match &config.checkpoint {
        Some(checkpoint) => {
            if !config.samples.is_empty() {
                return Err(SimulationError::SamplesWithCheckpoint);
            }
            if config.mutation_rate.is_some() {
                return Err(SimulationError::MutationRateWithCheckpoint);
            }
            if checkpoint.sequence_length() != sequence_length {
                return Err(SimulationError::SequenceLengthMismatch {
                    found: checkpoint.sequence_length(),
                    expected: sequence_length,
                });
            }
            checkpoint.validate(TableValidationFlags::default())?;
            let newest = checkpoint.max_node_time().unwrap_or_else(|| Time::from(0.0));
            let start_time = config.start_time.unwrap_or(newest);
            if !start_time.is_finite() || start_time < 0.0 {
                return Err(SimulationError::InvalidStartTime { found: start_time });
            }
            if start_time < newest {
                return Err(SimulationError::StartTimeBeforeCheckpoint {
                    start_time,
                    node_time: newest,
                });
            }
            (checkpoint.clone(), f64::from(start_time), true)
        }
        None => {
            if config.samples.is_empty() {
                return Err(SimulationError::NoSamples);
            }
            let start_time = config.start_time.unwrap_or_else(|| Time::from(0.0));
            if !start_time.is_finite() || start_time < 0.0 {
                return Err(SimulationError::InvalidStartTime { found: start_time });
            }
            let mut tables = TableCollection::new(sequence_length)?;
            for _ in &population_configurations {
                tables.add_population(None)?;
            }
            for sample in &config.samples {
                if sample.population.is_null()
                    || usize::from(sample.population) >= population_configurations.len()
                {
                    return Err(SimulationError::InvalidSamplePopulation {
                        population: sample.population,
                    });
                }
                tables.add_node(0.0, sample.population, NodeFlags::IS_SAMPLE.bits())?;
            }
            (tables, f64::from(start_time), false)
        }
    };

    let max_time = match config.max_time {
        Some(t) => {
            if !t.is_finite() || f64::from(t) < start_time {
                return Err(SimulationError::InvalidStartTime { found: t });
            }
            Some(f64::from(t))
        }
        None => None,
    };

    let initial = resolve_initial_state(&tables, &map)?;

    if from_checkpoint && !initial.lineages.is_empty() {
        let mut referenced: Vec<PopulationId> =
            initial.lineages.iter().map(|l| l.population).collect();
        referenced.sort();
        referenced.dedup();
        if referenced.len() != population_configurations.len() {
            return Err(SimulationError::PopulationCountMismatch {
                found: population_configurations.len(),
                expected: referenced.len(),
            });
        }
        // Referenced ids must be able to index the registry.
        if let Some(max) = referenced.last() {
            if usize::from(*max) >= population_configurations.len() {
                return Err(SimulationError::PopulationCountMismatch {
                    found: population_configurations.len(),
                    expected: usize::from(*max) + 1,
                });
            }
        }
    }

    let mut registry = PopulationRegistry::new(&population_configurations, start_time)?;
    if let Some(matrix) = &config.migration_matrix {
        registry.set_migration_matrix(matrix)?;
    }
    let events = EventQueue::new(&config.demographic_events)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let options = SimulatorOptions {
        model: config.model,
        start_time,
        max_time,
        record_migrations: config.record_migrations,
    };
    Simulator::new(&mut tables, &map, initial, registry, events, &mut rng, options).run()?;

    if let Some(rate) = config.mutation_rate {
        overlay_neutral_mutations(&mut tables, rate, &mut rng)?;
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default();
    let record = format!(
        "{{\"software\":\"backrustts\",\"version\":\"{}\",\"seed\":{}}}",
        env!("CARGO_PKG_VERSION"),
        seed
    );
    tables.add_provenance(timestamp, record);
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sample_size() {
        let config = SimulationConfig::with_sample_size(5);
        assert_eq!(config.samples.len(), 5);
        assert_eq!(config.population_configurations.len(), 1);
    }

    #[test]
    fn test_no_samples_rejected() {
        let config = SimulationConfig::default();
        assert_eq!(simulate(&config).err(), Some(SimulationError::NoSamples));
    }

    #[test]
    fn test_rate_and_map_conflict() {
        let mut config = SimulationConfig::with_sample_size(2);
        config.recombination_rate = Some(1.0);
        config.recombination_map = Some(RecombinationMap::uniform(10, 1.0).unwrap());
        assert_eq!(
            simulate(&config).err(),
            Some(SimulationError::RateAndMapBothSupplied)
        );
    }

    #[test]
    fn test_replicates_are_lazy_and_finite() {
        let config = SimulationConfig::with_sample_size(2);
        let replicates = simulate_replicates(&config, 3);
        assert_eq!(replicates.size_hint(), (3, Some(3)));
        assert_eq!(replicates.count(), 3);
    }
}
