//! Populations, migration rates, and scheduled demographic events.

use backrustts_core::{PopulationId, Time};

use crate::error::{SimulationError, SimulationResult};
use crate::model::Model;

/// Size and growth parameters for one population.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationConfiguration {
    /// Population size at the simulation start time.
    pub initial_size: f64,
    /// Forward-time exponential growth rate; going backwards, a
    /// positive rate shrinks the population.
    pub growth_rate: f64,
}

impl PopulationConfiguration {
    /// Create a new instance.
    pub fn new(initial_size: f64, growth_rate: f64) -> Self {
        Self {
            initial_size,
            growth_rate,
        }
    }
}

impl Default for PopulationConfiguration {
    fn default() -> Self {
        Self {
            initial_size: 1.0,
            growth_rate: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PopulationState {
    initial_size: f64,
    growth_rate: f64,
    last_change_time: f64,
}

impl PopulationState {
    fn size_at(&self, time: f64) -> f64 {
        if self.growth_rate == 0.0 {
            self.initial_size
        } else {
            self.initial_size * (-self.growth_rate * (time - self.last_change_time)).exp()
        }
    }
}

/// Per-population parameters plus the migration-rate matrix.
#[derive(Clone, Debug)]
pub(crate) struct PopulationRegistry {
    states: Vec<PopulationState>,
    migration: Vec<f64>,
}

impl PopulationRegistry {
    pub fn new(
        configurations: &[PopulationConfiguration],
        start_time: f64,
    ) -> SimulationResult<Self> {
        let mut states = vec![];
        for (i, config) in configurations.iter().enumerate() {
            if !config.initial_size.is_finite()
                || config.initial_size <= 0.0
                || !config.growth_rate.is_finite()
            {
                return Err(SimulationError::InvalidPopulationParameters {
                    population: PopulationId::from(i),
                });
            }
            states.push(PopulationState {
                initial_size: config.initial_size,
                growth_rate: config.growth_rate,
                last_change_time: start_time,
            });
        }
        let n = states.len();
        Ok(Self {
            states,
            migration: vec![0.0; n * n],
        })
    }

    pub fn num_populations(&self) -> usize {
        self.states.len()
    }

    pub fn size_at(&self, population: usize, time: f64) -> f64 {
        self.states[population].size_at(time)
    }

    pub fn growth_rate(&self, population: usize) -> f64 {
        self.states[population].growth_rate
    }

    pub fn migration_rate(&self, source: usize, dest: usize) -> f64 {
        self.migration[source * self.states.len() + dest]
    }

    pub fn set_migration_rate(
        &mut self,
        source: usize,
        dest: usize,
        rate: f64,
    ) -> SimulationResult<()> {
        if source == dest || !rate.is_finite() || rate < 0.0 {
            return Err(SimulationError::InvalidMigrationMatrix);
        }
        let n = self.states.len();
        self.migration[source * n + dest] = rate;
        Ok(())
    }

    pub fn set_migration_matrix(&mut self, matrix: &[Vec<f64>]) -> SimulationResult<()> {
        let n = self.states.len();
        if matrix.len() != n {
            return Err(SimulationError::InvalidMigrationMatrix);
        }
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(SimulationError::InvalidMigrationMatrix);
            }
            for (j, rate) in row.iter().enumerate() {
                if !rate.is_finite() || *rate < 0.0 {
                    return Err(SimulationError::InvalidMigrationMatrix);
                }
                if i == j && *rate != 0.0 {
                    return Err(SimulationError::InvalidMigrationMatrix);
                }
            }
        }
        for i in 0..n {
            for j in 0..n {
                self.migration[i * n + j] = matrix[i][j];
            }
        }
        Ok(())
    }

    /// Total per-lineage rate of leaving `source`.
    pub fn total_emigration_rate(&self, source: usize) -> f64 {
        let n = self.states.len();
        (0..n).map(|j| self.migration[source * n + j]).sum()
    }

    /// Apply a population-parameter change at `time`.
    ///
    /// When the size is left unchanged, the current size at `time` is
    /// frozen as the new initial size so that a growth-rate change
    /// does not teleport the population size.
    pub fn change_parameters(
        &mut self,
        population: Option<usize>,
        time: f64,
        initial_size: Option<f64>,
        growth_rate: Option<f64>,
    ) -> SimulationResult<()> {
        let targets: Vec<usize> = match population {
            Some(p) => vec![p],
            None => (0..self.states.len()).collect(),
        };
        for p in targets {
            let state = &mut self.states[p];
            let new_size = match initial_size {
                Some(size) => size,
                None => state.size_at(time),
            };
            if !new_size.is_finite() || new_size <= 0.0 {
                return Err(SimulationError::InvalidPopulationParameters {
                    population: PopulationId::from(p),
                });
            }
            state.initial_size = new_size;
            if let Some(rate) = growth_rate {
                state.growth_rate = rate;
            }
            state.last_change_time = time;
        }
        Ok(())
    }
}

/// A scheduled structural change, applied as simulated time crosses
/// its scheduled time.
#[derive(Clone, Debug, PartialEq)]
pub enum DemographicEvent {
    /// Swap the active event-rate model.
    ModelChange {
        /// When to apply
        time: Time,
        /// The model to switch to
        model: Model,
    },
    /// Move each lineage of `source` to `dest` with probability
    /// `proportion`.
    MassMigration {
        /// When to apply
        time: Time,
        /// Population moved from
        source: PopulationId,
        /// Population moved to
        dest: PopulationId,
        /// Per-lineage probability of moving
        proportion: f64,
    },
    /// Instantaneous coalescent collapse: each lineage of `population`
    /// joins a synchronous merge with probability `proportion`.
    Bottleneck {
        /// When to apply
        time: Time,
        /// The affected population
        population: PopulationId,
        /// Per-lineage participation probability
        proportion: f64,
    },
    /// Change size and/or growth rate of one or all populations.
    PopulationParametersChange {
        /// When to apply
        time: Time,
        /// The affected population, or all when `None`
        population: Option<PopulationId>,
        /// New size, if any
        initial_size: Option<f64>,
        /// New growth rate, if any
        growth_rate: Option<f64>,
    },
    /// Change one entry of the migration-rate matrix.
    MigrationRateChange {
        /// When to apply
        time: Time,
        /// Source population
        source: PopulationId,
        /// Destination population
        dest: PopulationId,
        /// The new rate
        rate: f64,
    },
}

impl DemographicEvent {
    /// The scheduled time.
    pub fn time(&self) -> Time {
        match self {
            DemographicEvent::ModelChange { time, .. } => *time,
            DemographicEvent::MassMigration { time, .. } => *time,
            DemographicEvent::Bottleneck { time, .. } => *time,
            DemographicEvent::PopulationParametersChange { time, .. } => *time,
            DemographicEvent::MigrationRateChange { time, .. } => *time,
        }
    }

    fn validate(&self) -> SimulationResult<()> {
        let time = f64::from(self.time());
        if !time.is_finite() || time < 0.0 {
            return Err(SimulationError::InvalidDemographicEvent);
        }
        match self {
            DemographicEvent::MassMigration { proportion, .. }
            | DemographicEvent::Bottleneck { proportion, .. } => {
                if !proportion.is_finite() || !(0.0..=1.0).contains(proportion) {
                    return Err(SimulationError::InvalidDemographicEvent);
                }
            }
            DemographicEvent::MigrationRateChange { source, dest, rate, .. } => {
                if source == dest || !rate.is_finite() || *rate < 0.0 {
                    return Err(SimulationError::InvalidDemographicEvent);
                }
            }
            _ => (),
        }
        Ok(())
    }
}

/// Pending demographic events, sorted by time with ties in
/// declaration order.
#[derive(Clone, Debug)]
pub(crate) struct EventQueue {
    events: Vec<DemographicEvent>,
    next: usize,
}

impl EventQueue {
    pub fn new(events: &[DemographicEvent]) -> SimulationResult<Self> {
        for event in events {
            event.validate()?;
        }
        let mut events = events.to_vec();
        // Stable sort keeps declaration order for equal times.
        events.sort_by(|a, b| a.time().partial_cmp(&b.time()).unwrap());
        Ok(Self { events, next: 0 })
    }

    /// Time of the next pending event.
    pub fn peek_time(&self) -> Option<Time> {
        self.events.get(self.next).map(|e| e.time())
    }

    /// Pop and return every event whose time is <= `time`, in order.
    pub fn advance_to(&mut self, time: Time) -> Vec<DemographicEvent> {
        let start = self.next;
        while self.next < self.events.len() && self.events[self.next].time() <= time {
            self.next += 1;
        }
        self.events[start..self.next].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_law() {
        let registry = PopulationRegistry::new(
            &[PopulationConfiguration::new(100.0, 0.05)],
            0.0,
        )
        .unwrap();
        assert_eq!(registry.size_at(0, 0.0), 100.0);
        let shrunk = registry.size_at(0, 10.0);
        assert!((shrunk - 100.0 * (-0.5_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_parameter_change_freezes_size() {
        let mut registry = PopulationRegistry::new(
            &[PopulationConfiguration::new(100.0, 0.05)],
            0.0,
        )
        .unwrap();
        let at_change = registry.size_at(0, 10.0);
        registry.change_parameters(Some(0), 10.0, None, Some(0.0)).unwrap();
        assert!((registry.size_at(0, 50.0) - at_change).abs() < 1e-9);
    }

    #[test]
    fn test_migration_matrix_validation() {
        let mut registry = PopulationRegistry::new(
            &[
                PopulationConfiguration::default(),
                PopulationConfiguration::default(),
            ],
            0.0,
        )
        .unwrap();
        assert_eq!(
            registry.set_migration_matrix(&[vec![0.0, 1.0]]),
            Err(SimulationError::InvalidMigrationMatrix)
        );
        assert_eq!(
            registry.set_migration_matrix(&[vec![1.0, 1.0], vec![1.0, 0.0]]),
            Err(SimulationError::InvalidMigrationMatrix)
        );
        registry
            .set_migration_matrix(&[vec![0.0, 2.0], vec![0.5, 0.0]])
            .unwrap();
        assert_eq!(registry.migration_rate(0, 1), 2.0);
        assert_eq!(registry.total_emigration_rate(1), 0.5);
    }

    #[test]
    fn test_queue_orders_ties_by_declaration() {
        let events = vec![
            DemographicEvent::MigrationRateChange {
                time: Time::from(2.0),
                source: PopulationId::from(0),
                dest: PopulationId::from(1),
                rate: 1.0,
            },
            DemographicEvent::MassMigration {
                time: Time::from(1.0),
                source: PopulationId::from(0),
                dest: PopulationId::from(1),
                proportion: 1.0,
            },
            DemographicEvent::Bottleneck {
                time: Time::from(1.0),
                population: PopulationId::from(1),
                proportion: 1.0,
            },
        ];
        let mut queue = EventQueue::new(&events).unwrap();
        assert_eq!(queue.peek_time(), Some(Time::from(1.0)));
        let due = queue.advance_to(Time::from(1.0));
        assert_eq!(due.len(), 2);
        assert!(matches!(due[0], DemographicEvent::MassMigration { .. }));
        assert!(matches!(due[1], DemographicEvent::Bottleneck { .. }));
        let due = queue.advance_to(Time::from(10.0));
        assert_eq!(due.len(), 1);
        assert_eq!(queue.advance_to(Time::from(100.0)).len(), 0);
    }

    #[test]
    fn test_event_validation() {
        assert_eq!(
            EventQueue::new(&[DemographicEvent::Bottleneck {
                time: Time::from(-1.0),
                population: PopulationId::from(0),
                proportion: 0.5,
            }])
            .err(),
            Some(SimulationError::InvalidDemographicEvent)
        );
        assert_eq!(
            EventQueue::new(&[DemographicEvent::MassMigration {
                time: Time::from(1.0),
                source: PopulationId::from(0),
                dest: PopulationId::from(1),
                proportion: 1.5,
            }])
            .err(),
            Some(SimulationError::InvalidDemographicEvent)
        );
    }
}
