//! The event scheduler: draws waiting times under the active model,
//! dispatches events against the lineage store, and appends the
//! resulting rows to the output tables.

use std::collections::BTreeMap;

use backrustts_core::{Locus, PopulationId, Time};
use backrustts_genetics::RecombinationMap;
use backrustts_tables::TableCollection;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Exp1, Poisson};

use crate::checkpoint::InitialState;
use crate::coverage::AncestralCoverage;
use crate::demography::{DemographicEvent, EventQueue, PopulationRegistry};
use crate::error::{SimulationError, SimulationResult};
use crate::merge::{buffer_edge, flush_edges, merge_lineages, BufferedEdge};
use crate::model::{coalescent_waiting_time, Model};
use crate::segment::Lineage;
use crate::store::LineageStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SimulationState {
    Running,
    AtDemographicEvent,
    Complete,
}

/// A candidate stochastic event, in tie-break priority order.
#[derive(Clone, Copy, Debug, PartialEq)]
enum CandidateEvent {
    Coalescence { population: usize },
    Recombination,
    Migration,
}

pub(crate) struct Simulator<'a> {
    tables: &'a mut TableCollection,
    map: &'a RecombinationMap,
    store: LineageStore,
    coverage: AncestralCoverage,
    populations: PopulationRegistry,
    events: EventQueue,
    model: Model,
    rng: &'a mut StdRng,
    time: f64,
    max_time: Option<f64>,
    record_migrations: bool,
    state: SimulationState,
}

pub(crate) struct SimulatorOptions {
    pub model: Model,
    pub start_time: f64,
    pub max_time: Option<f64>,
    pub record_migrations: bool,
}

impl<'a> Simulator<'a> {
    pub fn new(
        tables: &'a mut TableCollection,
        map: &'a RecombinationMap,
        initial: InitialState,
        populations: PopulationRegistry,
        events: EventQueue,
        rng: &'a mut StdRng,
        options: SimulatorOptions,
    ) -> Self {
        let mut store = LineageStore::new(populations.num_populations());
        for lineage in initial.lineages {
            store.insert(lineage);
        }
        Self {
            tables,
            map,
            store,
            coverage: initial.coverage,
            populations,
            events,
            model: options.model,
            rng,
            time: options.start_time,
            max_time: options.max_time,
            record_migrations: options.record_migrations,
            state: SimulationState::Running,
        }
    }

    /// Run to full coalescence or the time cutoff.
    pub fn run(&mut self) -> SimulationResult<()> {
        while self.state != SimulationState::Complete {
            if self.store.num_live() == 0 {
                self.state = SimulationState::Complete;
                break;
            }
            match self.model {
                Model::Hudson => self.hudson_step()?,
                Model::DiscreteTimeWrightFisher => self.wf_step()?,
            }
        }
        Ok(())
    }

    /// One jump of the continuous-time model.
    fn hudson_step(&mut self) -> SimulationResult<()> {
        let num_populations = self.store.num_populations();
        let mut best: Option<(f64, CandidateEvent)> = None;

        for population in 0..num_populations {
            let k = self.store.lineage_count(population);
            if k >= 2 {
                let draw: f64 = self.rng.sample(Exp1);
                let size_now = self.populations.size_at(population, self.time);
                let growth = self.populations.growth_rate(population);
                if let Some(dt) = coalescent_waiting_time(k, size_now, growth, draw) {
                    if best.map_or(true, |(t, _)| dt < t) {
                        best = Some((dt, CandidateEvent::Coalescence { population }));
                    }
                }
            }
        }

        let links = self.store.total_links();
        let recombination_rate = self.map.per_locus_rate() * links as f64;
        if recombination_rate > 0.0 {
            let draw: f64 = self.rng.sample(Exp1);
            let dt = draw / recombination_rate;
            if best.map_or(true, |(t, _)| dt < t) {
                best = Some((dt, CandidateEvent::Recombination));
            }
        }

        let mut migration_rate = 0.0;
        for population in 0..num_populations {
            migration_rate += self.store.lineage_count(population) as f64
                * self.populations.total_emigration_rate(population);
        }
        if migration_rate > 0.0 {
            let draw: f64 = self.rng.sample(Exp1);
            let dt = draw / migration_rate;
            if best.map_or(true, |(t, _)| dt < t) {
                best = Some((dt, CandidateEvent::Migration));
            }
        }

        let candidate_time = best.map(|(dt, _)| self.time + dt);
        let demographic_time = self.events.peek_time().map(f64::from);
        let next_time = match (candidate_time, demographic_time) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return Err(SimulationError::InfiniteWaitingTime),
        };

        if let Some(max_time) = self.max_time {
            if next_time > max_time {
                self.time = max_time;
                self.flush_uncoalesced()?;
                self.state = SimulationState::Complete;
                return Ok(());
            }
        }

        // Demographic events win ties against stochastic candidates.
        if let Some(dt) = demographic_time {
            if dt <= next_time {
                self.state = SimulationState::AtDemographicEvent;
                self.time = self.time.max(dt);
                self.apply_due_events()?;
                self.state = SimulationState::Running;
                return Ok(());
            }
        }

        let (dt, event) = best.ok_or(SimulationError::InfiniteWaitingTime)?;
        self.time += dt;
        match event {
            CandidateEvent::Coalescence { population } => self.coalescence_event(population),
            CandidateEvent::Recombination => self.recombination_event(),
            CandidateEvent::Migration => self.migration_event(),
        }
    }

    /// Merge two uniformly chosen lineages of one population.
    fn coalescence_event(&mut self, population: usize) -> SimulationResult<()> {
        let k = self.store.lineage_count(population);
        let a = self.rng.gen_range(0..k);
        let mut b = self.rng.gen_range(0..k - 1);
        if b >= a {
            b += 1;
        }
        let lineage_a = self.store.remove(population, a.max(b));
        let lineage_b = self.store.remove(population, a.min(b));
        let outcome = merge_lineages(
            &[lineage_a, lineage_b],
            Time::from(self.time),
            PopulationId::from(population),
            self.tables,
            &mut self.coverage,
            self.map,
        )?;
        if let Some(lineage) = outcome.lineage {
            self.store.insert(lineage);
        }
        Ok(())
    }

    /// Split one lineage, chosen proportionally to its links, at a
    /// uniformly chosen internal locus boundary.
    fn recombination_event(&mut self) -> SimulationResult<()> {
        let links = self.store.total_links();
        let target = self.rng.gen_range(0..links);
        let (population, index, offset) = self.store.find_by_link(target);
        let lineage = self.store.remove(population, index);
        let (head_left, _) = lineage.span();
        let breakpoint = Locus::new_valid(i64::from(head_left) + 1 + offset);
        let (left_part, right_part) = lineage.split(breakpoint);
        self.store.insert(left_part);
        self.store.insert(right_part);
        Ok(())
    }

    /// Move one lineage between populations.
    fn migration_event(&mut self) -> SimulationResult<()> {
        let num_populations = self.store.num_populations();
        let mut total = 0.0;
        for population in 0..num_populations {
            total += self.store.lineage_count(population) as f64
                * self.populations.total_emigration_rate(population);
        }
        let mut u = self.rng.gen::<f64>() * total;
        let mut chosen: Option<(usize, usize)> = None;
        let mut last: Option<(usize, usize)> = None;
        'outer: for source in 0..num_populations {
            let k = self.store.lineage_count(source) as f64;
            if k == 0.0 {
                continue;
            }
            for dest in 0..num_populations {
                let rate = k * self.populations.migration_rate(source, dest);
                if rate <= 0.0 {
                    continue;
                }
                last = Some((source, dest));
                if u < rate {
                    chosen = Some((source, dest));
                    break 'outer;
                }
                u -= rate;
            }
        }
        let (source, dest) = chosen
            .or(last)
            .ok_or(SimulationError::InfiniteWaitingTime)?;

        let index = self.rng.gen_range(0..self.store.lineage_count(source));
        let mut lineage = self.store.remove(source, index);
        if self.record_migrations {
            let (left, right) = lineage.span();
            let phys_left = self.map.locus_to_physical(left);
            let phys_right = self.map.locus_to_physical(right);
            if phys_left < phys_right {
                self.tables.add_migration(
                    phys_left,
                    phys_right,
                    lineage.node,
                    PopulationId::from(source),
                    PopulationId::from(dest),
                    Time::from(self.time),
                )?;
            }
        }
        lineage.population = PopulationId::from(dest);
        self.store.insert(lineage);
        Ok(())
    }

    /// One generation of the discrete-time model: crossover splits,
    /// then uniform parent-slot sampling with k-way merges of slot
    /// mates.
    fn wf_step(&mut self) -> SimulationResult<()> {
        let generation_time = self.time.floor() + 1.0;

        if let Some(dt) = self.events.peek_time().map(f64::from) {
            if dt < generation_time {
                if let Some(max_time) = self.max_time {
                    if dt > max_time {
                        self.time = max_time;
                        self.flush_uncoalesced()?;
                        self.state = SimulationState::Complete;
                        return Ok(());
                    }
                }
                self.state = SimulationState::AtDemographicEvent;
                self.time = self.time.max(dt);
                self.apply_due_events()?;
                self.state = SimulationState::Running;
                return Ok(());
            }
        }
        if let Some(max_time) = self.max_time {
            if generation_time > max_time {
                self.time = max_time;
                self.flush_uncoalesced()?;
                self.state = SimulationState::Complete;
                return Ok(());
            }
        }

        let per_link = self.map.per_locus_rate();
        for population in 0..self.store.num_populations() {
            let lineages = self.store.take_population(population);
            if lineages.is_empty() {
                continue;
            }

            let mut recombined: Vec<Lineage> = vec![];
            for lineage in lineages {
                let mean = per_link * lineage.links() as f64;
                let crossovers = if mean > 0.0 {
                    let poisson = Poisson::new(mean)
                        .map_err(|_| SimulationError::InvalidRate { found: mean })?;
                    self.rng.sample(poisson) as u64
                } else {
                    0
                };
                if crossovers == 0 {
                    recombined.push(lineage);
                    continue;
                }
                let (head, tail) = lineage.span();
                let mut breakpoints: Vec<i64> = (0..crossovers)
                    .map(|_| self.rng.gen_range(i64::from(head) + 1..i64::from(tail)))
                    .collect();
                breakpoints.sort_unstable();
                breakpoints.dedup();
                let mut remainder = lineage;
                for bp in breakpoints {
                    let (span_left, span_right) = remainder.span();
                    // A crossover falling outside the remaining
                    // material separates nothing.
                    if bp <= i64::from(span_left) || bp >= i64::from(span_right) {
                        continue;
                    }
                    let (left_part, right_part) = remainder.split(Locus::new_valid(bp));
                    recombined.push(left_part);
                    remainder = right_part;
                }
                recombined.push(remainder);
            }

            let size = self
                .populations
                .size_at(population, generation_time)
                .round()
                .max(1.0) as u64;
            let mut families: BTreeMap<u64, Vec<Lineage>> = BTreeMap::new();
            for lineage in recombined {
                let slot = self.rng.gen_range(0..size);
                families.entry(slot).or_default().push(lineage);
            }
            for (_, mut family) in families {
                if family.len() == 1 {
                    self.store.insert(family.pop().unwrap());
                } else {
                    let outcome = merge_lineages(
                        &family,
                        Time::from(generation_time),
                        PopulationId::from(population),
                        self.tables,
                        &mut self.coverage,
                        self.map,
                    )?;
                    if let Some(lineage) = outcome.lineage {
                        self.store.insert(lineage);
                    }
                }
            }
        }
        self.time = generation_time;
        Ok(())
    }

    fn apply_due_events(&mut self) -> SimulationResult<()> {
        let due = self.events.advance_to(Time::from(self.time));
        for event in due {
            self.apply_event(&event)?;
        }
        Ok(())
    }

    /// Apply one demographic event at the current time.  Structural
    /// events mutate the store directly and emit any nodes and edges
    /// through the ordinary table-append path.
    fn apply_event(&mut self, event: &DemographicEvent) -> SimulationResult<()> {
        match event {
            DemographicEvent::ModelChange { model, .. } => {
                self.model = *model;
            }
            DemographicEvent::PopulationParametersChange {
                population,
                initial_size,
                growth_rate,
                ..
            } => {
                self.populations.change_parameters(
                    population.map(usize::from),
                    self.time,
                    *initial_size,
                    *growth_rate,
                )?;
            }
            DemographicEvent::MigrationRateChange {
                source, dest, rate, ..
            } => {
                self.populations
                    .set_migration_rate(usize::from(*source), usize::from(*dest), *rate)?;
            }
            DemographicEvent::MassMigration {
                source,
                dest,
                proportion,
                ..
            } => {
                let source_index = usize::from(*source);
                let mut index = 0;
                while index < self.store.lineage_count(source_index) {
                    if self.rng.gen::<f64>() < *proportion {
                        let mut lineage = self.store.remove(source_index, index);
                        lineage.population = *dest;
                        self.store.insert(lineage);
                    } else {
                        index += 1;
                    }
                }
            }
            DemographicEvent::Bottleneck {
                population,
                proportion,
                ..
            } => {
                let population_index = usize::from(*population);
                let mut participants = vec![];
                let mut index = 0;
                while index < self.store.lineage_count(population_index) {
                    if self.rng.gen::<f64>() < *proportion {
                        participants.push(self.store.remove(population_index, index));
                    } else {
                        index += 1;
                    }
                }
                if participants.len() >= 2 {
                    let outcome = merge_lineages(
                        &participants,
                        Time::from(self.time),
                        *population,
                        self.tables,
                        &mut self.coverage,
                        self.map,
                    )?;
                    if let Some(lineage) = outcome.lineage {
                        self.store.insert(lineage);
                    }
                } else if let Some(lineage) = participants.pop() {
                    self.store.insert(lineage);
                }
            }
        }
        Ok(())
    }

    /// Give every live lineage a root node at the cutoff time.
    ///
    /// Every root a time cutoff introduces therefore shares that exact
    /// time.  Segments whose node already sits at the cutoff are left
    /// alone; they are already roots at that time.
    fn flush_uncoalesced(&mut self) -> SimulationResult<()> {
        let cutoff = self.time;
        for population in 0..self.store.num_populations() {
            for lineage in self.store.take_population(population) {
                let mut buffer: Vec<BufferedEdge> = vec![];
                for seg in &lineage.segments {
                    if f64::from(self.tables.node(seg.node).time) < cutoff {
                        buffer_edge(
                            &mut buffer,
                            i64::from(seg.left),
                            i64::from(seg.right),
                            seg.node,
                        );
                    }
                }
                if !buffer.is_empty() {
                    let parent = self.tables.add_node(cutoff, lineage.population, 0)?;
                    flush_edges(&mut buffer, parent, self.tables, self.map)?;
                }
            }
        }
        self.store.clear();
        Ok(())
    }
}
