/// The active event-rate model.
///
/// The model is swapped at run time by
/// [`DemographicEvent::ModelChange`](crate::DemographicEvent::ModelChange)
/// without discarding lineage state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
    /// The continuous-time coalescent: competing exponential waiting
    /// times for coalescence, recombination, and migration.
    Hudson,
    /// Discrete generations: one-generation steps with uniform parent
    /// sampling within each population and per-generation crossover
    /// draws.
    DiscreteTimeWrightFisher,
}

impl Default for Model {
    fn default() -> Self {
        Model::Hudson
    }
}

/// Waiting time until the next common-ancestor event among
/// `num_lineages` lineages in a population of size `size_now`
/// shrinking into the past at `growth_rate`.
///
/// `exp_draw` is a standard exponential deviate.  Returns `None` when
/// no coalescence can ever happen (fewer than two lineages, or a
/// population growing into the past faster than the pair rate).
pub(crate) fn coalescent_waiting_time(
    num_lineages: usize,
    size_now: f64,
    growth_rate: f64,
    exp_draw: f64,
) -> Option<f64> {
    if num_lineages < 2 {
        return None;
    }
    let pairs = (num_lineages * (num_lineages - 1)) as f64 / 2.0;
    let u = exp_draw / pairs;
    if growth_rate == 0.0 {
        Some(size_now * u)
    } else {
        let arg = 1.0 + growth_rate * size_now * u;
        if arg <= 0.0 {
            None
        } else {
            Some(arg.ln() / growth_rate)
        }
    }
}
