//! Neutral infinite-sites mutation overlay.
//!
//! Applied after the ancestry completes, never when resuming from a
//! checkpoint: resumed runs must leave the checkpoint's sites and
//! mutations untouched.

use backrustts_core::{NodeId, Position, Time};
use backrustts_tables::TableCollection;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Poisson;

use crate::error::{SimulationError, SimulationResult};

/// Drop Poisson-distributed mutations on every edge.
///
/// Each edge receives mutations at `rate` per base per time unit over
/// its physical span and branch length.  One mutation per site
/// (infinite sites over a discrete genome: colliding positions are
/// dropped).
pub(crate) fn overlay_neutral_mutations(
    tables: &mut TableCollection,
    rate: f64,
    rng: &mut StdRng,
) -> SimulationResult<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(SimulationError::InvalidRate { found: rate });
    }
    if rate == 0.0 {
        return Ok(());
    }

    let mut placed: Vec<(Position, NodeId, Time)> = vec![];
    for i in 0..tables.num_edges() {
        let edge = *tables.edge(i);
        let child_time = f64::from(tables.node(edge.child).time);
        let parent_time = f64::from(tables.node(edge.parent).time);
        let span = (i64::from(edge.right) - i64::from(edge.left)) as f64;
        let mean = rate * span * (parent_time - child_time);
        if mean <= 0.0 {
            continue;
        }
        let poisson =
            Poisson::new(mean).map_err(|_| SimulationError::InvalidRate { found: mean })?;
        let count = rng.sample(poisson) as u64;
        for _ in 0..count {
            let position = rng.gen_range(i64::from(edge.left)..i64::from(edge.right));
            let time = rng.gen_range(child_time..parent_time);
            placed.push((Position::new_valid(position), edge.child, Time::from(time)));
        }
    }

    placed.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    let mut last_position: Option<Position> = None;
    for (position, node, time) in placed {
        if last_position == Some(position) {
            continue;
        }
        last_position = Some(position);
        let site = tables.add_site(position, Some(b"0".to_vec()))?;
        tables.add_mutation(site, node, time, Some(b"1".to_vec()))?;
    }
    Ok(())
}
