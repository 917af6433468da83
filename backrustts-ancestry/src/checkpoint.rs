//! Converting a partially resolved genealogy into initial engine state.

use std::collections::BTreeMap;

use backrustts_core::{Locus, NodeId, Position};
use backrustts_genetics::RecombinationMap;
use backrustts_tables::{NodeFlags, TableCollection};

use crate::coverage::AncestralCoverage;
use crate::error::{SimulationError, SimulationResult};
use crate::segment::{add_segment, Lineage, Segment};

/// A genomic interval together with the roots of its tree.
///
/// Produced by [`root_intervals`].  A tree with more than one root is
/// not fully coalesced over that interval.
#[derive(Clone, Debug, PartialEq)]
pub struct RootInterval {
    /// Left end of the interval
    pub left: Position,
    /// Right end of the interval
    pub right: Position,
    /// The roots, ascending; only nodes with sample material count.
    pub roots: Vec<NodeId>,
}

/// Sweep a table collection left to right and report, for every
/// maximal interval with a constant tree, the roots reached from the
/// sample nodes.
///
/// The caller is responsible for validating the collection first; the
/// walk assumes edges describe an acyclic, time-ordered topology.
pub fn root_intervals(tables: &TableCollection) -> Vec<RootInterval> {
    let samples: Vec<NodeId> = tables
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| node.flags & NodeFlags::IS_SAMPLE.bits() != 0)
        .map(|(i, _)| NodeId::from(i))
        .collect();
    if samples.is_empty() {
        return vec![];
    }

    let edges = tables.edges();
    let mut insertion: Vec<usize> = (0..edges.len()).collect();
    insertion.sort_by_key(|&i| edges[i].left);
    let mut removal: Vec<usize> = (0..edges.len()).collect();
    removal.sort_by_key(|&i| edges[i].right);

    let mut parent: Vec<NodeId> = vec![NodeId::NULL; tables.num_nodes()];
    let sequence_length = i64::from(tables.sequence_length());
    let mut result = vec![];
    let mut ins = 0_usize;
    let mut outs = 0_usize;
    let mut x: i64 = 0;

    while x < sequence_length {
        while outs < removal.len() && i64::from(edges[removal[outs]].right) == x {
            parent[usize::from(edges[removal[outs]].child)] = NodeId::NULL;
            outs += 1;
        }
        while ins < insertion.len() && i64::from(edges[insertion[ins]].left) == x {
            parent[usize::from(edges[insertion[ins]].child)] = edges[insertion[ins]].parent;
            ins += 1;
        }
        let mut next = sequence_length;
        if ins < insertion.len() {
            next = next.min(i64::from(edges[insertion[ins]].left));
        }
        if outs < removal.len() {
            next = next.min(i64::from(edges[removal[outs]].right));
        }

        let mut roots: Vec<NodeId> = vec![];
        for sample in &samples {
            let mut u = *sample;
            while !parent[usize::from(u)].is_null() {
                u = parent[usize::from(u)];
            }
            if !roots.contains(&u) {
                roots.push(u);
            }
        }
        roots.sort();

        result.push(RootInterval {
            left: Position::new_valid(x),
            right: Position::new_valid(next),
            roots,
        });
        x = next;
    }
    result
}

/// Distinct edge coordinates strictly inside the genome.
fn interior_breakpoints(tables: &TableCollection) -> Vec<Position> {
    let sequence_length = tables.sequence_length();
    let mut breakpoints: Vec<Position> = vec![];
    for edge in tables.edges() {
        for x in [edge.left, edge.right] {
            if x > 0 && x < sequence_length {
                breakpoints.push(x);
            }
        }
    }
    breakpoints.sort();
    breakpoints.dedup();
    breakpoints
}

/// The initial Lineage/Segment Store state derived from a checkpoint.
pub(crate) struct InitialState {
    pub lineages: Vec<Lineage>,
    pub coverage: AncestralCoverage,
}

/// Build the initial lineages from a (validated) checkpoint.
///
/// Every tree root over an interval whose tree still has two or more
/// roots becomes unresolved ancestral material of that root's
/// lineage; single-root intervals are already complete and contribute
/// nothing.  Breakpoints the map cannot keep distinct are a fatal
/// configuration error; breakpoints that merely snap to a nearby
/// locus proceed best-effort.
pub(crate) fn resolve_initial_state(
    tables: &TableCollection,
    map: &RecombinationMap,
) -> SimulationResult<InitialState> {
    if !map.can_represent(&interior_breakpoints(tables)) {
        return Err(SimulationError::RecombinationMapTooCoarse);
    }

    let mut coverage = AncestralCoverage::new(map.num_loci());
    let mut materials: BTreeMap<NodeId, Vec<Segment>> = BTreeMap::new();
    for interval in root_intervals(tables) {
        if interval.roots.len() < 2 {
            continue;
        }
        let left = i64::from(map.physical_to_locus(interval.left));
        let right = i64::from(map.physical_to_locus(interval.right));
        if left >= right {
            continue;
        }
        coverage.set(left, right, interval.roots.len() as u32);
        for root in &interval.roots {
            add_segment(
                materials.entry(*root).or_default(),
                Locus::new_valid(left),
                Locus::new_valid(right),
                *root,
            );
        }
    }

    let mut lineages = vec![];
    for (node, segments) in materials {
        let population = tables.node(node).population;
        if population.is_null() {
            return Err(SimulationError::NullLineagePopulation { node });
        }
        lineages.push(Lineage::new(segments, node, population));
    }
    Ok(InitialState { lineages, coverage })
}
