//! Merging lineages into a common ancestor.

use backrustts_core::{Locus, NodeId, PopulationId, Time};
use backrustts_genetics::RecombinationMap;
use backrustts_tables::TableCollection;

use crate::coverage::AncestralCoverage;
use crate::error::SimulationResult;
use crate::segment::{add_segment, Lineage, Segment};

/// An edge buffered during one merge, in locus coordinates.
pub(crate) type BufferedEdge = (i64, i64, NodeId);

/// Extend an existing buffered edge for `child` when contiguous,
/// otherwise start a new one.
pub(crate) fn buffer_edge(buffer: &mut Vec<BufferedEdge>, left: i64, right: i64, child: NodeId) {
    let i = buffer.iter().rposition(|e| e.2 == child);

    match i {
        None => buffer.push((left, right, child)),
        Some(x) => {
            if buffer[x].1 == left {
                buffer[x].1 = right;
            } else {
                buffer.push((left, right, child));
            }
        }
    }
}

/// Append buffered edges to the tables, sorted by child then left.
///
/// Zero-length physical intervals are skipped: they arise only when
/// the recombination map cannot faithfully represent a locus interval,
/// and dropping them is the documented best-effort degradation.
pub(crate) fn flush_edges(
    buffer: &mut Vec<BufferedEdge>,
    parent: NodeId,
    tables: &mut TableCollection,
    map: &RecombinationMap,
) -> SimulationResult<()> {
    buffer.sort_by(|a, b| (a.2, a.0).cmp(&(b.2, b.0)));
    for (left, right, child) in buffer.iter() {
        let phys_left = map.locus_to_physical(Locus::new_valid(*left));
        let phys_right = map.locus_to_physical(Locus::new_valid(*right));
        if phys_left < phys_right {
            tables.add_edge(phys_left, phys_right, parent, *child)?;
        }
    }
    Ok(())
}

/// The result of merging a set of lineages.
pub(crate) struct MergeOutcome {
    /// The surviving merged lineage, unless every piece of material
    /// fully coalesced.
    pub lineage: Option<Lineage>,
    /// The ancestor node, when overlapping material required one.
    pub new_node: Option<NodeId>,
}

/// Merge the ancestral material of `ancestors` at `time` in
/// `population`.
///
/// Sweeps the combined segments left to right.  Material covered by a
/// single input lineage passes through unchanged.  Where k > 1 inputs
/// overlap, one ancestor node is created (at most one per merge) and
/// an edge is emitted from it to each contributing node over the
/// overlap; the overlap continues as material of the new node unless
/// the live-segment count there equals k, in which case the region has
/// fully coalesced and is retired.
pub(crate) fn merge_lineages(
    ancestors: &[Lineage],
    time: Time,
    population: PopulationId,
    tables: &mut TableCollection,
    coverage: &mut AncestralCoverage,
    map: &RecombinationMap,
) -> SimulationResult<MergeOutcome> {
    let mut queue: Vec<Segment> = ancestors
        .iter()
        .flat_map(|lineage| lineage.segments.iter().copied())
        .collect();
    queue.sort_by(|a, b| (a.left, a.node).cmp(&(b.left, b.node)));

    let mut new_node: Option<NodeId> = None;
    let mut output: Vec<Segment> = vec![];
    let mut edge_buffer: Vec<BufferedEdge> = vec![];
    let mut active: Vec<Segment> = vec![];

    let mut qidx = 0_usize;
    let mut left = match queue.first() {
        Some(seg) => i64::from(seg.left),
        None => {
            return Ok(MergeOutcome {
                lineage: None,
                new_node: None,
            })
        }
    };

    loop {
        while qidx < queue.len() && i64::from(queue[qidx].left) == left {
            active.push(queue[qidx]);
            qidx += 1;
        }
        if active.is_empty() {
            if qidx >= queue.len() {
                break;
            }
            left = i64::from(queue[qidx].left);
            continue;
        }

        let mut right = active
            .iter()
            .map(|seg| i64::from(seg.right))
            .min()
            .unwrap();
        if qidx < queue.len() {
            right = right.min(i64::from(queue[qidx].left));
        }

        if active.len() == 1 {
            add_segment(
                &mut output,
                Locus::new_valid(left),
                Locus::new_valid(right),
                active[0].node,
            );
        } else {
            let parent = match new_node {
                Some(node) => node,
                None => {
                    let node = tables.add_node(time, population, 0)?;
                    new_node = Some(node);
                    node
                }
            };
            for seg in &active {
                buffer_edge(&mut edge_buffer, left, right, seg.node);
            }
            let overlapping = active.len() as u32;
            for (sub_left, sub_right, count) in coverage.ranges(left, right) {
                debug_assert!(count >= overlapping);
                if count > overlapping {
                    add_segment(
                        &mut output,
                        Locus::new_valid(sub_left),
                        Locus::new_valid(sub_right),
                        parent,
                    );
                }
            }
            coverage.decrement(left, right, overlapping - 1);
        }

        active.retain(|seg| i64::from(seg.right) > right);
        left = right;
        if active.is_empty() && qidx >= queue.len() {
            break;
        }
    }

    if let Some(parent) = new_node {
        flush_edges(&mut edge_buffer, parent, tables, map)?;
    }

    let lineage = if output.is_empty() {
        None
    } else {
        let node = new_node.unwrap_or(output[0].node);
        Some(Lineage::new(output, node, population))
    };
    Ok(MergeOutcome { lineage, new_node })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backrustts_core::Position;
    use backrustts_tables::NodeFlags;

    fn locus(x: i64) -> Locus {
        Locus::new_valid(x)
    }

    fn setup(num_samples: usize, length: i64) -> (TableCollection, Vec<Lineage>) {
        let mut tables = TableCollection::new(Position::new_valid(length)).unwrap();
        tables.add_population(None).unwrap();
        let mut lineages = vec![];
        for _ in 0..num_samples {
            let node = tables
                .add_node(0.0, PopulationId::from(0), NodeFlags::IS_SAMPLE.bits())
                .unwrap();
            lineages.push(Lineage::new(
                vec![Segment::new(locus(0), locus(length), node)],
                node,
                PopulationId::from(0),
            ));
        }
        (tables, lineages)
    }

    #[test]
    fn test_pairwise_full_coalescence() {
        let map = RecombinationMap::uniform(10, 1.0).unwrap();
        let (mut tables, lineages) = setup(2, 10);
        let mut coverage = AncestralCoverage::new(10);
        coverage.set(0, 10, 2);

        let outcome = merge_lineages(
            &lineages,
            Time::from(1.5),
            PopulationId::from(0),
            &mut tables,
            &mut coverage,
            &map,
        )
        .unwrap();

        // Two samples over the same material: one MRCA, no survivor.
        assert!(outcome.lineage.is_none());
        let parent = outcome.new_node.unwrap();
        assert_eq!(tables.node(parent).time, Time::from(1.5));
        assert_eq!(tables.num_edges(), 2);
        for edge in tables.edges() {
            assert_eq!(edge.parent, parent);
            assert_eq!(edge.left, 0);
            assert_eq!(edge.right, 10);
        }
    }

    #[test]
    fn test_pairwise_partial_overlap() {
        let map = RecombinationMap::uniform(10, 1.0).unwrap();
        let (mut tables, mut lineages) = setup(3, 10);
        let mut coverage = AncestralCoverage::new(10);
        coverage.set(0, 10, 3);

        // Restrict lineage 1 to [4, 10) as if it had recombined away.
        lineages[1].segments = vec![Segment::new(locus(4), locus(10), lineages[1].node)];

        let outcome = merge_lineages(
            &lineages[0..2],
            Time::from(2.0),
            PopulationId::from(0),
            &mut tables,
            &mut coverage,
            &map,
        )
        .unwrap();

        // [0, 4) passes through; [4, 10) coalesced but a third sample
        // still carries it, so the survivor owns both pieces.
        let lineage = outcome.lineage.unwrap();
        let parent = outcome.new_node.unwrap();
        assert_eq!(
            lineage.segments,
            vec![
                Segment::new(locus(0), locus(4), lineages[0].node),
                Segment::new(locus(4), locus(10), parent),
            ]
        );
        assert_eq!(coverage.ranges(0, 10), vec![(0, 4, 3), (4, 10, 2)]);
        assert_eq!(tables.num_edges(), 2);
    }

    #[test]
    fn test_disjoint_merge_makes_no_node() {
        let map = RecombinationMap::uniform(10, 1.0).unwrap();
        let (mut tables, mut lineages) = setup(2, 10);
        let mut coverage = AncestralCoverage::new(10);
        coverage.set(0, 10, 2);

        lineages[0].segments = vec![Segment::new(locus(0), locus(4), lineages[0].node)];
        lineages[1].segments = vec![Segment::new(locus(6), locus(10), lineages[1].node)];

        let nodes_before = tables.num_nodes();
        let outcome = merge_lineages(
            &lineages,
            Time::from(1.0),
            PopulationId::from(0),
            &mut tables,
            &mut coverage,
            &map,
        )
        .unwrap();

        assert!(outcome.new_node.is_none());
        assert_eq!(tables.num_nodes(), nodes_before);
        assert_eq!(tables.num_edges(), 0);
        let lineage = outcome.lineage.unwrap();
        assert_eq!(lineage.segments.len(), 2);
    }

    #[test]
    fn test_three_way_merge() {
        let map = RecombinationMap::uniform(10, 1.0).unwrap();
        let (mut tables, lineages) = setup(3, 10);
        let mut coverage = AncestralCoverage::new(10);
        coverage.set(0, 10, 3);

        let outcome = merge_lineages(
            &lineages,
            Time::from(3.0),
            PopulationId::from(0),
            &mut tables,
            &mut coverage,
            &map,
        )
        .unwrap();

        assert!(outcome.lineage.is_none());
        assert_eq!(tables.num_edges(), 3);
    }
}
