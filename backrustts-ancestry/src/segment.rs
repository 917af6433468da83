use backrustts_core::{Locus, NodeId, PopulationId};

/// A segment is a half-open interval `[left, right)` of
/// [``Locus``] values associated with a [``NodeId``].
///
/// Segments record ancestral material: genome chunks whose history,
/// viewed from the samples, is not yet resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Segment {
    /// Left edge of interval
    pub left: Locus,
    /// Right edge of interval
    pub right: Locus,
    /// The node currently carrying the material
    pub node: NodeId,
}

impl Segment {
    /// Create a new instance.
    pub fn new(left: Locus, right: Locus, node: NodeId) -> Self {
        Segment { left, right, node }
    }
}

/// Append `[left, right)` for `node`, extending the previous segment
/// when the two are contiguous and carry the same node.
pub(crate) fn add_segment(segments: &mut Vec<Segment>, left: Locus, right: Locus, node: NodeId) {
    if left == right {
        return;
    }
    match segments.last_mut() {
        Some(last) if last.right == left && last.node == node => last.right = right,
        _ => segments.push(Segment::new(left, right, node)),
    }
}

/// A live unit of ancestry.
///
/// Segments are disjoint, sorted by `left`, and cover exactly the
/// lineage's ancestral material.  A lineage with zero segments is
/// extinct and must not be stored.
#[derive(Clone, Debug)]
pub(crate) struct Lineage {
    pub segments: Vec<Segment>,
    /// The node owning the lineage.
    pub node: NodeId,
    /// The population the lineage currently lives in.
    pub population: PopulationId,
}

impl Lineage {
    pub fn new(segments: Vec<Segment>, node: NodeId, population: PopulationId) -> Self {
        debug_assert!(!segments.is_empty());
        debug_assert!(segments
            .windows(2)
            .all(|w| w[0].right <= w[1].left));
        Self {
            segments,
            node,
            population,
        }
    }

    /// The outermost extent `(head.left, tail.right)` of the material.
    pub fn span(&self) -> (Locus, Locus) {
        (
            self.segments[0].left,
            self.segments[self.segments.len() - 1].right,
        )
    }

    /// The number of internal locus boundaries at which a crossover
    /// would separate material.
    pub fn links(&self) -> i64 {
        let (left, right) = self.span();
        i64::from(right) - i64::from(left) - 1
    }

    /// Split at `breakpoint`, which must fall strictly inside the
    /// lineage's span.  Both halves keep the owning node: the split
    /// itself creates no new node.
    pub fn split(&self, breakpoint: Locus) -> (Lineage, Lineage) {
        let bp = i64::from(breakpoint);
        let mut left_segments = vec![];
        let mut right_segments = vec![];
        for seg in &self.segments {
            if i64::from(seg.right) <= bp {
                left_segments.push(*seg);
            } else if i64::from(seg.left) >= bp {
                right_segments.push(*seg);
            } else {
                left_segments.push(Segment::new(seg.left, breakpoint, seg.node));
                right_segments.push(Segment::new(breakpoint, seg.right, seg.node));
            }
        }
        (
            Lineage::new(left_segments, self.node, self.population),
            Lineage::new(right_segments, self.node, self.population),
        )
    }
}
