//! The live-lineage store, indexed by population.

use crate::segment::Lineage;

/// All live lineages, grouped by population for O(1) sampling of the
/// participants in the next event.
#[derive(Clone, Debug)]
pub(crate) struct LineageStore {
    by_population: Vec<Vec<Lineage>>,
}

impl LineageStore {
    pub fn new(num_populations: usize) -> Self {
        Self {
            by_population: vec![vec![]; num_populations],
        }
    }

    pub fn insert(&mut self, lineage: Lineage) {
        let population = usize::from(lineage.population);
        self.by_population[population].push(lineage);
    }

    /// Remove by index; the last lineage in the population takes the
    /// vacated slot.
    pub fn remove(&mut self, population: usize, index: usize) -> Lineage {
        self.by_population[population].swap_remove(index)
    }

    pub fn lineage_count(&self, population: usize) -> usize {
        self.by_population[population].len()
    }

    pub fn num_live(&self) -> usize {
        self.by_population.iter().map(|v| v.len()).sum()
    }

    pub fn num_populations(&self) -> usize {
        self.by_population.len()
    }

    pub fn population(&self, population: usize) -> &[Lineage] {
        &self.by_population[population]
    }

    /// Remove and return every lineage of a population.
    pub fn take_population(&mut self, population: usize) -> Vec<Lineage> {
        std::mem::take(&mut self.by_population[population])
    }

    /// Total crossover links over all live lineages.
    pub fn total_links(&self) -> i64 {
        self.by_population
            .iter()
            .flat_map(|v| v.iter())
            .map(|lineage| lineage.links())
            .sum()
    }

    /// Locate the lineage holding the `target`-th link, in population
    /// then insertion order.  `target` must be in `[0, total_links())`.
    pub fn find_by_link(&self, target: i64) -> (usize, usize, i64) {
        let mut seen = 0;
        for (population, lineages) in self.by_population.iter().enumerate() {
            for (index, lineage) in lineages.iter().enumerate() {
                let links = lineage.links();
                if target < seen + links {
                    return (population, index, target - seen);
                }
                seen += links;
            }
        }
        panic!("link target out of range");
    }

    pub fn clear(&mut self) {
        for lineages in &mut self.by_population {
            lineages.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use backrustts_core::{Locus, NodeId, PopulationId};

    fn lineage(population: i32, left: i64, right: i64) -> Lineage {
        let node = NodeId::from(0);
        Lineage::new(
            vec![Segment::new(
                Locus::new_valid(left),
                Locus::new_valid(right),
                node,
            )],
            node,
            PopulationId::from(population),
        )
    }

    #[test]
    fn test_counts_and_links() {
        let mut store = LineageStore::new(2);
        store.insert(lineage(0, 0, 10));
        store.insert(lineage(1, 0, 5));
        store.insert(lineage(1, 2, 8));
        assert_eq!(store.num_live(), 3);
        assert_eq!(store.lineage_count(0), 1);
        assert_eq!(store.lineage_count(1), 2);
        assert_eq!(store.total_links(), 9 + 4 + 5);
    }

    #[test]
    fn test_find_by_link() {
        let mut store = LineageStore::new(1);
        store.insert(lineage(0, 0, 4)); // 3 links
        store.insert(lineage(0, 0, 6)); // 5 links
        assert_eq!(store.find_by_link(0), (0, 0, 0));
        assert_eq!(store.find_by_link(2), (0, 0, 2));
        assert_eq!(store.find_by_link(3), (0, 1, 0));
        assert_eq!(store.find_by_link(7), (0, 1, 4));
    }
}
