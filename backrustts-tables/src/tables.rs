use backrustts_core::{IndividualId, MigrationId, MutationId, NodeId, PopulationId, Position, SiteId, Time};
use bitflags::bitflags;
use thiserror::Error;

/// Error type related to [``TableCollection``]
#[derive(Error, Debug, PartialEq)]
pub enum TablesError {
    /// Returned by [``TableCollection::new``].
    #[error("Invalid genome length")]
    InvalidGenomeLength,
    /// Returned when invalid node `ID`s are encountered.
    #[error("Invalid node: {found:?}")]
    InvalidNodeValue {
        /// The invalid `ID`
        found: NodeId,
    },
    /// Returned when invalid positions are encountered.
    #[error("Invalid value for position: {found:?}")]
    InvalidPosition {
        /// The invalid position
        found: Position,
    },
    /// Returned when an [``Edge``]'s left/right values are invalid.
    #[error("Invalid position range: {found:?}")]
    InvalidLeftRight {
        /// The invalid `(left, right)`.
        found: (Position, Position),
    },
    /// Returned when a time value is not finite.
    #[error("Invalid value for time: {found:?}")]
    InvalidTime {
        /// The invalid time
        found: Time,
    },
    /// Returned when a node's population is out of bounds.
    #[error("Population is out of bounds: {found:?}")]
    PopulationOutOfBounds {
        /// The invalid population id
        found: PopulationId,
    },
    /// Returned when a node's individual is out of bounds.
    #[error("Individual is out of bounds: {found:?}")]
    IndividualOutOfBounds {
        /// The invalid individual id
        found: IndividualId,
    },
    #[error("Parent is NULL")]
    /// Can be returned by [``TableCollection::validate``]
    NullParent,
    #[error("Child is NULL")]
    /// Can be returned by [``TableCollection::validate``]
    NullChild,
    #[error("Node is out of bounds")]
    /// Can be returned by [``TableCollection::validate``]
    NodeOutOfBounds,
    #[error("Node time order violation")]
    /// Can be returned by [``TableCollection::validate``]
    NodeTimesUnordered,
    /// Returned when a child node inherits from two parents
    /// over overlapping intervals.
    #[error("Child {child:?} has overlapping parental intervals")]
    OverlappingChildIntervals {
        /// The offending child
        child: NodeId,
    },
    /// Returned when site positions are unsorted.
    #[error("Site positions are unsorted")]
    UnsortedSitePositions,
    /// Returned when a site position is duplicated.
    #[error("Duplicated site positions found")]
    DuplicatedSitePosition,
    /// Returned when a [``MutationRecord``]'s site is out of bounds.
    #[error("Site is out of bounds")]
    SiteOutOfBounds,
    /// Returned when a mutation's time precedes its node's time.
    #[error("Invalid mutation time")]
    InvalidMutationTime,
    /// Returned by [``TableCollection::truncate``] when a target
    /// count exceeds the current table length.
    #[error("Truncation target exceeds table length")]
    InvalidTruncationTarget,
}

/// Result type for operations on tables
pub type TablesResult<T> = std::result::Result<T, TablesError>;

/// A Node of a tree sequence
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Node {
    /// Birth time
    pub time: Time,
    /// Population of the node
    pub population: PopulationId,
    /// Individual the node belongs to, if any
    pub individual: IndividualId,
    /// Bit flags
    pub flags: u32,
}

/// An Edge is a transmission event
///
/// An edge is a record of transmission of a half-open chunk of genome
/// `[left, right)` from `parent` to `child`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    /// Left end
    pub left: Position,
    /// Right end
    pub right: Position,
    /// Index of parent in a [NodeTable](type.NodeTable.html)
    pub parent: NodeId,
    /// Index of child in a [NodeTable](type.NodeTable.html)
    pub child: NodeId,
}

/// A record of a lineage moving between populations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Migration {
    /// Left end of the migrating material
    pub left: Position,
    /// Right end of the migrating material
    pub right: Position,
    /// The node owning the migrating lineage
    pub node: NodeId,
    /// Population migrated from
    pub source: PopulationId,
    /// Population migrated to
    pub dest: PopulationId,
    /// Time of the migration
    pub time: Time,
}

/// A Site is the location and ancestral state of mutations.
#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    /// Position of the site
    pub position: Position,
    /// The ancestral state.
    /// [``None``] implies client code will apply a default.
    pub ancestral_state: Option<Vec<u8>>,
}

/// A MutationRecord is the minimal information needed about a mutation
/// to track it on a tree sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationRecord {
    /// The index of the corresponding [``Site``].
    pub site: SiteId,
    /// The node where the mutation maps
    pub node: NodeId,
    /// The origin time of the mutation
    pub time: Time,
    /// The derived state.
    /// [``None``] implies client code will apply a default.
    pub derived_state: Option<Vec<u8>>,
}

/// A population row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Population {
    /// Opaque metadata.
    pub metadata: Option<Vec<u8>>,
}

/// An individual row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Individual {
    /// Bit flags
    pub flags: u32,
}

/// A provenance row: a timestamp plus a free-form record.
///
/// Provenance content never participates in the reproducibility
/// guarantees of simulation output.
#[derive(Clone, Debug, PartialEq)]
pub struct Provenance {
    /// When the record was created
    pub timestamp: String,
    /// Free-form record contents
    pub record: String,
}

/// A node table
pub type NodeTable = Vec<Node>;
/// An edge table
pub type EdgeTable = Vec<Edge>;
/// A migration table
pub type MigrationTable = Vec<Migration>;
/// A site table
pub type SiteTable = Vec<Site>;
/// A Mutation table
pub type MutationTable = Vec<MutationRecord>;
/// A population table
pub type PopulationTable = Vec<Population>;
/// An individual table
pub type IndividualTable = Vec<Individual>;
/// A provenance table
pub type ProvenanceTable = Vec<Provenance>;

bitflags! {
    /// Set properties of a [`Node`].
    #[derive(Default)]
    pub struct NodeFlags: u32 {
        /// Default
        const NONE = 0;
        /// The node is a sample node.
        const IS_SAMPLE = 1 << 0;
    }
}

bitflags! {
    /// Modifies behavior of [``TableCollection::validate``]
    ///
    /// ```
    /// let f = backrustts_tables::TableValidationFlags::default();
    /// assert_eq!(f.contains(backrustts_tables::TableValidationFlags::VALIDATE_ALL), true);
    /// ```
    pub struct TableValidationFlags: u32 {
        /// Validate the node table
        const VALIDATE_NODES = 1 << 0;
        /// Validate the edge table
        const VALIDATE_EDGES = 1 << 1;
        /// Validate the migration table
        const VALIDATE_MIGRATIONS = 1 << 2;
        /// Validate the site table
        const VALIDATE_SITES = 1 << 3;
        /// Validate the mutation table
        const VALIDATE_MUTATIONS = 1 << 4;
        /// Validate all tables.
        /// This is also the "default" value.
        const VALIDATE_ALL = Self::VALIDATE_NODES.bits
            | Self::VALIDATE_EDGES.bits
            | Self::VALIDATE_MIGRATIONS.bits
            | Self::VALIDATE_SITES.bits
            | Self::VALIDATE_MUTATIONS.bits;
    }
}

impl Default for TableValidationFlags {
    fn default() -> Self {
        TableValidationFlags::VALIDATE_ALL
    }
}

/// A snapshot of the number of rows in each table.
///
/// Obtained from [``TableCollection::counts``] and consumed by
/// [``TableCollection::truncate``] to rewind a collection to a
/// previously observed state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableCounts {
    /// Number of population rows
    pub populations: usize,
    /// Number of individual rows
    pub individuals: usize,
    /// Number of node rows
    pub nodes: usize,
    /// Number of edge rows
    pub edges: usize,
    /// Number of migration rows
    pub migrations: usize,
    /// Number of site rows
    pub sites: usize,
    /// Number of mutation rows
    pub mutations: usize,
    /// Number of provenance rows
    pub provenances: usize,
}

fn position_non_negative(x: Position) -> TablesResult<()> {
    if x < 0 {
        Err(TablesError::InvalidPosition { found: x })
    } else {
        Ok(())
    }
}

fn node_non_negative(x: NodeId) -> TablesResult<()> {
    if x < 0 {
        Err(TablesError::InvalidNodeValue { found: x })
    } else {
        Ok(())
    }
}

fn time_finite(x: Time) -> TablesResult<()> {
    if !x.is_finite() {
        Err(TablesError::InvalidTime { found: x })
    } else {
        Ok(())
    }
}

/// A collection of the tables recording a genealogy.
///
/// Tables are append-only; mutation of existing rows is not part of
/// the public interface.  [``TableCollection::truncate``] rewinds
/// whole tables to a previous length.
#[derive(Clone, Debug, PartialEq)]
pub struct TableCollection {
    length_: Position, // Not visible outside of this module

    populations_: PopulationTable,
    individuals_: IndividualTable,
    nodes_: NodeTable,
    edges_: EdgeTable,
    migrations_: MigrationTable,
    sites_: SiteTable,
    mutations_: MutationTable,
    provenances_: ProvenanceTable,
}

impl TableCollection {
    /// Create a new collection for a genome of length `sequence_length`.
    pub fn new<P: Into<Position>>(sequence_length: P) -> TablesResult<TableCollection> {
        let length = sequence_length.into();
        if length < 1 {
            return Err(TablesError::InvalidGenomeLength);
        }

        Ok(TableCollection {
            length_: length,
            populations_: PopulationTable::new(),
            individuals_: IndividualTable::new(),
            nodes_: NodeTable::new(),
            edges_: EdgeTable::new(),
            migrations_: MigrationTable::new(),
            sites_: SiteTable::new(),
            mutations_: MutationTable::new(),
            provenances_: ProvenanceTable::new(),
        })
    }

    /// Add a population row.
    pub fn add_population(&mut self, metadata: Option<Vec<u8>>) -> TablesResult<PopulationId> {
        self.populations_.push(Population { metadata });
        Ok(PopulationId::from(self.populations_.len() - 1))
    }

    /// Add an individual row.
    pub fn add_individual(&mut self, flags: u32) -> TablesResult<IndividualId> {
        self.individuals_.push(Individual { flags });
        Ok(IndividualId::from(self.individuals_.len() - 1))
    }

    /// Add a node.
    ///
    /// Negative times are allowed; non-finite times are not.
    pub fn add_node<T: Into<Time>>(
        &mut self,
        time: T,
        population: PopulationId,
        flags: u32,
    ) -> TablesResult<NodeId> {
        self.add_node_with_individual(time, population, IndividualId::NULL, flags)
    }

    /// Add a node attached to an individual.
    pub fn add_node_with_individual<T: Into<Time>>(
        &mut self,
        time: T,
        population: PopulationId,
        individual: IndividualId,
        flags: u32,
    ) -> TablesResult<NodeId> {
        let time = time.into();
        time_finite(time)?;
        self.nodes_.push(Node {
            time,
            population,
            individual,
            flags,
        });
        Ok(NodeId::from(self.nodes_.len() - 1))
    }

    /// Add an Edge
    pub fn add_edge(
        &mut self,
        left: Position,
        right: Position,
        parent: NodeId,
        child: NodeId,
    ) -> TablesResult<()> {
        if right <= left {
            return Err(TablesError::InvalidLeftRight {
                found: (left, right),
            });
        }
        position_non_negative(left)?;
        position_non_negative(right)?;
        node_non_negative(parent)?;
        node_non_negative(child)?;

        self.edges_.push(Edge {
            left,
            right,
            parent,
            child,
        });

        Ok(())
    }

    /// Add a migration record.
    pub fn add_migration(
        &mut self,
        left: Position,
        right: Position,
        node: NodeId,
        source: PopulationId,
        dest: PopulationId,
        time: Time,
    ) -> TablesResult<MigrationId> {
        if right <= left {
            return Err(TablesError::InvalidLeftRight {
                found: (left, right),
            });
        }
        position_non_negative(left)?;
        node_non_negative(node)?;
        time_finite(time)?;
        self.migrations_.push(Migration {
            left,
            right,
            node,
            source,
            dest,
            time,
        });
        Ok(MigrationId::from(self.migrations_.len() - 1))
    }

    /// Add a site.
    pub fn add_site(
        &mut self,
        position: Position,
        ancestral_state: Option<Vec<u8>>,
    ) -> TablesResult<SiteId> {
        position_non_negative(position)?;
        if position >= self.length_ {
            return Err(TablesError::InvalidPosition { found: position });
        }
        self.sites_.push(Site {
            position,
            ancestral_state,
        });
        Ok(SiteId::from(self.sites_.len() - 1))
    }

    /// Add a mutation.
    pub fn add_mutation(
        &mut self,
        site: SiteId,
        node: NodeId,
        time: Time,
        derived_state: Option<Vec<u8>>,
    ) -> TablesResult<MutationId> {
        node_non_negative(node)?;
        time_finite(time)?;
        self.mutations_.push(MutationRecord {
            site,
            node,
            time,
            derived_state,
        });
        Ok(MutationId::from(self.mutations_.len() - 1))
    }

    /// Add a provenance row.  Returns the new number of rows.
    pub fn add_provenance(&mut self, timestamp: String, record: String) -> usize {
        self.provenances_.push(Provenance { timestamp, record });
        self.provenances_.len()
    }

    /// The genome length.
    pub fn sequence_length(&self) -> Position {
        self.length_
    }

    /// Return immutable reference to the [population table](type.PopulationTable.html)
    pub fn populations(&self) -> &PopulationTable {
        &self.populations_
    }

    /// Return immutable reference to the [individual table](type.IndividualTable.html)
    pub fn individuals(&self) -> &IndividualTable {
        &self.individuals_
    }

    /// Return immutable reference to [node table](type.NodeTable.html)
    pub fn nodes(&self) -> &NodeTable {
        &self.nodes_
    }

    /// Return immutable reference to the [edge table](type.EdgeTable.html)
    pub fn edges(&self) -> &EdgeTable {
        &self.edges_
    }

    /// Return immutable reference to the [migration table](type.MigrationTable.html)
    pub fn migrations(&self) -> &MigrationTable {
        &self.migrations_
    }

    /// Return immutable reference to [site table](type.SiteTable.html)
    pub fn sites(&self) -> &SiteTable {
        &self.sites_
    }

    /// Return immutable reference to the [mutation table](type.MutationTable.html)
    pub fn mutations(&self) -> &MutationTable {
        &self.mutations_
    }

    /// Return immutable reference to the [provenance table](type.ProvenanceTable.html)
    pub fn provenances(&self) -> &ProvenanceTable {
        &self.provenances_
    }

    /// Return number of nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes_.len()
    }

    /// Return number of edges
    pub fn num_edges(&self) -> usize {
        self.edges_.len()
    }

    /// Return number of populations
    pub fn num_populations(&self) -> usize {
        self.populations_.len()
    }

    /// Fetch a node row.
    pub fn node(&self, i: NodeId) -> &Node {
        &self.nodes_[usize::from(i)]
    }

    /// Fetch an edge row.
    pub fn edge(&self, i: usize) -> &Edge {
        &self.edges_[i]
    }

    /// Fetch a site row.
    pub fn site(&self, i: SiteId) -> &Site {
        &self.sites_[usize::from(i)]
    }

    /// Fetch a mutation row.
    pub fn mutation(&self, i: MutationId) -> &MutationRecord {
        &self.mutations_[usize::from(i)]
    }

    /// The largest node time in the collection, if any nodes exist.
    pub fn max_node_time(&self) -> Option<Time> {
        let mut rv: Option<Time> = None;
        for node in &self.nodes_ {
            match rv {
                None => rv = Some(node.time),
                Some(t) => {
                    if node.time > t {
                        rv = Some(node.time)
                    }
                }
            }
        }
        rv
    }

    /// Snapshot the current table lengths.
    pub fn counts(&self) -> TableCounts {
        TableCounts {
            populations: self.populations_.len(),
            individuals: self.individuals_.len(),
            nodes: self.nodes_.len(),
            edges: self.edges_.len(),
            migrations: self.migrations_.len(),
            sites: self.sites_.len(),
            mutations: self.mutations_.len(),
            provenances: self.provenances_.len(),
        }
    }

    /// Rewind every table to the lengths recorded in `counts`.
    pub fn truncate(&mut self, counts: &TableCounts) -> TablesResult<()> {
        let current = self.counts();
        if counts.populations > current.populations
            || counts.individuals > current.individuals
            || counts.nodes > current.nodes
            || counts.edges > current.edges
            || counts.migrations > current.migrations
            || counts.sites > current.sites
            || counts.mutations > current.mutations
            || counts.provenances > current.provenances
        {
            return Err(TablesError::InvalidTruncationTarget);
        }
        self.populations_.truncate(counts.populations);
        self.individuals_.truncate(counts.individuals);
        self.nodes_.truncate(counts.nodes);
        self.edges_.truncate(counts.edges);
        self.migrations_.truncate(counts.migrations);
        self.sites_.truncate(counts.sites);
        self.mutations_.truncate(counts.mutations);
        self.provenances_.truncate(counts.provenances);
        Ok(())
    }

    fn validate_nodes(&self) -> TablesResult<()> {
        for node in &self.nodes_ {
            time_finite(node.time)?;
            if !node.population.is_null()
                && usize::from(node.population) >= self.populations_.len()
            {
                return Err(TablesError::PopulationOutOfBounds {
                    found: node.population,
                });
            }
            if !node.individual.is_null()
                && usize::from(node.individual) >= self.individuals_.len()
            {
                return Err(TablesError::IndividualOutOfBounds {
                    found: node.individual,
                });
            }
        }
        Ok(())
    }

    fn validate_edges(&self) -> TablesResult<()> {
        for edge in &self.edges_ {
            if edge.parent.is_null() {
                return Err(TablesError::NullParent);
            }
            if edge.child.is_null() {
                return Err(TablesError::NullChild);
            }
            if usize::from(edge.parent) >= self.nodes_.len()
                || usize::from(edge.child) >= self.nodes_.len()
            {
                return Err(TablesError::NodeOutOfBounds);
            }
            if edge.left < 0 || edge.left > self.length_ {
                return Err(TablesError::InvalidPosition { found: edge.left });
            }
            if edge.right < 0 || edge.right > self.length_ {
                return Err(TablesError::InvalidPosition { found: edge.right });
            }
            if edge.left >= edge.right {
                return Err(TablesError::InvalidLeftRight {
                    found: (edge.left, edge.right),
                });
            }

            // child time must be < parent time b/c time moves into the past
            if self.nodes_[usize::from(edge.child)].time
                >= self.nodes_[usize::from(edge.parent)].time
            {
                return Err(TablesError::NodeTimesUnordered);
            }
        }

        // No child may inherit from two parents over overlapping
        // intervals.
        let mut sorted: Vec<(NodeId, Position, Position)> = self
            .edges_
            .iter()
            .map(|e| (e.child, e.left, e.right))
            .collect();
        sorted.sort();
        for w in sorted.windows(2) {
            if w[0].0 == w[1].0 && w[1].1 < w[0].2 {
                return Err(TablesError::OverlappingChildIntervals { child: w[0].0 });
            }
        }

        Ok(())
    }

    fn validate_migrations(&self) -> TablesResult<()> {
        for migration in &self.migrations_ {
            if usize::from(migration.node) >= self.nodes_.len() {
                return Err(TablesError::NodeOutOfBounds);
            }
            if migration.source.is_null()
                || usize::from(migration.source) >= self.populations_.len()
            {
                return Err(TablesError::PopulationOutOfBounds {
                    found: migration.source,
                });
            }
            if migration.dest.is_null() || usize::from(migration.dest) >= self.populations_.len() {
                return Err(TablesError::PopulationOutOfBounds {
                    found: migration.dest,
                });
            }
            if migration.left < 0 || migration.right > self.length_ {
                return Err(TablesError::InvalidPosition {
                    found: migration.left,
                });
            }
            time_finite(migration.time)?;
        }
        Ok(())
    }

    fn validate_sites(&self) -> TablesResult<()> {
        for (i, site) in self.sites_.iter().enumerate() {
            if site.position < 0 || site.position >= self.length_ {
                return Err(TablesError::InvalidPosition {
                    found: site.position,
                });
            }
            if i > 0 {
                if site.position < self.sites_[i - 1].position {
                    return Err(TablesError::UnsortedSitePositions);
                }
                if site.position == self.sites_[i - 1].position {
                    return Err(TablesError::DuplicatedSitePosition);
                }
            }
        }
        Ok(())
    }

    fn validate_mutations(&self) -> TablesResult<()> {
        for mutation in &self.mutations_ {
            if mutation.site.is_null() || usize::from(mutation.site) >= self.sites_.len() {
                return Err(TablesError::SiteOutOfBounds);
            }
            if mutation.node.is_null() || usize::from(mutation.node) >= self.nodes_.len() {
                return Err(TablesError::NodeOutOfBounds);
            }
            time_finite(mutation.time)?;
            if mutation.time < self.nodes_[usize::from(mutation.node)].time {
                return Err(TablesError::InvalidMutationTime);
            }
        }
        Ok(())
    }

    /// Perform a data integrity check on the collection.
    ///
    /// The errors returned here are the "malformed input" class that a
    /// simulation engine consuming a collection is expected to
    /// propagate verbatim.
    pub fn validate(&self, flags: TableValidationFlags) -> TablesResult<()> {
        if flags.contains(TableValidationFlags::VALIDATE_NODES) {
            self.validate_nodes()?;
        }
        if flags.contains(TableValidationFlags::VALIDATE_EDGES) {
            self.validate_edges()?;
        }
        if flags.contains(TableValidationFlags::VALIDATE_MIGRATIONS) {
            self.validate_migrations()?;
        }
        if flags.contains(TableValidationFlags::VALIDATE_SITES) {
            self.validate_sites()?;
        }
        if flags.contains(TableValidationFlags::VALIDATE_MUTATIONS) {
            self.validate_mutations()?;
        }
        Ok(())
    }
}
