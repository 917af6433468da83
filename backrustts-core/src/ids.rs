/// An id referring to a row of a node table.
///
/// ```
/// # use backrustts_core::NodeId;
/// let n = NodeId::from(-1);
/// assert!(n.is_null());
/// assert_eq!(n.into_raw(), -1);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct NodeId(pub(crate) i32);

/// An id referring to a row of a population table.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct PopulationId(pub(crate) i32);

/// An id referring to a row of an individual table.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct IndividualId(pub(crate) i32);

/// An id referring to a row of a site table.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct SiteId(pub(crate) i32);

/// An id referring to a row of a mutation table.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct MutationId(pub(crate) i32);

/// An id referring to a row of a migration table.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct MigrationId(pub(crate) i32);

impl_table_id!(NodeId);
impl_table_id!(PopulationId);
impl_table_id!(IndividualId);
impl_table_id!(SiteId);
impl_table_id!(MutationId);
impl_table_id!(MigrationId);
