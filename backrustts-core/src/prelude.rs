//! Convenience imports.

pub use crate::IndividualId;
pub use crate::Locus;
pub use crate::MigrationId;
pub use crate::MutationId;
pub use crate::NodeId;
pub use crate::PopulationId;
pub use crate::Position;
pub use crate::SiteId;
pub use crate::Time;
