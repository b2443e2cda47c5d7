//! The Cluster Membership Service abstraction and an in-process test double.

pub mod error;
pub mod in_process;
pub mod membership;
pub mod relation;

pub use error::MembershipError;
pub use in_process::{InProcessMembership, SharedCluster};
pub use membership::{ClusterMembership, UnitStatus};
pub use relation::{RelationKey, TestState};
