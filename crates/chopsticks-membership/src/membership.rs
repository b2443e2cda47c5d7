//! The Cluster Membership Service abstraction (`spec.md` §1, §4.7, §6).
//!
//! `spec.md` treats unit identity, leader election, and the peer databag as
//! an external collaborator with a narrow interface. This trait is that
//! interface; a real deployment supplies its own implementation (a Juju
//! charm's relation data, a Kubernetes lease plus a ConfigMap, etc).
//! Structurally grounded on `github-bot-sdk/src/client/mod.rs`'s
//! trait-first async-client design.

use async_trait::async_trait;
use chopsticks_core::UnitId;

use crate::error::MembershipError;
use crate::relation::RelationKey;

#[async_trait]
pub trait ClusterMembership: Send + Sync {
    /// This unit's stable opaque id.
    fn unit_id(&self) -> UnitId;

    /// This unit's private address, used e.g. to publish `leader_address`.
    fn private_address(&self) -> String;

    /// Whether this unit currently holds leadership. Re-evaluated on every
    /// call; leadership may change between calls.
    async fn is_leader(&self) -> bool;

    /// Number of peers, excluding self (`spec.md` §4.7 `test-status`).
    async fn peer_count(&self) -> usize;

    /// Read a snapshot of one peer databag key. Readable by any unit.
    async fn get_relation(&self, key: RelationKey) -> Option<String>;

    /// Write one peer databag key. Only the current leader may call this;
    /// a non-leader caller receives `MembershipError::NotLeader`
    /// (`spec.md` §3: "only the leader writes").
    async fn set_relation(&self, key: RelationKey, value: String) -> Result<(), MembershipError>;

    /// Write several peer databag keys as one batch, observed atomically by
    /// subsequent readers on this unit (`spec.md` §5 "Ordering").
    async fn set_relation_batch(
        &self,
        entries: &[(RelationKey, String)],
    ) -> Result<(), MembershipError> {
        for (key, value) in entries {
            self.set_relation(*key, value.clone()).await?;
        }
        Ok(())
    }

    /// Publish this unit's presentation status (`spec.md` §4.6.4). Any unit
    /// may call this for itself, unlike `set_relation`, which is
    /// leader-restricted peer state.
    async fn set_status(&self, status: UnitStatus);
}

/// A unit's externally-visible presentation status, one-to-one with
/// `coordinator::status::PresentationStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Blocked(String),
    Active(String),
    Waiting(String),
}
