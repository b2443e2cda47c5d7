//! An in-process fake of the Cluster Membership Service.
//!
//! Several [`InProcessMembership`] handles can share one [`SharedCluster`] to
//! simulate a multi-unit cluster (including leader failover) inside a single
//! test process, without any external substrate. Grounded structurally on
//! `queue-runtime/src/providers/memory.rs`'s in-memory provider:
//! same role (a trait implementation that exists purely so the workspace is
//! runnable without external infrastructure), same shape (shared state behind
//! a lock, one struct per "connection" pointing at it).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chopsticks_core::UnitId;
use tracing::debug;

use crate::error::MembershipError;
use crate::membership::{ClusterMembership, UnitStatus};
use crate::relation::RelationKey;

#[derive(Default)]
struct ClusterState {
    databag: HashMap<RelationKey, String>,
    leader: Option<UnitId>,
    units: HashSet<UnitId>,
    statuses: HashMap<UnitId, UnitStatus>,
}

/// Shared state behind every [`InProcessMembership`] handle for one
/// simulated cluster.
#[derive(Clone, Default)]
pub struct SharedCluster {
    state: Arc<RwLock<ClusterState>>,
}

impl SharedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a membership handle for a new unit and add it to the cluster.
    /// The first unit to join becomes leader automatically.
    pub fn join(&self, unit_id: UnitId, address: impl Into<String>) -> InProcessMembership {
        let mut state = self.state.write().unwrap();
        state.units.insert(unit_id.clone());
        if state.leader.is_none() {
            state.leader = Some(unit_id.clone());
        }
        InProcessMembership {
            unit_id,
            address: address.into(),
            cluster: self.clone(),
        }
    }

    /// Force a leadership change, simulating an election by the external
    /// membership substrate (used by the leader-failover end-to-end test).
    pub fn elect_leader(&self, unit_id: UnitId) {
        debug!(new_leader = %unit_id, "simulated leader election");
        self.state.write().unwrap().leader = Some(unit_id);
    }

    pub fn remove_unit(&self, unit_id: &UnitId) {
        let mut state = self.state.write().unwrap();
        state.units.remove(unit_id);
        if state.leader.as_ref() == Some(unit_id) {
            state.leader = None;
        }
    }
}

pub struct InProcessMembership {
    unit_id: UnitId,
    address: String,
    cluster: SharedCluster,
}

#[async_trait]
impl ClusterMembership for InProcessMembership {
    fn unit_id(&self) -> UnitId {
        self.unit_id.clone()
    }

    fn private_address(&self) -> String {
        self.address.clone()
    }

    async fn is_leader(&self) -> bool {
        self.cluster.state.read().unwrap().leader.as_ref() == Some(&self.unit_id)
    }

    async fn peer_count(&self) -> usize {
        self.cluster
            .state
            .read()
            .unwrap()
            .units
            .iter()
            .filter(|u| *u != &self.unit_id)
            .count()
    }

    async fn get_relation(&self, key: RelationKey) -> Option<String> {
        self.cluster.state.read().unwrap().databag.get(&key).cloned()
    }

    async fn set_relation(&self, key: RelationKey, value: String) -> Result<(), MembershipError> {
        if !self.is_leader().await {
            return Err(MembershipError::NotLeader);
        }
        self.cluster
            .state
            .write()
            .unwrap()
            .databag
            .insert(key, value);
        Ok(())
    }

    async fn set_status(&self, status: UnitStatus) {
        self.cluster
            .state
            .write()
            .unwrap()
            .statuses
            .insert(self.unit_id.clone(), status);
    }
}

impl InProcessMembership {
    /// Test/introspection accessor: the last status this unit published.
    pub fn status(&self) -> Option<UnitStatus> {
        self.cluster.state.read().unwrap().statuses.get(&self.unit_id).cloned()
    }
}
