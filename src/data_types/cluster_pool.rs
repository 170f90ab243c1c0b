
use std::sync::Arc;

use crate::data_types::candidate_pair::ClusterId;
use crate::data_types::cluster::Cluster;

/// Arena of the clusters in one merge session.
/// Ids are never reused, so a removed id stays dead and any pair pointing at it is known to be stale.
/// Clusters are shared immutably, cloning the pool is a cheap snapshot.
#[derive(Clone, Debug, Default)]
pub struct ClusterPool {
    slots: Vec<Option<Arc<Cluster>>>,
    num_live: usize
}

impl ClusterPool {
    pub fn new() -> ClusterPool {
        Default::default()
    }

    /// Adds a cluster and returns its new id
    pub fn insert(&mut self, cluster: Cluster) -> ClusterId {
        self.insert_shared(Arc::new(cluster))
    }

    /// Adds an already shared cluster and returns its new id
    pub fn insert_shared(&mut self, cluster: Arc<Cluster>) -> ClusterId {
        let cluster_id = self.slots.len();
        self.slots.push(Some(cluster));
        self.num_live += 1;
        cluster_id
    }

    /// Returns the cluster if it is still live
    pub fn get(&self, cluster_id: ClusterId) -> Option<&Arc<Cluster>> {
        self.slots.get(cluster_id).and_then(|slot| slot.as_ref())
    }

    pub fn is_live(&self, cluster_id: ClusterId) -> bool {
        self.get(cluster_id).is_some()
    }

    /// Retires a cluster, returning it if it was live
    pub fn remove(&mut self, cluster_id: ClusterId) -> Option<Arc<Cluster>> {
        let removed = self.slots.get_mut(cluster_id).and_then(|slot| slot.take());
        if removed.is_some() {
            self.num_live -= 1;
        }
        removed
    }

    /// Number of live clusters
    pub fn len(&self) -> usize {
        self.num_live
    }

    pub fn is_empty(&self) -> bool {
        self.num_live == 0
    }

    /// Iterates over the live clusters in id order
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &Arc<Cluster>)> {
        self.slots.iter()
            .enumerate()
            .filter_map(|(cluster_id, slot)| slot.as_ref().map(|c| (cluster_id, c)))
    }

    /// Consumes the pool, returning the live clusters in id order
    pub fn into_clusters(self) -> Vec<Arc<Cluster>> {
        self.slots.into_iter().flatten().collect()
    }
}
