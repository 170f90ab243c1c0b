
use bit_vec::BitVec;
use log::trace;

use crate::data_types::cluster::{Cluster, SeedTag};
use crate::data_types::fragment::{Fragment, FragmentId, FragmentSet};

/// Result of refining one seed group
#[derive(Debug)]
pub enum TwistOutcome {
    /// the partition stopped changing after `rounds` rounds
    Converged { clusters: Vec<Cluster>, rounds: usize },
    /// a cluster fell to or below the size cutoff during round `round`
    Collapsed { round: usize },
    /// the partition was still changing when the round limit was hit
    Unstable { rounds: usize }
}

/// Iteratively reassigns the fragments of a seed group to the cluster whose consensus they match best
pub struct Twister<'a> {
    /// the fragments the clusters index into
    fragments: &'a FragmentSet,
    /// number of clusters in every seed group
    ploidy: usize,
    /// a cluster collapses when its size is at or below |union| / (alpha * ploidy)
    alpha: f64,
    /// number of mismatches or gaps a fragment may carry and still be assigned
    beta: usize,
    /// maximum number of rounds before giving up
    max_rounds: usize
}

impl<'a> Twister<'a> {
    /// Creates a new twister.
    /// # Arguments
    /// * `fragments` - the fragment set the clusters index into
    /// * `ploidy` - number of clusters per seed group
    /// * `alpha` - size cutoff divisor, must be positive
    /// * `beta` - allowed shortfall between a fragment's best similarity and its length
    /// * `max_rounds` - the round limit, at least 1
    pub fn new(fragments: &'a FragmentSet, ploidy: usize, alpha: f64, beta: usize, max_rounds: usize) -> Twister<'a> {
        assert!(ploidy > 0);
        assert!(alpha > 0.0);
        Twister {
            fragments,
            ploidy,
            alpha,
            beta,
            max_rounds: max_rounds.max(1)
        }
    }

    /// Picks the cluster a fragment belongs to, if the best match is unique and close enough.
    /// # Arguments
    /// * `fragment` - the fragment to place
    /// * `consensuses` - one consensus per cluster
    fn best_assignment(&self, fragment: &Fragment, consensuses: &[Fragment]) -> Option<usize> {
        let scores: Vec<usize> = consensuses.iter()
            .map(|consensus| consensus.similarity(fragment))
            .collect();
        let best_score: usize = *scores.iter().max()?;
        let mut best_indices = scores.iter().enumerate()
            .filter(|(_i, &s)| s == best_score)
            .map(|(i, _s)| i);
        let best_index = best_indices.next()?;
        if best_indices.next().is_some() {
            // ambiguous
            return None;
        }

        if best_score + self.beta >= fragment.len() {
            Some(best_index)
        } else {
            None
        }
    }

    /// Performs a single round of reassignment.
    /// Returns None if any new cluster has a size at or below the cutoff.
    /// # Arguments
    /// * `clusters` - the current clusters, one per haplotype
    /// * `tag` - the seed tag of the group, carried into the new clusters
    pub fn twist_once(&self, clusters: &[Cluster], tag: SeedTag) -> Option<Vec<Cluster>> {
        assert_eq!(clusters.len(), self.ploidy);

        let mut union: BitVec = BitVec::from_elem(self.fragments.len(), false);
        for cluster in clusters.iter() {
            for fragment_id in cluster.members() {
                union.set(fragment_id, true);
            }
        }
        let union_size: usize = union.iter().filter(|&b| b).count();

        let consensuses: Vec<Fragment> = clusters.iter()
            .map(|c| c.consensus())
            .collect();

        let mut assignments: Vec<Vec<FragmentId>> = vec![vec![]; self.ploidy];
        let mut num_dropped: usize = 0;
        for (fragment_id, is_member) in union.iter().enumerate() {
            if !is_member {
                continue;
            }
            match self.best_assignment(self.fragments.get(fragment_id), &consensuses) {
                Some(cluster_index) => assignments[cluster_index].push(fragment_id),
                None => num_dropped += 1
            };
        }

        let cutoff: f64 = union_size as f64 / (self.alpha * self.ploidy as f64);
        let sizes: Vec<usize> = assignments.iter().map(|a| a.len()).collect();
        trace!("Twist tag {}: union={}, dropped={}, sizes={:?}, cutoff={:.3}", tag, union_size, num_dropped, sizes, cutoff);
        if sizes.iter().any(|&s| s as f64 <= cutoff) {
            return None;
        }

        Some(
            assignments.into_iter()
                .map(|ids| Cluster::from_members(self.fragments, ids, tag))
                .collect()
        )
    }

    /// Twists a seed group until the partition stops changing.
    /// # Arguments
    /// * `clusters` - the seeded clusters, one per haplotype
    /// * `tag` - the seed tag of the group
    pub fn twist(&self, clusters: Vec<Cluster>, tag: SeedTag) -> TwistOutcome {
        let mut current: Vec<Cluster> = clusters;
        for round in 1..=self.max_rounds {
            let next: Vec<Cluster> = match self.twist_once(&current, tag) {
                Some(n) => n,
                None => return TwistOutcome::Collapsed { round }
            };
            if same_partition(&current, &next) {
                return TwistOutcome::Converged { clusters: next, rounds: round };
            }
            current = next;
        }
        TwistOutcome::Unstable { rounds: self.max_rounds }
    }
}

/// Returns true if both collections hold the same member sets, ignoring cluster order
pub fn same_partition(c1: &[Cluster], c2: &[Cluster]) -> bool {
    if c1.len() != c2.len() {
        return false;
    }
    let member_sets = |clusters: &[Cluster]| -> Vec<Vec<FragmentId>> {
        let mut sets: Vec<Vec<FragmentId>> = clusters.iter()
            .map(|c| c.members().collect())
            .collect();
        sets.sort();
        sets
    };
    member_sets(c1) == member_sets(c2)
}
