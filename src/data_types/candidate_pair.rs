
use priority_queue::PriorityQueue;
use std::cmp::{Ordering, Reverse};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::data_types::cluster::Cluster;

/// Index of a cluster inside a `ClusterPool`
pub type ClusterId = usize;

/// Exact Jaccard index of two supporting sets, stored as the ratio intersection / union.
/// Only positive intersections are representable, so the value is always in (0, 1].
#[derive(Clone, Copy, Debug)]
pub struct JaccardScore {
    intersection: u64,
    union: u64
}

impl JaccardScore {
    /// Returns None when the intersection is empty or the union is smaller than the intersection
    pub fn new(intersection: u64, union: u64) -> Option<JaccardScore> {
        if intersection == 0 || union < intersection {
            None
        } else {
            Some(JaccardScore { intersection, union })
        }
    }

    /// Scores the supporting sets of two clusters
    pub fn between(c1: &Cluster, c2: &Cluster) -> Option<JaccardScore> {
        let intersection = c1.intersection_size(c2) as u64;
        let union = (c1.num_members() + c2.num_members()) as u64 - intersection;
        JaccardScore::new(intersection, union)
    }

    /// Float view of the score, for reporting only
    pub fn value(&self) -> f64 {
        self.intersection as f64 / self.union as f64
    }
}

impl Ord for JaccardScore {
    fn cmp(&self, other: &Self) -> Ordering {
        // a/b vs c/d -> a*d vs c*b, widened so it cannot overflow
        let lhs = self.intersection as u128 * other.union as u128;
        let rhs = other.intersection as u128 * self.union as u128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for JaccardScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for JaccardScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JaccardScore {}

/// A proposed merge of two clusters. Identity is the unordered pair of cluster ids, the score is carried along.
#[derive(Clone, Copy, Debug)]
pub struct CandidatePair {
    /// the lower cluster id
    first: ClusterId,
    /// the higher cluster id
    second: ClusterId,
    /// similarity of the two supporting sets
    score: JaccardScore
}

impl PartialEq for CandidatePair {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first && self.second == other.second
    }
}

impl Eq for CandidatePair {}

impl Hash for CandidatePair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.first.hash(state);
        self.second.hash(state);
    }
}

impl CandidatePair {
    /// Creates a new pair, the ids are stored in ascending order.
    /// # Panics
    /// * if both ids are the same
    pub fn new(id_a: ClusterId, id_b: ClusterId, score: JaccardScore) -> CandidatePair {
        assert_ne!(id_a, id_b, "a cluster cannot pair with itself");
        let (first, second) = if id_a < id_b { (id_a, id_b) } else { (id_b, id_a) };
        CandidatePair {
            first,
            second,
            score
        }
    }

    /// Scores two clusters and returns a pair only if they may legally merge (disjoint tags, positive intersection).
    /// # Arguments
    /// * `id_a` - pool id of the first cluster
    /// * `c_a` - the first cluster
    /// * `id_b` - pool id of the second cluster
    /// * `c_b` - the second cluster
    pub fn score_clusters(id_a: ClusterId, c_a: &Cluster, id_b: ClusterId, c_b: &Cluster) -> Option<CandidatePair> {
        if id_a == id_b || c_a.shares_tag(c_b) {
            return None;
        }
        JaccardScore::between(c_a, c_b)
            .map(|score| CandidatePair::new(id_a, id_b, score))
    }

    pub fn first(&self) -> ClusterId {
        self.first
    }

    pub fn second(&self) -> ClusterId {
        self.second
    }

    pub fn score(&self) -> JaccardScore {
        self.score
    }

    pub fn contains(&self, cluster_id: ClusterId) -> bool {
        self.first == cluster_id || self.second == cluster_id
    }
}

/// Queue priority: best score first, then the earliest insertion
pub type PairPriority = (JaccardScore, Reverse<u64>);

/// A pair together with the sequence number it was enqueued with
#[derive(Clone, Copy, Debug)]
pub struct SequencedCandidatePair {
    pub pair: CandidatePair,
    pub sequence: u64
}

impl SequencedCandidatePair {
    pub fn priority(&self) -> PairPriority {
        (self.pair.score(), Reverse(self.sequence))
    }
}

/// Hands out strictly increasing sequence numbers, clones share the same counter
#[derive(Clone, Debug, Default)]
pub struct SequenceCounter {
    next: Arc<AtomicU64>
}

impl SequenceCounter {
    pub fn new() -> SequenceCounter {
        Default::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, AtomicOrdering::Relaxed)
    }

    /// Number of sequence numbers handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(AtomicOrdering::Relaxed)
    }
}

/// Best-first queue of candidate pairs, safe to fill from several threads.
/// Pushing a pair that is already queued keeps the original entry.
#[derive(Debug)]
pub struct PairQueue {
    queue: Mutex<PriorityQueue<CandidatePair, PairPriority>>,
    sequence: SequenceCounter
}

impl PairQueue {
    /// Creates an empty queue drawing from the given sequence counter
    pub fn new(sequence: SequenceCounter) -> PairQueue {
        PairQueue {
            queue: Mutex::new(PriorityQueue::new()),
            sequence
        }
    }

    fn lock(&self) -> MutexGuard<'_, PriorityQueue<CandidatePair, PairPriority>> {
        // a poisoned lock still guards a consistent queue
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a pair, the sequence number is assigned while holding the lock so insertion order matches sequence order.
    /// Returns None if the pair was already queued.
    pub fn push(&self, pair: CandidatePair) -> Option<SequencedCandidatePair> {
        let mut queue = self.lock();
        if queue.get(&pair).is_some() {
            return None;
        }
        let entry = SequencedCandidatePair {
            pair,
            sequence: self.sequence.next()
        };
        queue.push(pair, entry.priority());
        Some(entry)
    }

    /// Removes and returns the best pair
    pub fn pop(&self) -> Option<SequencedCandidatePair> {
        self.lock().pop()
            .map(|(pair, (_score, Reverse(sequence)))| SequencedCandidatePair { pair, sequence })
    }

    /// Drops every queued pair that references any of the given clusters, returns the number dropped
    pub fn remove_involving(&self, cluster_ids: &[ClusterId]) -> usize {
        let mut queue = self.lock();
        let stale: Vec<CandidatePair> = queue.iter()
            .filter(|(pair, _priority)| cluster_ids.iter().any(|&cid| pair.contains(cid)))
            .map(|(pair, _priority)| *pair)
            .collect();
        for pair in stale.iter() {
            queue.remove(pair);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
