
use log::{debug, info, trace, warn};
use rustc_hash::FxHashMap as HashMap;
use simple_error::bail;
use std::sync::{Arc, mpsc};
use threadpool::ThreadPool;

use crate::data_types::candidate_pair::{CandidatePair, ClusterId, PairQueue, SequenceCounter};
use crate::data_types::cluster::{Cluster, SeedTag};
use crate::data_types::cluster_pool::ClusterPool;
use crate::data_types::fragment::FragmentSet;

/// How the agglomeration is run
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum MergeMode {
    /// one thread scores and merges
    Serial,
    /// one merge loop, new candidate pairs are scored on a worker pool
    PhaseParallel,
    /// one independent merge loop per haplotype, each anchored on a cluster from the best seed group
    MultiMerger
}

/// Merge engine parameters
#[derive(Clone, Debug)]
pub struct MergeConfig {
    pub mode: MergeMode,
    /// stop as soon as a merged cluster spans every site
    pub early_exit_on_full_coverage: bool,
    /// worker threads for the parallel modes
    pub threads: usize
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            mode: MergeMode::Serial,
            early_exit_on_full_coverage: false,
            threads: 1
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchedulerState {
    /// pairs have not been queued yet
    Initializing,
    /// popping and merging
    Running,
    /// nothing left to do, the pool holds the final clusters
    Converged
}

/// Counters collected while merging
#[derive(Clone, Debug, Default)]
pub struct MergeStats {
    /// legal pairs queued during initialization
    pub initial_pairs: u64,
    /// successful merges
    pub merges: u64,
    /// pairs that were popped but no longer legal
    pub discarded_pairs: u64,
    /// pairs dropped from the queue because one side was consumed
    pub purged_pairs: u64,
    /// true if a merge loop stopped on full coverage
    pub early_exit: bool
}

impl MergeStats {
    /// Folds another set of counters into this one
    pub fn absorb(&mut self, other: &MergeStats) {
        self.initial_pairs += other.initial_pairs;
        self.merges += other.merges;
        self.discarded_pairs += other.discarded_pairs;
        self.purged_pairs += other.purged_pairs;
        self.early_exit |= other.early_exit;
    }
}

/// What a single scheduler step did
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// two clusters were merged into the given new cluster
    Merged(ClusterId),
    /// the popped pair was stale and thrown away
    Discarded,
    /// a merge produced a cluster spanning every site and early exit is enabled
    EarlyExit(ClusterId),
    /// the queue is empty
    Exhausted
}

/// Best-first agglomerative merging over one pool of clusters
pub struct MergeScheduler {
    /// the fragments every cluster indexes into
    fragments: Arc<FragmentSet>,
    /// the live clusters
    pool: ClusterPool,
    /// candidate pairs, shared with scoring workers
    queue: Arc<PairQueue>,
    config: MergeConfig,
    state: SchedulerState,
    /// scoring workers, only present in phase-parallel mode
    worker_pool: Option<ThreadPool>,
    stats: MergeStats
}

impl MergeScheduler {
    /// Creates a scheduler over an initial set of clusters.
    /// # Arguments
    /// * `fragments` - the fragment set the clusters index into
    /// * `pool` - the starting clusters
    /// * `config` - the merge configuration
    /// * `sequence` - source of queue sequence numbers, may be shared with other schedulers
    pub fn new(fragments: Arc<FragmentSet>, pool: ClusterPool, config: MergeConfig, sequence: SequenceCounter) -> MergeScheduler {
        let worker_pool = if config.mode == MergeMode::PhaseParallel {
            Some(ThreadPool::new(config.threads.max(1)))
        } else {
            None
        };
        MergeScheduler {
            fragments,
            pool,
            queue: Arc::new(PairQueue::new(sequence)),
            config,
            state: SchedulerState::Initializing,
            worker_pool,
            stats: Default::default()
        }
    }

    /// Scores every unordered pair of live clusters and queues the legal ones
    pub fn initialize(&mut self) {
        assert_eq!(self.state, SchedulerState::Initializing);
        let live: Vec<(ClusterId, Arc<Cluster>)> = self.pool.iter()
            .map(|(cid, c)| (cid, c.clone()))
            .collect();
        for (i, (id_a, c_a)) in live.iter().enumerate() {
            for (id_b, c_b) in live[(i+1)..].iter() {
                if let Some(pair) = CandidatePair::score_clusters(*id_a, c_a, *id_b, c_b) {
                    trace!("Initial pair {}-{}: {:.4}", id_a, id_b, pair.score().value());
                    if self.queue.push(pair).is_some() {
                        self.stats.initial_pairs += 1;
                    }
                }
            }
        }
        info!("Queued {} initial pairs from {} clusters", self.stats.initial_pairs, live.len());
        self.state = SchedulerState::Running;
    }

    /// Starts the scheduler from a single pair instead of all pairs
    pub fn seed_pair(&mut self, pair: CandidatePair) {
        assert_eq!(self.state, SchedulerState::Initializing);
        if self.queue.push(pair).is_some() {
            self.stats.initial_pairs += 1;
        }
        self.state = SchedulerState::Running;
    }

    /// Pops the best pair and merges it if it is still legal.
    /// # Errors
    /// * if a scoring worker panics
    pub fn step(&mut self) -> Result<StepOutcome, Box<dyn std::error::Error>> {
        match self.state {
            SchedulerState::Initializing => self.initialize(),
            SchedulerState::Running => {},
            SchedulerState::Converged => return Ok(StepOutcome::Exhausted)
        };

        let entry = match self.queue.pop() {
            Some(e) => e,
            None => {
                self.state = SchedulerState::Converged;
                return Ok(StepOutcome::Exhausted);
            }
        };

        // the pair may have gone stale since it was queued
        let id_a = entry.pair.first();
        let id_b = entry.pair.second();
        let (c_a, c_b) = match (self.pool.get(id_a), self.pool.get(id_b)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => {
                trace!("Discarding stale pair {}-{}", id_a, id_b);
                self.stats.discarded_pairs += 1;
                return Ok(StepOutcome::Discarded);
            }
        };
        let merged: Cluster = match Cluster::merge(&c_a, &c_b, &self.fragments) {
            Some(m) => m,
            None => {
                trace!("Discarding pair {}-{} with shared tags", id_a, id_b);
                self.stats.discarded_pairs += 1;
                return Ok(StepOutcome::Discarded);
            }
        };

        self.stats.purged_pairs += self.queue.remove_involving(&[id_a, id_b]) as u64;
        self.pool.remove(id_a);
        self.pool.remove(id_b);
        let covers_all_sites = merged.covers_all_sites();
        debug!("Merged {}+{} (score {:.4}, seq {}): {} fragments, region {:?}, SADF {}",
            id_a, id_b, entry.pair.score().value(), entry.sequence,
            merged.num_members(), merged.active_region(), merged.sadf());
        let merged_id = self.pool.insert(merged);
        self.stats.merges += 1;

        self.score_against_survivors(merged_id)?;

        if self.config.early_exit_on_full_coverage && covers_all_sites {
            debug!("Cluster {} spans all sites, stopping early", merged_id);
            self.stats.early_exit = true;
            self.state = SchedulerState::Converged;
            return Ok(StepOutcome::EarlyExit(merged_id));
        }
        Ok(StepOutcome::Merged(merged_id))
    }

    /// Queues every legal pair between a newly merged cluster and the other live clusters
    fn score_against_survivors(&mut self, merged_id: ClusterId) -> Result<(), Box<dyn std::error::Error>> {
        let merged: Arc<Cluster> = match self.pool.get(merged_id) {
            Some(m) => m.clone(),
            None => bail!("Merged cluster {} is missing from the pool", merged_id)
        };
        let survivors: Vec<(ClusterId, Arc<Cluster>)> = self.pool.iter()
            .filter(|(cid, _c)| *cid != merged_id)
            .map(|(cid, c)| (cid, c.clone()))
            .collect();

        match self.worker_pool.as_ref() {
            Some(worker_pool) if !survivors.is_empty() => {
                let panics_before = worker_pool.panic_count();
                let num_workers = worker_pool.max_count().max(1);
                let chunk_size = (survivors.len() + num_workers - 1) / num_workers;
                for chunk in survivors.chunks(chunk_size) {
                    let chunk: Vec<(ClusterId, Arc<Cluster>)> = chunk.to_vec();
                    let merged = merged.clone();
                    let queue = self.queue.clone();
                    worker_pool.execute(move || {
                        for (cid, cluster) in chunk.iter() {
                            if let Some(pair) = CandidatePair::score_clusters(merged_id, &merged, *cid, cluster) {
                                queue.push(pair);
                            }
                        }
                    });
                }
                worker_pool.join();
                if worker_pool.panic_count() > panics_before {
                    bail!("Panic detected in scoring ThreadPool while pairing cluster {}", merged_id);
                }
            },
            _ => {
                for (cid, cluster) in survivors.iter() {
                    if let Some(pair) = CandidatePair::score_clusters(merged_id, &merged, *cid, cluster) {
                        self.queue.push(pair);
                    }
                }
            }
        };
        Ok(())
    }

    /// Steps until the queue is exhausted or an early exit triggers
    /// # Errors
    /// * if a scoring worker panics
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            match self.step()? {
                StepOutcome::Merged(_) | StepOutcome::Discarded => {},
                StepOutcome::EarlyExit(_) | StepOutcome::Exhausted => break
            };
        }
        debug!("Merging converged: {:?}, {} clusters remain", self.stats, self.pool.len());
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    pub fn pool(&self) -> &ClusterPool {
        &self.pool
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn into_pool(self) -> ClusterPool {
        self.pool
    }
}

/// Picks the seed group with the highest mean support and, for each of its clusters,
/// the best-scoring legal pair with a cluster from any other group.
/// Returns one (anchor, best pair) entry per cluster of the chosen group, in id order.
/// # Arguments
/// * `pool` - the seeded clusters, each carrying a single tag
/// * `ploidy` - the expected number of clusters per seed group
pub fn select_anchor_pairs(pool: &ClusterPool, ploidy: usize) -> Vec<(ClusterId, Option<CandidatePair>)> {
    let mut groups: HashMap<SeedTag, Vec<ClusterId>> = Default::default();
    for (cid, cluster) in pool.iter() {
        if cluster.tags().len() == 1 {
            let tag = cluster.sorted_tags()[0];
            groups.entry(tag).or_default().push(cid);
        }
    }

    // highest mean support wins, ties go to the lowest tag
    let mut best_group: Option<(SeedTag, u64)> = None;
    let mut tags: Vec<SeedTag> = groups.keys().copied().collect();
    tags.sort_unstable();
    for tag in tags.into_iter() {
        let members = &groups[&tag];
        if members.len() != ploidy {
            continue;
        }
        // compare sum * ploidy instead of the mean, every complete group has the same size
        let total_support: u64 = members.iter()
            .filter_map(|&cid| pool.get(cid))
            .map(|c| c.num_members() as u64)
            .sum();
        if best_group.map(|(_t, best)| total_support > best).unwrap_or(true) {
            best_group = Some((tag, total_support));
        }
    }

    let best_tag = match best_group {
        Some((tag, support)) => {
            debug!("Anchor seed group {} with mean support {:.2}", tag, support as f64 / ploidy as f64);
            tag
        },
        None => return vec![]
    };

    let anchors: &[ClusterId] = &groups[&best_tag];
    anchors.iter()
        .filter_map(|&anchor_id| pool.get(anchor_id).map(|anchor| (anchor_id, anchor)))
        .map(|(anchor_id, anchor)| {
            let mut best_pair: Option<CandidatePair> = None;
            for (cid, cluster) in pool.iter() {
                if anchors.contains(&cid) {
                    continue;
                }
                if let Some(pair) = CandidatePair::score_clusters(anchor_id, anchor, cid, cluster) {
                    // strictly better only, so ties keep the lowest partner id
                    if best_pair.map(|bp| pair.score() > bp.score()).unwrap_or(true) {
                        best_pair = Some(pair);
                    }
                }
            }
            (anchor_id, best_pair)
        })
        .collect()
}

/// Returns the highest-SADF live cluster, ties go to the lowest id
fn best_sadf_cluster(pool: &ClusterPool) -> Option<Arc<Cluster>> {
    let mut best: Option<&Arc<Cluster>> = None;
    for (_cid, cluster) in pool.iter() {
        if best.map(|b| cluster.sadf() > b.sadf()).unwrap_or(true) {
            best = Some(cluster);
        }
    }
    best.cloned()
}

/// One merger job: merges outward from a single seed pair on a private pool and reports the best cluster
fn run_single_merger(
    fragments: Arc<FragmentSet>, pool: ClusterPool, anchor_id: ClusterId, seed_pair: Option<CandidatePair>,
    sequence: SequenceCounter, early_exit_on_full_coverage: bool
) -> Result<(Arc<Cluster>, MergeStats), String> {
    let seed_pair = match seed_pair {
        Some(sp) => sp,
        None => {
            // nothing overlaps the anchor, it is reported as-is
            return match pool.get(anchor_id) {
                Some(anchor) => Ok((anchor.clone(), Default::default())),
                None => Err(format!("Anchor cluster {anchor_id} is missing from the pool"))
            };
        }
    };

    let config = MergeConfig {
        mode: MergeMode::Serial,
        early_exit_on_full_coverage,
        threads: 1
    };
    let mut scheduler = MergeScheduler::new(fragments, pool, config, sequence);
    scheduler.seed_pair(seed_pair);
    scheduler.run().map_err(|e| e.to_string())?;

    let stats = scheduler.stats().clone();
    match best_sadf_cluster(scheduler.pool()) {
        Some(best) => Ok((best, stats)),
        None => Err(format!("Merger anchored on {anchor_id} finished with an empty pool"))
    }
}

/// Runs one merger per anchor of the best seed group on a thread pool, each on its own snapshot of the pool.
/// Returns the cluster reported by each merger, in anchor order, and the summed counters.
/// # Arguments
/// * `fragments` - the fragment set the clusters index into
/// * `pool` - the seeded clusters
/// * `ploidy` - the number of haplotypes, which is also the number of mergers
/// * `threads` - the number of worker threads
/// * `early_exit_on_full_coverage` - if true, each merger stops once it builds a cluster spanning every site
/// # Errors
/// * if a merger panics or fails to report
pub fn run_multi_merger(fragments: Arc<FragmentSet>, pool: ClusterPool, ploidy: usize, threads: usize, early_exit_on_full_coverage: bool)
    -> Result<(Vec<Arc<Cluster>>, MergeStats), Box<dyn std::error::Error>> {
    let anchors = select_anchor_pairs(&pool, ploidy);
    let mut stats: MergeStats = Default::default();
    if anchors.is_empty() {
        warn!("No complete seed group available to anchor the mergers");
        return Ok((vec![], stats));
    }

    let num_mergers = anchors.len();
    info!("Starting {} mergers on {} threads...", num_mergers, threads.max(1).min(num_mergers));
    let sequence = SequenceCounter::new();
    let worker_pool = ThreadPool::new(threads.max(1).min(num_mergers));
    let (tx, rx) = mpsc::channel();
    for (merger_index, (anchor_id, seed_pair)) in anchors.into_iter().enumerate() {
        let tx = tx.clone();
        let fragments = fragments.clone();
        let snapshot = pool.clone();
        let sequence = sequence.clone();
        worker_pool.execute(move || {
            // dynamic errors cannot be sent via mpsc, so they are flattened to strings here
            let result = run_single_merger(fragments, snapshot, anchor_id, seed_pair, sequence, early_exit_on_full_coverage);
            // the receiver only goes away if the caller already bailed
            let _ = tx.send((merger_index, result));
        });
    }
    // only the workers hold senders now, a panicked worker drops its sender without sending
    drop(tx);

    let mut reported: Vec<Option<Arc<Cluster>>> = vec![None; num_mergers];
    for _ in 0..num_mergers {
        let (merger_index, result) = match rx.recv() {
            Ok(r) => r,
            Err(_) => bail!("Merger thread exited without reporting, {} panics detected in ThreadPool", worker_pool.panic_count())
        };
        let (best, merger_stats) = match result {
            Ok(r) => r,
            Err(e) => bail!("Merger {} failed: {}", merger_index, e)
        };
        debug!("Merger {} reported {} fragments, region {:?}, SADF {}", merger_index, best.num_members(), best.active_region(), best.sadf());
        stats.absorb(&merger_stats);
        reported[merger_index] = Some(best);
    }
    worker_pool.join();
    if worker_pool.panic_count() > 0 {
        bail!("Panic detected in merger ThreadPool, check above for details.");
    }

    Ok((reported.into_iter().flatten().collect(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::fragment::Fragment;
    use crate::seeder::{Seeder, SeedingConfig};
    use std::str::FromStr;

    const HAPLOTYPES: [&str; 2] = ["0101101001", "1010010110"];

    /// every window of length 4 from two complementary haplotypes, each read twice
    fn build_fragments() -> FragmentSet {
        let mut fragment_set = FragmentSet::new();
        let num_sites = HAPLOTYPES[0].len();
        for start in 0..(num_sites - 3) {
            for hap in HAPLOTYPES.iter() {
                for _ in 0..2 {
                    fragment_set.insert(Fragment::from_pattern(start, &hap[start..(start+4)]).unwrap());
                }
            }
        }
        fragment_set
    }

    fn seed_pool(fragments: &FragmentSet) -> ClusterPool {
        let config = SeedingConfig {
            ploidy: 2,
            alpha: 2.0,
            beta: 1,
            seed_length: 3,
            max_seed_span: 4,
            inclusive_seeding: true,
            max_twist_rounds: 100
        };
        let (clusters, _stats) = Seeder::new(fragments, config).run();
        let mut pool = ClusterPool::new();
        for cluster in clusters.into_iter() {
            pool.insert(cluster);
        }
        pool
    }

    fn mode_config(mode: MergeMode, threads: usize) -> MergeConfig {
        MergeConfig {
            mode,
            early_exit_on_full_coverage: false,
            threads
        }
    }

    #[test]
    fn test_merge_mode_strings() {
        assert_eq!(MergeMode::from_str("serial").unwrap(), MergeMode::Serial);
        assert_eq!(MergeMode::from_str("phase-parallel").unwrap(), MergeMode::PhaseParallel);
        assert_eq!(MergeMode::from_str("multi-merger").unwrap(), MergeMode::MultiMerger);
        assert!(MergeMode::from_str("parallel").is_err());
        assert_eq!(MergeMode::MultiMerger.to_string(), "multi-merger");
    }

    #[test]
    fn test_step_lifecycle() {
        let mut fragment_set = FragmentSet::new();
        for pattern in ["000", "001", "011"] {
            fragment_set.insert(Fragment::from_pattern(0, pattern).unwrap());
        }
        let fragments = Arc::new(fragment_set);
        let mut pool = ClusterPool::new();
        pool.insert(Cluster::from_members(&fragments, [0, 1], 0));
        pool.insert(Cluster::from_members(&fragments, [1, 2], 1));
        pool.insert(Cluster::from_members(&fragments, [1], 2));

        let mut scheduler = MergeScheduler::new(fragments, pool, Default::default(), SequenceCounter::new());
        assert_eq!(scheduler.state(), SchedulerState::Initializing);
        scheduler.initialize();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.stats().initial_pairs, 3);

        // a pair pointing at a cluster that does not exist is thrown away when popped
        let perfect = crate::data_types::candidate_pair::JaccardScore::new(1, 1).unwrap();
        scheduler.queue.push(CandidatePair::new(0, 9, perfect));
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Discarded);
        assert_eq!(scheduler.stats().discarded_pairs, 1);

        // 0-2 and 1-2 tie at 1/2 ahead of 0-1 at 1/3, and 0-2 was queued first
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Merged(3));
        assert_eq!(scheduler.stats().purged_pairs, 2);
        // the only remaining pairing is 1 with 3
        assert_eq!(scheduler.queue_len(), 1);
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Merged(4));
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Exhausted);
        assert_eq!(scheduler.state(), SchedulerState::Converged);
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Exhausted);
        assert_eq!(scheduler.stats().merges, 2);

        let pool = scheduler.into_pool();
        assert_eq!(pool.len(), 1);
        let (_cid, last) = pool.iter().next().unwrap();
        assert_eq!(last.sorted_tags(), vec![0, 1, 2]);
        assert_eq!(last.num_members(), 3);
    }

    #[test]
    fn test_serial_merge_error_free() {
        let fragments = Arc::new(build_fragments());
        let pool = seed_pool(&fragments);
        assert!(pool.len() >= 4);

        let mut scheduler = MergeScheduler::new(fragments.clone(), pool, mode_config(MergeMode::Serial, 1), SequenceCounter::new());
        scheduler.run().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Converged);
        assert!(scheduler.stats().merges > 0);

        let pool = scheduler.into_pool();
        let full: Vec<&Arc<Cluster>> = pool.iter()
            .map(|(_cid, c)| c)
            .filter(|c| c.covers_all_sites())
            .collect();
        assert!(!full.is_empty());
        for (_cid, cluster) in pool.iter() {
            assert_eq!(cluster.mec(), 0);
            let consensus = cluster.consensus();
            let pattern = consensus.pattern();
            let (start, end) = cluster.active_region().unwrap();
            assert!(HAPLOTYPES.iter().any(|h| h[start..=end] == pattern));
        }
    }

    #[test]
    fn test_early_exit() {
        let fragments = Arc::new(build_fragments());
        let pool = seed_pool(&fragments);
        let config = MergeConfig {
            mode: MergeMode::Serial,
            early_exit_on_full_coverage: true,
            threads: 1
        };
        let mut scheduler = MergeScheduler::new(fragments, pool, config, SequenceCounter::new());
        scheduler.run().unwrap();
        assert!(scheduler.stats().early_exit);
        assert!(scheduler.pool().iter().any(|(_cid, c)| c.covers_all_sites()));
    }

    #[test]
    fn test_phase_parallel_matches_serial() {
        let fragments = Arc::new(build_fragments());
        let pool = seed_pool(&fragments);

        let mut serial = MergeScheduler::new(fragments.clone(), pool.clone(), mode_config(MergeMode::Serial, 1), SequenceCounter::new());
        serial.run().unwrap();
        let mut parallel = MergeScheduler::new(fragments, pool, mode_config(MergeMode::PhaseParallel, 4), SequenceCounter::new());
        parallel.run().unwrap();

        // the merges themselves can differ in tie order, but the outcome quality must not
        for scheduler in [&serial, &parallel] {
            for (_cid, cluster) in scheduler.pool().iter() {
                assert_eq!(cluster.mec(), 0);
            }
            assert!(scheduler.pool().iter().any(|(_cid, c)| c.covers_all_sites()));
        }
    }

    #[test]
    fn test_select_anchor_pairs() {
        let mut fragment_set = FragmentSet::new();
        for pattern in ["00", "01", "10", "11", "0-", "1-"] {
            fragment_set.insert(Fragment::from_pattern(0, pattern).unwrap());
        }
        let mut pool = ClusterPool::new();
        // group 0 has mean support 1, group 1 has mean support 2
        pool.insert(Cluster::from_members(&fragment_set, [0], 0));
        pool.insert(Cluster::from_members(&fragment_set, [1], 0));
        pool.insert(Cluster::from_members(&fragment_set, [0, 4], 1));
        pool.insert(Cluster::from_members(&fragment_set, [2, 5], 1));
        // incomplete group is never picked
        pool.insert(Cluster::from_members(&fragment_set, [0, 1, 2, 3, 4], 2));

        let anchors = select_anchor_pairs(&pool, 2);
        assert_eq!(anchors.len(), 2);
        let (anchor_2, pair_2) = anchors[0];
        assert_eq!(anchor_2, 2);
        // 2 vs 0 scores 1/2, 2 vs 4 scores 2/5
        let pair_2 = pair_2.unwrap();
        assert_eq!((pair_2.first(), pair_2.second()), (0, 2));

        let (anchor_3, pair_3) = anchors[1];
        assert_eq!(anchor_3, 3);
        // only the incomplete group overlaps cluster 3
        let pair_3 = pair_3.unwrap();
        assert_eq!((pair_3.first(), pair_3.second()), (3, 4));

        assert!(select_anchor_pairs(&ClusterPool::new(), 2).is_empty());
    }

    #[test]
    fn test_multi_merger() {
        let fragments = Arc::new(build_fragments());
        let pool = seed_pool(&fragments);
        for early_exit_on_full_coverage in [false, true] {
            let (reported, stats) = run_multi_merger(fragments.clone(), pool.clone(), 2, 2, early_exit_on_full_coverage).unwrap();
            assert_eq!(reported.len(), 2);
            assert!(stats.merges > 0);
            for cluster in reported.iter() {
                assert_eq!(cluster.mec(), 0);
            }
            if !early_exit_on_full_coverage {
                assert!(!stats.early_exit);
            }
        }
    }
}
