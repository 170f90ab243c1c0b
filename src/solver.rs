
use cpu_time::ProcessTime;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::data_types::cluster::{Cluster, SeedTag, fragment_set_consensus, remove_conflicting_fragments};
use crate::data_types::cluster_pool::ClusterPool;
use crate::data_types::candidate_pair::SequenceCounter;
use crate::data_types::fragment::{Fragment, FragmentSet};
use crate::merge_scheduler::{MergeConfig, MergeMode, MergeScheduler, MergeStats, run_multi_merger};
use crate::seeder::{Seeder, SeedingConfig, SeedingStats};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("ploidy must be at least 2, got {0}")]
    PloidyTooLow(usize),
    #[error("alpha must be a positive number, got {0}")]
    InvalidAlpha(f64),
    #[error("seed length must be at least 1")]
    EmptySeed,
    #[error("maximum seed span must be at least 1")]
    EmptySeedSpan,
    #[error("maximum twist rounds must be at least 1")]
    NoTwistRounds,
    #[error("thread count must be at least 1")]
    NoThreads
}

/// Every knob of a solver run
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// number of haplotypes to reconstruct
    pub ploidy: usize,
    /// twist size cutoff divisor
    pub alpha: f64,
    /// allowed shortfall between a fragment's best similarity and its length during twisting
    pub beta: usize,
    /// number of sites per seed tuple
    pub seed_length: usize,
    /// seed tuples must satisfy last - first < max_seed_span
    pub max_seed_span: usize,
    /// accept seed tuples with exactly `ploidy` distinct patterns
    pub inclusive_seeding: bool,
    /// twist round limit per seed group
    pub max_twist_rounds: usize,
    pub merge_mode: MergeMode,
    /// stop merging once a cluster spans every site
    pub early_exit_on_full_coverage: bool,
    /// worker threads for the parallel merge modes
    pub threads: usize,
    /// strip minority-allele fragments from the seeds before merging
    pub remove_conflicting_fragments: bool,
    /// drop output clusters that repeat a better cluster
    pub prune_redundant: bool
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ploidy: 2,
            alpha: 2.0,
            beta: 1,
            seed_length: 3,
            max_seed_span: 8,
            inclusive_seeding: false,
            max_twist_rounds: 100,
            merge_mode: MergeMode::Serial,
            early_exit_on_full_coverage: false,
            threads: 1,
            remove_conflicting_fragments: false,
            prune_redundant: false
        }
    }
}

impl SolverConfig {
    /// Checks every value range
    /// # Errors
    /// * the first out-of-range value found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ploidy < 2 {
            return Err(ConfigError::PloidyTooLow(self.ploidy));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        if self.seed_length == 0 {
            return Err(ConfigError::EmptySeed);
        }
        if self.max_seed_span == 0 {
            return Err(ConfigError::EmptySeedSpan);
        }
        if self.max_twist_rounds == 0 {
            return Err(ConfigError::NoTwistRounds);
        }
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        Ok(())
    }

    pub fn seeding_config(&self) -> SeedingConfig {
        SeedingConfig {
            ploidy: self.ploidy,
            alpha: self.alpha,
            beta: self.beta,
            seed_length: self.seed_length,
            max_seed_span: self.max_seed_span,
            inclusive_seeding: self.inclusive_seeding,
            max_twist_rounds: self.max_twist_rounds
        }
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            mode: self.merge_mode,
            early_exit_on_full_coverage: self.early_exit_on_full_coverage,
            threads: self.threads
        }
    }
}

/// One reconstructed haplotype with the support behind it
#[derive(Clone, Debug)]
pub struct HaplotypeResult {
    /// majority consensus over the active region, ties are gaps
    pub consensus: Fragment,
    /// number of unique supporting fragments
    pub num_fragments: usize,
    /// summed frequency of the supporting fragments
    pub weight: u64,
    pub sadf: u64,
    pub mec: u64,
    /// seed groups merged into this haplotype, ascending
    pub tags: Vec<SeedTag>
}

impl HaplotypeResult {
    fn from_cluster(cluster: &Cluster) -> HaplotypeResult {
        HaplotypeResult {
            consensus: cluster.consensus(),
            num_fragments: cluster.num_members(),
            weight: cluster.weight(),
            sadf: cluster.sadf(),
            mec: cluster.mec(),
            tags: cluster.sorted_tags()
        }
    }
}

/// Counters for a full solver run
#[derive(Clone, Debug, Default)]
pub struct SolverStats {
    /// unique fragments in the input
    pub num_fragments: usize,
    /// number of sites spanned by the input
    pub num_sites: usize,
    /// summed fragment frequencies
    pub total_weight: u64,
    pub seeding: SeedingStats,
    /// fragments removed from seeds by the conflict filter
    pub conflicting_fragments_removed: usize,
    pub merge: MergeStats,
    /// output clusters dropped as redundant
    pub redundant_pruned: usize,
    /// process CPU time spent in the solver
    pub cpu_seconds: f64
}

pub struct SolverResult {
    /// the haplotypes, descending by SADF
    pub haplotypes: Vec<HaplotypeResult>,
    pub statistics: SolverStats
}

/// Drops every cluster that is redundant with a cluster ranked ahead of it.
/// Returns the survivors in their original order and the number dropped.
/// No survivor is redundant with one ranked ahead of it, so a second pass drops nothing.
/// # Arguments
/// * `clusters` - candidate outputs, best first
pub fn prune_redundant_clusters(clusters: Vec<Arc<Cluster>>) -> (Vec<Arc<Cluster>>, usize) {
    let mut kept: Vec<Arc<Cluster>> = Vec::with_capacity(clusters.len());
    let mut pruned: usize = 0;
    for cluster in clusters.into_iter() {
        if kept.iter().any(|k| cluster.is_redundant_with(k)) {
            pruned += 1;
        } else {
            kept.push(cluster);
        }
    }
    (kept, pruned)
}

/// Runs the full reconstruction: seeding, twisting, merging and the optional filters.
/// # Arguments
/// * `fragments` - the unique input fragments
/// * `config` - the solver configuration
/// # Errors
/// * if the configuration is out of range
/// * if a merge worker panics or fails to report
pub fn solve(fragments: FragmentSet, config: &SolverConfig) -> Result<SolverResult, Box<dyn std::error::Error>> {
    config.validate()?;
    let start_time = ProcessTime::now();
    let fragments: Arc<FragmentSet> = Arc::new(fragments);

    let mut statistics = SolverStats {
        num_fragments: fragments.len(),
        num_sites: fragments.num_sites(),
        total_weight: fragments.total_weight(),
        ..Default::default()
    };
    info!("Solving {} unique fragments ({} reads) over {} sites with ploidy {}",
        statistics.num_fragments, statistics.total_weight, statistics.num_sites, config.ploidy);
    if fragments.is_empty() {
        warn!("No fragments were provided, nothing to solve");
        return Ok(SolverResult {
            haplotypes: vec![],
            statistics
        });
    }

    if log::log_enabled!(log::Level::Debug) {
        let raw_consensus = fragment_set_consensus(fragments.iter().map(|(_fid, f)| f));
        debug!("Raw input consensus: {}", raw_consensus.pretty_string());
    }

    let (mut seeds, seeding_stats) = Seeder::new(&fragments, config.seeding_config()).run();
    statistics.seeding = seeding_stats;

    if config.remove_conflicting_fragments {
        let (cleaned, removed) = remove_conflicting_fragments(seeds, &fragments);
        info!("Removed {} conflicting fragments, {} seed clusters remain", removed, cleaned.len());
        seeds = cleaned;
        statistics.conflicting_fragments_removed = removed;
    }

    let mut pool = ClusterPool::new();
    for cluster in seeds.into_iter() {
        pool.insert(cluster);
    }

    info!("Merging {} clusters in {} mode...", pool.len(), config.merge_mode);
    let mut clusters: Vec<Arc<Cluster>> = match config.merge_mode {
        MergeMode::Serial | MergeMode::PhaseParallel => {
            let mut scheduler = MergeScheduler::new(fragments.clone(), pool, config.merge_config(), SequenceCounter::new());
            scheduler.run()?;
            statistics.merge = scheduler.stats().clone();
            scheduler.into_pool().into_clusters()
        },
        MergeMode::MultiMerger => {
            let (reported, merge_stats) = run_multi_merger(fragments.clone(), pool, config.ploidy, config.threads, config.early_exit_on_full_coverage)?;
            statistics.merge = merge_stats;
            reported
        }
    };
    info!("Merging finished after {} merges, {} candidate clusters", statistics.merge.merges, clusters.len());

    // stable, so equal SADF keeps pool order
    clusters.sort_by_key(|c| std::cmp::Reverse(c.sadf()));

    if config.prune_redundant {
        let (kept, pruned) = prune_redundant_clusters(clusters);
        debug!("Pruned {} redundant clusters", pruned);
        clusters = kept;
        statistics.redundant_pruned = pruned;
    }

    let haplotypes: Vec<HaplotypeResult> = clusters.iter()
        .map(|c| HaplotypeResult::from_cluster(c))
        .collect();
    statistics.cpu_seconds = start_time.elapsed().as_secs_f64();
    info!("Reconstructed {} haplotypes in {:.3} CPU seconds", haplotypes.len(), statistics.cpu_seconds);

    Ok(SolverResult {
        haplotypes,
        statistics
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HAPLOTYPES: [&str; 2] = ["0101101001", "1010010110"];

    /// every window of length 4 from two complementary haplotypes, each read twice
    fn build_fragments(extra: &[(usize, &str)]) -> FragmentSet {
        let mut fragment_set = FragmentSet::new();
        let num_sites = HAPLOTYPES[0].len();
        for start in 0..(num_sites - 3) {
            for hap in HAPLOTYPES.iter() {
                for _ in 0..2 {
                    fragment_set.insert(Fragment::from_pattern(start, &hap[start..(start+4)]).unwrap());
                }
            }
        }
        for &(start, pattern) in extra.iter() {
            fragment_set.insert(Fragment::from_pattern(start, pattern).unwrap());
        }
        fragment_set
    }

    fn test_config(merge_mode: MergeMode) -> SolverConfig {
        SolverConfig {
            inclusive_seeding: true,
            max_seed_span: 4,
            merge_mode,
            threads: 2,
            ..Default::default()
        }
    }

    fn sorted_patterns(result: &SolverResult) -> Vec<String> {
        let mut patterns: Vec<String> = result.haplotypes.iter()
            .map(|h| h.consensus.pattern())
            .collect();
        patterns.sort();
        patterns
    }

    #[test]
    fn test_validate() {
        assert_eq!(SolverConfig::default().validate(), Ok(()));
        let bad = |f: fn(&mut SolverConfig)| {
            let mut config = SolverConfig::default();
            f(&mut config);
            config.validate()
        };
        assert_eq!(bad(|c| c.ploidy = 1), Err(ConfigError::PloidyTooLow(1)));
        assert_eq!(bad(|c| c.alpha = 0.0), Err(ConfigError::InvalidAlpha(0.0)));
        assert_eq!(bad(|c| c.seed_length = 0), Err(ConfigError::EmptySeed));
        assert_eq!(bad(|c| c.max_seed_span = 0), Err(ConfigError::EmptySeedSpan));
        assert_eq!(bad(|c| c.max_twist_rounds = 0), Err(ConfigError::NoTwistRounds));
        assert_eq!(bad(|c| c.threads = 0), Err(ConfigError::NoThreads));

        let config = SolverConfig { ploidy: 0, ..Default::default() };
        let error = solve(FragmentSet::new(), &config).err().unwrap();
        assert_eq!(error.downcast_ref::<ConfigError>(), Some(&ConfigError::PloidyTooLow(0)));
    }

    #[test]
    fn test_empty_input() {
        let result = solve(FragmentSet::new(), &SolverConfig::default()).unwrap();
        assert!(result.haplotypes.is_empty());
        assert_eq!(result.statistics.num_fragments, 0);
    }

    #[test]
    fn test_separable_diploid() {
        let result = solve(build_fragments(&[]), &test_config(MergeMode::Serial)).unwrap();
        assert_eq!(result.haplotypes.len(), 2);
        assert_eq!(sorted_patterns(&result), vec![HAPLOTYPES[0].to_string(), HAPLOTYPES[1].to_string()]);
        for haplotype in result.haplotypes.iter() {
            assert_eq!(haplotype.consensus.start(), 0);
            assert_eq!(haplotype.mec, 0);
            assert_eq!(haplotype.num_fragments, 7);
            assert_eq!(haplotype.weight, 14);
        }

        let stats = &result.statistics;
        assert_eq!(stats.num_fragments, 14);
        assert_eq!(stats.num_sites, 10);
        assert_eq!(stats.total_weight, 28);
        assert!(stats.seeding.seed_groups > 0);
        // each haplotype ends as one cluster built from one seed per group
        assert_eq!(stats.merge.merges, 2 * stats.seeding.seed_groups - 2);
    }

    #[test]
    fn test_merge_modes_agree() {
        let serial = solve(build_fragments(&[]), &test_config(MergeMode::Serial)).unwrap();
        let parallel = solve(build_fragments(&[]), &test_config(MergeMode::PhaseParallel)).unwrap();
        assert_eq!(sorted_patterns(&serial), sorted_patterns(&parallel));

        let multi = solve(build_fragments(&[]), &test_config(MergeMode::MultiMerger)).unwrap();
        assert_eq!(multi.haplotypes.len(), 2);
        for haplotype in multi.haplotypes.iter() {
            assert_eq!(haplotype.mec, 0);
            let start = haplotype.consensus.start();
            let pattern = haplotype.consensus.pattern();
            assert!(HAPLOTYPES.iter().any(|h| h[start..(start + pattern.len())] == pattern));
        }
    }

    #[test]
    fn test_solve_from_file() {
        let fragments = crate::fragment_parsing::load_fragments(std::path::Path::new("./test_data/diploid_fragments.tsv")).unwrap();
        assert_eq!(fragments.len(), 14);
        let result = solve(fragments, &test_config(MergeMode::Serial)).unwrap();
        assert_eq!(sorted_patterns(&result), vec![HAPLOTYPES[0].to_string(), HAPLOTYPES[1].to_string()]);
    }

    #[test]
    fn test_sorted_by_sadf() {
        // an extra copy of a first-haplotype read makes it the stronger haplotype
        let result = solve(build_fragments(&[(0, "0101")]), &test_config(MergeMode::Serial)).unwrap();
        assert_eq!(result.haplotypes.len(), 2);
        assert!(result.haplotypes[0].sadf > result.haplotypes[1].sadf);
        assert_eq!(result.haplotypes[0].consensus.pattern(), HAPLOTYPES[0]);
    }

    #[test]
    fn test_filters_on_clean_data() {
        let config = SolverConfig {
            remove_conflicting_fragments: true,
            prune_redundant: true,
            early_exit_on_full_coverage: true,
            ..test_config(MergeMode::Serial)
        };
        let result = solve(build_fragments(&[]), &config).unwrap();
        assert_eq!(result.statistics.conflicting_fragments_removed, 0);
        assert!(result.statistics.merge.early_exit);
        for haplotype in result.haplotypes.iter() {
            assert_eq!(haplotype.mec, 0);
        }
        assert!(result.haplotypes.iter().any(|h| h.consensus.len() == 10));
    }

    #[test]
    fn test_prune_redundant_clusters() {
        let mut fragment_set = FragmentSet::new();
        for (start, pattern) in [(0, "0110"), (1, "11"), (1, "11"), (2, "0")] {
            fragment_set.insert(Fragment::from_pattern(start, pattern).unwrap());
        }
        let full = Arc::new(Cluster::from_members(&fragment_set, [0], 0));
        let inner = Arc::new(Cluster::from_members(&fragment_set, [1], 1));
        let other = Arc::new(Cluster::from_members(&fragment_set, [2], 2));

        let (kept, pruned) = prune_redundant_clusters(vec![full.clone(), inner.clone(), other.clone()]);
        assert_eq!(pruned, 1);
        assert_eq!(kept.len(), 2);
        assert!(Arc::ptr_eq(&kept[0], &full));
        assert!(Arc::ptr_eq(&kept[1], &other));
        // the survivors are already free of redundancy
        let (again, pruned) = prune_redundant_clusters(kept.clone());
        assert_eq!(pruned, 0);
        assert_eq!(again.len(), kept.len());

        // a better-ranked cluster is never pruned by a worse one
        let (kept, pruned) = prune_redundant_clusters(vec![inner, full]);
        assert_eq!(pruned, 0);
        assert_eq!(kept.len(), 2);
    }
}
