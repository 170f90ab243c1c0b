
use log::{debug, info, trace};
use rustc_hash::FxHashMap as HashMap;
use std::cmp::Reverse;

use crate::data_types::cluster::{Cluster, SeedTag};
use crate::data_types::fragment::{Allele, FragmentId, FragmentSet};
use crate::twister::{TwistOutcome, Twister};

/// Parameters controlling seed discovery and refinement
#[derive(Clone, Debug)]
pub struct SeedingConfig {
    /// number of haplotypes, also the number of clusters per seed group
    pub ploidy: usize,
    /// twist size cutoff divisor
    pub alpha: f64,
    /// allowed shortfall between a fragment's best similarity and its length during twisting
    pub beta: usize,
    /// number of sites in each seed tuple
    pub seed_length: usize,
    /// a tuple is only examined if last - first < max_seed_span
    pub max_seed_span: usize,
    /// if true, a tuple needs only `ploidy` distinct patterns instead of `ploidy + 1`
    pub inclusive_seeding: bool,
    /// round limit for twisting a seed group
    pub max_twist_rounds: usize
}

impl SeedingConfig {
    /// A tuple is accepted when its number of distinct patterns exceeds this value
    pub fn variability_threshold(&self) -> usize {
        if self.inclusive_seeding {
            self.ploidy - 1
        } else {
            self.ploidy
        }
    }
}

/// Counters collected while seeding
#[derive(Clone, Debug, Default)]
pub struct SeedingStats {
    /// number of site tuples visited
    pub tuples_examined: u64,
    /// tuples skipped for having too few distinct patterns
    pub low_variability: u64,
    /// seed groups where a cluster collapsed during twisting
    pub twist_failures: u64,
    /// seed groups that hit the twist round limit
    pub unstable_twists: u64,
    /// seed groups that survived twisting
    pub seed_groups: u64
}

/// Enumerates strictly increasing site tuples of a fixed length in lexicographic order,
/// restricted to tuples where the last site minus the first site is below the span limit.
pub struct SiteTuples {
    /// number of sites to draw from
    num_sites: usize,
    /// the exclusive limit on last - first
    max_span: usize,
    /// the tuple to yield next, None once exhausted
    current: Option<Vec<usize>>
}

impl SiteTuples {
    /// Creates the tuple iterator.
    /// # Arguments
    /// * `num_sites` - the sites are 0..num_sites
    /// * `tuple_length` - the number of sites per tuple, at least 1
    /// * `max_span` - only tuples with last - first < max_span are produced
    pub fn new(num_sites: usize, tuple_length: usize, max_span: usize) -> SiteTuples {
        assert!(tuple_length > 0);
        let first: Vec<usize> = (0..tuple_length).collect();
        let current = if tuple_length <= num_sites && tuple_length - 1 < max_span {
            Some(first)
        } else {
            None
        };
        SiteTuples {
            num_sites,
            max_span,
            current
        }
    }

    /// Computes the lexicographic successor of `tuple`, if there is one
    fn successor(&self, tuple: &[usize]) -> Option<Vec<usize>> {
        let length = tuple.len();
        for position in (0..length).rev() {
            // bump this position and pack everything after it as tight as possible
            let value = tuple[position] + 1;
            let last = value + (length - 1 - position);
            let first = if position == 0 { value } else { tuple[0] };
            if last < self.num_sites && last - first < self.max_span {
                let mut next: Vec<usize> = tuple[..position].to_vec();
                next.extend(value..=last);
                return Some(next);
            }
        }
        None
    }
}

impl Iterator for SiteTuples {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.take()?;
        self.current = self.successor(&current);
        Some(current)
    }
}

/// All fragments sharing one exact pattern at a site tuple
#[derive(Clone, Debug, PartialEq)]
pub struct PatternGroup {
    /// the alleles at the tuple sites, never gaps
    pub pattern: Vec<Allele>,
    /// summed frequency of the members
    pub weight: u64,
    /// the fragments carrying this pattern, ascending
    pub members: Vec<FragmentId>
}

/// Finds seed groups by scanning site tuples for well-supported distinct patterns
pub struct Seeder<'a> {
    fragments: &'a FragmentSet,
    config: SeedingConfig
}

impl<'a> Seeder<'a> {
    pub fn new(fragments: &'a FragmentSet, config: SeedingConfig) -> Seeder<'a> {
        Seeder {
            fragments,
            config
        }
    }

    /// Groups the fragments that call every site in the tuple by their pattern there.
    /// Groups are ranked by descending weight, equal weights by ascending pattern.
    /// # Arguments
    /// * `sites` - a strictly increasing, non-empty list of sites
    pub fn pattern_groups(&self, sites: &[usize]) -> Vec<PatternGroup> {
        let first = sites[0];
        let last = sites[sites.len() - 1];

        let mut groups: HashMap<Vec<Allele>, PatternGroup> = Default::default();
        for fragment_id in self.fragments.spanning(first, last) {
            let fragment = self.fragments.get(fragment_id);
            let pattern: Vec<Allele> = sites.iter()
                .map(|&s| fragment.allele(s))
                .collect();
            if pattern.iter().any(|a| !a.is_call()) {
                continue;
            }

            let group = groups.entry(pattern.clone()).or_insert_with(|| PatternGroup {
                pattern,
                weight: 0,
                members: vec![]
            });
            group.weight += fragment.frequency();
            group.members.push(fragment_id);
        }

        let mut ranked: Vec<PatternGroup> = groups.into_values().collect();
        ranked.sort_by(|g1, g2| {
            (Reverse(g1.weight), &g1.pattern).cmp(&(Reverse(g2.weight), &g2.pattern))
        });
        ranked
    }

    /// Runs seeding over every valid tuple, twisting each accepted seed group.
    /// Returns every cluster from the groups that survived, plus the counters.
    pub fn run(&self) -> (Vec<Cluster>, SeedingStats) {
        let ploidy = self.config.ploidy;
        let threshold = self.config.variability_threshold();
        let twister = Twister::new(
            self.fragments, ploidy, self.config.alpha, self.config.beta, self.config.max_twist_rounds
        );

        info!("Seeding with length={}, max span={}, threshold={}...", self.config.seed_length, self.config.max_seed_span, threshold);
        let mut stats: SeedingStats = Default::default();
        let mut clusters: Vec<Cluster> = vec![];
        let mut next_tag: SeedTag = 0;
        let tuples = SiteTuples::new(self.fragments.num_sites(), self.config.seed_length, self.config.max_seed_span);
        for sites in tuples {
            stats.tuples_examined += 1;
            let groups: Vec<PatternGroup> = self.pattern_groups(&sites);
            if groups.len() <= threshold {
                stats.low_variability += 1;
                continue;
            }

            let seeds: Vec<Cluster> = groups.iter()
                .take(ploidy)
                .map(|g| Cluster::from_members(self.fragments, g.members.iter().copied(), next_tag))
                .collect();

            match twister.twist(seeds, next_tag) {
                TwistOutcome::Converged { clusters: twisted, rounds } => {
                    debug!("Seed group {} at {:?} converged after {} rounds, sizes={:?}",
                        next_tag, sites, rounds, twisted.iter().map(|c| c.num_members()).collect::<Vec<usize>>());
                    clusters.extend(twisted);
                    stats.seed_groups += 1;
                    next_tag += 1;
                },
                TwistOutcome::Collapsed { round } => {
                    trace!("Seed at {:?} collapsed in round {}", sites, round);
                    stats.twist_failures += 1;
                },
                TwistOutcome::Unstable { rounds } => {
                    debug!("Seed at {:?} did not converge in {} rounds", sites, rounds);
                    stats.unstable_twists += 1;
                }
            };
        }

        info!("Seeding finished: {} tuples examined, {} seed groups, {} clusters", stats.tuples_examined, stats.seed_groups, clusters.len());
        (clusters, stats)
    }
}
