
use bit_vec::BitVec;
use log::trace;
use rustc_hash::FxHashSet as HashSet;

use crate::data_types::fragment::{Allele, Fragment, FragmentId, FragmentSet};

/// Identifies the seed group a cluster was created from
pub type SeedTag = u32;

/// How a consensus resolves a site where the 0 and 1 counts are equal
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TiePolicy {
    /// ties become a gap, used for cluster consensus
    Gap,
    /// ties become '0', used for raw fragment-set consensus
    Zero
}

/// Resolves a single site from its weighted counts.
/// # Arguments
/// * `num0` - weighted count of '0' calls
/// * `num1` - weighted count of '1' calls
/// * `policy` - what to emit when the counts are equal
pub fn consensus_allele(num0: u64, num1: u64, policy: TiePolicy) -> Allele {
    if num0 > num1 {
        Allele::Zero
    } else if num1 > num0 {
        Allele::One
    } else {
        match policy {
            TiePolicy::Gap => Allele::Gap,
            TiePolicy::Zero => Allele::Zero
        }
    }
}

/// A candidate haplotype: a set of supporting fragments with per-site allele counts.
/// All counts are weighted by fragment frequency.
#[derive(Clone, Debug)]
pub struct Cluster {
    /// weighted count of '0' calls per site
    num0: Vec<u64>,
    /// weighted count of '1' calls per site
    num1: Vec<u64>,
    /// number of member fragments whose span covers each site, gaps included
    depth: Vec<u32>,
    /// inclusive (start, end) of the sites covered by any member fragment
    active_region: Option<(usize, usize)>,
    /// membership over fragment ids
    members: BitVec,
    /// cached number of set bits in `members`
    num_members: usize,
    /// sum of member frequencies
    weight: u64,
    /// seed groups that contributed to this cluster
    tags: HashSet<SeedTag>
}

impl Cluster {
    /// Creates an empty, untagged cluster.
    /// # Arguments
    /// * `num_sites` - the number of sites in the problem
    /// * `num_fragments` - the number of unique fragments in the problem
    pub fn new(num_sites: usize, num_fragments: usize) -> Cluster {
        Cluster {
            num0: vec![0; num_sites],
            num1: vec![0; num_sites],
            depth: vec![0; num_sites],
            active_region: None,
            members: BitVec::from_elem(num_fragments, false),
            num_members: 0,
            weight: 0,
            tags: Default::default()
        }
    }

    /// Creates an empty cluster carrying a single seed tag
    pub fn with_tag(num_sites: usize, num_fragments: usize, tag: SeedTag) -> Cluster {
        let mut cluster = Cluster::new(num_sites, num_fragments);
        cluster.tags.insert(tag);
        cluster
    }

    /// Creates a tagged cluster from a collection of fragment ids.
    /// # Arguments
    /// * `fragments` - the fragment set the ids index into
    /// * `ids` - the member fragments, duplicates are ignored
    /// * `tag` - the seed tag for the new cluster
    pub fn from_members<I>(fragments: &FragmentSet, ids: I, tag: SeedTag) -> Cluster
    where I: IntoIterator<Item = FragmentId> {
        let mut cluster = Cluster::with_tag(fragments.num_sites(), fragments.len(), tag);
        for fragment_id in ids {
            cluster.add_fragment(fragment_id, fragments.get(fragment_id));
        }
        cluster
    }

    /// Adds a fragment to the cluster, updating counts and the active region.
    /// Returns false if the fragment was already a member.
    /// # Arguments
    /// * `fragment_id` - the id of the fragment in its `FragmentSet`
    /// * `fragment` - the fragment itself
    /// # Panics
    /// * if the id or the fragment span fall outside of the dimensions this cluster was built with
    pub fn add_fragment(&mut self, fragment_id: FragmentId, fragment: &Fragment) -> bool {
        if self.contains(fragment_id) {
            return false;
        }
        self.members.set(fragment_id, true);
        self.num_members += 1;
        self.weight += fragment.frequency();

        let frequency = fragment.frequency();
        for (site, allele) in fragment.region().zip(fragment.alleles().iter()) {
            self.depth[site] += 1;
            match allele {
                Allele::Zero => self.num0[site] += frequency,
                Allele::One => self.num1[site] += frequency,
                Allele::Gap => {}
            };
        }

        if let Some(last_site) = fragment.last_site() {
            self.active_region = match self.active_region {
                Some((start, end)) => Some((start.min(fragment.start()), end.max(last_site))),
                None => Some((fragment.start(), last_site))
            };
        }
        true
    }

    /// Removes a fragment from the cluster, the exact inverse of `add_fragment`.
    /// Returns false if the fragment was not a member.
    /// # Arguments
    /// * `fragment_id` - the id of the fragment in its `FragmentSet`
    /// * `fragment` - the fragment itself
    pub fn remove_fragment(&mut self, fragment_id: FragmentId, fragment: &Fragment) -> bool {
        if !self.contains(fragment_id) {
            return false;
        }
        self.members.set(fragment_id, false);
        self.num_members -= 1;
        self.weight -= fragment.frequency();

        let frequency = fragment.frequency();
        for (site, allele) in fragment.region().zip(fragment.alleles().iter()) {
            self.depth[site] -= 1;
            match allele {
                Allele::Zero => self.num0[site] -= frequency,
                Allele::One => self.num1[site] -= frequency,
                Allele::Gap => {}
            };
        }

        // shrink the region back to the covered sites
        self.active_region = match self.active_region {
            Some((start, end)) if self.num_members > 0 => {
                let new_start = (start..=end).find(|&site| self.depth[site] > 0);
                let new_end = (start..=end).rev().find(|&site| self.depth[site] > 0);
                new_start.zip(new_end)
            },
            _ => None
        };
        true
    }

    pub fn contains(&self, fragment_id: FragmentId) -> bool {
        self.members.get(fragment_id).unwrap_or(false)
    }

    /// Iterates over the member fragment ids in ascending order
    pub fn members(&self) -> impl Iterator<Item = FragmentId> + '_ {
        self.members.iter()
            .enumerate()
            .filter(|(_i, is_member)| *is_member)
            .map(|(i, _is_member)| i)
    }

    pub fn num_members(&self) -> usize {
        self.num_members
    }

    pub fn is_empty(&self) -> bool {
        self.num_members == 0
    }

    /// Sum of the frequencies of all member fragments
    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn tags(&self) -> &HashSet<SeedTag> {
        &self.tags
    }

    /// Returns the tags in ascending order, mostly for reporting
    pub fn sorted_tags(&self) -> Vec<SeedTag> {
        let mut tags: Vec<SeedTag> = self.tags.iter().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn shares_tag(&self, other: &Cluster) -> bool {
        !self.tags.is_disjoint(&other.tags)
    }

    /// Inclusive (start, end) of the sites covered by the members, None when empty
    pub fn active_region(&self) -> Option<(usize, usize)> {
        self.active_region
    }

    /// Number of sites in the active region
    pub fn span_len(&self) -> usize {
        match self.active_region {
            Some((start, end)) => end - start + 1,
            None => 0
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num0.len()
    }

    /// Returns true if the active region spans every site
    pub fn covers_all_sites(&self) -> bool {
        self.num_sites() > 0 && self.span_len() == self.num_sites()
    }

    pub fn num0(&self) -> &[u64] {
        &self.num0
    }

    pub fn num1(&self) -> &[u64] {
        &self.num1
    }

    /// Sum over all sites of |num0 - num1|; higher means more confident
    pub fn sadf(&self) -> u64 {
        self.num0.iter().zip(self.num1.iter())
            .map(|(&n0, &n1)| n0.abs_diff(n1))
            .sum()
    }

    /// Sum over all sites of min(num0, num1), the number of calls disagreeing with the majority
    pub fn mec(&self) -> u64 {
        self.num0.iter().zip(self.num1.iter())
            .map(|(&n0, &n1)| n0.min(n1))
            .sum()
    }

    /// Number of fragments supporting both clusters
    pub fn intersection_size(&self, other: &Cluster) -> usize {
        self.members.blocks().zip(other.members.blocks())
            .map(|(b1, b2)| (b1 & b2).count_ones() as usize)
            .sum()
    }

    /// Two clusters may merge iff they have no seed group in common and share at least one fragment
    pub fn can_merge(&self, other: &Cluster) -> bool {
        !self.shares_tag(other) && self.intersection_size(other) > 0
    }

    /// Builds the union of two clusters: members, counts and tags.
    /// Returns None if the clusters share a tag. Intersection is not checked here, see `can_merge`.
    /// # Arguments
    /// * `c1` - the first cluster
    /// * `c2` - the second cluster
    /// * `fragments` - the fragment set both clusters index into
    pub fn merge(c1: &Cluster, c2: &Cluster, fragments: &FragmentSet) -> Option<Cluster> {
        if c1.shares_tag(c2) {
            return None;
        }

        // start from the bigger side so fewer fragments need to be added
        let (base, extra) = if c1.num_members >= c2.num_members { (c1, c2) } else { (c2, c1) };
        let mut merged = base.clone();
        for fragment_id in extra.members() {
            merged.add_fragment(fragment_id, fragments.get(fragment_id));
        }
        merged.tags.extend(extra.tags.iter().copied());
        Some(merged)
    }

    /// Majority allele per site over the active region, ties become gaps.
    /// An empty cluster yields an empty fragment at site 0.
    pub fn consensus(&self) -> Fragment {
        match self.active_region {
            Some((start, end)) => {
                let alleles: Vec<Allele> = (start..=end)
                    .map(|site| consensus_allele(self.num0[site], self.num1[site], TiePolicy::Gap))
                    .collect();
                Fragment::new(start, alleles)
            },
            None => Fragment::new(0, vec![])
        }
    }

    /// Checks whether a single fragment agrees with the strict majority at every site it calls
    fn agrees_with_majority(&self, fragment: &Fragment) -> bool {
        fragment.region().zip(fragment.alleles().iter())
            .all(|(site, allele)| {
                match allele {
                    Allele::Zero => self.num0[site] > self.num1[site],
                    Allele::One => self.num1[site] > self.num0[site],
                    Allele::Gap => true
                }
            })
    }

    /// Removes every member with a call that is not the strict majority at its site.
    /// All members are judged against the counts before any removal. Returns the number removed.
    /// # Arguments
    /// * `fragments` - the fragment set this cluster indexes into
    pub fn remove_conflicting_fragments(&mut self, fragments: &FragmentSet) -> usize {
        let conflicting: Vec<FragmentId> = self.members()
            .filter(|&fragment_id| !self.agrees_with_majority(fragments.get(fragment_id)))
            .collect();
        for &fragment_id in conflicting.iter() {
            trace!("Removing conflicting fragment {}", fragment_id);
            self.remove_fragment(fragment_id, fragments.get(fragment_id));
        }
        conflicting.len()
    }

    /// Returns true if this cluster adds nothing over `other`: its active region lies inside the other's
    /// and every called site of its consensus matches the other's consensus.
    pub fn is_redundant_with(&self, other: &Cluster) -> bool {
        let (start, end) = match (self.active_region, other.active_region) {
            (Some((s1, e1)), Some((s2, e2))) if s2 <= s1 && e1 <= e2 => (s1, e1),
            _ => return false
        };
        (start..=end).all(|site| {
            let allele = consensus_allele(self.num0[site], self.num1[site], TiePolicy::Gap);
            !allele.is_call() || allele == consensus_allele(other.num0[site], other.num1[site], TiePolicy::Gap)
        })
    }
}

/// Repeatedly strips conflicting fragments from every cluster until a pass removes nothing.
/// Clusters that end up empty are dropped. Returns the surviving clusters and the total number of removals.
/// # Arguments
/// * `clusters` - the clusters to clean
/// * `fragments` - the fragment set the clusters index into
pub fn remove_conflicting_fragments(mut clusters: Vec<Cluster>, fragments: &FragmentSet) -> (Vec<Cluster>, usize) {
    let mut total_removed: usize = 0;
    loop {
        let removed: usize = clusters.iter_mut()
            .map(|cluster| cluster.remove_conflicting_fragments(fragments))
            .sum();
        clusters.retain(|cluster| !cluster.is_empty());
        total_removed += removed;
        if removed == 0 {
            break;
        }
    }
    (clusters, total_removed)
}

/// Majority allele per site over the combined span of a raw collection of fragments, ties become '0'.
/// An empty collection yields an empty fragment at site 0.
/// # Arguments
/// * `fragments` - the fragments to combine, weighted by their frequency
pub fn fragment_set_consensus<'a, I>(fragments: I) -> Fragment
where I: IntoIterator<Item = &'a Fragment> {
    let fragments: Vec<&Fragment> = fragments.into_iter()
        .filter(|f| !f.is_empty())
        .collect();
    let start = match fragments.iter().map(|f| f.start()).min() {
        Some(s) => s,
        None => return Fragment::new(0, vec![])
    };
    let end = fragments.iter().map(|f| f.region().end).max().unwrap_or(start);

    let mut num0: Vec<u64> = vec![0; end - start];
    let mut num1: Vec<u64> = vec![0; end - start];
    for fragment in fragments.iter() {
        for (site, allele) in fragment.region().zip(fragment.alleles().iter()) {
            match allele {
                Allele::Zero => num0[site - start] += fragment.frequency(),
                Allele::One => num1[site - start] += fragment.frequency(),
                Allele::Gap => {}
            };
        }
    }

    let alleles: Vec<Allele> = num0.iter().zip(num1.iter())
        .map(|(&n0, &n1)| consensus_allele(n0, n1, TiePolicy::Zero))
        .collect();
    Fragment::new(start, alleles)
}
