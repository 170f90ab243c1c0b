
use bio::data_structures::interval_tree::IntervalTree;
use rustc_hash::FxHashMap as HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;

/// Dense index of a fragment inside a `FragmentSet`
pub type FragmentId = usize;

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::FromRepr)]
pub enum Allele {
    Zero=0,
    One=1,
    Gap=2
}

impl Allele {
    /// Converts a pattern symbol into an allele, returns None for anything outside of {'0', '1', '-'}
    pub fn from_symbol(symbol: char) -> Option<Allele> {
        match symbol {
            '0' => Some(Allele::Zero),
            '1' => Some(Allele::One),
            '-' => Some(Allele::Gap),
            _ => None
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Allele::Zero => '0',
            Allele::One => '1',
            Allele::Gap => '-'
        }
    }

    /// Returns true if this is an actual allele call (0 or 1)
    pub fn is_call(&self) -> bool {
        *self < Allele::Gap
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FragmentError {
    #[error("fragment pattern is empty")]
    EmptyPattern,
    #[error("invalid allele symbol {symbol:?} at pattern offset {offset}")]
    InvalidSymbol { symbol: char, offset: usize },
    #[error("fragment at {start} with {length} sites runs past the largest site index")]
    SiteOverflow { start: usize, length: usize }
}

/// A single read converted into allele calls over consecutive sites.
/// Identity is the start site plus the pattern, the frequency tracks how many identical reads were collapsed into this one.
#[derive(Clone, Debug)]
pub struct Fragment {
    /// the first site covered by this fragment
    start: usize,
    /// the allele calls, one per site starting at `start`; gaps are allowed anywhere
    alleles: Vec<Allele>,
    /// the number of reads with this exact identity
    frequency: u64
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.alleles == other.alleles
    }
}

impl Eq for Fragment {}

impl Hash for Fragment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // frequency is not part of the identity
        self.start.hash(state);
        self.alleles.hash(state);
    }
}

impl Fragment {
    /// Creates a new fragment with a frequency of 1.
    /// # Arguments
    /// * `start` - the first site the fragment covers
    /// * `alleles` - the calls for each site, starting at `start`
    /// # Panics
    /// * if `start + alleles.len()` overflows
    pub fn new(start: usize, alleles: Vec<Allele>) -> Fragment {
        assert!(start.checked_add(alleles.len()).is_some(), "fragment end overflows the site index");
        Fragment {
            start,
            alleles,
            frequency: 1
        }
    }

    /// Parses a pattern string over {'0', '1', '-'} into a fragment with a frequency of 1.
    /// # Arguments
    /// * `start` - the first site the fragment covers
    /// * `pattern` - the pattern string
    /// # Errors
    /// * if the pattern is empty or contains a symbol outside of the alphabet
    /// * if the end of the fragment is not representable as a site index
    pub fn from_pattern(start: usize, pattern: &str) -> Result<Fragment, FragmentError> {
        if pattern.is_empty() {
            return Err(FragmentError::EmptyPattern);
        }
        let alleles: Vec<Allele> = pattern.chars().enumerate()
            .map(|(offset, symbol)| Allele::from_symbol(symbol).ok_or(FragmentError::InvalidSymbol { symbol, offset }))
            .collect::<Result<Vec<Allele>, FragmentError>>()?;
        if start.checked_add(alleles.len()).is_none() {
            return Err(FragmentError::SiteOverflow { start, length: alleles.len() });
        }
        Ok(Fragment::new(start, alleles))
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Returns the covered sites as an exclusive-ended range
    pub fn region(&self) -> Range<usize> {
        self.start..(self.start + self.alleles.len())
    }

    /// Returns the last covered site (inclusive), or None for an empty fragment
    pub fn last_site(&self) -> Option<usize> {
        if self.alleles.is_empty() {
            None
        } else {
            Some(self.start + self.alleles.len() - 1)
        }
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn increment_frequency(&mut self) {
        self.frequency += 1;
    }

    pub fn add_frequency(&mut self, value: u64) {
        self.frequency += value;
    }

    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    /// Returns the allele at a given site, anything outside the fragment is a gap
    pub fn allele(&self, site: usize) -> Allele {
        if self.region().contains(&site) {
            self.alleles[site - self.start]
        } else {
            Allele::Gap
        }
    }

    /// Returns the number of sites that carry an actual call
    pub fn num_calls(&self) -> usize {
        self.alleles.iter()
            .filter(|a| a.is_call())
            .count()
    }

    /// Counts the sites where both fragments carry the same call; gaps never match.
    /// # Arguments
    /// * `other` - the fragment to compare against
    pub fn similarity(&self, other: &Fragment) -> usize {
        let min_compare = self.start.max(other.start);
        let max_compare = self.region().end.min(other.region().end);
        (min_compare..max_compare)
            .filter(|&site| {
                let allele = self.allele(site);
                allele.is_call() && allele == other.allele(site)
            })
            .count()
    }

    /// Returns the pattern as a string over {'0', '1', '-'}
    pub fn pattern(&self) -> String {
        self.alleles.iter().map(|a| a.symbol()).collect()
    }

    /// Compact output form, `start<TAB>pattern`
    pub fn compact_string(&self) -> String {
        format!("{}\t{}", self.start, self.pattern())
    }

    /// Annotated output form, `start-(length)->pattern`
    pub fn pretty_string(&self) -> String {
        format!("{}-({})->{}", self.start, self.len(), self.pattern())
    }
}

/// Collection of unique fragments, duplicates are collapsed into a single entry with increased frequency.
/// Fragments are addressed by their insertion order.
#[derive(Default)]
pub struct FragmentSet {
    /// the unique fragments in insertion order
    fragments: Vec<Fragment>,
    /// identity lookup into `fragments`
    lookup: HashMap<Fragment, FragmentId>,
    /// fragment spans, used to find the fragments covering a site quickly
    span_index: IntervalTree<usize, FragmentId>,
    /// one past the last covered site of any fragment
    num_sites: usize,
    /// sum of all fragment frequencies
    total_weight: u64
}

impl std::fmt::Debug for FragmentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentSet")
            .field("num_fragments", &self.fragments.len())
            .field("num_sites", &self.num_sites)
            .field("total_weight", &self.total_weight)
            .finish()
    }
}

impl FragmentSet {
    pub fn new() -> FragmentSet {
        Default::default()
    }

    /// Adds a fragment to the set. If an identical fragment is already present, its frequency is increased instead.
    /// Returns the id of the stored fragment.
    /// # Arguments
    /// * `fragment` - the fragment to add, its frequency is carried over
    pub fn insert(&mut self, fragment: Fragment) -> FragmentId {
        self.total_weight += fragment.frequency();
        if let Some(&existing) = self.lookup.get(&fragment) {
            self.fragments[existing].add_frequency(fragment.frequency());
            return existing;
        }

        let fragment_id: FragmentId = self.fragments.len();
        let region = fragment.region();
        if !region.is_empty() {
            self.num_sites = self.num_sites.max(region.end);
            self.span_index.insert(region, fragment_id);
        }
        self.lookup.insert(fragment.clone(), fragment_id);
        self.fragments.push(fragment);
        fragment_id
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Returns the number of sites, i.e. the largest last site of any fragment + 1
    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    /// Returns the sum of frequencies over all fragments
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn get(&self, fragment_id: FragmentId) -> &Fragment {
        &self.fragments[fragment_id]
    }

    /// Returns the id of a fragment with the same identity, if present
    pub fn find(&self, fragment: &Fragment) -> Option<FragmentId> {
        self.lookup.get(fragment).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> {
        self.fragments.iter().enumerate()
    }

    /// Returns the ids of all fragments whose span includes every site in `first..=last`, sorted ascending.
    /// Gaps inside the span are not checked here.
    /// # Arguments
    /// * `first` - the first site that must be covered
    /// * `last` - the last site that must be covered, inclusive
    pub fn spanning(&self, first: usize, last: usize) -> Vec<FragmentId> {
        assert!(first <= last);
        let mut ids: Vec<FragmentId> = self.span_index.find(first..(first+1))
            .filter(|entry| entry.interval().end > last)
            .map(|entry| *entry.data())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alleles(pattern: &str) -> Vec<Allele> {
        pattern.chars().map(|c| Allele::from_symbol(c).unwrap()).collect()
    }

    #[test]
    fn test_allele_repr() {
        assert_eq!(Allele::from_repr(0), Some(Allele::Zero));
        assert_eq!(Allele::from_repr(1), Some(Allele::One));
        assert_eq!(Allele::from_repr(2), Some(Allele::Gap));
        assert_eq!(Allele::from_repr(3), None);
        assert!(Allele::One.is_call());
        assert!(!Allele::Gap.is_call());
        assert_eq!(Allele::from_symbol('x'), None);
    }

    #[test]
    fn test_from_pattern() {
        let fragment = Fragment::from_pattern(3, "01-1").unwrap();
        assert_eq!(fragment.start(), 3);
        assert_eq!(fragment.len(), 4);
        assert_eq!(fragment.region(), 3..7);
        assert_eq!(fragment.last_site(), Some(6));
        assert_eq!(fragment.frequency(), 1);
        assert_eq!(fragment.num_calls(), 3);
        assert_eq!(fragment.alleles(), &alleles("01-1")[..]);
        assert_eq!(fragment.allele(2), Allele::Gap);
        assert_eq!(fragment.allele(4), Allele::One);
        assert_eq!(fragment.allele(5), Allele::Gap);
        assert_eq!(fragment.allele(7), Allele::Gap);

        assert_eq!(Fragment::from_pattern(0, ""), Err(FragmentError::EmptyPattern));
        assert_eq!(Fragment::from_pattern(0, "01a"), Err(FragmentError::InvalidSymbol { symbol: 'a', offset: 2 }));
        assert_eq!(Fragment::from_pattern(usize::MAX, "01"), Err(FragmentError::SiteOverflow { start: usize::MAX, length: 2 }));
        assert_eq!(Fragment::from_pattern(usize::MAX - 2, "01").unwrap().last_site(), Some(usize::MAX - 2 + 1));
    }

    #[test]
    fn test_identity_ignores_frequency() {
        let mut f1 = Fragment::from_pattern(0, "010").unwrap();
        let f2 = Fragment::from_pattern(0, "010").unwrap();
        f1.increment_frequency();
        assert_eq!(f1, f2);
        assert_eq!(f1.frequency(), 2);

        // same pattern at a different start is a different fragment
        let f3 = Fragment::from_pattern(1, "010").unwrap();
        assert_ne!(f1, f3);
    }

    #[test]
    fn test_similarity() {
        let f1 = Fragment::from_pattern(0, "0110-").unwrap();
        let f2 = Fragment::from_pattern(2, "1--11").unwrap();
        // overlap is sites 2..5: (1,1) match, (0,-) no, (-,-) no
        assert_eq!(f1.similarity(&f2), 1);
        assert_eq!(f2.similarity(&f1), 1);

        // no overlap at all
        let f3 = Fragment::from_pattern(10, "111").unwrap();
        assert_eq!(f1.similarity(&f3), 0);

        // full self match ignores gaps
        assert_eq!(f1.similarity(&f1), 4);
    }

    #[test]
    fn test_output_forms() {
        let fragment = Fragment::from_pattern(12, "0-11").unwrap();
        assert_eq!(fragment.pattern(), "0-11");
        assert_eq!(fragment.compact_string(), "12\t0-11");
        assert_eq!(fragment.pretty_string(), "12-(4)->0-11");

        let empty = Fragment::new(0, vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.last_site(), None);
        assert_eq!(empty.compact_string(), "0\t");
    }

    #[test]
    fn test_fragment_set_collapse() {
        let mut fragment_set = FragmentSet::new();
        let id1 = fragment_set.insert(Fragment::from_pattern(0, "010").unwrap());
        let id2 = fragment_set.insert(Fragment::from_pattern(0, "010").unwrap());
        let id3 = fragment_set.insert(Fragment::from_pattern(1, "101").unwrap());

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(fragment_set.len(), 2);
        assert_eq!(fragment_set.get(id1).frequency(), 2);
        assert_eq!(fragment_set.get(id3).frequency(), 1);
        assert_eq!(fragment_set.total_weight(), 3);
        assert_eq!(fragment_set.num_sites(), 4);
        assert_eq!(fragment_set.find(&Fragment::from_pattern(1, "101").unwrap()), Some(id3));
        assert_eq!(fragment_set.find(&Fragment::from_pattern(2, "101").unwrap()), None);
    }

    #[test]
    fn test_spanning() {
        let mut fragment_set = FragmentSet::new();
        fragment_set.insert(Fragment::from_pattern(0, "0101").unwrap()); // 0..4
        fragment_set.insert(Fragment::from_pattern(2, "11").unwrap()); // 2..4
        fragment_set.insert(Fragment::from_pattern(3, "0-01").unwrap()); // 3..7
        fragment_set.insert(Fragment::from_pattern(5, "1").unwrap()); // 5..6

        assert_eq!(fragment_set.spanning(0, 3), vec![0]);
        assert_eq!(fragment_set.spanning(2, 3), vec![0, 1]);
        assert_eq!(fragment_set.spanning(3, 3), vec![0, 1, 2]);
        assert_eq!(fragment_set.spanning(3, 5), vec![2]);
        assert_eq!(fragment_set.spanning(5, 6), vec![2]);
        assert!(fragment_set.spanning(7, 8).is_empty());
    }
}
