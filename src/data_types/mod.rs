
/// Contains the merge proposal types and the best-first pair queue
pub mod candidate_pair;
/// Contains the Cluster type, a candidate haplotype with per-site allele counts
pub mod cluster;
/// Contains the arena of live clusters used during merging
pub mod cluster_pool;
/// Contains the Fragment read record and the deduplicating FragmentSet
pub mod fragment;
