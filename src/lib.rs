
/// CLI functionality and checks
pub mod cli;
/// Contains the fragment and cluster data types shared by every stage
pub mod data_types;
/// Loads fragment records from plain or gzipped text
pub mod fragment_parsing;
/// Best-first agglomerative merging of clusters, serial or threaded
pub mod merge_scheduler;
/// Seed generation from site tuples with distinct read patterns
pub mod seeder;
/// Runs the full pipeline from fragments to ranked haplotypes
pub mod solver;
/// Iterative reassignment of seed group fragments by consensus similarity
pub mod twister;
/// Contains the haplotype and statistics output writers
pub mod writers;
