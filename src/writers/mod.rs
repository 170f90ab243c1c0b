
/// Contains the writer for reconstructed haplotype lines
pub mod haplotype_writer;
/// Contains the writer for per-haplotype and run statistics
pub mod solver_stats;
