
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::solver::{HaplotypeResult, SolverResult};

/// This is a wrapper for writing solver statistics to a delimited file
pub struct StatsWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

/// Contains all the data written to each row of the stats file.
/// Haplotype columns are empty when a run reports no haplotypes.
#[derive(Serialize)]
struct CsvRow {
    /// rank of the haplotype in the output, best SADF first
    haplotype_index: Option<usize>,
    /// first site of the consensus
    start: Option<usize>,
    /// last site of the consensus
    end: Option<usize>,
    /// number of sites in the consensus
    length: Option<usize>,
    /// unique supporting fragments
    num_fragments: Option<usize>,
    /// supporting reads, counting duplicates
    weight: Option<u64>,
    sadf: Option<u64>,
    mec: Option<u64>,
    /// merged seed tags, semicolon separated
    tags: Option<String>,
    /// sites in the input
    num_sites: usize,
    /// unique fragments in the input
    input_fragments: usize,
    /// reads in the input
    input_weight: u64,
    /// seed groups that survived twisting
    seed_groups: u64,
    /// seed groups dropped by collapse or the round limit
    failed_seeds: u64,
    conflicting_fragments_removed: usize,
    merges: u64,
    discarded_pairs: u64,
    redundant_pruned: usize,
    cpu_seconds: f64
}

impl StatsWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write all stats to, a ".csv" extension switches from tabs to commas
    pub fn new(filename: &Path) -> csv::Result<StatsWriter> {
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(StatsWriter {
            csv_writer
        })
    }

    /// Writes one row per haplotype, each carrying the run-level counters
    /// # Arguments
    /// * `solver_result` - the finished solver run
    pub fn write_stats(&mut self, solver_result: &SolverResult) -> csv::Result<()> {
        let stats = &solver_result.statistics;
        let base = CsvRow {
            haplotype_index: None,
            start: None,
            end: None,
            length: None,
            num_fragments: None,
            weight: None,
            sadf: None,
            mec: None,
            tags: None,
            num_sites: stats.num_sites,
            input_fragments: stats.num_fragments,
            input_weight: stats.total_weight,
            seed_groups: stats.seeding.seed_groups,
            failed_seeds: stats.seeding.twist_failures + stats.seeding.unstable_twists,
            conflicting_fragments_removed: stats.conflicting_fragments_removed,
            merges: stats.merge.merges,
            discarded_pairs: stats.merge.discarded_pairs,
            redundant_pruned: stats.redundant_pruned,
            cpu_seconds: stats.cpu_seconds
        };

        if solver_result.haplotypes.is_empty() {
            self.csv_writer.serialize(&base)?;
        }
        for (index, haplotype) in solver_result.haplotypes.iter().enumerate() {
            let row = haplotype_row(index, haplotype, &base);
            self.csv_writer.serialize(&row)?;
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}

/// Fills in the haplotype columns on top of the run-level columns
fn haplotype_row(index: usize, haplotype: &HaplotypeResult, base: &CsvRow) -> CsvRow {
    let consensus = &haplotype.consensus;
    let tags: Vec<String> = haplotype.tags.iter().map(|t| t.to_string()).collect();
    CsvRow {
        haplotype_index: Some(index),
        start: Some(consensus.start()),
        end: consensus.last_site(),
        length: Some(consensus.len()),
        num_fragments: Some(haplotype.num_fragments),
        weight: Some(haplotype.weight),
        sadf: Some(haplotype.sadf),
        mec: Some(haplotype.mec),
        tags: Some(tags.join(";")),
        num_sites: base.num_sites,
        input_fragments: base.input_fragments,
        input_weight: base.input_weight,
        seed_groups: base.seed_groups,
        failed_seeds: base.failed_seeds,
        conflicting_fragments_removed: base.conflicting_fragments_removed,
        merges: base.merges,
        discarded_pairs: base.discarded_pairs,
        redundant_pruned: base.redundant_pruned,
        cpu_seconds: base.cpu_seconds
    }
}
