
use clap::Parser;
use chrono::Datelike;
use lazy_static::lazy_static;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::merge_scheduler::MergeMode;
use crate::solver::SolverConfig;
use crate::writers::haplotype_writer::OutputStyle;

lazy_static! {
    /// Stores the full version string we plan to use.
    /// # Examples
    /// * `0.4.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.4.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));
}

#[derive(Clone, Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = format!("Copyright (C) 2023-{}     kphase developers
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
research use only.", chrono::Utc::now().year()))]
pub struct Settings {
    /// Input fragment file, one "start<TAB>pattern" record per line (gzip allowed)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "fragments")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub fragments_filename: PathBuf,

    /// Output haplotype file (default: stdout)
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: Option<PathBuf>,

    /// Output haplotype statistics file (optional, csv/tsv)
    #[clap(long = "stats-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub stats_filename: Option<PathBuf>,

    /// Write haplotypes as "start-(length)->pattern" instead of "start<TAB>pattern"
    #[clap(long = "pretty")]
    #[clap(help_heading = Some("Input/Output"))]
    pub pretty: bool,

    /// Number of threads to use for the parallel merge modes
    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Number of haplotypes to reconstruct
    #[clap(short = 'k')]
    #[clap(long = "ploidy")]
    #[clap(value_name = "K")]
    #[clap(default_value = "2")]
    #[clap(help_heading = Some("Seeding"))]
    pub ploidy: usize,

    /// Number of sites in each seed tuple
    #[clap(long = "seed-length")]
    #[clap(value_name = "SITES")]
    #[clap(default_value = "3")]
    #[clap(help_heading = Some("Seeding"))]
    pub seed_length: usize,

    /// Seed tuples must have (last site - first site) below this value
    #[clap(long = "max-seed-span")]
    #[clap(value_name = "SITES")]
    #[clap(default_value = "8")]
    #[clap(help_heading = Some("Seeding"))]
    pub max_seed_span: usize,

    /// Accept seed tuples with exactly K distinct patterns instead of requiring more than K
    #[clap(long = "inclusive-seeding")]
    #[clap(help_heading = Some("Seeding"))]
    pub inclusive_seeding: bool,

    /// Twisting collapses a cluster at or below |union| / (alpha * K) fragments
    #[clap(long = "alpha")]
    #[clap(value_name = "FLOAT")]
    #[clap(default_value = "2.0")]
    #[clap(help_heading = Some("Twisting"))]
    pub alpha: f64,

    /// Number of mismatches or gaps a fragment may carry and still be assigned while twisting
    #[clap(long = "beta")]
    #[clap(value_name = "COUNT")]
    #[clap(default_value = "1")]
    #[clap(help_heading = Some("Twisting"))]
    pub beta: usize,

    /// Maximum twist rounds before a seed group is dropped as unstable
    #[clap(long = "max-twist-rounds")]
    #[clap(value_name = "ROUNDS")]
    #[clap(default_value = "100")]
    #[clap(help_heading = Some("Twisting"))]
    pub max_twist_rounds: usize,

    /// Merge strategy: serial, phase-parallel, or multi-merger
    #[clap(long = "merge-mode")]
    #[clap(value_name = "MODE")]
    #[clap(default_value = "serial")]
    #[clap(help_heading = Some("Merging"))]
    pub merge_mode: MergeMode,

    /// Stop merging once a cluster spans every site
    #[clap(long = "early-exit")]
    #[clap(help_heading = Some("Merging"))]
    pub early_exit: bool,

    /// Remove minority-allele fragments from the seed clusters before merging
    #[clap(long = "remove-conflicts")]
    #[clap(help_heading = Some("Merging"))]
    pub remove_conflicts: bool,

    /// Drop output haplotypes that are contained in a better haplotype
    #[clap(long = "prune-redundant")]
    #[clap(help_heading = Some("Merging"))]
    pub prune_redundant: bool
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
fn check_required_filename(filename: &Path, label: &str) {
    if !filename.exists() {
        error!("{} does not exist: \"{}\"", label, filename.display());
        std::process::exit(exitcode::NOINPUT);
    } else {
        info!("{}: \"{}\"", label, filename.display());
    }
}

impl Settings {
    /// Wrapper function to build the solver configuration from our CLI settings
    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            ploidy: self.ploidy,
            alpha: self.alpha,
            beta: self.beta,
            seed_length: self.seed_length,
            max_seed_span: self.max_seed_span,
            inclusive_seeding: self.inclusive_seeding,
            max_twist_rounds: self.max_twist_rounds,
            merge_mode: self.merge_mode,
            early_exit_on_full_coverage: self.early_exit,
            threads: self.threads,
            remove_conflicting_fragments: self.remove_conflicts,
            prune_redundant: self.prune_redundant
        }
    }

    pub fn output_style(&self) -> OutputStyle {
        if self.pretty {
            OutputStyle::Pretty
        } else {
            OutputStyle::Compact
        }
    }
}

pub fn get_raw_settings() -> Settings {
    Settings::parse()
}

/// Do some additional checks here, we may increase these as we go.
/// Also can modify settings if needed since we're passing it around.
/// # Arguments
/// * `settings` - the raw settings, nothing has been checked other than what clap does for us.
pub fn check_settings(mut settings: Settings) -> Settings {
    check_required_filename(&settings.fragments_filename, "Fragment file");
    if let Some(ref filename) = settings.output_filename {
        info!("Output file: \"{}\"", filename.display());
    }
    if let Some(ref filename) = settings.stats_filename {
        info!("Statistics file: \"{}\"", filename.display());
    }

    // 0 doesn't make sense, so lets just error proof it up to 1
    if settings.threads == 0 {
        settings.threads = 1;
    }

    if let Err(e) = settings.solver_config().validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(exitcode::USAGE);
    }

    // dump stuff to the logger
    info!("Seeding:");
    info!("\tPloidy: {}", settings.ploidy);
    info!("\tSeed length: {}", settings.seed_length);
    info!("\tMaximum seed span: {}", settings.max_seed_span);
    if settings.max_seed_span < settings.seed_length {
        warn!("\tMaximum seed span is too small for the seed length, no seeds can be formed.");
    }
    info!("\tInclusive seeding: {}", if settings.inclusive_seeding { "ENABLED" } else { "DISABLED" });

    info!("Twisting:");
    info!("\tAlpha: {}", settings.alpha);
    info!("\tBeta: {}", settings.beta);
    info!("\tMaximum rounds: {}", settings.max_twist_rounds);

    info!("Merging:");
    info!("\tMode: {}", settings.merge_mode);
    info!("\tEarly exit on full coverage: {}", if settings.early_exit { "ENABLED" } else { "DISABLED" });
    info!("\tConflicting fragment removal: {}", if settings.remove_conflicts { "ENABLED" } else { "DISABLED" });
    info!("\tRedundant haplotype pruning: {}", if settings.prune_redundant { "ENABLED" } else { "DISABLED" });

    if settings.merge_mode == MergeMode::Serial && settings.threads > 1 {
        warn!("Serial merging uses a single thread, --threads {} is ignored.", settings.threads);
    }
    info!("Processing threads: {}", settings.threads);

    //send the settings back
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::try_parse_from([
            "kphase", "-i", "fragments.tsv", "-k", "3", "--merge-mode", "multi-merger",
            "--pretty", "--early-exit", "-vv"
        ]).unwrap();
        assert_eq!(settings.fragments_filename, PathBuf::from("fragments.tsv"));
        assert_eq!(settings.verbosity, 2);
        assert_eq!(settings.output_style(), OutputStyle::Pretty);

        let config = settings.solver_config();
        assert_eq!(config.ploidy, 3);
        assert_eq!(config.merge_mode, MergeMode::MultiMerger);
        assert!(config.early_exit_on_full_coverage);
        assert!(!config.prune_redundant);
        assert_eq!(config.alpha, 2.0);
        assert_eq!(config.beta, 1);
        assert_eq!(config.seed_length, 3);
        assert_eq!(config.max_seed_span, 8);
        assert_eq!(config.max_twist_rounds, 100);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_parse_failures() {
        // the fragment file is required
        assert!(Settings::try_parse_from(["kphase"]).is_err());
        assert!(Settings::try_parse_from(["kphase", "-i", "f.tsv", "--merge-mode", "parallel"]).is_err());
        assert!(Settings::try_parse_from(["kphase", "-i", "f.tsv", "--beta", "-1"]).is_err());
    }
}
