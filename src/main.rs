
use kphase::cli::{Settings, check_settings, get_raw_settings};
use kphase::data_types::fragment::FragmentSet;
use kphase::fragment_parsing::load_fragments;
use kphase::solver::{ConfigError, SolverResult, solve};
use kphase::writers::haplotype_writer::HaplotypeWriter;
use kphase::writers::solver_stats::StatsWriter;

use log::{LevelFilter, debug, error, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

fn main() {
    // get the settings
    let settings: Settings = get_raw_settings();
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    // immediately setup logging first
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    // okay, now we can check all the other settings
    let cli_settings: Settings = check_settings(settings);
    let start_time: Instant = Instant::now();

    let fragments: FragmentSet = match load_fragments(&cli_settings.fragments_filename) {
        Ok(f) => f,
        Err(e) => {
            error!("Error during fragment loading: {}", e);
            if e.is_io() {
                std::process::exit(exitcode::IOERR);
            } else {
                std::process::exit(exitcode::DATAERR);
            }
        }
    };

    let solver_result: SolverResult = match solve(fragments, &cli_settings.solver_config()) {
        Ok(r) => r,
        Err(e) => {
            error!("Error during haplotype reconstruction: {}", e);
            if e.downcast_ref::<ConfigError>().is_some() {
                std::process::exit(exitcode::USAGE);
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    for (index, haplotype) in solver_result.haplotypes.iter().enumerate() {
        debug!("haplotype {}: {} fragments, SADF {}, MEC {}, tags {:?}",
            index, haplotype.num_fragments, haplotype.sadf, haplotype.mec, haplotype.tags);
    }

    // haplotypes go to stdout unless an output file was given
    let output_stream: Box<dyn Write> = match cli_settings.output_filename {
        Some(ref filename) => {
            match File::create(filename) {
                Ok(f) => Box::new(BufWriter::new(f)),
                Err(e) => {
                    error!("Error during output file creation: {}", e);
                    std::process::exit(exitcode::CANTCREAT);
                }
            }
        },
        None => Box::new(BufWriter::new(std::io::stdout().lock()))
    };
    let mut haplotype_writer = HaplotypeWriter::new(output_stream, cli_settings.output_style());
    match haplotype_writer.write_all(&solver_result.haplotypes) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while writing haplotypes: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };
    std::mem::drop(haplotype_writer);

    if let Some(ref filename) = cli_settings.stats_filename {
        info!("Saving haplotype statistics to {:?}...", filename);
        let mut stats_writer: StatsWriter = match StatsWriter::new(filename) {
            Ok(sw) => sw,
            Err(e) => {
                error!("Error during statistics writer creation: {}", e);
                std::process::exit(exitcode::IOERR);
            }
        };
        match stats_writer.write_stats(&solver_result) {
            Ok(()) => {},
            Err(e) => {
                error!("Error while writing statistics file: {}", e);
                std::process::exit(exitcode::IOERR);
            }
        };
    }

    info!("Wrote {} haplotypes after {} seconds.", solver_result.haplotypes.len(), start_time.elapsed().as_secs_f64());
}
