
use flate2::bufread::MultiGzDecoder;
use log::{debug, info};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::data_types::fragment::{Fragment, FragmentError, FragmentSet};

#[derive(thiserror::Error, Debug)]
pub enum FragmentParseError {
    #[error("failed to read fragments: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected \"start<TAB>pattern\"")]
    MissingDelimiter { line: usize },
    #[error("line {line}: invalid start index {value:?}")]
    InvalidStart { line: usize, value: String },
    #[error("line {line}: {source}")]
    InvalidPattern { line: usize, source: FragmentError }
}

impl FragmentParseError {
    /// Returns true if the error came from the underlying reader rather than the content
    pub fn is_io(&self) -> bool {
        matches!(self, FragmentParseError::Io(_))
    }
}

/// Parses one non-blank line into a fragment
fn parse_line(line: &str, line_number: usize) -> Result<Fragment, FragmentParseError> {
    let (start_field, pattern) = match line.split_once('\t') {
        Some(fields) => fields,
        None => return Err(FragmentParseError::MissingDelimiter { line: line_number })
    };
    let start: usize = match start_field.trim().parse() {
        Ok(s) => s,
        Err(_) => return Err(FragmentParseError::InvalidStart { line: line_number, value: start_field.to_string() })
    };
    Fragment::from_pattern(start, pattern.trim_end())
        .map_err(|source| FragmentParseError::InvalidPattern { line: line_number, source })
}

/// Reads `start<TAB>pattern` records into a fragment set, collapsing duplicates into their multiplicity.
/// Blank lines are skipped.
/// # Arguments
/// * `reader` - the source of fragment lines
/// # Errors
/// * if reading fails
/// * if a line is missing the tab, has a non-integer start, or has a bad pattern; the error carries the 1-based line number
pub fn parse_fragments<R: BufRead>(reader: R) -> Result<FragmentSet, FragmentParseError> {
    let mut fragment_set = FragmentSet::new();
    let mut num_records: usize = 0;
    for (line_index, line) in reader.lines().enumerate() {
        let line: String = line?;
        let line: &str = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fragment = parse_line(line, line_index + 1)?;
        fragment_set.insert(fragment);
        num_records += 1;
    }
    debug!("Parsed {} records into {} unique fragments", num_records, fragment_set.len());
    Ok(fragment_set)
}

/// Loads fragments from a file
/// # Arguments
/// * `filename` - the fragment file, gzip is allowed
/// # Errors
/// * if the file cannot be opened or read
/// * if any record is malformed
pub fn load_fragments(filename: &Path) -> Result<FragmentSet, FragmentParseError> {
    info!("Loading {:?}...", filename);
    let file: std::fs::File = std::fs::File::open(filename)?;
    let file_reader = BufReader::new(file);
    let reader: Box<dyn BufRead> = if filename.extension().unwrap_or_default() == "gz" {
        debug!("Detected gzip extension, loading fragments with MultiGzDecoder...");
        Box::new(BufReader::new(MultiGzDecoder::new(file_reader)))
    } else {
        debug!("Loading fragments as plain-text file...");
        Box::new(file_reader)
    };

    let fragment_set = parse_fragments(reader)?;
    info!("Finished loading {} unique fragments ({} reads) over {} sites.",
        fragment_set.len(), fragment_set.total_weight(), fragment_set.num_sites());
    Ok(fragment_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn check_small_set(fragment_set: &FragmentSet) {
        assert_eq!(fragment_set.len(), 2);
        assert_eq!(fragment_set.total_weight(), 3);
        assert_eq!(fragment_set.num_sites(), 4);
        let first = fragment_set.get(0);
        assert_eq!(first.compact_string(), "0\t010");
        assert_eq!(first.frequency(), 2);
        let second = fragment_set.get(1);
        assert_eq!(second.compact_string(), "1\t101");
        assert_eq!(second.frequency(), 1);
    }

    #[test]
    fn test_parse_duplicates() {
        let text = "0\t010\n0\t010\n1\t101\n";
        let fragment_set = parse_fragments(text.as_bytes()).unwrap();
        check_small_set(&fragment_set);
    }

    #[test]
    fn test_parse_blank_and_crlf() {
        let text = "\n0\t010\r\n   \n0\t010\r\n\n1\t101";
        let fragment_set = parse_fragments(text.as_bytes()).unwrap();
        check_small_set(&fragment_set);
    }

    #[test]
    fn test_parse_gaps() {
        let fragment_set = parse_fragments("2\t1--0\n".as_bytes()).unwrap();
        assert_eq!(fragment_set.len(), 1);
        assert_eq!(fragment_set.get(0).num_calls(), 2);
        assert_eq!(fragment_set.num_sites(), 6);
    }

    #[test]
    fn test_parse_errors() {
        let error = parse_fragments("0\t01\n0 01\n".as_bytes()).unwrap_err();
        assert!(matches!(error, FragmentParseError::MissingDelimiter { line: 2 }));
        assert!(!error.is_io());

        let error = parse_fragments("\n-1\t01\n".as_bytes()).unwrap_err();
        assert!(matches!(error, FragmentParseError::InvalidStart { line: 2, .. }));

        let error = parse_fragments("x\t01\n".as_bytes()).unwrap_err();
        assert!(matches!(error, FragmentParseError::InvalidStart { line: 1, .. }));

        let error = parse_fragments("0\t01\n3\t0a1\n".as_bytes()).unwrap_err();
        match error {
            FragmentParseError::InvalidPattern { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, FragmentError::InvalidSymbol { symbol: 'a', offset: 1 });
            },
            other => panic!("unexpected error {other:?}")
        };

        // a start this large would put the fragment end past the last site index
        let text = format!("0\t01\n{}\t01\n", usize::MAX);
        let error = parse_fragments(text.as_bytes()).unwrap_err();
        match error {
            FragmentParseError::InvalidPattern { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, FragmentError::SiteOverflow { start: usize::MAX, length: 2 });
            },
            other => panic!("unexpected error {other:?}")
        };

        let error = parse_fragments("4\t\n".as_bytes()).unwrap_err();
        assert!(matches!(error, FragmentParseError::InvalidPattern { line: 1, source: FragmentError::EmptyPattern }));
    }

    #[test]
    fn test_load_fragments() {
        let plain = load_fragments(&PathBuf::from("./test_data/small_fragments.tsv")).unwrap();
        check_small_set(&plain);
        let compressed = load_fragments(&PathBuf::from("./test_data/small_fragments.tsv.gz")).unwrap();
        check_small_set(&compressed);

        let error = load_fragments(&PathBuf::from("./test_data/does_not_exist.tsv")).unwrap_err();
        assert!(error.is_io());
    }
}
