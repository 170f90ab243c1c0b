
use std::io::Write;

use crate::solver::HaplotypeResult;

/// How each haplotype line is rendered
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    /// `start<TAB>pattern`
    Compact,
    /// `start-(length)->pattern`
    Pretty
}

/// Writes one consensus line per haplotype to any output stream
pub struct HaplotypeWriter<W: Write> {
    /// the destination
    writer: W,
    style: OutputStyle,
    /// number of haplotypes written so far
    num_written: usize
}

impl<W: Write> HaplotypeWriter<W> {
    /// Creates a new writer
    /// # Arguments
    /// * `writer` - the output stream, wrap it in a `BufWriter` for files
    /// * `style` - the line format
    pub fn new(writer: W, style: OutputStyle) -> HaplotypeWriter<W> {
        HaplotypeWriter {
            writer,
            style,
            num_written: 0
        }
    }

    /// Writes a single haplotype line
    /// # Errors
    /// * if the underlying stream fails
    pub fn write_haplotype(&mut self, haplotype: &HaplotypeResult) -> std::io::Result<()> {
        let line: String = match self.style {
            OutputStyle::Compact => haplotype.consensus.compact_string(),
            OutputStyle::Pretty => haplotype.consensus.pretty_string()
        };
        writeln!(self.writer, "{line}")?;
        self.num_written += 1;
        Ok(())
    }

    /// Writes every haplotype in order and flushes
    /// # Errors
    /// * if the underlying stream fails
    pub fn write_all(&mut self, haplotypes: &[HaplotypeResult]) -> std::io::Result<()> {
        for haplotype in haplotypes.iter() {
            self.write_haplotype(haplotype)?;
        }
        self.writer.flush()
    }

    pub fn num_written(&self) -> usize {
        self.num_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
