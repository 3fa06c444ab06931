//! CSV export of assembled feature vectors.

use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::data::FeatureRecord;
use crate::errors::MatchError;
use crate::vector::VectorAssembler;

/// Writes one header line plus one row per record, using the assembler's layout.
#[derive(Clone, Debug)]
pub struct CsvExporter {
    assembler: VectorAssembler,
}

impl CsvExporter {
    /// Exporter laying rows out with `assembler`.
    pub fn new(assembler: VectorAssembler) -> Self {
        Self { assembler }
    }

    /// Layout used for the header and every row.
    pub fn assembler(&self) -> &VectorAssembler {
        &self.assembler
    }

    /// Create (or truncate) `path` and write all records. Returns the row count.
    pub fn write_csv<'a, I>(&self, path: &Path, records: I) -> Result<usize, MatchError>
    where
        I: IntoIterator<Item = &'a FeatureRecord>,
    {
        let file = File::create(path)?;
        let written = self.write_to(BufWriter::new(file), records)?;
        info!(path = %path.display(), rows = written, "wrote CSV data lines");
        Ok(written)
    }

    /// Write header and rows to any sink. Numbers use `Display` formatting,
    /// which is locale independent.
    pub fn write_to<'a, W, I>(&self, sink: W, records: I) -> Result<usize, MatchError>
    where
        W: Write,
        I: IntoIterator<Item = &'a FeatureRecord>,
    {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(sink);
        writer.write_record(self.assembler.column_names())?;
        let mut written = 0;
        for record in records {
            let vector = self.assembler.to_vector(record)?;
            writer.write_record(vector.iter().map(f64::to_string))?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}
