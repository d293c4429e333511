//! CSV writer

use std::io::Write;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};
use fieldcalc_core::FormulaDraft;

/// CSV formulas table writer
///
/// Takes drafts rather than formulas so rows that no longer validate survive a rewrite.
/// Use [`Formula::to_draft`](fieldcalc_core::Formula::to_draft) to write formulas.
pub struct CsvWriter;

impl CsvWriter {
    /// Write rows to a CSV file, replacing its contents
    ///
    /// The table is written to a temporary file next to `path` and renamed over it, so
    /// a failed write leaves the previous contents in place.
    pub fn write_file<P: AsRef<Path>>(
        rows: &[FormulaDraft],
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        Self::write(rows, temp.as_file_mut(), options)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Write rows to a writer
    pub fn write<W: Write>(
        rows: &[FormulaDraft],
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .from_writer(writer);

        if options.write_header {
            csv_writer.write_record(crate::COLUMNS)?;
        }

        for row in rows {
            let record = [
                row.id.map(|id| id.to_string()).unwrap_or_default(),
                row.department_id.to_string(),
                row.target_field.clone(),
                row.formula_expression.clone(),
                row.description.clone().unwrap_or_default(),
                if row.is_active { "1" } else { "0" }.to_string(),
                row.created_at
                    .map(|t| t.format(crate::TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default(),
            ];
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
