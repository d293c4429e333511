//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;
use chrono::NaiveDateTime;
use fieldcalc_core::FormulaDraft;

/// CSV formulas table reader
///
/// Rows come back as unvalidated [`FormulaDraft`]s; building them into formulas is the
/// caller's decision, since one bad stored expression should not hide the rest.
pub struct CsvReader;

impl CsvReader {
    /// Read all formula rows from a CSV file
    pub fn read_file<P: AsRef<Path>>(
        path: P,
        options: &CsvReadOptions,
    ) -> CsvResult<Vec<FormulaDraft>> {
        let file = File::open(path)?;
        Self::read(file, options)
    }

    /// Read all formula rows from a reader
    pub fn read<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<Vec<FormulaDraft>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(options.has_header)
            .flexible(true)
            .from_reader(reader);

        let mut drafts = Vec::new();

        for (idx, result) in csv_reader.records().enumerate() {
            let record = result?;
            let row = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);

            // Skip blank lines
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let field = |column: usize| record.get(column).unwrap_or("").trim();
            let parse_error = |column: usize, message: String| {
                CsvError::invalid_row(row, column, message)
            };

            let id = match field(0) {
                "" => None,
                text => Some(
                    text.parse::<i64>()
                        .map_err(|e| parse_error(0, format!("invalid id '{}': {}", text, e)))?,
                ),
            };

            let department_id = field(1).parse::<i64>().map_err(|e| {
                parse_error(1, format!("invalid department_id '{}': {}", field(1), e))
            })?;

            let description = match field(4) {
                "" => None,
                text => Some(text.to_string()),
            };

            let is_active = Self::parse_bool(field(5))
                .ok_or_else(|| parse_error(5, format!("invalid is_active '{}'", field(5))))?;

            let created_at = match field(6) {
                "" => None,
                text => Some(
                    NaiveDateTime::parse_from_str(text, crate::TIMESTAMP_FORMAT).map_err(|e| {
                        parse_error(6, format!("invalid created_at '{}': {}", text, e))
                    })?,
                ),
            };

            drafts.push(FormulaDraft {
                id,
                department_id,
                target_field: field(2).to_string(),
                formula_expression: record.get(3).unwrap_or("").to_string(),
                description,
                is_active,
                created_at,
            });
        }

        Ok(drafts)
    }

    /// Active flags are stored as SQLite-style integers; words are accepted too
    fn parse_bool(field: &str) -> Option<bool> {
        match field.to_lowercase().as_str() {
            "" | "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_rows() {
        let data = "\
id,department_id,target_field,formula_expression,description,is_active,created_at
1,1,total,[price] * [quantity],Calculate total,1,2024-05-01 08:30:00
2,1,net,[total] - [discount],,0,
,2,fee,[distance] * 1000,,,
";
        let drafts = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap();
        assert_eq!(drafts.len(), 3);

        assert_eq!(drafts[0].id, Some(1));
        assert_eq!(drafts[0].formula_expression, "[price] * [quantity]");
        assert_eq!(drafts[0].description.as_deref(), Some("Calculate total"));
        assert!(drafts[0].created_at.is_some());

        assert!(!drafts[1].is_active);
        assert_eq!(drafts[1].description, None);

        assert_eq!(drafts[2].id, None);
        assert_eq!(drafts[2].department_id, 2);
        assert!(drafts[2].is_active);
    }

    #[test]
    fn test_invalid_department() {
        let data = "id,department_id,target_field,formula_expression\n1,sales,total,[a]\n";
        let err = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CsvError::InvalidRow {
                row: 2,
                column: "department_id",
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "row 2, column 'department_id': invalid department_id 'sales': invalid digit found in string"
        );
    }

    #[test]
    fn test_invalid_expression_still_read() {
        let data = "id,department_id,target_field,formula_expression\n1,1,total,([a]\n";
        let drafts = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap();
        assert_eq!(drafts[0].formula_expression, "([a]");
        assert!(drafts[0].clone().build().is_err());
    }
}
