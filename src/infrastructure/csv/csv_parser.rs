// ============================================================
// CSV PARSER
// ============================================================
// Quote-aware parsing (RFC 4180) on top of the `csv` crate

use super::{RowIter, TabularParser};
use crate::domain::csv::Record;
use crate::domain::error::{AppError, Result};
use csv::{Reader, ReaderBuilder, StringRecord, Trim};

/// RFC 4180 parser; drop-in replacement for the naive splitter
pub struct CsvParser {
    /// Delimiter character (default: comma)
    delimiter: u8,

    /// Whether to trim whitespace from headers and values
    trim: bool,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

impl CsvParser {
    /// Create a new CSV parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    fn reader<'a>(&self, text: &'a str) -> Reader<&'a [u8]> {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(true) // Allow rows with different lengths
            .from_reader(text.as_bytes())
    }

    fn read_headers(reader: &mut Reader<&[u8]>) -> Result<Vec<String>> {
        let headers = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read CSV headers: {}", e)))?;

        if headers.is_empty() {
            return Err(AppError::ParseError("CSV input has no header line".to_string()));
        }
        Ok(headers.iter().map(str::to_string).collect())
    }

    /// Align one parsed record onto the headers
    fn parse_row(index: usize, headers: &[String], record: &StringRecord) -> Record {
        let values: Vec<&str> = record.iter().collect();
        Record::from_values(index, headers, &values)
    }
}

impl TabularParser for CsvParser {
    fn name(&self) -> &'static str {
        "rfc4180"
    }

    fn headers(&self, text: &str) -> Result<Vec<String>> {
        Self::read_headers(&mut self.reader(text))
    }

    fn rows<'a>(&self, text: &'a str) -> Result<RowIter<'a>> {
        let mut reader = self.reader(text);
        let headers = Self::read_headers(&mut reader)?;

        let iter = reader
            .into_records()
            .enumerate()
            .map(move |(index, result)| {
                let record = result.map_err(|e| {
                    AppError::ParseError(format!("Failed to parse CSV row {}: {}", index + 1, e))
                })?;
                Ok(Self::parse_row(index, &headers, &record))
            });

        Ok(Box::new(iter))
    }
}
