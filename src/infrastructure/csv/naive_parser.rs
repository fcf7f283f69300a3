// ============================================================
// NAIVE CSV PARSER
// ============================================================
// Line and delimiter splitting only. Quoted fields are NOT understood:
// a quoted value containing the delimiter ends up spread over several
// columns and every following column shifts.

use super::{RowIter, TabularParser};
use crate::domain::csv::Record;
use crate::domain::error::{AppError, Result};

pub struct NaiveCsvParser {
    delimiter: char,
}

impl Default for NaiveCsvParser {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl NaiveCsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter as char;
        self
    }

    /// Non-empty lines, split on `\n` with an optional trailing `\r`
    fn lines(text: &str) -> impl Iterator<Item = &str> {
        text.split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty())
    }

    fn split_trimmed<'a>(&self, line: &'a str) -> Vec<&'a str> {
        line.split(self.delimiter).map(str::trim).collect()
    }
}

impl TabularParser for NaiveCsvParser {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn headers(&self, text: &str) -> Result<Vec<String>> {
        let header = Self::lines(text)
            .next()
            .ok_or_else(|| AppError::ParseError("CSV input has no header line".to_string()))?;

        Ok(self
            .split_trimmed(header)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    fn rows<'a>(&self, text: &'a str) -> Result<RowIter<'a>> {
        let headers = self.headers(text)?;
        let delimiter = self.delimiter;

        let iter = Self::lines(text).skip(1).enumerate().map(move |(index, line)| {
            let values: Vec<&str> = line.split(delimiter).map(str::trim).collect();
            Ok(Record::from_values(index, &headers, &values))
        });

        Ok(Box::new(iter))
    }
}
