// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// Text decoding and the parsers behind `TabularParser`

mod csv_parser;
mod decode;
mod naive_parser;

pub use csv_parser::CsvParser;
pub use decode::decode_text;
pub use naive_parser::NaiveCsvParser;

use crate::domain::csv::{CsvPreview, Dataset, ParserConfig, ParserKind, Record};
use crate::domain::error::Result;

/// Lazily evaluated rows. Each call to [`TabularParser::rows`] starts over
/// from the first data row.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// Turns delimited text into a header list and aligned rows.
pub trait TabularParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Header names, trimmed, in file order
    fn headers(&self, text: &str) -> Result<Vec<String>>;

    /// Data rows keyed by the header
    fn rows<'a>(&self, text: &'a str) -> Result<RowIter<'a>>;

    /// First `limit` rows plus the total row count
    fn preview(&self, text: &str, limit: usize) -> Result<CsvPreview> {
        let headers = self.headers(text)?;
        let mut rows = Vec::with_capacity(limit.min(64));
        let mut total_rows = 0;

        for row in self.rows(text)? {
            let row = row?;
            if rows.len() < limit {
                rows.push(row);
            }
            total_rows += 1;
        }

        Ok(CsvPreview {
            headers,
            rows,
            total_rows,
        })
    }

    /// Materialize every row
    fn parse(&self, text: &str) -> Result<Dataset> {
        let headers = self.headers(text)?;
        let rows = self.rows(text)?.collect::<Result<Vec<_>>>()?;
        Ok(Dataset { headers, rows })
    }
}

/// Build the parser selected by `config`
pub fn parser_for(config: &ParserConfig) -> Box<dyn TabularParser> {
    match config.kind {
        ParserKind::Naive => Box::new(NaiveCsvParser::new().with_delimiter(config.delimiter)),
        ParserKind::Rfc4180 => Box::new(CsvParser::new().with_delimiter(config.delimiter)),
    }
}
