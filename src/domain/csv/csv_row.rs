// ============================================================
// CSV ROW TYPES
// ============================================================
// Data structures representing parsed CSV content

use super::FieldMap;
use serde::{Deserialize, Serialize};

/// A single named value in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvField {
    /// Header name this value was aligned to
    pub name: String,

    /// Field value, `None` when the row was shorter than the header
    pub value: Option<String>,
}

impl CsvField {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One row of a dataset, its values aligned to the header by position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Row index (0-based, header excluded)
    pub index: usize,

    /// One field per header, in header order
    pub fields: Vec<CsvField>,
}

impl Record {
    /// Align `values` onto `headers` by index. Short rows leave trailing
    /// fields empty; excess values are dropped.
    pub fn from_values<S: AsRef<str>>(index: usize, headers: &[String], values: &[S]) -> Self {
        let fields = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                CsvField::new(header.clone(), values.get(idx).map(|v| v.as_ref().to_string()))
            })
            .collect();

        Self { index, fields }
    }

    /// Value for `name`. With duplicated headers the last column wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_deref())
    }

    /// Present values keyed by header name
    pub fn field_map(&self) -> FieldMap {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_ref().map(|v| (f.name.clone(), v.clone())))
            .collect()
    }
}

/// Ordered rows sharing one header set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

impl Dataset {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row; values are aligned against the dataset's header set.
    pub fn push_values<S: AsRef<str>>(&mut self, values: &[S]) {
        let record = Record::from_values(self.rows.len(), &self.headers, values);
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bounded view of a parsed file, used before submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvPreview {
    /// Header names, trimmed
    pub headers: Vec<String>,

    /// First rows of the file, at most the configured preview size
    pub rows: Vec<Record>,

    /// Number of data rows in the whole file
    pub total_rows: usize,
}

impl CsvPreview {
    pub fn is_truncated(&self) -> bool {
        self.total_rows > self.rows.len()
    }
}
