// ============================================================
// PARSER CONFIGURATION
// ============================================================
// Which parser to use and how much of a file to preview

use serde::{Deserialize, Serialize};

/// Parser implementation selected for uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Plain line/delimiter splitting, no quoting support
    #[default]
    Naive,
    /// Quote-aware parsing through the `csv` crate
    Rfc4180,
}

/// Configuration for CSV parsing and preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Parser implementation (default: naive)
    pub kind: ParserKind,

    /// Field delimiter (default: comma)
    pub delimiter: u8,

    /// Rows materialized for preview (default: 20)
    pub preview_rows: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            kind: ParserKind::Naive,
            delimiter: b',',
            preview_rows: 20,
        }
    }
}

impl ParserConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.preview_rows == 0 {
            return Err("preview_rows must be > 0".to_string());
        }
        if matches!(self.delimiter, b'\n' | b'\r') {
            return Err("delimiter cannot be a line break".to_string());
        }
        Ok(())
    }
}
