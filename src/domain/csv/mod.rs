// ============================================================
// CSV DOMAIN LAYER
// ============================================================
// Core types and value objects for tabular ingestion
// No I/O, no async, no external dependencies

mod csv_row;
mod parser_config;

pub use csv_row::{CsvField, CsvPreview, Dataset, Record};
pub use parser_config::{ParserConfig, ParserKind};

pub use std::collections::HashMap;
pub type FieldMap = HashMap<String, String>;

/// Columns every uploaded dataset must carry, in request order.
pub const REQUIRED_FIELDS: [&str; 6] = ["cm_id", "pt_id", "mkt_id", "mp_year", "adm0_id", "adm1_id"];
