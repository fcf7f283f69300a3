pub mod error;
pub mod prediction;
pub mod single_form;
pub mod upload;

// Tabular ingestion types
pub mod csv;
