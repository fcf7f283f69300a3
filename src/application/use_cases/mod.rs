pub mod batch_session;
pub mod ingestion_controller;
pub mod schema_validator;
pub mod single_session;
