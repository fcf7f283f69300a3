pub mod use_cases;

pub use use_cases::batch_session::{BatchSession, BatchSessionView, BatchState};
pub use use_cases::ingestion_controller::IngestionController;
pub use use_cases::schema_validator::{SchemaValidator, SchemaViolation};
pub use use_cases::single_session::{SingleSession, SingleSessionView, SingleState};
