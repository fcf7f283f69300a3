//! Batch upload session as an explicit state value.
//!
//! `Idle → FileLoaded → Previewed → Submitting → Results | Error`
//!
//! Every transition consumes the current session and returns the next one,
//! so transitions can be exercised without a controller or a network.

use super::schema_validator::SchemaValidator;
use crate::domain::csv::CsvPreview;
use crate::domain::error::{AppError, Result};
use crate::domain::prediction::{BatchPrediction, ResultTable};
use crate::domain::upload::UploadFile;
use serde::Serialize;
use uuid::Uuid;

pub const PREVIEW_FAILED: &str = "Failed to read CSV preview.";
pub const NO_FILE: &str = "Please choose a CSV file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    FileLoaded,
    Previewed,
    Submitting,
    Results,
    Error,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BatchSession {
    #[default]
    Idle,
    FileLoaded {
        id: Uuid,
        file: UploadFile,
    },
    Previewed {
        id: Uuid,
        file: UploadFile,
        preview: CsvPreview,
    },
    Submitting {
        id: Uuid,
        file: UploadFile,
        preview: CsvPreview,
    },
    Results {
        id: Uuid,
        file: UploadFile,
        preview: CsvPreview,
        result: BatchPrediction,
    },
    Error {
        id: Option<Uuid>,
        file: Option<UploadFile>,
        preview: Option<CsvPreview>,
        message: String,
    },
}

/// What a started submission needs to reach the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTicket {
    pub session_id: Uuid,
    pub file: UploadFile,
}

impl BatchSession {
    pub fn state(&self) -> BatchState {
        match self {
            BatchSession::Idle => BatchState::Idle,
            BatchSession::FileLoaded { .. } => BatchState::FileLoaded,
            BatchSession::Previewed { .. } => BatchState::Previewed,
            BatchSession::Submitting { .. } => BatchState::Submitting,
            BatchSession::Results { .. } => BatchState::Results,
            BatchSession::Error { .. } => BatchState::Error,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            BatchSession::Idle => None,
            BatchSession::FileLoaded { id, .. }
            | BatchSession::Previewed { id, .. }
            | BatchSession::Submitting { id, .. }
            | BatchSession::Results { id, .. } => Some(*id),
            BatchSession::Error { id, .. } => *id,
        }
    }

    pub fn file(&self) -> Option<&UploadFile> {
        match self {
            BatchSession::Idle => None,
            BatchSession::FileLoaded { file, .. }
            | BatchSession::Previewed { file, .. }
            | BatchSession::Submitting { file, .. }
            | BatchSession::Results { file, .. } => Some(file),
            BatchSession::Error { file, .. } => file.as_ref(),
        }
    }

    pub fn preview(&self) -> Option<&CsvPreview> {
        match self {
            BatchSession::Idle | BatchSession::FileLoaded { .. } => None,
            BatchSession::Previewed { preview, .. }
            | BatchSession::Submitting { preview, .. }
            | BatchSession::Results { preview, .. } => Some(preview),
            BatchSession::Error { preview, .. } => preview.as_ref(),
        }
    }

    pub fn result(&self) -> Option<&BatchPrediction> {
        match self {
            BatchSession::Results { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BatchSession::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// CSV offered for download, only after a successful submission.
    pub fn export_csv(&self) -> Option<&str> {
        self.result().and_then(BatchPrediction::export_csv)
    }

    /// A new file replaces whatever the session held.
    pub fn select_file(self, file: UploadFile) -> Self {
        BatchSession::FileLoaded {
            id: Uuid::new_v4(),
            file,
        }
    }

    /// Parse outcome for the file loaded under `session_id`. Outcomes for a
    /// superseded session are ignored.
    pub fn preview_ready(self, session_id: Uuid, outcome: Result<CsvPreview>) -> Self {
        match self {
            BatchSession::FileLoaded { id, file } if id == session_id => match outcome {
                Ok(preview) => BatchSession::Previewed { id, file, preview },
                Err(_) => BatchSession::Error {
                    id: Some(id),
                    file: Some(file),
                    preview: None,
                    message: PREVIEW_FAILED.to_string(),
                },
            },
            other => other,
        }
    }

    /// Guarded start of a submission. The header check runs before the
    /// session can enter `Submitting`; on any refusal no request is made.
    pub fn begin_submit(self, validator: &SchemaValidator) -> (Self, Result<SubmitTicket>) {
        match self {
            BatchSession::Idle
            | BatchSession::Error {
                file: None, ..
            } => (
                BatchSession::Error {
                    id: None,
                    file: None,
                    preview: None,
                    message: NO_FILE.to_string(),
                },
                Err(AppError::ValidationError(NO_FILE.to_string())),
            ),
            session @ BatchSession::FileLoaded { .. } => (
                session,
                Err(AppError::Busy("CSV preview is not ready yet.".to_string())),
            ),
            session @ BatchSession::Submitting { .. } => (
                session,
                Err(AppError::Busy("A submission is already in progress.".to_string())),
            ),
            BatchSession::Previewed { id, file, preview }
            | BatchSession::Results {
                id, file, preview, ..
            } => Self::check_and_submit(id, file, preview, validator),
            BatchSession::Error {
                id,
                file: Some(file),
                preview,
                ..
            } => {
                let id = id.unwrap_or_else(Uuid::new_v4);
                // A file whose preview failed has no headers to offer.
                let preview = preview.unwrap_or_else(|| CsvPreview {
                    headers: Vec::new(),
                    rows: Vec::new(),
                    total_rows: 0,
                });
                Self::check_and_submit(id, file, preview, validator)
            }
        }
    }

    fn check_and_submit(
        id: Uuid,
        file: UploadFile,
        preview: CsvPreview,
        validator: &SchemaValidator,
    ) -> (Self, Result<SubmitTicket>) {
        if let Err(violation) = validator.check_headers(&preview.headers) {
            let message = violation.message.clone();
            return (
                BatchSession::Error {
                    id: Some(id),
                    file: Some(file),
                    preview: Some(preview),
                    message,
                },
                Err(violation.into()),
            );
        }

        let ticket = SubmitTicket {
            session_id: id,
            file: file.clone(),
        };
        (BatchSession::Submitting { id, file, preview }, Ok(ticket))
    }

    /// Server outcome for the submission started under `session_id`.
    /// Remote failures keep the server's message; results from a superseded
    /// session are dropped.
    pub fn complete(self, session_id: Uuid, outcome: Result<BatchPrediction>) -> Self {
        match self {
            BatchSession::Submitting { id, file, preview } if id == session_id => match outcome {
                Ok(result) => BatchSession::Results {
                    id,
                    file,
                    preview,
                    result,
                },
                Err(err) => BatchSession::Error {
                    id: Some(id),
                    file: Some(file),
                    preview: Some(preview),
                    message: err.user_message().to_string(),
                },
            },
            other => other,
        }
    }

    pub fn view(&self) -> BatchSessionView {
        BatchSessionView {
            session_id: self.id(),
            state: self.state(),
            file_name: self.file().map(|f| f.name.clone()),
            preview: self.preview().cloned(),
            error: self.error().map(str::to_string),
            results: self.result().map(|r| ResultTable::from_rows(&r.rows)),
            export_available: self.export_csv().is_some(),
        }
    }
}

/// Serializable snapshot of the session for callers and the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSessionView {
    pub session_id: Option<Uuid>,
    pub state: BatchState,
    pub file_name: Option<String>,
    pub preview: Option<CsvPreview>,
    pub error: Option<String>,
    pub results: Option<ResultTable>,
    pub export_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::csv::{NaiveCsvParser, TabularParser};
    use serde_json::json;

    const VALID_CSV: &str = "cm_id,pt_id,mkt_id,mp_year,adm0_id,adm1_id\n1,1,42,2020,3,15";
    const MISSING_ADM1: &str = "cm_id,pt_id,mkt_id,mp_year,adm0_id\n1,1,42,2020,3";

    fn loaded(text: &str) -> (BatchSession, Uuid) {
        let session =
            BatchSession::Idle.select_file(UploadFile::new("prices.csv", text.as_bytes().to_vec()));
        let id = session.id().unwrap();
        (session, id)
    }

    fn previewed(text: &str) -> (BatchSession, Uuid) {
        let (session, id) = loaded(text);
        let preview = NaiveCsvParser::new().preview(text, 20);
        (session.preview_ready(id, preview), id)
    }

    fn batch_result() -> BatchPrediction {
        serde_json::from_value(json!({
            "rows": [{"cm_id": 1, "prediction": 10.5}],
            "csv": "cm_id,prediction\n1,10.5\n"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_headers_reach_submitting() {
        let (session, id) = previewed(VALID_CSV);
        assert_eq!(session.state(), BatchState::Previewed);
        assert_eq!(session.preview().unwrap().rows.len(), 1);

        let (session, ticket) = session.begin_submit(&SchemaValidator::default());
        let ticket = ticket.unwrap();
        assert_eq!(session.state(), BatchState::Submitting);
        assert_eq!(ticket.session_id, id);
        assert_eq!(ticket.file.name, "prices.csv");
    }

    #[test]
    fn test_missing_column_blocks_submission() {
        let (session, _) = previewed(MISSING_ADM1);
        let (session, ticket) = session.begin_submit(&SchemaValidator::default());

        assert!(matches!(ticket, Err(AppError::ValidationError(_))));
        assert_eq!(session.state(), BatchState::Error);
        assert_eq!(
            session.error(),
            Some("CSV must contain columns: cm_id, pt_id, mkt_id, mp_year, adm0_id, adm1_id")
        );
        // The preview stays so the user still sees the file.
        assert!(session.preview().is_some());
    }

    #[test]
    fn test_preview_failure_message() {
        let (session, id) = loaded("");
        let session = session.preview_ready(
            id,
            Err(AppError::ParseError("CSV input has no header line".to_string())),
        );
        assert_eq!(session.state(), BatchState::Error);
        assert_eq!(session.error(), Some(PREVIEW_FAILED));
    }

    #[test]
    fn test_submit_without_file() {
        let (session, ticket) = BatchSession::Idle.begin_submit(&SchemaValidator::default());
        assert!(ticket.is_err());
        assert_eq!(session.error(), Some(NO_FILE));
    }

    #[test]
    fn test_submit_guarded_while_pending_or_loading() {
        let (session, _) = loaded(VALID_CSV);
        let (session, ticket) = session.begin_submit(&SchemaValidator::default());
        assert!(matches!(ticket, Err(AppError::Busy(_))));
        assert_eq!(session.state(), BatchState::FileLoaded);

        let (session, _) = previewed(VALID_CSV);
        let (session, first) = session.begin_submit(&SchemaValidator::default());
        assert!(first.is_ok());
        let (session, second) = session.begin_submit(&SchemaValidator::default());
        assert!(matches!(second, Err(AppError::Busy(_))));
        assert_eq!(session.state(), BatchState::Submitting);
    }

    #[test]
    fn test_success_stores_rows_and_csv() {
        let (session, id) = previewed(VALID_CSV);
        let (session, _) = session.begin_submit(&SchemaValidator::default());
        let session = session.complete(id, Ok(batch_result()));

        assert_eq!(session.state(), BatchState::Results);
        assert_eq!(session.export_csv(), Some("cm_id,prediction\n1,10.5\n"));

        let view = session.view();
        assert!(view.export_available);
        assert_eq!(view.results.unwrap().headers, vec!["cm_id", "prediction"]);
    }

    #[test]
    fn test_remote_error_keeps_server_message() {
        let (session, id) = previewed(VALID_CSV);
        let (session, _) = session.begin_submit(&SchemaValidator::default());
        let session = session.complete(id, Err(AppError::RemoteError("bad column".to_string())));

        assert_eq!(session.error(), Some("bad column"));
        assert!(session.result().is_none());
        let view = session.view();
        assert!(!view.export_available);
        assert!(view.results.is_none());
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let (session, old_id) = previewed(VALID_CSV);
        let (session, _) = session.begin_submit(&SchemaValidator::default());

        let session = session.select_file(UploadFile::new("other.csv", VALID_CSV.into()));
        let new_id = session.id().unwrap();
        assert_ne!(old_id, new_id);

        let session = session.complete(old_id, Ok(batch_result()));
        assert_eq!(session.state(), BatchState::FileLoaded);
        assert!(session.result().is_none());
    }

    #[test]
    fn test_new_file_discards_results() {
        let (session, id) = previewed(VALID_CSV);
        let (session, _) = session.begin_submit(&SchemaValidator::default());
        let session = session.complete(id, Ok(batch_result()));

        let session = session.select_file(UploadFile::new("next.csv", Vec::new()));
        assert_eq!(session.state(), BatchState::FileLoaded);
        assert!(session.export_csv().is_none());
        assert!(session.error().is_none());
        assert!(session.preview().is_none());
    }

    #[test]
    fn test_resubmit_after_results_and_errors() {
        let validator = SchemaValidator::default();
        let (session, id) = previewed(VALID_CSV);
        let (session, _) = session.begin_submit(&validator);
        let session = session.complete(id, Err(AppError::TransportError("refused".to_string())));
        assert_eq!(session.error(), Some("refused"));

        let (session, ticket) = session.begin_submit(&validator);
        assert!(ticket.is_ok());
        let session = session.complete(id, Ok(batch_result()));

        let (session, ticket) = session.begin_submit(&validator);
        assert!(ticket.is_ok());
        assert_eq!(session.state(), BatchState::Submitting);
    }

    #[test]
    fn test_submit_after_failed_preview_reports_columns() {
        let (session, id) = loaded("garbage");
        let session = session.preview_ready(id, Err(AppError::ParseError("x".to_string())));
        let (session, ticket) = session.begin_submit(&SchemaValidator::default());

        assert!(matches!(ticket, Err(AppError::ValidationError(_))));
        assert!(session.error().unwrap().starts_with("CSV must contain columns"));
    }
}
