// ============================================================
// INGESTION CONTROLLER USE CASE
// ============================================================
// Orchestrate file read, preview, header check, submission and export

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use super::batch_session::{BatchSession, BatchSessionView};
use super::schema_validator::SchemaValidator;
use super::single_session::{SingleSession, SingleSessionView};
use crate::domain::csv::{CsvPreview, ParserConfig};
use crate::domain::error::{AppError, Result};
use crate::domain::single_form::SingleRecordForm;
use crate::domain::upload::UploadFile;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::csv::{decode_text, parser_for, TabularParser};
use crate::infrastructure::export::{ExportArtifact, ResultExporter};
use crate::infrastructure::prediction_client::{HttpPredictionClient, PredictionClient};

/// Owns the current batch and single-record sessions. Session values are
/// swapped under a short lock that is never held across a network call.
pub struct IngestionController {
    client: Arc<dyn PredictionClient>,
    parser: Arc<dyn TabularParser>,
    validator: SchemaValidator,
    exporter: ResultExporter,
    preview_rows: usize,
    batch: Mutex<BatchSession>,
    single: Mutex<SingleSession>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_preview(parser: &dyn TabularParser, bytes: &[u8], limit: usize) -> Result<CsvPreview> {
    let text = decode_text(bytes)?;
    parser.preview(&text, limit)
}

impl IngestionController {
    pub fn new(
        client: Arc<dyn PredictionClient>,
        parser_config: &ParserConfig,
        exporter: ResultExporter,
    ) -> Self {
        Self {
            client,
            parser: Arc::from(parser_for(parser_config)),
            validator: SchemaValidator::default(),
            exporter,
            preview_rows: parser_config.preview_rows,
            batch: Mutex::new(BatchSession::Idle),
            single: Mutex::new(SingleSession::default()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client =
            HttpPredictionClient::new(&config.prediction_base_url, config.request_timeout())?;
        Ok(Self::new(
            Arc::new(client),
            &config.parser_config(),
            ResultExporter::new(config.export_file_name.clone()),
        ))
    }

    fn swap_batch<R>(&self, transition: impl FnOnce(BatchSession) -> (BatchSession, R)) -> R {
        let mut guard = lock(&self.batch);
        let current = std::mem::take(&mut *guard);
        let (next, out) = transition(current);
        *guard = next;
        out
    }

    fn swap_single<R>(&self, transition: impl FnOnce(SingleSession) -> (SingleSession, R)) -> R {
        let mut guard = lock(&self.single);
        let current = std::mem::take(&mut *guard);
        let (next, out) = transition(current);
        *guard = next;
        out
    }

    /// Start a new session holding `file`, not yet previewed. A pending
    /// preview or submission for an earlier file is superseded.
    pub fn stage_file(&self, file: UploadFile) -> BatchSessionView {
        info!(file = %file.name, bytes = file.size(), "CSV file selected");
        self.swap_batch(|session| {
            let session = session.select_file(file);
            let view = session.view();
            (session, view)
        })
    }

    /// Parse the staged file off the async workers and record the preview.
    /// A preview that finishes after another file was staged is dropped.
    pub async fn preview_staged(&self) -> BatchSessionView {
        let staged = match &*lock(&self.batch) {
            BatchSession::FileLoaded { id, file } => Some((*id, file.clone())),
            _ => None,
        };
        let (id, file) = match staged {
            Some(staged) => staged,
            None => return self.batch_view(),
        };

        let parser = Arc::clone(&self.parser);
        let limit = self.preview_rows;
        let name = file.name.clone();
        let preview =
            tokio::task::spawn_blocking(move || build_preview(parser.as_ref(), &file.bytes, limit))
                .await
                .unwrap_or_else(|e| {
                    Err(AppError::Internal(format!("Preview task failed: {}", e)))
                });

        match &preview {
            Ok(preview) => info!(
                file = %name,
                parser = self.parser.name(),
                rows = preview.total_rows,
                columns = preview.headers.len(),
                "CSV preview ready"
            ),
            Err(err) => warn!(file = %name, error = %err, "CSV preview failed"),
        }

        self.swap_batch(|session| {
            let session = session.preview_ready(id, preview);
            let view = session.view();
            (session, view)
        })
    }

    /// `stage_file` followed by `preview_staged`
    pub async fn select_file(&self, file: UploadFile) -> BatchSessionView {
        self.stage_file(file);
        self.preview_staged().await
    }

    /// Read a local file and start a session with it. An unreadable file
    /// ends in the same error state as an unparsable one.
    pub async fn select_path(&self, path: &Path) -> BatchSessionView {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match tokio::fs::read(path).await {
            Ok(bytes) => self.select_file(UploadFile::new(name, bytes)).await,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read CSV file");
                self.swap_batch(|session| {
                    let session = session.select_file(UploadFile::new(name, Vec::new()));
                    let session = match session.id() {
                        Some(id) => session.preview_ready(id, Err(err.into())),
                        None => session,
                    };
                    let view = session.view();
                    (session, view)
                })
            }
        }
    }

    /// Upload the previewed file. Refusals by the submission guard come back
    /// as `Err(Busy)` with the session untouched; every other failure is
    /// folded into the returned view's error message.
    pub async fn submit_batch(&self) -> Result<BatchSessionView> {
        let validator = &self.validator;
        let ticket = self.swap_batch(|session| session.begin_submit(validator));

        let ticket = match ticket {
            Ok(ticket) => ticket,
            Err(err @ AppError::Busy(_)) => {
                warn!(error = %err, "Batch submission refused");
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, "Batch submission blocked before upload");
                return Ok(self.batch_view());
            }
        };

        info!(file = %ticket.file.name, bytes = ticket.file.size(), "Submitting batch");
        let outcome = self.client.predict_batch(&ticket.file).await;

        match &outcome {
            Ok(result) => info!(
                rows = result.rows.len(),
                has_csv = result.export_csv().is_some(),
                "Batch prediction complete"
            ),
            Err(err) => warn!(error = %err, "Batch prediction failed"),
        }

        Ok(self.swap_batch(|session| {
            let session = session.complete(ticket.session_id, outcome);
            let view = session.view();
            if let Some(table) = view.results.as_ref().filter(|t| t.heterogeneous) {
                warn!(columns = ?table.headers, "Result rows do not share one column set");
            }
            (session, view)
        }))
    }

    pub fn batch_view(&self) -> BatchSessionView {
        lock(&self.batch).view()
    }

    /// Download artifact for the current results, if the server sent a CSV.
    pub fn export_artifact(&self) -> Option<ExportArtifact> {
        let session = lock(&self.batch);
        self.exporter.artifact(session.export_csv())
    }

    pub fn save_export(&self, dir: &Path) -> Result<PathBuf> {
        let artifact = self
            .export_artifact()
            .ok_or_else(|| AppError::ValidationError("No results to export.".to_string()))?;
        let path = self.exporter.save_to(&artifact, dir)?;
        info!(path = %path.display(), "Exported predictions");
        Ok(path)
    }

    /// Validate and submit one record. `Err(Busy)` when a prediction is
    /// already pending; validation and remote failures land in the view.
    pub async fn predict_single(&self, form: SingleRecordForm) -> Result<SingleSessionView> {
        let request = self.swap_single(|session| session.submit(form));

        let request = match request {
            Ok(request) => request,
            Err(err @ AppError::Busy(_)) => return Err(err),
            Err(err) => {
                warn!(error = %err, "Single prediction blocked before request");
                return Ok(self.single_view());
            }
        };

        let outcome = self.client.predict_single(&request).await;
        if let Err(err) = &outcome {
            warn!(error = %err, "Single prediction failed");
        }

        Ok(self.swap_single(|session| {
            let session = session.complete(outcome);
            let view = session.view();
            (session, view)
        }))
    }

    /// Type into one field of the held form. `Err` when the value is not
    /// digits or a prediction is pending; the form is unchanged then.
    pub fn edit_single_field(&self, name: &str, value: &str) -> Result<SingleSessionView> {
        self.swap_single(|session| {
            let (session, edited) = session.edit(name, value);
            let view = session.view();
            (session, edited.map(|_| view))
        })
    }

    /// Submit the form built up through `edit_single_field`.
    pub async fn submit_single_form(&self) -> Result<SingleSessionView> {
        let form = lock(&self.single).form().clone();
        self.predict_single(form).await
    }

    pub fn single_view(&self) -> SingleSessionView {
        lock(&self.single).view()
    }

    pub fn reset_single(&self) -> SingleSessionView {
        self.swap_single(|session| {
            let session = session.reset();
            let view = session.view();
            (session, view)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::batch_session::BatchState;
    use crate::application::use_cases::single_session::{SingleState, INVALID_FORM};
    use crate::domain::prediction::{BatchPrediction, PredictionRequest};
    use crate::infrastructure::prediction_client::stub_server::{StubResponse, StubServer};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const VALID_CSV: &str = "cm_id,pt_id,mkt_id,mp_year,adm0_id,adm1_id\n1,1,42,2020,3,15";

    struct FakeClient {
        single: Result<f64>,
        batch: Result<BatchPrediction>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(single: Result<f64>, batch: Result<BatchPrediction>) -> Arc<Self> {
            Arc::new(Self {
                single,
                batch,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PredictionClient for FakeClient {
        async fn predict_single(&self, _request: &PredictionRequest) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.single.clone()
        }

        async fn predict_batch(&self, _file: &UploadFile) -> Result<BatchPrediction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.batch.clone()
        }
    }

    fn batch_ok() -> BatchPrediction {
        serde_json::from_value(json!({
            "rows": [
                {"cm_id": 1, "pt_id": 1, "mkt_id": 42, "mp_year": 2020, "adm0_id": 3, "adm1_id": 15, "prediction": 10.5}
            ],
            "csv": "cm_id,pt_id,mkt_id,mp_year,adm0_id,adm1_id,prediction\n1,1,42,2020,3,15,10.5\n"
        }))
        .unwrap()
    }

    fn controller(client: Arc<FakeClient>) -> IngestionController {
        IngestionController::new(client, &ParserConfig::default(), ResultExporter::default())
    }

    fn upload(text: &str) -> UploadFile {
        UploadFile::new("prices.csv", text.as_bytes().to_vec())
    }

    fn form() -> SingleRecordForm {
        SingleRecordForm {
            cm_id: "1".into(),
            pt_id: "1".into(),
            mkt_id: "42".into(),
            mp_year: "2020".into(),
            adm0_id: "3".into(),
            adm1_id: "15".into(),
        }
    }

    #[tokio::test]
    async fn test_batch_end_to_end() {
        let client = FakeClient::new(Ok(0.0), Ok(batch_ok()));
        let controller = controller(client.clone());

        let view = controller.select_file(upload(VALID_CSV)).await;
        assert_eq!(view.state, BatchState::Previewed);
        assert_eq!(view.preview.as_ref().unwrap().rows.len(), 1);

        let view = controller.submit_batch().await.unwrap();
        assert_eq!(view.state, BatchState::Results);
        assert!(view.export_available);
        assert_eq!(client.calls(), 1);

        let artifact = controller.export_artifact().unwrap();
        assert_eq!(artifact.file_name, "predictions.csv");
        assert_eq!(artifact.bytes, batch_ok().csv.unwrap().into_bytes());
    }

    #[tokio::test]
    async fn test_staged_file_refuses_submit_until_previewed() {
        let client = FakeClient::new(Ok(0.0), Ok(batch_ok()));
        let controller = controller(client.clone());

        let view = controller.stage_file(upload(VALID_CSV));
        assert_eq!(view.state, BatchState::FileLoaded);
        assert!(view.preview.is_none());

        let refused = controller.submit_batch().await;
        assert!(matches!(refused, Err(AppError::Busy(_))));
        assert_eq!(controller.batch_view().state, BatchState::FileLoaded);
        assert_eq!(client.calls(), 0);

        let view = controller.preview_staged().await;
        assert_eq!(view.state, BatchState::Previewed);
        assert_eq!(view.session_id, controller.batch_view().session_id);

        let view = controller.submit_batch().await.unwrap();
        assert_eq!(view.state, BatchState::Results);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_restaging_replaces_pending_file() {
        let controller = controller(FakeClient::new(Ok(0.0), Ok(batch_ok())));

        let first = controller.stage_file(upload("a,b\n1,2"));
        let second = controller.stage_file(UploadFile::new("second.csv", VALID_CSV.into()));
        assert_ne!(first.session_id, second.session_id);

        let view = controller.preview_staged().await;
        assert_eq!(view.session_id, second.session_id);
        assert_eq!(view.file_name.as_deref(), Some("second.csv"));
        assert_eq!(view.state, BatchState::Previewed);

        // nothing left to preview
        let again = controller.preview_staged().await;
        assert_eq!(again, view);
    }

    #[tokio::test]
    async fn test_missing_column_makes_no_network_call() {
        let client = FakeClient::new(Ok(0.0), Ok(batch_ok()));
        let controller = controller(client.clone());

        controller
            .select_file(upload("cm_id,pt_id,mkt_id,mp_year,adm0_id\n1,1,42,2020,3"))
            .await;
        let view = controller.submit_batch().await.unwrap();

        assert_eq!(view.state, BatchState::Error);
        assert_eq!(
            view.error.as_deref(),
            Some("CSV must contain columns: cm_id, pt_id, mkt_id, mp_year, adm0_id, adm1_id")
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_preview() {
        let client = FakeClient::new(Ok(0.0), Ok(batch_ok()));
        let controller = controller(client);

        let view = controller
            .select_file(UploadFile::new("bad.csv", vec![b'a', 0xFF, 0xFE, 0xFD]))
            .await;
        assert_eq!(view.state, BatchState::Error);
        assert_eq!(view.error.as_deref(), Some("Failed to read CSV preview."));

        let view = controller
            .select_path(Path::new("/definitely/not/here.csv"))
            .await;
        assert_eq!(view.state, BatchState::Error);
        assert_eq!(view.file_name.as_deref(), Some("here.csv"));
        assert_eq!(view.error.as_deref(), Some("Failed to read CSV preview."));
    }

    #[tokio::test]
    async fn test_select_path_reads_file() {
        let dir = std::env::temp_dir().join(format!("foodprice-ctl-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("input.csv");
        std::fs::write(&path, VALID_CSV).unwrap();

        let controller = controller(FakeClient::new(Ok(0.0), Ok(batch_ok())));
        let view = controller.select_path(&path).await;

        assert_eq!(view.state, BatchState::Previewed);
        assert_eq!(view.file_name.as_deref(), Some("input.csv"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_submission_is_refused() {
        let client = Arc::new(FakeClient {
            single: Ok(1.0),
            batch: Ok(batch_ok()),
            delay: Duration::from_millis(50),
            calls: AtomicUsize::new(0),
        });
        let controller = controller(client.clone());
        controller.select_file(upload(VALID_CSV)).await;

        let (first, second) = tokio::join!(controller.submit_batch(), controller.submit_batch());
        assert_eq!(first.unwrap().state, BatchState::Results);
        assert!(matches!(second, Err(AppError::Busy(_))));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_message() {
        let client = FakeClient::new(
            Ok(0.0),
            Err(AppError::TransportError("connection refused".to_string())),
        );
        let controller = controller(client);
        controller.select_file(upload(VALID_CSV)).await;

        let view = controller.submit_batch().await.unwrap();
        assert_eq!(view.error.as_deref(), Some("connection refused"));
        assert!(controller.export_artifact().is_none());
        assert!(controller.save_export(&std::env::temp_dir()).is_err());
    }

    #[tokio::test]
    async fn test_submit_without_file() {
        let controller = controller(FakeClient::new(Ok(0.0), Ok(batch_ok())));
        let view = controller.submit_batch().await.unwrap();
        assert_eq!(view.error.as_deref(), Some("Please choose a CSV file."));
    }

    #[tokio::test]
    async fn test_incomplete_single_form_makes_no_request() {
        let client = FakeClient::new(Ok(1.0), Ok(batch_ok()));
        let controller = controller(client.clone());

        let mut form = form();
        form.mp_year = String::new();
        let view = controller.predict_single(form).await.unwrap();

        assert_eq!(view.state, SingleState::Error);
        assert_eq!(
            view.error.as_deref(),
            Some("Please enter numeric values for all fields.")
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_prediction_and_reset() {
        let controller = controller(FakeClient::new(Ok(123.45), Ok(batch_ok())));

        let view = controller.predict_single(form()).await.unwrap();
        assert_eq!(view.prediction, Some(123.45));

        let view = controller.reset_single();
        assert_eq!(view.state, SingleState::Idle);
        assert_eq!(view.prediction, None);
    }

    #[tokio::test]
    async fn test_field_edits_build_the_submitted_form() {
        let controller = controller(FakeClient::new(Ok(99.5), Ok(batch_ok())));

        for (name, value) in [
            ("cm_id", "1"),
            ("pt_id", "1"),
            ("mkt_id", "42"),
            ("mp_year", "2020"),
            ("adm0_id", "3"),
        ] {
            controller.edit_single_field(name, value).unwrap();
        }
        assert!(controller.edit_single_field("adm1_id", "1x").is_err());
        assert_eq!(controller.single_view().form.adm1_id, "");

        let view = controller.submit_single_form().await.unwrap();
        assert_eq!(view.error.as_deref(), Some(INVALID_FORM));

        let view = controller.edit_single_field("adm1_id", "15").unwrap();
        assert_eq!(view.form, form());
        let view = controller.submit_single_form().await.unwrap();
        assert_eq!(view.prediction, Some(99.5));

        let view = controller.reset_single();
        assert_eq!(view.form, SingleRecordForm::default());
    }

    #[actix_web::test]
    async fn test_batch_remote_error_against_server() {
        let stub = StubServer::start(
            StubResponse::json(200, json!({"predictions": [1.0]})),
            StubResponse::json(500, json!({"error": "bad column"})),
        )
        .await;
        let client = HttpPredictionClient::new(&stub.base_url, None).unwrap();
        let controller = IngestionController::new(
            Arc::new(client),
            &ParserConfig::default(),
            ResultExporter::default(),
        );

        controller.select_file(upload(VALID_CSV)).await;
        let view = controller.submit_batch().await.unwrap();

        assert_eq!(view.error.as_deref(), Some("bad column"));
        assert!(view.results.is_none());
        assert!(!view.export_available);
        assert_eq!(stub.hits(), 1);
        stub.stop().await;
    }

    #[actix_web::test]
    async fn test_single_prediction_against_server() {
        let stub = StubServer::start(
            StubResponse::json(200, json!({"predictions": [123.45]})),
            StubResponse::json(200, json!({})),
        )
        .await;
        let client = HttpPredictionClient::new(&stub.base_url, None).unwrap();
        let controller = IngestionController::new(
            Arc::new(client),
            &ParserConfig::default(),
            ResultExporter::default(),
        );

        let view = controller.predict_single(form()).await.unwrap();
        assert_eq!(view.prediction, Some(123.45));
        stub.stop().await;
    }

    #[actix_web::test]
    async fn test_delayed_server_keeps_single_request_outstanding() {
        let stub = StubServer::start(
            StubResponse::json(200, json!({"predictions": 2.5})).delayed(100),
            StubResponse::json(200, json!({})),
        )
        .await;
        let client = HttpPredictionClient::new(&stub.base_url, None).unwrap();
        let controller = IngestionController::new(
            Arc::new(client),
            &ParserConfig::default(),
            ResultExporter::default(),
        );

        let (first, second) =
            tokio::join!(controller.predict_single(form()), controller.predict_single(form()));
        assert_eq!(first.unwrap().prediction, Some(2.5));
        assert!(matches!(second, Err(AppError::Busy(_))));
        assert_eq!(stub.hits(), 1);
        stub.stop().await;
    }
}
