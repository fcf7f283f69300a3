use crate::application::{IngestionController, SingleSessionView, SingleState};
use crate::domain::error::{AppError, Result};
use crate::domain::single_form::SingleRecordForm;
use crate::domain::upload::UploadFile;
use actix_cors::Cors;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub controller: Arc<IngestionController>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
    pub export_dir: PathBuf,
    pub import_dir: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
}

impl HttpState {
    pub fn new(controller: Arc<IngestionController>, export_dir: PathBuf) -> Self {
        Self {
            controller,
            logs: Arc::new(Mutex::new(Vec::new())),
            export_dir,
            import_dir: None,
            allowed_origins: Vec::new(),
        }
    }

    pub fn with_import_dir(mut self, import_dir: Option<PathBuf>) -> Self {
        self.import_dir = import_dir;
        self
    }

    pub fn with_allowed_origins(mut self, allowed_origins: Vec<String>) -> Self {
        self.allowed_origins = allowed_origins;
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_body(err: &AppError) -> ErrorBody {
    ErrorBody {
        error: err.user_message().to_string(),
    }
}

#[derive(Deserialize)]
struct FileQuery {
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoadRequest {
    pub path: PathBuf,
}

#[derive(Deserialize)]
pub struct FieldEdit {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Serialize)]
struct SavedExport {
    path: String,
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

fn prediction_response(
    data: &HttpState,
    outcome: Result<SingleSessionView>,
) -> HttpResponse {
    match outcome {
        Ok(view) if view.state == SingleState::Result => {
            add_log(
                &data.logs,
                "INFO",
                "Predict",
                &format!("Prediction: {:?}", view.prediction),
            );
            HttpResponse::Ok().json(view)
        }
        Ok(view) if matches!(view.failure, Some(AppError::ValidationError(_))) => {
            add_log(
                &data.logs,
                "WARN",
                "Predict",
                view.error.as_deref().unwrap_or_default(),
            );
            HttpResponse::BadRequest().json(view)
        }
        Ok(view) => {
            let message = view.failure.as_ref().map(|e| e.to_string()).unwrap_or_default();
            add_log(
                &data.logs,
                "ERROR",
                "Predict",
                &format!("Prediction failed: {}", message),
            );
            HttpResponse::BadGateway().json(view)
        }
        Err(e) => {
            add_log(&data.logs, "WARN", "Predict", &e.to_string());
            HttpResponse::Conflict().json(error_body(&e))
        }
    }
}

#[post("/predict")]
async fn predict(data: web::Data<HttpState>, req: web::Json<SingleRecordForm>) -> impl Responder {
    add_log(&data.logs, "INFO", "Predict", "Single prediction requested");
    let outcome = data.controller.predict_single(req.into_inner()).await;
    prediction_response(&data, outcome)
}

#[post("/predict/submit")]
async fn submit_form(data: web::Data<HttpState>) -> impl Responder {
    add_log(&data.logs, "INFO", "Predict", "Submitting entered form");
    let outcome = data.controller.submit_single_form().await;
    prediction_response(&data, outcome)
}

#[post("/predict/field")]
async fn edit_field(data: web::Data<HttpState>, req: web::Json<FieldEdit>) -> impl Responder {
    match data.controller.edit_single_field(&req.name, &req.value) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e @ AppError::Busy(_)) => HttpResponse::Conflict().json(error_body(&e)),
        Err(e) => HttpResponse::BadRequest().json(error_body(&e)),
    }
}

#[get("/predict")]
async fn single_view(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.controller.single_view())
}

#[post("/predict/reset")]
async fn reset_single(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.controller.reset_single())
}

#[post("/batch/file")]
async fn upload_file(
    data: web::Data<HttpState>,
    query: web::Query<FileQuery>,
    body: web::Bytes,
) -> impl Responder {
    let name = query
        .into_inner()
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "upload.csv".to_string());
    add_log(
        &data.logs,
        "INFO",
        "Batch",
        &format!("File selected: {} ({} bytes)", name, body.len()),
    );

    let view = data
        .controller
        .select_file(UploadFile::new(name, body.to_vec()))
        .await;
    if let Some(err) = &view.error {
        add_log(&data.logs, "ERROR", "Batch", err);
    }
    HttpResponse::Ok().json(view)
}

/// Resolve `requested` inside the import directory. Symlinks and `..` are
/// followed before the containment check.
async fn resolve_import(import_dir: Option<&Path>, requested: &Path) -> Result<PathBuf> {
    let not_available =
        || AppError::ValidationError("File is not available in the import directory.".to_string());

    let dir = import_dir.ok_or_else(not_available)?;
    let root = tokio::fs::canonicalize(dir).await.map_err(|e| {
        AppError::ConfigError(format!("import_dir {} is unusable: {}", dir.display(), e))
    })?;
    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| not_available())?;

    if !resolved.starts_with(&root) {
        return Err(not_available());
    }
    Ok(resolved)
}

#[post("/batch/load")]
async fn load_file(data: web::Data<HttpState>, req: web::Json<LoadRequest>) -> impl Responder {
    let path = match resolve_import(data.import_dir.as_deref(), &req.path).await {
        Ok(path) => path,
        Err(e @ AppError::ValidationError(_)) => {
            add_log(
                &data.logs,
                "WARN",
                "Batch",
                &format!("Refused to load {}", req.path.display()),
            );
            return HttpResponse::Forbidden().json(error_body(&e));
        }
        Err(e) => {
            add_log(&data.logs, "ERROR", "Batch", &e.to_string());
            return HttpResponse::InternalServerError().json(error_body(&e));
        }
    };
    add_log(
        &data.logs,
        "INFO",
        "Batch",
        &format!("Loading file: {}", path.display()),
    );

    let view = data.controller.select_path(&path).await;
    if let Some(err) = &view.error {
        add_log(&data.logs, "ERROR", "Batch", err);
    }
    HttpResponse::Ok().json(view)
}

#[get("/batch")]
async fn batch_view(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.controller.batch_view())
}

#[post("/batch/submit")]
async fn submit_batch(data: web::Data<HttpState>) -> impl Responder {
    add_log(&data.logs, "INFO", "Batch", "Submitting batch");

    match data.controller.submit_batch().await {
        Ok(view) => {
            match (&view.error, &view.results) {
                (Some(err), _) => add_log(&data.logs, "ERROR", "Batch", err),
                (None, Some(table)) => add_log(
                    &data.logs,
                    "INFO",
                    "Batch",
                    &format!("Received {} result rows", table.rows.len()),
                ),
                (None, None) => {}
            }
            HttpResponse::Ok().json(view)
        }
        Err(e) => {
            add_log(&data.logs, "WARN", "Batch", &e.to_string());
            HttpResponse::Conflict().json(error_body(&e))
        }
    }
}

#[get("/batch/export")]
async fn download_export(data: web::Data<HttpState>) -> impl Responder {
    match data.controller.export_artifact() {
        Some(artifact) => HttpResponse::Ok()
            .content_type(artifact.content_type)
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ))
            .body(artifact.bytes),
        None => HttpResponse::NotFound().json(ErrorBody {
            error: "No results to export.".to_string(),
        }),
    }
}

#[post("/batch/export/save")]
async fn save_export(data: web::Data<HttpState>) -> impl Responder {
    match data.controller.save_export(&data.export_dir) {
        Ok(path) => {
            let path = path.display().to_string();
            add_log(
                &data.logs,
                "INFO",
                "Export",
                &format!("Saved predictions to {}", path),
            );
            HttpResponse::Ok().json(SavedExport { path })
        }
        Err(e @ AppError::ValidationError(_)) => HttpResponse::NotFound().json(error_body(&e)),
        Err(e) => {
            add_log(&data.logs, "ERROR", "Export", &e.to_string());
            HttpResponse::InternalServerError().json(error_body(&e))
        }
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data
        .logs
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    HttpResponse::Ok().json(&*logs)
}

/// Routes under `/api`. Uploads have no size ceiling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(usize::MAX)).service(
        web::scope("/api")
            .service(health)
            .service(predict)
            .service(submit_form)
            .service(edit_field)
            .service(single_view)
            .service(reset_single)
            .service(upload_file)
            .service(load_file)
            .service(batch_view)
            .service(submit_batch)
            .service(download_export)
            .service(save_export)
            .service(get_logs),
    );
}

/// Cross-origin calls only from the configured origins; none by default.
pub fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins.iter().fold(
        Cors::default()
            .allowed_methods(vec!["GET", "POST"])
            .allow_any_header()
            .max_age(3600),
        |cors, origin| cors.allowed_origin(origin),
    )
}

pub fn start_server(state: web::Data<HttpState>, host: &str, port: u16) -> std::io::Result<Server> {
    let origins = state.allowed_origins.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&origins))
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

pub fn add_log_entry(logs: &Arc<Mutex<Vec<LogEntry>>>, entry: LogEntry) {
    let mut logs = logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    logs.push(entry);
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
}

pub fn add_log(logs: &Arc<Mutex<Vec<LogEntry>>>, level: &str, source: &str, message: &str) {
    add_log_entry(
        logs,
        LogEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            level: level.to_string(),
            source: source.to_string(),
            message: message.to_string(),
        },
    );
}
