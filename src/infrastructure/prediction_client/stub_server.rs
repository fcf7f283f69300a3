//! Stand-in prediction server for tests: fixed responses on `/predict` and
//! `/batch_predict`, bound to an ephemeral local port.

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    pub content_type: &'static str,
    pub delay_ms: u64,
}

impl StubResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "application/json",
            delay_ms: 0,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "text/plain",
            delay_ms: 0,
        }
    }

    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[derive(Default)]
struct Captured {
    body: Option<Vec<u8>>,
    content_type: Option<String>,
}

struct StubState {
    predict: StubResponse,
    batch: StubResponse,
    hits: AtomicUsize,
    captured: Mutex<Captured>,
}

pub struct StubServer {
    pub base_url: String,
    state: web::Data<StubState>,
    handle: ServerHandle,
}

impl StubServer {
    pub async fn start(predict: StubResponse, batch: StubResponse) -> Self {
        let state = web::Data::new(StubState {
            predict,
            batch,
            hits: AtomicUsize::new(0),
            captured: Mutex::new(Captured::default()),
        });

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .route("/predict", web::post().to(handle_predict))
                .route("/batch_predict", web::post().to(handle_batch))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind stub server");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    /// Requests served so far, both endpoints together
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<Vec<u8>> {
        self.state.captured.lock().unwrap().body.clone()
    }

    pub fn last_content_type(&self) -> Option<String> {
        self.state.captured.lock().unwrap().content_type.clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn respond(
    req: HttpRequest,
    body: web::Bytes,
    state: &StubState,
    response: &StubResponse,
) -> HttpResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    {
        let mut captured = state.captured.lock().unwrap();
        captured.body = Some(body.to_vec());
        captured.content_type = req
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
    }

    if response.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
    }

    HttpResponse::build(StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK))
        .content_type(response.content_type)
        .body(response.body.clone())
}

async fn handle_predict(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<StubState>,
) -> HttpResponse {
    respond(req, body, &state, &state.predict).await
}

async fn handle_batch(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<StubState>,
) -> HttpResponse {
    respond(req, body, &state, &state.batch).await
}
