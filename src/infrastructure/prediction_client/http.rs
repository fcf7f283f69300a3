use super::PredictionClient;
use crate::domain::error::{AppError, Result};
use crate::domain::prediction::{BatchPrediction, ErrorResponse, PredictResponse, PredictionRequest};
use crate::domain::upload::UploadFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpPredictionClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPredictionClient {
    /// `timeout` of `None` leaves requests bounded only by the transport.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid prediction server URL '{}': {}", base_url, e))
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-2xx response into a `RemoteError`, preferring the
    /// server's own `error` message.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|body| body.error)
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

        warn!(status = status.as_u16(), error = %message, "Prediction server rejected request");
        Err(AppError::RemoteError(message))
    }

    fn invalid_body(err: reqwest::Error) -> AppError {
        AppError::TransportError(format!("Invalid response from prediction server: {}", err))
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict_single(&self, request: &PredictionRequest) -> Result<f64> {
        let url = self.endpoint("predict");
        debug!(%url, ?request, "Requesting single prediction");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::TransportError(e.to_string()))?;

        let body: PredictResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::invalid_body)?;

        body.predictions.first().ok_or_else(|| {
            AppError::RemoteError("Prediction server returned no predictions".to_string())
        })
    }

    async fn predict_batch(&self, file: &UploadFile) -> Result<BatchPrediction> {
        let url = self.endpoint("batch_predict");
        debug!(%url, file = %file.name, bytes = file.size(), "Uploading batch file");

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str("text/csv")
            .map_err(|e| AppError::Internal(format!("Invalid multipart content type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::TransportError(e.to_string()))?;

        let mut body: BatchPrediction = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::invalid_body)?;

        if body.export_csv().is_none() {
            body.csv = None;
        }
        Ok(body)
    }
}
