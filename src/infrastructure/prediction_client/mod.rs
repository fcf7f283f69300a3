pub mod http;

#[cfg(test)]
pub(crate) mod stub_server;

use crate::domain::error::Result;
use crate::domain::prediction::{BatchPrediction, PredictionRequest};
use crate::domain::upload::UploadFile;
use async_trait::async_trait;

pub use http::HttpPredictionClient;

/// The remote prediction server, seen only through its two endpoints.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    /// One record in, the first prediction out.
    async fn predict_single(&self, request: &PredictionRequest) -> Result<f64>;

    /// Upload the raw file; the server returns result rows and a rendered CSV.
    async fn predict_batch(&self, file: &UploadFile) -> Result<BatchPrediction>;
}
