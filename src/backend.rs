//! Extraction/QA backend interface and its HTTP implementation.
//!
//! The session core only depends on [`QaBackend`]; [`HttpBackend`] talks to a
//! service exposing `POST /upload` (multipart field `pdf`) and `POST /query`.

use crate::config::ClientConfig;
use crate::error::{ExtractionError, QueryError};
use crate::models::{PageData, PdfFile, QueryRequest, QueryResponse, UploadResponse, PDF_CONTENT_TYPE};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};
use url::Url;

#[async_trait]
pub trait QaBackend: Send + Sync {
    /// Upload raw document bytes and receive per-page data.
    async fn extract(&self, file: &PdfFile) -> Result<Vec<PageData>, ExtractionError>;

    /// Ask a question against previously extracted pages.
    async fn query(&self, question: &str, pages: &[PageData]) -> Result<QueryResponse, QueryError>;
}

// ============================================================================
// HTTP Backend
// ============================================================================

pub struct HttpBackend {
    client: reqwest::Client,
    upload_url: Url,
    query_url: Url,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = match builder.build() {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    error = %e,
                    timeout = ?config.request_timeout,
                    "HTTP client setup failed, using defaults without timeout"
                );
                reqwest::Client::new()
            }
        };

        Self {
            client,
            upload_url: config.upload_url(),
            query_url: config.query_url(),
        }
    }
}

#[async_trait]
impl QaBackend for HttpBackend {
    async fn extract(&self, file: &PdfFile) -> Result<Vec<PageData>, ExtractionError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(PDF_CONTENT_TYPE)
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        let form = Form::new().part("pdf", part);

        debug!(url = %self.upload_url, file = %file.name, bytes = file.size(), "uploading document");

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Status { status: status.as_u16(), body });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Decode(e.to_string()))?;

        Ok(body.pages)
    }

    async fn query(&self, question: &str, pages: &[PageData]) -> Result<QueryResponse, QueryError> {
        let request = QueryRequest {
            question: question.to_string(),
            pdf_pages: pages.to_vec(),
        };

        debug!(url = %self.query_url, pages = pages.len(), "sending query");

        let response = self
            .client
            .post(self.query_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status { status: status.as_u16(), body });
        }

        response
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))
    }
}
