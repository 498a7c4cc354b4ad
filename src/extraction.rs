//! Document extraction: ship the raw file to the backend and get back the
//! per-page data later bundled with every query.

use crate::backend::QaBackend;
use crate::error::ExtractionError;
use crate::models::{PageData, PdfFile};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ExtractionClient {
    backend: Arc<dyn QaBackend>,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn QaBackend>) -> Self {
        Self { backend }
    }

    /// Submit `file` for extraction.
    ///
    /// Callers own the supersession check: a result for a file that is no
    /// longer current must be dropped by whoever applies it.
    pub async fn submit(&self, file: &PdfFile) -> Result<Vec<PageData>, ExtractionError> {
        match self.backend.extract(file).await {
            Ok(pages) => {
                info!(file = %file.name, pages = pages.len(), "extraction complete");
                Ok(pages)
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "extraction failed");
                Err(e)
            }
        }
    }
}
