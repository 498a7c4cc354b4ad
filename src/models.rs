//! Data models for the document chat client.
//!
//! This module contains the session data model (documents, messages, rendered
//! pages) and the wire types exchanged with the extraction/QA backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque per-page payload produced by the backend's `/upload` endpoint.
/// It is passed through verbatim to `/query`.
pub type PageData = serde_json::Value;

// ============================================================================
// Files and Documents
// ============================================================================

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file the user picked, before it becomes the active document.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub name: String,
    /// Declared MIME type, if the picker supplied one.
    pub content_type: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl PdfFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: Some(PDF_CONTENT_TYPE.to_string()),
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(|c| c.to_string());
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// A declared content type wins; without one, sniff the `%PDF-` header.
    pub fn is_pdf(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.eq_ignore_ascii_case(PDF_CONTENT_TYPE),
            None => self.bytes.starts_with(PDF_MAGIC),
        }
    }
}

/// The active document of a session.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub size: usize,
    pub bytes: Arc<[u8]>,
    /// Lifecycle this document belongs to.
    pub generation: u64,
}

impl Document {
    pub fn from_file(file: &PdfFile, generation: u64) -> Self {
        Self {
            name: file.name.clone(),
            size: file.size(),
            bytes: file.bytes.clone(),
            generation,
        }
    }

    /// Human readable size, e.g. "1.25 MB".
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size as f64 / (1024.0 * 1024.0))
    }
}

// ============================================================================
// Session Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Phase {
    #[default]
    Empty,
    Uploading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtractionStatus {
    #[default]
    Idle,
    Pending,
    Complete,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderStatus {
    #[default]
    Idle,
    Rendering,
    Complete,
    Failed(String),
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            citations: Vec::new(),
            sent_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            citations,
            sent_at: Utc::now(),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Raster surface for one page, sized for the requested scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    /// Text drawn on the page, for selection and accessibility.
    pub text_layer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub index: u32,
    pub surface: RasterSurface,
    pub bounds_key: String,
}

impl RenderedPage {
    pub fn new(index: u32, surface: RasterSurface) -> Self {
        Self {
            index,
            surface,
            bounds_key: bounds_key(index),
        }
    }
}

/// Stable viewer key for a page, shared by rendering and citation lookup.
pub fn bounds_key(index: u32) -> String {
    format!("page-{}", index)
}

// ============================================================================
// Session Events
// ============================================================================

/// Notifications for the presentation layer. Document-scoped events carry the
/// generation they belong to; only current-generation events are ever sent.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    FileChosen { generation: u64, name: String },
    UploadProgress { generation: u64, percent: u8 },
    UploadComplete { generation: u64 },
    PagesExtracted { generation: u64, count: usize },
    ExtractionFailed { generation: u64, error: String },
    PageRendered { generation: u64, index: u32 },
    RenderComplete { generation: u64, pages: u32 },
    RenderFailed { generation: u64, error: String },
    MessageAppended { index: usize, sender: Sender },
    Navigated { page: u32 },
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub pages: Vec<PageData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(rename = "pdfPages")]
    pub pdf_pages: Vec<PageData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Option<Vec<Citation>>,
}
