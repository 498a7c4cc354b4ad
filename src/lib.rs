//! Document chat library - session core for a PDF question-answering client.
//!
//! A user picks a PDF, which is uploaded with simulated progress, sent to the
//! backend for per-page text extraction and rendered page by page into the
//! viewer. Questions about the document go to the backend; answers carry page
//! citations that scroll the viewer.
//!
//! - `session`: the controller tying every flow to the active document
//! - `upload`: simulated upload progress
//! - `extraction`: backend extraction requests
//! - `render`: page rendering and the viewer surface
//! - `conversation`: the chat log and backend queries
//! - `citations`: citation-driven viewer navigation
//! - `backend`: the backend interface and its HTTP client
//! - `dev_server`: a reference backend for local development

pub mod backend;
pub mod citations;
pub mod config;
pub mod conversation;
pub mod dev_server;
pub mod error;
pub mod extraction;
pub mod models;
pub mod render;
pub mod session;
pub mod upload;

#[cfg(test)]
mod testing;

pub use backend::{HttpBackend, QaBackend};
pub use citations::{CitationNavigator, NoopScroll, ScrollTarget};
pub use config::ClientConfig;
pub use error::{ConfigError, ExtractionError, QueryError, RenderError, SessionError};
pub use models::{Citation, Message, PdfFile, Phase, SessionEvent};
pub use session::{Session, SessionController, SessionSnapshot};

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
pub const DEV_SERVER_ADDR: &str = "127.0.0.1:3000";

/// Simulated upload progress: `DEFAULT_PROGRESS_STEP` percent every
/// `DEFAULT_PROGRESS_INTERVAL_MS`.
pub const DEFAULT_PROGRESS_STEP: u8 = 10;
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

pub const DEFAULT_RENDER_SCALE: f32 = 1.5;
