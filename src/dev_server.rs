//! Reference question-answering backend for local development.
//!
//! Serves the two endpoints the client talks to:
//!
//! - `POST /upload`: multipart form with the document in field `pdf`; responds
//!   `{"pages": [{"page": n, "text": "..."}]}`
//! - `POST /query`: `{"question": "...", "pdfPages": [...]}`; responds
//!   `{"answer": "...", "citations": [{"page": n}]}`
//!
//! Answers are picked by keyword overlap: the best-scoring page supplies the
//! most relevant sentence, and the top pages are cited.

use crate::models::{Citation, PageData, QueryRequest, QueryResponse, UploadResponse};
use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Upload size cap for the multipart body.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// At most this many pages are cited per answer.
const MAX_CITATIONS: usize = 3;

pub const NO_MATCH_ANSWER: &str = "I couldn't find anything about that in the document.";

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "him", "his", "how", "its", "may", "who", "did", "does",
    "what", "when", "where", "which", "why", "with", "this", "that", "from", "they", "them",
    "there", "their", "about", "into", "than", "then", "these", "those", "would", "could",
    "should", "will", "been", "were", "your", "tell", "document", "pdf",
];

// ============================================================================
// Server
// ============================================================================

pub fn router() -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/query", post(query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "reference backend listening");
    }
    axum::serve(listener, router()).await
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload(mut multipart: Multipart) -> Response {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("pdf") {
            filename = field.file_name().unwrap_or("document.pdf").to_string();

            match field.bytes().await {
                Ok(bytes) => file_data = bytes.to_vec(),
                Err(e) => {
                    return (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                        .into_response()
                }
            }
            break;
        }
    }

    if file_data.is_empty() {
        return (StatusCode::BAD_REQUEST, "No file uploaded").into_response();
    }

    let size = file_data.len();
    let extracted =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&file_data))
            .await;

    let texts = match extracted {
        Ok(Ok(texts)) => texts,
        Ok(Err(e)) => {
            warn!(file = %filename, error = %e, "text extraction failed");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Failed to extract text: {}", e),
            )
                .into_response();
        }
        Err(e) => {
            warn!(file = %filename, error = %e, "extraction task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Extraction task failed").into_response();
        }
    };

    info!(file = %filename, bytes = size, pages = texts.len(), "document extracted");
    Json(UploadResponse { pages: page_records(texts) }).into_response()
}

pub async fn query(Json(request): Json<QueryRequest>) -> Json<QueryResponse> {
    let response = answer_question(&request.question, &request.pdf_pages);
    info!(
        pages = request.pdf_pages.len(),
        cited = response.citations.as_ref().map_or(0, Vec::len),
        "question answered"
    );
    Json(response)
}

fn page_records(texts: Vec<String>) -> Vec<PageData> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| serde_json::json!({ "page": i + 1, "text": text }))
        .collect()
}

// ============================================================================
// Answering
// ============================================================================

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9]+").unwrap())
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?\n]+[.!?]?").unwrap())
}

/// Lowercased content words of `text`, in order of first appearance.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn hits(terms: &[String], text: &str) -> usize {
    let lower = text.to_lowercase();
    terms.iter().map(|t| lower.matches(t.as_str()).count()).sum()
}

/// Page number and text of one page record. Records without a usable `page`
/// field (missing, or not a `u32`) are numbered by position.
fn page_fields(position: usize, page: &PageData) -> (u32, &str) {
    let number = page
        .get("page")
        .and_then(|p| p.as_u64())
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(position as u32 + 1);
    let text = page.get("text").and_then(|t| t.as_str()).unwrap_or("");
    (number, text)
}

pub fn answer_question(question: &str, pages: &[PageData]) -> QueryResponse {
    let terms = keywords(question);
    if terms.is_empty() {
        return QueryResponse { answer: NO_MATCH_ANSWER.to_string(), citations: Some(Vec::new()) };
    }

    let mut ranked: Vec<(usize, u32, &str)> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let (number, text) = page_fields(i, page);
            (hits(&terms, text), number, text)
        })
        .filter(|(score, _, _)| *score > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let Some(&(_, _, best_text)) = ranked.first() else {
        return QueryResponse { answer: NO_MATCH_ANSWER.to_string(), citations: Some(Vec::new()) };
    };

    let answer = sentence_re()
        .find_iter(best_text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .max_by(|a, b| hits(&terms, a).cmp(&hits(&terms, b)).then(b.len().cmp(&a.len())))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| NO_MATCH_ANSWER.to_string());

    let citations = ranked
        .iter()
        .take(MAX_CITATIONS)
        .map(|&(_, page, _)| Citation { page })
        .collect();

    QueryResponse { answer, citations: Some(citations) }
}

#[cfg(test)]
#[path = "dev_server_test.rs"]
mod dev_server_test;
