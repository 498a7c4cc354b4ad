//! Scripted collaborators shared by the unit tests.
//!
//! Test documents are `%PDF-<n>` byte strings: the scripted engine and backend
//! both read the page count from them.

use crate::backend::QaBackend;
use crate::citations::ScrollTarget;
use crate::error::{ExtractionError, QueryError, RenderError};
use crate::models::{Citation, PageData, PdfFile, QueryResponse, RasterSurface};
use crate::render::{DocumentHandle, PdfEngine};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

pub fn pdf_file(name: &str, pages: u32) -> PdfFile {
    PdfFile::new(name, format!("%PDF-{}", pages).into_bytes())
}

fn scripted_page_count(bytes: &[u8]) -> Option<u32> {
    let rest = bytes.strip_prefix(b"%PDF-")?;
    std::str::from_utf8(rest).ok()?.trim().parse().ok()
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Default)]
pub struct ScriptedEngine {
    fixed_pages: Option<u32>,
    fail_at: Option<u32>,
    corrupt: bool,
    page_delay: Option<Duration>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl ScriptedEngine {
    pub fn pages(n: u32) -> Self {
        Self { fixed_pages: Some(n), ..Self::default() }
    }

    pub fn corrupt() -> Self {
        Self { corrupt: true, ..Self::default() }
    }

    pub fn failing_at(mut self, page: u32) -> Self {
        self.fail_at = Some(page);
        self
    }

    /// Block the calling thread this long per page.
    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Threads that ran `open` and `render_page`, in call order.
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }
}

struct ScriptedHandle {
    pages: u32,
    fail_at: Option<u32>,
    page_delay: Option<Duration>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl PdfEngine for ScriptedEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RenderError> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        if self.corrupt || !bytes.starts_with(b"%PDF-") {
            return Err(RenderError::Open("not a PDF".to_string()));
        }
        let pages = self.fixed_pages.or_else(|| scripted_page_count(bytes)).unwrap_or(1);
        Ok(Box::new(ScriptedHandle {
            pages,
            fail_at: self.fail_at,
            page_delay: self.page_delay,
            threads: self.threads.clone(),
        }))
    }
}

impl DocumentHandle for ScriptedHandle {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn render_page(&self, index: u32, scale: f32) -> Result<RasterSurface, RenderError> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        if let Some(delay) = self.page_delay {
            std::thread::sleep(delay);
        }
        if self.fail_at == Some(index) {
            return Err(RenderError::Page { page: index, message: "scripted failure".to_string() });
        }
        Ok(RasterSurface {
            width: (612.0 * scale) as u32,
            height: (792.0 * scale) as u32,
            scale,
            text_layer: format!("page {}", index),
        })
    }
}

// ============================================================================
// Backend
// ============================================================================

type ScriptedReply = (Duration, Result<QueryResponse, QueryError>);

#[derive(Default)]
pub struct ScriptedBackend {
    extract_delays: HashMap<String, Duration>,
    extract_failures: HashSet<String>,
    replies: Mutex<VecDeque<ScriptedReply>>,
    pub queries: Mutex<Vec<(String, Vec<PageData>)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract_delay(mut self, file: &str, delay: Duration) -> Self {
        self.extract_delays.insert(file.to_string(), delay);
        self
    }

    pub fn extract_fails(mut self, file: &str) -> Self {
        self.extract_failures.insert(file.to_string());
        self
    }

    pub fn reply(self, answer: &str, pages: &[u32]) -> Self {
        self.reply_after(Duration::ZERO, answer, pages)
    }

    pub fn reply_after(self, delay: Duration, answer: &str, pages: &[u32]) -> Self {
        let response = QueryResponse {
            answer: answer.to_string(),
            citations: Some(pages.iter().map(|&page| Citation { page }).collect()),
        };
        self.replies.lock().unwrap().push_back((delay, Ok(response)));
        self
    }

    pub fn reply_error(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((Duration::ZERO, Err(QueryError::Transport("connection refused".to_string()))));
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl QaBackend for ScriptedBackend {
    async fn extract(&self, file: &PdfFile) -> Result<Vec<PageData>, ExtractionError> {
        if let Some(delay) = self.extract_delays.get(&file.name) {
            tokio::time::sleep(*delay).await;
        }
        if self.extract_failures.contains(&file.name) {
            return Err(ExtractionError::Status { status: 500, body: "boom".to_string() });
        }
        let pages = scripted_page_count(&file.bytes).unwrap_or(1);
        Ok((1..=pages)
            .map(|page| serde_json::json!({ "page": page, "text": format!("{} page {}", file.name, page) }))
            .collect())
    }

    async fn query(&self, question: &str, pages: &[PageData]) -> Result<QueryResponse, QueryError> {
        self.queries
            .lock()
            .unwrap()
            .push((question.to_string(), pages.to_vec()));

        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some((delay, reply)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
            None => Ok(QueryResponse { answer: "ok".to_string(), citations: None }),
        }
    }
}

// ============================================================================
// Scroll Target
// ============================================================================

#[derive(Default)]
pub struct RecordingScroller {
    pub requests: Mutex<Vec<String>>,
}

impl RecordingScroller {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ScrollTarget for RecordingScroller {
    fn scroll_into_view(&self, bounds_key: &str) {
        self.requests.lock().unwrap().push(bounds_key.to_string());
    }
}

// ============================================================================
// Fixture Documents
// ============================================================================

/// A small but real PDF with one page per entry in `texts`, MediaBox 595x842
/// inherited from the page tree root.
pub fn sample_pdf(texts: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
