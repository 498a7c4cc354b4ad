//! Page-by-page document rendering into the viewer.
//!
//! The decoding engine is a collaborator behind [`PdfEngine`]; the default
//! [`LopdfEngine`] sizes each page from its MediaBox and carries the page text
//! as the surface's text layer. [`DocumentRenderer`] decodes once per call and
//! emits pages strictly in order, yielding between pages so earlier pages are
//! visible before later ones finish. Engine work runs on the blocking pool.

use crate::error::RenderError;
use crate::models::{bounds_key, RasterSurface, RenderedPage};
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// US Letter in PDF points, used when a page has no usable MediaBox.
const FALLBACK_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Inherited attributes are looked up through at most this many parents.
const MAX_PARENT_DEPTH: usize = 32;

// ============================================================================
// Engine Interface
// ============================================================================

pub trait PdfEngine: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RenderError>;
}

pub trait DocumentHandle: Send {
    fn page_count(&self) -> u32;

    /// Render the 1-based page `index` at `scale`.
    fn render_page(&self, index: u32, scale: f32) -> Result<RasterSurface, RenderError>;
}

// ============================================================================
// lopdf Engine
// ============================================================================

pub struct LopdfEngine;

struct LopdfHandle {
    doc: lopdf::Document,
    page_ids: Vec<ObjectId>,
}

impl PdfEngine for LopdfEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RenderError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| RenderError::Open(e.to_string()))?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

        if page_ids.is_empty() {
            return Err(RenderError::Open("document has no pages".to_string()));
        }

        Ok(Box::new(LopdfHandle { doc, page_ids }))
    }
}

impl DocumentHandle for LopdfHandle {
    fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    fn render_page(&self, index: u32, scale: f32) -> Result<RasterSurface, RenderError> {
        let page_id = index
            .checked_sub(1)
            .and_then(|i| self.page_ids.get(i as usize))
            .copied()
            .ok_or_else(|| RenderError::Page {
                page: index,
                message: "page out of range".to_string(),
            })?;

        let page = self.doc.get_dictionary(page_id).map_err(|e| RenderError::Page {
            page: index,
            message: e.to_string(),
        })?;

        let (width, height) = media_box(&self.doc, page).unwrap_or_else(|| {
            debug!(page = index, "no MediaBox, using US Letter");
            FALLBACK_PAGE_SIZE
        });

        let text_layer = match self.doc.extract_text(&[index]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page = index, error = %e, "text layer unavailable");
                String::new()
            }
        };

        Ok(RasterSurface {
            width: (width * scale as f64).round() as u32,
            height: (height * scale as f64).round() as u32,
            scale,
            text_layer,
        })
    }
}

/// Page size in points from the page's MediaBox, following `Parent` links
/// since MediaBox is inheritable.
fn media_box(doc: &lopdf::Document, page: &Dictionary) -> Option<(f64, f64)> {
    let mut dict = page;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(obj) = dict.get(b"MediaBox") {
            if let Some(size) = resolve(doc, obj).and_then(box_size) {
                return Some(size);
            }
        }
        dict = match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok()?,
            _ => return None,
        };
    }
    None
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn box_size(obj: &Object) -> Option<(f64, f64)> {
    let coords = match obj {
        Object::Array(items) if items.len() >= 4 => items,
        _ => return None,
    };
    let x1 = as_f64(&coords[0])?;
    let y1 = as_f64(&coords[1])?;
    let x2 = as_f64(&coords[2])?;
    let y2 = as_f64(&coords[3])?;
    Some(((x2 - x1).abs(), (y2 - y1).abs()))
}

fn as_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

// ============================================================================
// Viewer Surface
// ============================================================================

/// Rendered pages in display order plus the `bounds_key` lookup table used by
/// citation navigation.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pages: Vec<RenderedPage>,
    lookup: HashMap<String, usize>,
}

impl Viewer {
    pub fn clear(&mut self) {
        self.pages.clear();
        self.lookup.clear();
    }

    /// Append the next page. Pages must arrive as 1, 2, 3, ...; anything else
    /// is refused.
    pub fn append(&mut self, page: RenderedPage) -> bool {
        if page.index as usize != self.pages.len() + 1 {
            warn!(expected = self.pages.len() + 1, got = page.index, "out-of-order page refused");
            return false;
        }
        self.lookup.insert(page.bounds_key.clone(), self.pages.len());
        self.pages.push(page);
        true
    }

    pub fn find(&self, page: u32) -> Option<&RenderedPage> {
        self.lookup
            .get(&bounds_key(page))
            .and_then(|&i| self.pages.get(i))
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

// ============================================================================
// Renderer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Every page was emitted.
    Completed { pages: u32 },
    /// The sink refused a page; nothing further was rendered.
    Abandoned { rendered: u32 },
}

#[derive(Clone)]
pub struct DocumentRenderer {
    engine: Arc<dyn PdfEngine>,
    scale: f32,
}

impl DocumentRenderer {
    pub fn new(engine: Arc<dyn PdfEngine>, scale: f32) -> Self {
        Self { engine, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Decode `bytes` once and hand pages 1..=N to `emit` in order.
    ///
    /// Decoding and each page render run on the blocking pool; `emit` runs
    /// on the calling task. `emit` returns `false` when the render has been
    /// superseded; rendering stops there. On a page failure the pages already
    /// emitted stay with the sink and the error is returned.
    pub async fn render<F>(&self, bytes: Arc<[u8]>, mut emit: F) -> Result<RenderOutcome, RenderError>
    where
        F: FnMut(RenderedPage) -> bool,
    {
        let engine = self.engine.clone();
        let mut handle = tokio::task::spawn_blocking(move || engine.open(&bytes))
            .await
            .map_err(|e| RenderError::Open(format!("decode task failed: {}", e)))??;
        let count = handle.page_count();
        debug!(pages = count, scale = self.scale, "document decoded");

        for index in 1..=count {
            let scale = self.scale;
            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = handle.render_page(index, scale);
                (handle, result)
            })
            .await
            .map_err(|e| RenderError::Page {
                page: index,
                message: format!("render task failed: {}", e),
            })?;
            handle = returned;

            if !emit(RenderedPage::new(index, result?)) {
                debug!(rendered = index - 1, "render abandoned");
                return Ok(RenderOutcome::Abandoned { rendered: index - 1 });
            }
            tokio::task::yield_now().await;
        }

        Ok(RenderOutcome::Completed { pages: count })
    }
}
