//! Document session controller.
//!
//! Coordinates the three asynchronous flows of a session: simulated upload
//! progress, backend extraction, and page rendering, plus the conversation and
//! citation navigation on top of them.
//!
//! Every file selection bumps the session generation. Tasks of the previous
//! generation are aborted, and every write back into the session re-checks the
//! generation under the session lock, so a superseded document can never leak
//! pages, progress or rendered output into the current one. Events are sent
//! while the session lock is held, so subscribers see them in state order.

use crate::backend::{HttpBackend, QaBackend};
use crate::citations::{CitationNavigator, ScrollTarget};
use crate::config::ClientConfig;
use crate::conversation::ConversationManager;
use crate::error::{ExtractionError, RenderError, SessionError};
use crate::extraction::ExtractionClient;
use crate::models::{
    Document, ExtractionStatus, Message, PageData, PdfFile, Phase, RenderStatus, RenderedPage,
    SessionEvent,
};
use crate::render::{DocumentRenderer, LopdfEngine, PdfEngine, RenderOutcome, Viewer};
use crate::upload::UploadTracker;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

const EVENT_CAPACITY: usize = 256;

// ============================================================================
// Session State
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub generation: u64,
    pub document: Option<Document>,
    pub phase: Phase,
    pub upload_progress: u8,
    pub pages: Vec<PageData>,
    pub extraction: ExtractionStatus,
    pub render: RenderStatus,
    pub viewer: Viewer,
    /// Pending composer text.
    pub input: String,
}

impl Session {
    fn begin(&mut self, file: &PdfFile) -> u64 {
        self.generation += 1;
        self.document = Some(Document::from_file(file, self.generation));
        self.phase = Phase::Uploading;
        self.upload_progress = 0;
        self.pages.clear();
        self.extraction = ExtractionStatus::Pending;
        self.render = RenderStatus::Idle;
        self.viewer.clear();
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Queries need a document whose upload finished and whose pages were
    /// extracted.
    pub fn can_query(&self) -> bool {
        self.document.is_some()
            && self.phase == Phase::Ready
            && self.extraction == ExtractionStatus::Complete
    }
}

/// Point-in-time copy of everything the presentation layer renders.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: Session,
    pub messages: Vec<Message>,
    pub pending_replies: usize,
}

impl SessionSnapshot {
    pub fn rendered_pages(&self) -> &[RenderedPage] {
        self.session.viewer.pages()
    }

    /// The chat surface is shown once the upload is done, even while pages are
    /// still rendering.
    pub fn chat_visible(&self) -> bool {
        self.session.document.is_some() && self.session.phase == Phase::Ready
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Tasks working for the current generation. Held for the whole of a file
/// selection and of an upload completion, so generations start and store
/// their tasks one at a time. Lock order: lifecycle, then state.
struct Lifecycle {
    upload: UploadTracker,
    extraction: Option<JoinHandle<()>>,
    render: Option<JoinHandle<()>>,
}

impl Lifecycle {
    fn abort_all(&mut self) {
        self.upload.cancel();
        for handle in [self.extraction.take(), self.render.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

struct Inner {
    state: Mutex<Session>,
    lifecycle: Mutex<Lifecycle>,
    extraction: ExtractionClient,
    renderer: DocumentRenderer,
    conversation: ConversationManager,
    navigator: CitationNavigator,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        config: &ClientConfig,
        backend: Arc<dyn QaBackend>,
        engine: Arc<dyn PdfEngine>,
        scroll: Arc<dyn ScrollTarget>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Inner {
            state: Mutex::new(Session::default()),
            lifecycle: Mutex::new(Lifecycle {
                upload: UploadTracker::new(config.progress_step, config.progress_interval),
                extraction: None,
                render: None,
            }),
            extraction: ExtractionClient::new(backend.clone()),
            renderer: DocumentRenderer::new(engine, config.render_scale),
            conversation: ConversationManager::new(backend).with_events(events.clone()),
            navigator: CitationNavigator::new(scroll),
            events,
        };

        Self { inner: Arc::new(inner) }
    }

    /// Controller wired to the HTTP backend and the lopdf engine.
    pub fn from_config(config: &ClientConfig, scroll: Arc<dyn ScrollTarget>) -> Self {
        Self::new(
            config,
            Arc::new(HttpBackend::new(config)),
            Arc::new(LopdfEngine),
            scroll,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.inner.lock_state().clone(),
            messages: self.inner.conversation.messages(),
            pending_replies: self.inner.conversation.pending(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock_state().generation
    }

    /// Make `file` the active document, superseding whatever was loaded.
    ///
    /// Valid in any phase. Starts upload progress and extraction
    /// concurrently; rendering starts when the upload completes. The
    /// conversation log is kept. Returns the new generation. Must be called
    /// from within a tokio runtime.
    pub fn choose_file(&self, file: PdfFile) -> Result<u64, SessionError> {
        if file.size() == 0 {
            return Err(SessionError::EmptyFile(file.name));
        }
        if !file.is_pdf() {
            return Err(SessionError::NotPdf(file.name));
        }

        let mut lifecycle = self.inner.lock_lifecycle();
        lifecycle.abort_all();

        let generation = {
            let mut state = self.inner.lock_state();
            let generation = state.begin(&file);
            self.inner.emit(SessionEvent::FileChosen { generation, name: file.name.clone() });
            generation
        };
        info!(generation, file = %file.name, bytes = file.size(), "document chosen");

        let inner = self.inner.clone();
        let extraction_file = file.clone();
        lifecycle.extraction = Some(tokio::spawn(async move {
            let result = inner.extraction.submit(&extraction_file).await;
            inner.apply_extraction(generation, result);
        }));

        let on_progress = {
            let inner = self.inner.clone();
            move |percent| inner.apply_progress(generation, percent)
        };
        let on_complete = {
            let inner = self.inner.clone();
            move |file: PdfFile| Inner::complete_upload(&inner, generation, file)
        };
        lifecycle.upload.start(file, on_progress, on_complete);

        Ok(generation)
    }

    pub fn set_input(&self, text: &str) {
        self.inner.lock_state().input = text.to_string();
    }

    pub fn input(&self) -> String {
        self.inner.lock_state().input.clone()
    }

    /// Send the pending input and clear it.
    ///
    /// A no-op that leaves the input in place when it is blank or the
    /// document cannot be queried yet.
    pub fn submit_input(&self) -> Option<JoinHandle<Message>> {
        let (text, pages) = {
            let mut state = self.inner.lock_state();
            if state.input.trim().is_empty() || !state.can_query() {
                return None;
            }
            (std::mem::take(&mut state.input), state.pages.clone())
        };
        self.inner.conversation.send(&text, Some(&pages))
    }

    /// Send `text` with the current page data, bypassing the composer.
    pub fn send_message(&self, text: &str) -> Option<JoinHandle<Message>> {
        let pages = {
            let state = self.inner.lock_state();
            state.can_query().then(|| state.pages.clone())
        };
        self.inner.conversation.send(text, pages.as_deref())
    }

    /// Scroll the viewer to a cited page. Silently ignored if that page is
    /// not rendered.
    pub fn navigate(&self, page: u32) -> bool {
        let key = {
            let state = self.inner.lock_state();
            self.inner.navigator.resolve(&state.viewer, page)
        };
        match key {
            Some(key) => {
                self.inner.navigator.scroll_to(&key);
                self.inner.emit(SessionEvent::Navigated { page });
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Task Callbacks
// ============================================================================

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn apply_progress(&self, generation: u64, percent: u8) {
        let mut state = self.lock_state();
        if !state.is_current(generation) {
            return;
        }
        state.upload_progress = state.upload_progress.max(percent);
        self.emit(SessionEvent::UploadProgress { generation, percent });
    }

    /// Runs on the upload task. The generation check and the render handle
    /// store happen under the lifecycle lock, so a newer selection either
    /// lands before (and this completion is dropped) or after (and aborts
    /// the render started here).
    fn complete_upload(inner: &Arc<Inner>, generation: u64, file: PdfFile) {
        let mut lifecycle = inner.lock_lifecycle();
        {
            let mut state = inner.lock_state();
            if !state.is_current(generation) {
                debug!(generation, "stale upload completion dropped");
                return;
            }
            state.upload_progress = 100;
            state.phase = Phase::Ready;
            state.render = RenderStatus::Rendering;
            state.viewer.clear();
            inner.emit(SessionEvent::UploadComplete { generation });
        }
        info!(generation, file = %file.name, "upload complete");

        let task_inner = inner.clone();
        let render = tokio::spawn(async move {
            let result = task_inner
                .renderer
                .render(file.bytes, |page| task_inner.accept_page(generation, page))
                .await;
            task_inner.finish_render(generation, result);
        });

        if let Some(previous) = lifecycle.render.replace(render) {
            previous.abort();
        }
    }

    fn apply_extraction(&self, generation: u64, result: Result<Vec<PageData>, ExtractionError>) {
        let mut state = self.lock_state();
        if !state.is_current(generation) {
            debug!(generation, current = state.generation, "stale extraction result dropped");
            return;
        }
        let event = match result {
            Ok(pages) => {
                let count = pages.len();
                state.pages = pages;
                state.extraction = ExtractionStatus::Complete;
                SessionEvent::PagesExtracted { generation, count }
            }
            Err(e) => {
                state.pages.clear();
                state.extraction = ExtractionStatus::Failed(e.to_string());
                SessionEvent::ExtractionFailed { generation, error: e.to_string() }
            }
        };
        self.emit(event);
    }

    /// Render sink: append `page` if its document is still current.
    fn accept_page(&self, generation: u64, page: RenderedPage) -> bool {
        let index = page.index;
        let mut state = self.lock_state();
        let accepted = state.is_current(generation) && state.viewer.append(page);
        if accepted {
            self.emit(SessionEvent::PageRendered { generation, index });
        }
        accepted
    }

    fn finish_render(&self, generation: u64, result: Result<RenderOutcome, RenderError>) {
        let mut state = self.lock_state();
        if !state.is_current(generation) {
            return;
        }
        let event = match result {
            Ok(RenderOutcome::Completed { pages }) => {
                state.render = RenderStatus::Complete;
                SessionEvent::RenderComplete { generation, pages }
            }
            Ok(RenderOutcome::Abandoned { .. }) => return,
            Err(e) => {
                warn!(generation, error = %e, rendered = state.viewer.len(), "render failed");
                state.render = RenderStatus::Failed(e.to_string());
                SessionEvent::RenderFailed { generation, error: e.to_string() }
            }
        };
        self.emit(event);
    }
}
