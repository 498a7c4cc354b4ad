//! The question/answer conversation.
//!
//! The log is append-only. A send appends the user message before it returns,
//! then a background task asks the backend and appends exactly one assistant
//! message, either the answer or [`FALLBACK_REPLY`]. Replies land in
//! completion order, so with several sends in flight they may interleave with
//! later user messages.

use crate::backend::QaBackend;
use crate::models::{Message, PageData, SessionEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Assistant text used when the backend cannot answer.
pub const FALLBACK_REPLY: &str = "Network Error";

#[derive(Clone)]
pub struct ConversationManager {
    backend: Arc<dyn QaBackend>,
    log: Arc<Mutex<Vec<Message>>>,
    in_flight: Arc<AtomicUsize>,
    events: Option<broadcast::Sender<SessionEvent>>,
}

impl ConversationManager {
    pub fn new(backend: Arc<dyn QaBackend>) -> Self {
        Self {
            backend,
            log: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Send `text` with the current document's page data.
    ///
    /// `pages` is `None` when no document is loaded. Blank text or a missing
    /// document make this a no-op returning `None`. Otherwise the user message
    /// is already in the log when this returns, and the handle resolves to the
    /// assistant message once it has been appended. Must be called from within
    /// a tokio runtime.
    pub fn send(&self, text: &str, pages: Option<&[PageData]>) -> Option<JoinHandle<Message>> {
        if text.trim().is_empty() {
            return None;
        }
        let pages = pages?.to_vec();

        append(&self.log, &self.events, Message::user(text));
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let backend = self.backend.clone();
        let log = self.log.clone();
        let events = self.events.clone();
        let in_flight = self.in_flight.clone();
        let question = text.to_string();

        Some(tokio::spawn(async move {
            let reply = match backend.query(&question, &pages).await {
                Ok(response) => {
                    let citations = response.citations.unwrap_or_default();
                    debug!(citations = citations.len(), "answer received");
                    Message::assistant(response.answer, citations)
                }
                Err(e) => {
                    warn!(error = %e, "query failed, using fallback reply");
                    Message::assistant(FALLBACK_REPLY, Vec::new())
                }
            };

            append(&log, &events, reply.clone());
            in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        }))
    }

    pub fn messages(&self) -> Vec<Message> {
        lock_log(&self.log).clone()
    }

    pub fn len(&self) -> usize {
        lock_log(&self.log).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends still waiting on the backend.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

fn lock_log(log: &Mutex<Vec<Message>>) -> std::sync::MutexGuard<'_, Vec<Message>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn append(
    log: &Mutex<Vec<Message>>,
    events: &Option<broadcast::Sender<SessionEvent>>,
    message: Message,
) {
    let sender = message.sender;
    let index = {
        let mut log = lock_log(log);
        log.push(message);
        log.len() - 1
    };
    if let Some(tx) = events {
        let _ = tx.send(SessionEvent::MessageAppended { index, sender });
    }
}
