//! Simulated upload progress.
//!
//! Progress is a local timer, not a measurement of the real transfer: a fixed
//! step every fixed interval until 100, then the completion callback fires
//! once. Starting a new upload aborts the running sequence.

use crate::error::UploadInterrupted;
use crate::models::PdfFile;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

struct ActiveUpload {
    file: String,
    handle: JoinHandle<()>,
}

pub struct UploadTracker {
    step: u8,
    interval: Duration,
    current: Option<ActiveUpload>,
}

impl UploadTracker {
    pub fn new(step: u8, interval: Duration) -> Self {
        Self {
            step,
            interval,
            current: None,
        }
    }

    /// Begin a progress sequence for `file`, cancelling any previous one.
    ///
    /// `on_progress` sees each percentage in increasing order; `on_complete`
    /// runs exactly once after 100 unless the sequence is superseded first.
    /// Must be called from within a tokio runtime.
    pub fn start<P, C>(&mut self, file: PdfFile, on_progress: P, on_complete: C)
    where
        P: Fn(u8) + Send + 'static,
        C: FnOnce(PdfFile) + Send + 'static,
    {
        self.cancel();

        let steps = progress_steps(self.step);
        let interval = self.interval;
        let name = file.name.clone();

        let handle = tokio::spawn(async move {
            for percent in steps {
                tokio::time::sleep(interval).await;
                on_progress(percent);
            }
            on_complete(file);
        });

        self.current = Some(ActiveUpload { file: name, handle });
    }

    /// Stop the running sequence without completing it.
    pub fn cancel(&mut self) -> Option<UploadInterrupted> {
        let active = self.current.take()?;
        if active.handle.is_finished() {
            return None;
        }
        active.handle.abort();

        let interrupted = UploadInterrupted { file: active.file };
        debug!("{}", interrupted);
        Some(interrupted)
    }

    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .map(|a| !a.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for UploadTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Percentages reported for one upload: strictly increasing, ending at 100.
/// The last step is clamped when `step` does not divide 100.
pub fn progress_steps(step: u8) -> Vec<u8> {
    let step = step.max(1);
    let mut steps = Vec::new();
    let mut progress: u8 = 0;
    while progress < 100 {
        progress = progress.saturating_add(step).min(100);
        steps.push(progress);
    }
    steps
}
