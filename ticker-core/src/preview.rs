//! Preview generation scheduling.
//!
//! Edits arrive faster than the renderer should be called, so the scheduler
//! debounces them: each edit saves the draft synchronously, then arms a
//! trailing timer for the configured quiet window. A newer edit aborts the
//! armed timer outright. Once the timer fires the request is in flight and
//! is not cancelled; instead every request carries a sequence number and a
//! completion whose sequence is no longer the latest is discarded, so the
//! last request always wins. Field toggles skip the timer and regenerate
//! immediately.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::CoreConfig;
use crate::draft::DraftStore;
use crate::error::TickerResult;
use crate::form::FormState;

/// Payload sent to the remote renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Ticket style to render.
    pub style: String,
    /// Field key → value map, empty strings for disabled/empty fields.
    pub user_data: serde_json::Map<String, serde_json::Value>,
    /// Requested image transport, always `"base64"`.
    pub format: String,
}

impl GenerateRequest {
    /// Build the payload for the current form and style.
    #[must_use]
    pub fn from_form(style: &str, form: &FormState) -> Self {
        Self {
            style: style.to_string(),
            user_data: form.user_data(),
            format: "base64".to_string(),
        }
    }
}

/// A rendered ticket preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    /// Decoded PNG bytes.
    pub bytes: Vec<u8>,
    /// Path of a cached copy on disk, when the renderer client kept one.
    pub cached_path: Option<PathBuf>,
}

/// Remote renderer boundary.
#[async_trait]
pub trait RenderClient: Send + Sync {
    /// Render a preview for `request`.
    async fn generate(&self, request: &GenerateRequest) -> TickerResult<PreviewImage>;
}

/// Events emitted by the scheduler.
#[derive(Debug)]
pub enum PreviewEvent {
    /// A generation request was issued to the renderer.
    Started {
        /// Sequence number of the request.
        seq: u64,
    },
    /// The latest request completed successfully.
    Ready {
        /// Sequence number of the request.
        seq: u64,
        /// The rendered preview.
        image: PreviewImage,
    },
    /// The latest request failed. There is no automatic retry.
    Failed {
        /// Sequence number of the request.
        seq: u64,
        /// Failure description.
        message: String,
    },
    /// The synchronous draft save that accompanies an edit failed.
    DraftSaveFailed {
        /// Failure description.
        message: String,
    },
}

/// Debouncing scheduler in front of a [`RenderClient`].
///
/// Requires a running tokio runtime; timers and requests are spawned tasks.
pub struct PreviewScheduler<R> {
    render: Arc<R>,
    drafts: DraftStore,
    window: Duration,
    auto_preview: bool,
    latest: Arc<AtomicU64>,
    pending: Mutex<Option<PendingTask>>,
    events: mpsc::UnboundedSender<PreviewEvent>,
}

/// An armed (or recently fired) debounce task. `armed` flips to false when
/// the timer elapses and the request goes in flight; only armed tasks may
/// be aborted.
struct PendingTask {
    armed: Arc<std::sync::atomic::AtomicBool>,
    handle: JoinHandle<()>,
}

impl<R: RenderClient + 'static> PreviewScheduler<R> {
    /// Scheduler with the debounce window from `config`, returning the
    /// receiving end of its event channel.
    #[must_use]
    pub fn new(
        render: Arc<R>,
        drafts: DraftStore,
        config: &CoreConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PreviewEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            render,
            drafts,
            window: Duration::from_millis(config.debounce_window_ms),
            auto_preview: config.auto_preview,
            latest: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            events,
        };
        (scheduler, receiver)
    }

    /// Record an edit: save the draft now, regenerate after the quiet
    /// window (when auto preview is on).
    pub fn note_edit(&self, form: &FormState, style: &str) {
        self.autosave(form, style);
        if self.auto_preview {
            self.schedule(GenerateRequest::from_form(style, form), self.window);
        }
    }

    /// Record a field toggle: save the draft now, regenerate immediately.
    pub fn note_toggle(&self, form: &FormState, style: &str) {
        self.autosave(form, style);
        self.schedule(GenerateRequest::from_form(style, form), Duration::ZERO);
    }

    /// Request generation immediately, bypassing the quiet window.
    pub fn generate_now(&self, form: &FormState, style: &str) {
        self.schedule(GenerateRequest::from_form(style, form), Duration::ZERO);
    }

    /// Lifecycle hook for page hide/unload: cancel any armed timer and do a
    /// final synchronous draft save.
    pub fn flush(&self, form: &FormState, style: &str) {
        self.cancel_pending();
        self.autosave(form, style);
    }

    /// Configured quiet window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn autosave(&self, form: &FormState, style: &str) {
        if let Err(e) = self.drafts.save(form, style) {
            tracing::warn!("draft autosave failed: {e}");
            let _ = self.events.send(PreviewEvent::DraftSaveFailed {
                message: e.to_string(),
            });
        }
    }

    fn cancel_pending(&self) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(task) = pending.take() {
            if task.armed.load(Ordering::SeqCst) {
                // Timer has not fired: cancel it outright. In-flight
                // requests are left to finish; the sequence check discards
                // their result if it is stale.
                task.handle.abort();
            }
        }
    }

    fn schedule(&self, request: GenerateRequest, delay: Duration) {
        self.cancel_pending();

        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let armed = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let render = Arc::clone(&self.render);
        let latest = Arc::clone(&self.latest);
        let task_armed = Arc::clone(&armed);
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // Past the timer: from here the request counts as in flight.
            task_armed.store(false, Ordering::SeqCst);
            let _ = events.send(PreviewEvent::Started { seq });

            let result = render.generate(&request).await;
            if latest.load(Ordering::SeqCst) != seq {
                tracing::debug!(seq, "discarding stale preview response");
                return;
            }
            match result {
                Ok(image) => {
                    let _ = events.send(PreviewEvent::Ready { seq, image });
                }
                Err(e) => {
                    tracing::warn!(seq, "preview generation failed: {e}");
                    let _ = events.send(PreviewEvent::Failed {
                        seq,
                        message: e.to_string(),
                    });
                }
            }
        });

        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *pending = Some(PendingTask { armed, handle });
    }
}
