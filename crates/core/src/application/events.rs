//! Completion event bus
//!
//! Listeners run sequentially, in registration order, inside the worker task
//! that completed the job. A failing or panicking listener is logged and the
//! remaining listeners still run.

use crate::application::worker::constants::CONTEXT_MARKER_PATH;
use crate::application::worker::{execute_guarded, PanicGuardResult};
use crate::domain::CompletionEvent;
use crate::error::Result;
use crate::port::MarkerWriter;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// Callback invoked after each successfully processed job
#[async_trait]
pub trait CompletionListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn on_completed(&self, event: &CompletionEvent) -> Result<()>;
}

/// Process-wide completion bus
#[derive(Clone, Default)]
pub struct CompletionBus {
    listeners: Arc<RwLock<Vec<Arc<dyn CompletionListener>>>>,
}

impl CompletionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it runs after every listener registered before it
    pub fn subscribe(&self, listener: Arc<dyn CompletionListener>) {
        debug!(listener = %listener.name(), "Subscribed completion listener");
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Invoke all listeners with `event`
    ///
    /// Returns the number of listeners that failed or panicked.
    pub async fn publish(&self, event: &CompletionEvent) -> usize {
        // snapshot so no lock is held across listener awaits
        let listeners: Vec<Arc<dyn CompletionListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut failures = 0;
        for listener in listeners {
            match execute_guarded(listener.on_completed(event)).await {
                PanicGuardResult::Success(Ok(())) => {}
                PanicGuardResult::Success(Err(e)) => {
                    failures += 1;
                    error!(
                        listener = %listener.name(),
                        job_id = %event.job_id,
                        error = %e,
                        "Completion listener failed"
                    );
                }
                PanicGuardResult::Panicked(msg) => {
                    failures += 1;
                    error!(
                        listener = %listener.name(),
                        job_id = %event.job_id,
                        panic_msg = %msg,
                        "Completion listener panicked"
                    );
                }
            }
        }
        failures
    }
}

/// Records the context of the last processed job (`tenant_<id>` or `central`)
pub struct ContextMarkerListener {
    writer: Arc<dyn MarkerWriter>,
    path: String,
}

impl ContextMarkerListener {
    pub fn new(writer: Arc<dyn MarkerWriter>) -> Self {
        Self::with_path(writer, CONTEXT_MARKER_PATH)
    }

    pub fn with_path(writer: Arc<dyn MarkerWriter>, path: impl Into<String>) -> Self {
        Self {
            writer,
            path: path.into(),
        }
    }
}

#[async_trait]
impl CompletionListener for ContextMarkerListener {
    fn name(&self) -> &str {
        "context_marker"
    }

    async fn on_completed(&self, event: &CompletionEvent) -> Result<()> {
        self.writer
            .write_marker(&self.path, &event.tenant.marker())
            .await?;
        Ok(())
    }
}
