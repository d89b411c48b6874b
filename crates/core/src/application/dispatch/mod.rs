// Dispatch Service - Enqueue jobs stamped with the caller's tenant context

pub mod enqueue;

pub use enqueue::{validate_request, DispatchRequest};

use crate::error::Result;
use crate::port::{IdProvider, JobQueue, Tenancy, TimeProvider};
use std::sync::Arc;

/// Dispatch Service
#[derive(Clone)]
pub struct DispatchService {
    queue: Arc<dyn JobQueue>,
    tenancy: Arc<dyn Tenancy>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl DispatchService {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        tenancy: Arc<dyn Tenancy>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue,
            tenancy,
            id_provider,
            time_provider,
        }
    }

    /// Same service, dispatching from another tenancy scope
    pub fn for_tenancy(&self, tenancy: Arc<dyn Tenancy>) -> Self {
        Self {
            tenancy,
            ..self.clone()
        }
    }

    /// Enqueue a new job, returns its id
    pub async fn dispatch(&self, req: DispatchRequest) -> Result<String> {
        enqueue::execute(
            self.queue.as_ref(),
            self.tenancy.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }
}
