// Worker Builder

use super::{Worker, WorkerConfig};
use crate::application::events::CompletionBus;
use crate::application::jobs::HandlerRegistry;
use crate::application::tenant_resolver::TenantResolver;
use crate::error::{AppError, Result};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{JobQueue, RestartSignal, TenantDirectory, TimeProvider};
use std::sync::Arc;

/// Assembles a `Worker`; queue, tenant directory and handlers are required
#[derive(Default)]
pub struct WorkerBuilder {
    name: Option<String>,
    config: WorkerConfig,
    queue: Option<Arc<dyn JobQueue>>,
    tenants: Option<Arc<dyn TenantDirectory>>,
    handlers: Option<HandlerRegistry>,
    bus: Option<CompletionBus>,
    restart_signal: Option<Arc<dyn RestartSignal>>,
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl WorkerBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn tenants(mut self, directory: Arc<dyn TenantDirectory>) -> Self {
        self.tenants = Some(directory);
        self
    }

    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Completion bus; defaults to an empty one
    pub fn bus(mut self, bus: CompletionBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn restart_signal(mut self, signal: Arc<dyn RestartSignal>) -> Self {
        self.restart_signal = Some(signal);
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(time_provider);
        self
    }

    pub fn build(self) -> Result<Worker> {
        let queue = self
            .queue
            .ok_or_else(|| AppError::Config("worker requires a job queue".to_string()))?;
        let tenants = self
            .tenants
            .ok_or_else(|| AppError::Config("worker requires a tenant directory".to_string()))?;
        let handlers = self
            .handlers
            .ok_or_else(|| AppError::Config("worker requires a handler registry".to_string()))?;

        Ok(Worker {
            name: self
                .name
                .unwrap_or_else(|| format!("worker-{}", self.config.queue)),
            config: self.config,
            queue,
            resolver: Arc::new(TenantResolver::new(tenants)),
            handlers: Arc::new(handlers),
            bus: self.bus.unwrap_or_default(),
            restart_signal: self.restart_signal,
            time_provider: self
                .time_provider
                .unwrap_or_else(|| Arc::new(SystemTimeProvider)),
        })
    }
}
