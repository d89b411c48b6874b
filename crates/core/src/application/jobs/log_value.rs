// LogValue job: write a tenant attribute to a named marker location

use crate::domain::{JobKind, JobPayload};
use crate::port::{JobContext, JobError, JobHandler, MarkerWriter};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const DEFAULT_ATTRIBUTE: &str = "abc";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogValuePayload {
    /// Tenant attribute to read
    #[serde(default = "default_attribute")]
    pub attribute: String,
    /// Marker location, relative to the writer's base; defaults to the attribute name
    #[serde(default)]
    pub target: Option<String>,
}

fn default_attribute() -> String {
    DEFAULT_ATTRIBUTE.to_string()
}

impl LogValuePayload {
    pub fn parse(payload: &JobPayload) -> Result<Self, JobError> {
        serde_json::from_value(payload.as_value().clone())
            .map_err(|e| JobError::InvalidPayload(e.to_string()))
    }

    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.attribute)
    }
}

pub struct LogValueJob {
    writer: Arc<dyn MarkerWriter>,
}

impl LogValueJob {
    pub fn new(writer: Arc<dyn MarkerWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl JobHandler for LogValueJob {
    fn kind(&self) -> JobKind {
        JobKind::LogValue
    }

    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<(), JobError> {
        let payload = LogValuePayload::parse(payload)?;
        // central context and missing attributes both log an empty value
        let value = ctx.attribute(&payload.attribute).unwrap_or_default();

        self.writer.write_marker(payload.target(), value).await?;

        info!(
            job_id = %ctx.job_id,
            tenant = %ctx.tenant,
            attribute = %payload.attribute,
            target = %payload.target(),
            "Tenant value logged"
        );
        Ok(())
    }
}
