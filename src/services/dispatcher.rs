//! Event dispatcher - turns a classified reading into a queued job
//!
//! Every dispatch declares the queue, binds it to the logging exchange,
//! wraps the payload in a `JobEnvelope` and publishes it. Transient broker
//! faults are retried a bounded number of times; anything else drops the
//! event and the caller moves on.

use crate::domain::envelope::JobEnvelope;
use crate::domain::php_serialize::{EncodeError, Mapping};
use crate::domain::types::LogLevel;
use crate::infra::metrics::Metrics;
use crate::infra::sections::Section;
use crate::io::broker::{ChannelError, MessageChannel};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("payload encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("envelope serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Encode(_) => "encode",
            DispatchError::Serialize(_) => "serialize",
            DispatchError::Channel(e) => e.kind(),
        }
    }
}

/// Where a section's events go: fixed for a running section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub queue: String,
    pub routing_key: String,
    pub namespace: String,
}

impl Route {
    pub fn new(
        queue: impl Into<String>,
        routing_key: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self { queue: queue.into(), routing_key: routing_key.into(), namespace: namespace.into() }
    }

    /// Route for a section, `None` when the section has no consumer yet
    pub fn for_section(section: Section, queue: &str) -> Option<Self> {
        let routing_key = section.routing_key(queue)?;
        let namespace = section.namespace()?;
        Some(Self::new(queue, routing_key, namespace))
    }
}

/// Log payload the consumer job is constructed from
pub fn sensor_log(
    ip_address: &str,
    sensor_id: Option<&str>,
    status: Option<bool>,
    level: LogLevel,
    code: i64,
) -> Mapping {
    let message = Mapping::new().with("level", level.as_str()).with("content", code);
    Mapping::new()
        .with("ip_address", ip_address)
        .with("sensor_id", sensor_id)
        .with("status", status)
        .with("message", message)
}

pub struct Dispatcher {
    channel: Arc<dyn MessageChannel>,
    exchange: String,
    publish_retries: u32,
    retry_backoff: Duration,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        exchange: impl Into<String>,
        publish_retries: u32,
        retry_backoff: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { channel, exchange: exchange.into(), publish_retries, retry_backoff, metrics }
    }

    /// Publish one payload as a job on `routing_key`
    pub async fn dispatch(
        &self,
        queue: &str,
        routing_key: &str,
        namespace: &str,
        payload: &Mapping,
    ) -> Result<(), DispatchError> {
        self.channel.declare(queue).await?;
        self.channel.bind(&self.exchange, queue, routing_key).await?;

        let envelope = JobEnvelope::new(queue, routing_key, namespace, payload);
        let body = envelope.to_json()?;

        let mut attempt = 0u32;
        loop {
            match self.channel.publish(&self.exchange, routing_key, &body).await {
                Ok(()) => {
                    self.metrics.record_dispatched();
                    debug!(
                        routing_key = %routing_key,
                        job_uuid = %envelope.job_uuid(),
                        bytes = body.len(),
                        "job_published"
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.publish_retries => {
                    attempt += 1;
                    warn!(
                        routing_key = %routing_key,
                        attempt = attempt,
                        error = %e,
                        "publish_retry"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Dispatch along a fixed route
    pub async fn dispatch_to(&self, route: &Route, payload: &Mapping) -> Result<(), DispatchError> {
        self.dispatch(&route.queue, &route.routing_key, &route.namespace, payload).await
    }

    /// Best-effort channel release
    pub async fn close(&self) {
        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "broker_close_failed");
        }
    }
}
