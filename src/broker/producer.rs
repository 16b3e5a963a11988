// =============================================================================
// Frame producer — fire-and-forget publish of binary envelopes
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::debug;

use crate::config::KafkaConfig;

/// Enqueue timeout for a single publish.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can publish an opaque frame to the log.
///
/// The throttle worker is written against this seam so it can be exercised
/// without a broker.
#[async_trait]
pub trait FramePublisher: Send + Sync {
    async fn publish(&self, payload: &[u8]) -> Result<()>;
}

/// Kafka-backed publisher for the market topic.  No keys, no headers; the
/// broker assigns partitions.
pub struct FrameProducer {
    inner: FutureProducer,
    topic: String,
}

impl FrameProducer {
    pub fn new(cfg: &KafkaConfig) -> Result<Self> {
        let inner: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.bootstrap)
            .set("message.timeout.ms", "5000")
            .create()
            .context("failed to create Kafka producer")?;

        Ok(Self {
            inner,
            topic: cfg.topic.clone(),
        })
    }
}

#[async_trait]
impl FramePublisher for FrameProducer {
    async fn publish(&self, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload);
        let (partition, offset) = self
            .inner
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(e, _)| e)
            .with_context(|| format!("failed to publish to topic {}", self.topic))?;
        debug!(topic = %self.topic, partition, offset, bytes = payload.len(), "frame published");
        Ok(())
    }
}
