// =============================================================================
// Frame consumer — at-least-once pull from the market topic
// =============================================================================

use anyhow::{Context, Result};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;

use crate::config::KafkaConfig;

/// Consumer group shared by all stream-processor instances.
const GROUP_ID: &str = "stream-processor-group";

/// Kafka consumer joined to the stream-processor group.  Offsets start at
/// `latest` and auto-commit, so replay after a restart begins at the live
/// edge of the topic.
pub struct FrameConsumer {
    inner: StreamConsumer,
}

impl FrameConsumer {
    pub fn new(cfg: &KafkaConfig) -> Result<Self> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.bootstrap)
            .set("group.id", GROUP_ID)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .create()
            .context("failed to create Kafka consumer")?;

        inner
            .subscribe(&[&cfg.topic])
            .with_context(|| format!("failed to subscribe to topic {}", cfg.topic))?;

        Ok(Self { inner })
    }

    /// Wait for the next message and return its payload.  Messages without a
    /// payload yield `None`.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>> {
        let message = self
            .inner
            .recv()
            .await
            .context("Kafka consumer poll failed")?;
        Ok(message.payload().map(<[u8]>::to_vec))
    }
}
