// =============================================================================
// Kafka plumbing — frame producer and consumer for the market topic
// =============================================================================

pub mod consumer;
pub mod producer;

pub use consumer::FrameConsumer;
pub use producer::{FrameProducer, FramePublisher};
