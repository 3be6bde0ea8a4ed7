use crate::domain::events::DomainEvent;
use crate::domain::ports::EventSink;
use crate::error::{Result, SalonError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Logs every event as one structured line. What the CLI wires in when no
/// notification dispatcher is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| SalonError::Internal(Box::new(e)))?;
        tracing::info!(event = event.name(), %payload, "domain event");
        Ok(())
    }
}

/// Hands events to an asynchronous consumer, such as the notification
/// dispatcher, over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| SalonError::Unavailable("event consumer has shut down".into()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, _event: DomainEvent) -> Result<()> {
        Ok(())
    }
}
