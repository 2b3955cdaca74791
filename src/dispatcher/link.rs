//! Broker link abstraction
//!
//! A link issues requests (connect, publish, disconnect) and reports their
//! completion asynchronously as [`BrokerEvent`]s produced by the transport's
//! event loop.

use crate::error::Result;
use std::time::Duration;

/// Transport-assigned identifier of an outgoing publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u16);

/// Completion events delivered by the broker event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Connection acknowledgment; 0 is success
    ConnAck { code: u8 },
    /// A publish with this identifier left the client
    PublishComplete { id: MessageId },
    /// The event loop stopped
    ConnectionLost { reason: String },
}

/// Request side of a broker connection
#[async_trait::async_trait]
pub trait BrokerLink: Send {
    /// Issue the connect request; the outcome arrives as [`BrokerEvent::ConnAck`].
    async fn connect(&mut self, connect_timeout: Duration) -> Result<()>;

    /// Hand a message to the transport and return the identifier its
    /// completion event will carry.
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<MessageId>;

    /// Next event from the event loop; `None` once it has stopped.
    async fn next_event(&mut self) -> Option<BrokerEvent>;

    /// Tear the session down. Safe to call when never connected.
    async fn disconnect(&mut self) -> Result<()>;
}
