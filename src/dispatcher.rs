//! Ordered delivery of device settings over the control broker
//!
//! The dispatcher walks a fixed state machine:
//!
//! ```text
//! Init -> Connecting -> Connected -> Publishing(0) -> Acked(0) -> ... -> Done
//! ```
//!
//! Setting `i + 1` is only published after the completion of setting `i` has
//! been observed, so the device never sees a discharge floor that disagrees
//! with its charge target. Every wait is bounded and the session is torn down
//! on every exit path.

use crate::config::{BrokerConfig, TopicsConfig};
use crate::error::{ReserveError, Result};
use crate::heuristic::BatteryTarget;
use crate::logging::get_logger;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

pub mod link;
pub mod mqtt;

pub use link::{BrokerEvent, BrokerLink, MessageId};
pub use mqtt::MqttLink;

/// Payload that enables grid charging
pub const GRID_CHARGE_ENABLE: &str = "true";

/// A setting waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub topic: String,
    pub payload: String,
}

impl PendingCommand {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Settings for a target, in delivery order: charge target, discharge floor,
/// grid charge enable.
pub fn build_commands(target: &BatteryTarget, topics: &TopicsConfig) -> Vec<PendingCommand> {
    vec![
        PendingCommand::new(
            topics.topic(&topics.charge_target),
            target.charge_setpoint().to_string(),
        ),
        PendingCommand::new(
            topics.topic(&topics.discharge_floor),
            target.discharge_floor().to_string(),
        ),
        PendingCommand::new(topics.topic(&topics.grid_charge), GRID_CHARGE_ENABLE),
    ]
}

/// Dispatcher progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Init,
    Connecting,
    Connected,
    Publishing(usize),
    Acked(usize),
    Done,
    Failed(String),
}

/// Sequences commands over a [`BrokerLink`]
pub struct CommandDispatcher<L: BrokerLink> {
    link: L,
    connect_timeout: Duration,
    ack_timeout: Duration,
    state: DispatchState,
    logger: crate::logging::StructuredLogger,
}

impl<L: BrokerLink> CommandDispatcher<L> {
    pub fn new(link: L, config: &BrokerConfig) -> Self {
        Self::with_timeouts(
            link,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.ack_timeout_secs),
        )
    }

    pub fn with_timeouts(link: L, connect_timeout: Duration, ack_timeout: Duration) -> Self {
        Self {
            link,
            connect_timeout,
            ack_timeout,
            state: DispatchState::Init,
            logger: get_logger("dispatcher"),
        }
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Deliver `commands` in order. The link is disconnected whatever the outcome.
    pub async fn dispatch(&mut self, commands: &[PendingCommand]) -> Result<()> {
        let result = self.run(commands).await;

        if let Err(e) = self.link.disconnect().await {
            self.logger.warn(&format!("Broker teardown failed: {}", e));
        }

        match &result {
            Ok(()) => {
                self.transition(DispatchState::Done);
                self.logger
                    .info(&format!("All {} settings delivered", commands.len()));
            }
            Err(e) => {
                self.logger.error(&format!("Dispatch failed: {}", e));
                self.transition(DispatchState::Failed(e.to_string()));
            }
        }
        result
    }

    async fn run(&mut self, commands: &[PendingCommand]) -> Result<()> {
        self.transition(DispatchState::Connecting);
        self.link.connect(self.connect_timeout).await?;
        self.await_connack().await?;
        self.transition(DispatchState::Connected);

        for (i, command) in commands.iter().enumerate() {
            self.transition(DispatchState::Publishing(i));
            self.logger.info(&format!(
                "Publishing {}/{}: {} = {}",
                i + 1,
                commands.len(),
                command.topic,
                command.payload
            ));
            let id = self.link.publish(&command.topic, &command.payload).await?;
            self.await_publish_complete(id, command).await?;
            self.transition(DispatchState::Acked(i));
        }
        Ok(())
    }

    /// Transport failures before any CONNACK count as a failed handshake.
    async fn await_connack(&mut self) -> Result<()> {
        let what = "connection acknowledgment";
        let deadline = Instant::now() + self.connect_timeout + self.ack_timeout;
        loop {
            match self.wait_event(deadline, what).await? {
                Some(BrokerEvent::ConnAck { code: 0 }) => return Ok(()),
                Some(BrokerEvent::ConnAck { code }) => {
                    return Err(ReserveError::connection_refused(code));
                }
                Some(BrokerEvent::ConnectionLost { reason }) => {
                    return Err(ReserveError::handshake_failed(reason));
                }
                None => {
                    return Err(ReserveError::handshake_failed(format!(
                        "event loop stopped while awaiting {}",
                        what
                    )));
                }
                Some(other) => self
                    .logger
                    .debug(&format!("Ignoring {:?} while connecting", other)),
            }
        }
    }

    async fn await_publish_complete(&mut self, id: MessageId, command: &PendingCommand) -> Result<()> {
        let deadline = Instant::now() + self.ack_timeout;
        let what = format!("publish completion for '{}'", command.topic);
        loop {
            match self.wait_event(deadline, &what).await? {
                Some(BrokerEvent::PublishComplete { id: done }) if done == id => return Ok(()),
                Some(BrokerEvent::ConnectionLost { reason }) => {
                    return Err(ReserveError::network(format!(
                        "connection lost while awaiting {}: {}",
                        what, reason
                    )));
                }
                None => {
                    return Err(ReserveError::network(format!(
                        "event loop stopped while awaiting {}",
                        what
                    )));
                }
                Some(other) => self
                    .logger
                    .debug(&format!("Ignoring {:?} while awaiting {:?}", other, id)),
            }
        }
    }

    /// Next link event, or `Timeout` once `deadline` passes
    async fn wait_event(&mut self, deadline: Instant, what: &str) -> Result<Option<BrokerEvent>> {
        timeout_at(deadline, self.link.next_event())
            .await
            .map_err(|_| ReserveError::timeout(format!("no {} received", what)))
    }

    fn transition(&mut self, next: DispatchState) {
        self.logger
            .debug(&format!("Dispatcher {:?} -> {:?}", self.state, next));
        self.state = next;
    }
}
