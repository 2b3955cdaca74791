//! MQTT broker link built on rumqttc
//!
//! The rumqttc event loop runs on its own task and forwards connection and
//! publish completions through a bounded channel.

use super::link::{BrokerEvent, BrokerLink, MessageId};
use crate::config::BrokerConfig;
use crate::error::{ReserveError, Result};
use crate::logging::get_logger;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const REQUEST_CAPACITY: usize = 10;
const EVENT_CAPACITY: usize = 16;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// rumqttc-backed [`BrokerLink`], at-most-once delivery
pub struct MqttLink {
    options: MqttOptions,
    client: Option<AsyncClient>,
    events: Option<mpsc::Receiver<BrokerEvent>>,
    event_loop: Option<JoinHandle<()>>,
    logger: crate::logging::StructuredLogger,
}

impl MqttLink {
    pub fn new(config: &BrokerConfig) -> Self {
        let client_id = if config.client_id.is_empty() {
            format!("battery-reserve-{}", uuid::Uuid::new_v4().simple())
        } else {
            config.client_id.clone()
        };

        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)));
        options.set_clean_session(true);
        if let Some(user) = config.username.as_ref() {
            options.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
        }

        Self {
            options,
            client: None,
            events: None,
            event_loop: None,
            logger: get_logger("mqtt"),
        }
    }
}

fn return_code(code: ConnectReturnCode) -> u8 {
    code as u8
}

#[async_trait::async_trait]
impl BrokerLink for MqttLink {
    async fn connect(&mut self, connect_timeout: Duration) -> Result<()> {
        let (host, port) = self.options.broker_address();
        self.logger
            .info(&format!("Connecting to MQTT broker at {}:{}", host, port));

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        eventloop
            .network_options
            .set_connection_timeout(connect_timeout.as_secs().max(1));

        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let logger = self.logger.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => BrokerEvent::ConnAck {
                        code: return_code(ack.code),
                    },
                    Ok(Event::Outgoing(Outgoing::Publish(pkid))) => BrokerEvent::PublishComplete {
                        id: MessageId(pkid),
                    },
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        logger.debug("Disconnect sent, stopping event loop");
                        break;
                    }
                    Ok(other) => {
                        logger.trace(&format!("MQTT event: {:?}", other));
                        continue;
                    }
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        let _ = tx
                            .send(BrokerEvent::ConnAck {
                                code: return_code(code),
                            })
                            .await;
                        break;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(BrokerEvent::ConnectionLost {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        self.client = Some(client);
        self.events = Some(rx);
        self.event_loop = Some(handle);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<MessageId> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ReserveError::publish(topic, "not connected"))?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(|e| ReserveError::publish(topic, e.to_string()))?;
        // At-most-once publishes carry no packet id
        Ok(MessageId(0))
    }

    async fn next_event(&mut self) -> Option<BrokerEvent> {
        match self.events.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            self.logger.info("Disconnecting from MQTT broker");
            if let Err(e) = client.disconnect().await {
                self.logger
                    .debug(&format!("Disconnect request not delivered: {}", e));
            }
        }
        if let Some(mut handle) = self.event_loop.take()
            && timeout(SHUTDOWN_GRACE, &mut handle).await.is_err()
        {
            self.logger.warn("Event loop did not stop in time, aborting");
            handle.abort();
        }
        self.events = None;
        Ok(())
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
        }
    }
}
