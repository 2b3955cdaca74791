#![allow(dead_code)]

use battery_reserve::Config;
use battery_reserve::dispatcher::{BrokerEvent, BrokerLink, MessageId};
use battery_reserve::series::{Sample, TimeSeries};
use chrono::{NaiveDate, NaiveTime};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

pub fn ts(date: NaiveDate, hour: u32) -> i64 {
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap())
        .and_utc()
        .timestamp()
}

/// Sun table CSV with one row per `(date, rise_h, rise_m, set_h, set_m)`
pub fn sun_table(rows: &[(NaiveDate, u32, u32, u32, u32)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "year,month,day,rise_hour_utc,rise_minute_utc,set_hour_utc,set_minute_utc"
    )
    .unwrap();
    for (date, rh, rm, sh, sm) in rows {
        use chrono::Datelike;
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            date.year(),
            date.month(),
            date.day(),
            rh,
            rm,
            sh,
            sm
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

/// Hourly `cloud_cover` forecast starting at midnight of `date`
pub fn daily_forecast(date: NaiveDate, covers: &[f64]) -> TimeSeries {
    TimeSeries::new(
        "daily_forecast",
        vec!["cloud_cover".to_string()],
        covers
            .iter()
            .enumerate()
            .map(|(h, &c)| Sample::new(ts(date, h as u32), vec![c]))
            .collect(),
    )
    .unwrap()
}

pub fn config_with_sun_table(table: &tempfile::NamedTempFile) -> Config {
    let mut config = Config::default();
    config.daylight.sun_table = table.path().display().to_string();
    config.logging.console_output = false;
    config
}

/// Operations observed by a [`ScriptedLink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOp {
    Connect,
    Publish { topic: String, payload: String },
    Disconnect,
}

#[derive(Debug, Default)]
pub struct LinkRecord {
    pub ops: Vec<LinkOp>,
    /// Set when a publish was issued while a previous one was unacknowledged
    pub overlapped: bool,
}

impl LinkRecord {
    pub fn publishes(&self) -> Vec<(String, String)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                LinkOp::Publish { topic, payload } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn connected(&self) -> bool {
        self.ops.contains(&LinkOp::Connect)
    }

    pub fn disconnected(&self) -> bool {
        self.ops.last() == Some(&LinkOp::Disconnect)
    }
}

/// Broker stand-in whose acknowledgments follow a script
pub struct ScriptedLink {
    record: Arc<Mutex<LinkRecord>>,
    connack: Option<u8>,
    acked_publishes: Option<usize>,
    fail_publish_at: Option<usize>,
    lose_connection_at: Option<usize>,
    queue: VecDeque<BrokerEvent>,
    outstanding: Option<MessageId>,
    published: usize,
}

impl ScriptedLink {
    /// Accepts the connection and acknowledges every publish
    pub fn new() -> Self {
        Self {
            record: Arc::new(Mutex::new(LinkRecord::default())),
            connack: Some(0),
            acked_publishes: None,
            fail_publish_at: None,
            lose_connection_at: None,
            queue: VecDeque::new(),
            outstanding: None,
            published: 0,
        }
    }

    pub fn refusing(mut self, code: u8) -> Self {
        self.connack = Some(code);
        self
    }

    /// Never acknowledge the connection
    pub fn silent_connect(mut self) -> Self {
        self.connack = None;
        self
    }

    /// Only acknowledge the first `n` publishes
    pub fn acking_only(mut self, n: usize) -> Self {
        self.acked_publishes = Some(n);
        self
    }

    /// Fail the hand-off of publish number `index`
    pub fn failing_publish(mut self, index: usize) -> Self {
        self.fail_publish_at = Some(index);
        self
    }

    /// Report a lost connection instead of acknowledging publish `index`
    pub fn losing_connection_at(mut self, index: usize) -> Self {
        self.lose_connection_at = Some(index);
        self
    }

    pub fn record(&self) -> Arc<Mutex<LinkRecord>> {
        Arc::clone(&self.record)
    }

    fn push_op(&self, op: LinkOp) {
        self.record.lock().unwrap().ops.push(op);
    }
}

#[async_trait::async_trait]
impl BrokerLink for ScriptedLink {
    async fn connect(&mut self, _connect_timeout: Duration) -> battery_reserve::Result<()> {
        self.push_op(LinkOp::Connect);
        if let Some(code) = self.connack {
            self.queue.push_back(BrokerEvent::ConnAck { code });
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> battery_reserve::Result<MessageId> {
        let index = self.published;
        self.published += 1;
        {
            let mut record = self.record.lock().unwrap();
            if self.outstanding.is_some() {
                record.overlapped = true;
            }
            record.ops.push(LinkOp::Publish {
                topic: topic.to_string(),
                payload: payload.to_string(),
            });
        }

        if self.fail_publish_at == Some(index) {
            return Err(battery_reserve::ReserveError::publish(topic, "client queue closed"));
        }

        let id = MessageId(index as u16 + 1);
        self.outstanding = Some(id);
        if self.lose_connection_at == Some(index) {
            self.queue.push_back(BrokerEvent::ConnectionLost {
                reason: "connection reset by peer".to_string(),
            });
        } else if self.acked_publishes.is_none_or(|n| index < n) {
            self.queue.push_back(BrokerEvent::PublishComplete { id });
        }
        Ok(id)
    }

    async fn next_event(&mut self) -> Option<BrokerEvent> {
        match self.queue.pop_front() {
            Some(event) => {
                if let BrokerEvent::PublishComplete { id } = &event
                    && self.outstanding == Some(*id)
                {
                    self.outstanding = None;
                }
                Some(event)
            }
            // Silence: nothing more will ever arrive
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) -> battery_reserve::Result<()> {
        self.push_op(LinkOp::Disconnect);
        Ok(())
    }
}
