//! Loan event channel backed by a Redis Stream and a consumer group
//!
//! Publishing appends to the stream (`XADD`). Consuming reads through the
//! group (`XREADGROUP`), so every delivery stays in the consumer's pending
//! list until it is acknowledged with `XACK`. Pending entries are handed
//! out again on start-up and then every `redelivery_interval`, which gives
//! at-least-once delivery with manual acknowledgment. A sweep pages through
//! the whole pending list, one `batch_size` page per `receive`.

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, MultiplexedConnection},
    streams::{StreamReadOptions, StreamReadReply},
    AsyncCommands, Client,
};
use std::time::Instant;
use tokio::sync::Mutex;

use crate::{
    config::RedisConfig,
    error::{AppError, AppResult},
    models::event::LoanEvent,
    ports::{Delivery, EventConsumer, EventPublisher},
};

/// Stream entry field holding the JSON event
const EVENT_FIELD: &str = "event";

/// Read new entries never delivered to any consumer of the group
const NEW_ENTRIES: &str = ">";
/// Read this consumer's delivered but unacknowledged entries from the start
const PENDING_ENTRIES: &str = "0";

pub struct RedisEventChannel {
    config: RedisConfig,
    /// Shared connection for `XADD`/`XACK`
    writer: ConnectionManager,
    /// Dedicated connection for blocking reads, so acks never queue behind them
    reader: MultiplexedConnection,
    sweep: Mutex<Sweep>,
}

/// Progress through this consumer's pending list
#[derive(Debug, Default)]
struct Sweep {
    /// When the current or last sweep started, `None` before the first one
    started: Option<Instant>,
    /// Entry id to read after, `None` when no sweep is in progress
    cursor: Option<String>,
}

/// Where the next page of a sweep starts, `None` once a short page shows the
/// pending list is exhausted
fn next_cursor(page: &[Delivery], batch_size: usize) -> Option<String> {
    if page.len() < batch_size {
        return None;
    }
    page.last().map(|delivery| delivery.id.clone())
}

impl RedisEventChannel {
    /// Connect to Redis, check the connection and make sure the stream and
    /// consumer group exist
    pub async fn connect(config: &RedisConfig) -> AppResult<Self> {
        let client = Client::open(config.url.as_str())?;

        let mut writer = ConnectionManager::new(client.clone()).await?;
        redis::cmd("PING").query_async::<_, String>(&mut writer).await?;

        let reader = client.get_multiplexed_async_connection().await?;

        let channel = Self {
            config: config.clone(),
            writer,
            reader,
            sweep: Mutex::new(Sweep::default()),
        };
        channel.ensure_group().await?;

        Ok(channel)
    }

    async fn ensure_group(&self) -> AppResult<()> {
        let mut conn = self.writer.clone();
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(&self.config.stream, &self.config.group, "0")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(AppError::Channel(e)),
        }
    }

    /// Start of the next pending page, starting a new sweep when one is due
    async fn pending_start(&self) -> Option<String> {
        let mut sweep = self.sweep.lock().await;
        if sweep.cursor.is_none() {
            let due = match sweep.started {
                None => true,
                Some(at) => at.elapsed() >= self.config.redelivery_interval(),
            };
            if due {
                sweep.started = Some(Instant::now());
                sweep.cursor = Some(PENDING_ENTRIES.to_string());
            }
        }
        sweep.cursor.clone()
    }

    async fn advance_sweep(&self, page: &[Delivery]) {
        self.sweep.lock().await.cursor = next_cursor(page, self.config.batch_size);
    }

    async fn read(&self, start: &str) -> AppResult<Vec<Delivery>> {
        let mut options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(self.config.batch_size);
        if start == NEW_ENTRIES {
            options = options.block(self.config.block_ms);
        }

        let mut conn = self.reader.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.config.stream], &[start], &options)
            .await?;

        let deliveries = reply
            .map(|reply| {
                reply
                    .keys
                    .into_iter()
                    .flat_map(|key| key.ids)
                    .map(|entry| Delivery {
                        body: entry.get::<Vec<u8>>(EVENT_FIELD),
                        id: entry.id,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(deliveries)
    }
}

#[async_trait]
impl EventPublisher for RedisEventChannel {
    async fn publish(&self, event: &LoanEvent) -> AppResult<()> {
        let body = event.to_json()?;
        let mut conn = self.writer.clone();
        let entry_id: String = conn
            .xadd(&self.config.stream, "*", &[(EVENT_FIELD, body.as_str())])
            .await?;

        tracing::debug!(
            event_id = %event.event_id,
            entry_id = %entry_id,
            "Published {}",
            event.event_type
        );
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for RedisEventChannel {
    async fn receive(&self) -> AppResult<Vec<Delivery>> {
        if let Some(start) = self.pending_start().await {
            let pending = self.read(&start).await?;
            self.advance_sweep(&pending).await;
            if !pending.is_empty() {
                tracing::info!(count = pending.len(), "Redelivering pending events");
                return Ok(pending);
            }
        }

        self.read(NEW_ENTRIES).await
    }

    async fn ack(&self, delivery_id: &str) -> AppResult<()> {
        let mut conn = self.writer.clone();
        let _: i64 = conn
            .xack(&self.config.stream, &self.config.group, &[delivery_id])
            .await?;
        Ok(())
    }
}
