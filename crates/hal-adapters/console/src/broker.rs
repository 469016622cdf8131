//! The console broker.

use std::sync::Arc;

use async_trait::async_trait;
use hal_core::{Broker, BoxedBroker, BrokerError, BrokerResult, ConfigurableBroker, Event};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::config::ConsoleConfig;

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// The broker-native payload of a console event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    /// 1-based line number in the input.
    pub number: u64,
    /// The line as read, before trimming.
    pub raw: String,
}

/// A broker that reads chat lines from one stream and writes replies to another.
///
/// Every non-empty input line becomes one event in the configured room, from
/// the configured user. Replies are written as `[room] body`. Room and user
/// ids are their own names.
pub struct ConsoleBroker {
    config: ConsoleConfig,
    reader: Mutex<Option<Reader>>,
    writer: Mutex<Writer>,
}

impl ConsoleBroker {
    /// A console broker over stdin and stdout.
    pub fn new(config: ConsoleConfig) -> Self {
        Self::with_io(
            config,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }

    /// A console broker over arbitrary async streams.
    pub fn with_io<R, W>(config: ConsoleConfig, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            config,
            reader: Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    fn event(self: &Arc<Self>, number: u64, raw: String) -> Event {
        let broker: BoxedBroker = Arc::clone(self) as BoxedBroker;
        Event::new(
            broker,
            self.config.room.as_str(),
            self.config.user.as_str(),
            raw.trim(),
        )
        .with_room_name(self.config.room.as_str())
        .with_user_name(self.config.user.as_str())
        .with_original(ConsoleLine { number, raw })
    }
}

#[async_trait]
impl Broker for ConsoleBroker {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, event: &Event) -> BrokerResult<()> {
        let line = format!("[{}] {}\n", event.room(), event.body());
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BrokerError::send(e.to_string()))?;
        writer.flush().await?;
        Ok(())
    }

    async fn stream(self: Arc<Self>, out: mpsc::Sender<Event>) -> BrokerResult<()> {
        let Some(reader) = self.reader.lock().await.take() else {
            return Err(BrokerError::StreamFailed(
                "console input is already being read".into(),
            ));
        };

        info!(room = %self.config.room, user = %self.config.user, "Reading console input");

        let mut lines = reader.lines();
        let mut number = 0;
        while let Some(raw) = lines.next_line().await? {
            number += 1;
            if raw.trim().is_empty() {
                continue;
            }
            let event = self.event(number, raw);
            out.send(event).await.map_err(|_| BrokerError::Closed)?;
        }

        debug!(lines = number, "Console input closed");
        Ok(())
    }

    fn looks_like_room_id(&self, s: &str) -> bool {
        !s.is_empty()
    }

    fn looks_like_user_id(&self, s: &str) -> bool {
        !s.is_empty()
    }

    fn room_id_to_name(&self, id: &str) -> Option<String> {
        Some(id.to_string())
    }

    fn room_name_to_id(&self, name: &str) -> Option<String> {
        Some(name.to_string())
    }

    fn user_id_to_name(&self, id: &str) -> Option<String> {
        Some(id.to_string())
    }

    fn user_name_to_id(&self, name: &str) -> Option<String> {
        Some(name.to_string())
    }
}

impl ConfigurableBroker for ConsoleBroker {
    type Config = ConsoleConfig;

    fn config_key() -> &'static str {
        "console"
    }

    fn from_config(config: Self::Config) -> Self {
        Self::new(config)
    }
}
