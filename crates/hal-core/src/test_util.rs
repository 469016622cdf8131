//! Test helpers, enabled with the `test-util` feature.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::broker::Broker;
use crate::error::{BrokerError, BrokerResult};
use crate::event::Event;

/// A message recorded by [`RecordingBroker::send`].
///
/// Holds no broker handle, so recording never keeps the broker alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    room_id: String,
    user_id: String,
    body: String,
}

impl SentMessage {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A broker that records everything sent through it.
///
/// Its `stream` forwards whatever is pushed with [`inject`](Self::inject),
/// so tests can drive a router end to end.
pub struct RecordingBroker {
    name: String,
    sent: Mutex<Vec<SentMessage>>,
    sent_notify: Notify,
    inbound_tx: mpsc::UnboundedSender<(String, String)>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<(String, String)>>>,
}

impl RecordingBroker {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: name.into(),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        })
    }

    /// Builds an event in `room_id` from user `tester`, originating here.
    pub fn event(self: &Arc<Self>, room_id: &str, body: &str) -> Event {
        Event::new(Arc::clone(self) as Arc<dyn Broker>, room_id, "tester", body)
    }

    /// Queues an event to be produced by `stream`.
    pub fn inject(&self, room_id: &str, body: &str) {
        let _ = self.inbound_tx.send((room_id.to_string(), body.to_string()));
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Bodies of everything sent so far.
    pub fn sent_bodies(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.body.clone()).collect()
    }

    /// Waits until at least `count` events have been sent.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<SentMessage> {
        loop {
            let notified = self.sent_notify.notified();
            {
                let sent = self.sent.lock();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &Event) -> BrokerResult<()> {
        self.sent.lock().push(SentMessage {
            room_id: event.room_id().to_string(),
            user_id: event.user_id().to_string(),
            body: event.body().to_string(),
        });
        self.sent_notify.notify_waiters();
        Ok(())
    }

    async fn stream(self: Arc<Self>, out: mpsc::Sender<Event>) -> BrokerResult<()> {
        let Some(mut rx) = self.inbound_rx.lock().take() else {
            return Err(BrokerError::StreamFailed("already streaming".into()));
        };
        while let Some((room_id, body)) = rx.recv().await {
            let event = self.event(&room_id, &body);
            out.send(event).await.map_err(|_| BrokerError::Closed)?;
        }
        Ok(())
    }

    fn looks_like_room_id(&self, _s: &str) -> bool {
        true
    }

    fn room_id_to_name(&self, id: &str) -> Option<String> {
        Some(id.to_string())
    }
}
