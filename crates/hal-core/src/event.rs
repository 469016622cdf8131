//! The event model.
//!
//! Every inbound chat message is normalized into one concrete [`Event`]. An
//! event always carries the broker it came from, so replies can be routed
//! back without any lookup: there is no way to build an event without one.
//!
//! Events are cheap to clone (strings plus a few `Arc`s). The router hands
//! each matched plugin instance its own copy with that instance attached;
//! the identifying fields are never changed after the broker produced the
//! event.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::broker::BoxedBroker;
use crate::error::BrokerResult;
use crate::plugin::PluginInstance;

/// Opaque broker-native payload.
pub type Original = Arc<dyn Any + Send + Sync>;

/// One inbound chat message.
#[derive(Clone)]
pub struct Event {
    body: String,
    room_id: String,
    room: Option<String>,
    user_id: String,
    user: Option<String>,
    time: DateTime<Utc>,
    broker: BoxedBroker,
    original: Option<Original>,
    instance: Option<Arc<PluginInstance>>,
}

impl Event {
    /// Creates an event stamped with the current time.
    pub fn new(
        broker: BoxedBroker,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            room_id: room_id.into(),
            room: None,
            user_id: user_id.into(),
            user: None,
            time: Utc::now(),
            broker,
            original: None,
            instance: None,
        }
    }

    /// Sets the human readable room name.
    pub fn with_room_name(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Sets the human readable user name.
    pub fn with_user_name(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Overrides the creation timestamp.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Attaches the broker-native message this event was built from.
    pub fn with_original<T>(mut self, original: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.original = Some(Arc::new(original));
        self
    }

    /// Returns a copy of this event carrying `instance` as dispatch context.
    ///
    /// Other copies of the event are unaffected.
    pub fn with_instance(&self, instance: Arc<PluginInstance>) -> Self {
        let mut scoped = self.clone();
        scoped.instance = Some(instance);
        scoped
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// The room name if the broker supplied one, otherwise the room id.
    pub fn room(&self) -> &str {
        self.room.as_deref().unwrap_or(&self.room_id)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The user name if the broker supplied one, otherwise the user id.
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.user_id)
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The broker this event came from.
    pub fn broker(&self) -> &BoxedBroker {
        &self.broker
    }

    pub fn broker_name(&self) -> &str {
        self.broker.name()
    }

    /// Downcasts the broker-native payload, if one was attached.
    pub fn original<T: Any>(&self) -> Option<&T> {
        self.original.as_ref()?.downcast_ref::<T>()
    }

    /// The plugin instance this copy was dispatched to.
    ///
    /// `None` outside of a plugin callback.
    pub fn instance(&self) -> Option<&Arc<PluginInstance>> {
        self.instance.as_ref()
    }

    /// Splits the body on whitespace.
    pub fn body_as_args(&self) -> Vec<&str> {
        self.body.split_whitespace().collect()
    }

    /// Builds the event a reply with `body` would be sent as.
    ///
    /// Same broker, room, user and instance; fresh timestamp; no original.
    pub fn reply_event(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            time: Utc::now(),
            original: None,
            ..self.clone()
        }
    }

    /// Sends `body` back to the room this event came from.
    pub async fn reply(&self, body: impl Into<String>) -> BrokerResult<()> {
        let reply = self.reply_event(body);
        self.broker.send(&reply).await
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}: {}",
            self.broker.name(),
            self.room(),
            self.user(),
            self.body
        )
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("broker", &self.broker.name())
            .field("room_id", &self.room_id)
            .field("user_id", &self.user_id)
            .field("time", &self.time)
            .field("body", &self.body)
            .field("has_original", &self.original.is_some())
            .field("instance", &self.instance.as_ref().map(|i| i.name()))
            .finish()
    }
}
