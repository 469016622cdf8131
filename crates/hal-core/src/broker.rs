//! Broker trait and related types.
//!
//! A broker is an adapter to one external chat service. It is a source of
//! inbound [`Event`]s (via [`Broker::stream`]) and a sink for replies (via
//! [`Broker::send`]). The router knows nothing else about it: native message
//! types stay inside the adapter and travel with the event only as an opaque
//! payload.
//!
//! # Example
//!
//! ```rust,ignore
//! struct LoopbackBroker;
//!
//! #[async_trait]
//! impl Broker for LoopbackBroker {
//!     fn name(&self) -> &str {
//!         "loopback"
//!     }
//!
//!     async fn send(&self, event: &Event) -> BrokerResult<()> {
//!         println!("{}", event.body());
//!         Ok(())
//!     }
//!
//!     async fn stream(self: Arc<Self>, out: mpsc::Sender<Event>) -> BrokerResult<()> {
//!         let broker: BoxedBroker = self;
//!         out.send(Event::new(broker, "room", "user", "!ping"))
//!             .await
//!             .map_err(|_| BrokerError::Closed)?;
//!         std::future::pending().await
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BrokerResult;
use crate::event::Event;

/// The core broker trait.
///
/// Identifier resolution methods are pure lookups: they must not block and
/// return `None` when the identifier is unknown. The defaults know nothing.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Stable identifier, unique among the brokers attached to a router.
    fn name(&self) -> &str;

    /// Delivers the event's body to the room the event names.
    async fn send(&self, event: &Event) -> BrokerResult<()>;

    /// Produces events onto `out` until the service goes away.
    ///
    /// Must not return except on a fatal error (or when `out` is closed).
    /// A full channel suspends the caller; that is the backpressure path and
    /// implementations should not buffer around it.
    async fn stream(self: Arc<Self>, out: mpsc::Sender<Event>) -> BrokerResult<()>;

    /// Whether `s` is shaped like a room id on this service.
    fn looks_like_room_id(&self, _s: &str) -> bool {
        false
    }

    /// Whether `s` is shaped like a user id on this service.
    fn looks_like_user_id(&self, _s: &str) -> bool {
        false
    }

    /// Resolves a room id to its display name.
    fn room_id_to_name(&self, _id: &str) -> Option<String> {
        None
    }

    /// Resolves a room name to its id.
    fn room_name_to_id(&self, _name: &str) -> Option<String> {
        None
    }

    /// Resolves a user id to its display name.
    fn user_id_to_name(&self, _id: &str) -> Option<String> {
        None
    }

    /// Resolves a user name to its id.
    fn user_name_to_id(&self, _name: &str) -> Option<String> {
        None
    }
}

/// A shared broker trait object.
pub type BoxedBroker = Arc<dyn Broker>;

/// Trait for brokers that can be created from configuration.
///
/// Separates compile-time concerns (`Config` type, `from_config()`) from the
/// object-safe [`Broker`] trait.
pub trait ConfigurableBroker: Broker {
    /// The configuration type, deserialized from the `brokers.<name>` table.
    type Config: serde::de::DeserializeOwned + Default;

    /// Returns the key of this broker's table under `brokers`.
    fn config_key() -> &'static str
    where
        Self: Sized;

    /// Creates a broker from its deserialized configuration.
    fn from_config(config: Self::Config) -> Self
    where
        Self: Sized;
}
