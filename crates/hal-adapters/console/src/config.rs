//! Configuration types for the console broker.
//!
//! # Example Configuration
//!
//! ```toml
//! [brokers.console]
//! room = "lobby"
//! user = "operator"
//! ```

use serde::{Deserialize, Serialize};

/// Console broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Room every typed line is posted to.
    pub room: String,

    /// User every typed line is posted as.
    pub user: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            room: "lobby".to_string(),
            user: "console".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Sets the room.
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    /// Sets the user.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}
