//! # hal Console Broker
//!
//! A broker that turns lines typed on stdin into chat events and prints
//! replies on stdout. Useful for trying plugins locally and for tests, where
//! any async reader and writer can stand in for the terminal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hal_broker_console::ConsoleBroker;
//! use hal_runtime::HalRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HalRuntime::new();
//!     runtime.add_configured_broker::<ConsoleBroker>()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ```text
//! $ echo-bot
//! !echo hello
//! [lobby] hello
//! ```

pub mod broker;
pub mod config;

pub use broker::{ConsoleBroker, ConsoleLine};
pub use config::ConsoleConfig;
