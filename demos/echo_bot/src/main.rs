//! Echo Bot Example
//!
//! A console chat bot: every line typed on stdin is a message in the
//! configured room, replies are printed on stdout.
//!
//! # Plugins
//!
//! | Plugin | Pattern | Reply |
//! |--------|---------|-------|
//! | `echo` | `^!echo` | the text after the command |
//! | `ping` | `^!ping$` | `pong` |
//! | `info` | `^!info$` | who, where and when |
//! | `pluginmgr` | `^!plugin` | list, attach and detach plugins |
//!
//! Which rooms they are attached to comes from `[[instances]]` in `hal.toml`.
//! Try `!plugin detach ping` followed by `!ping`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config demos/echo_bot/hal.toml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hal::prelude::*;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A console echo bot built on hal")]
struct Args {
    /// Configuration file (defaults to ./hal.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Plugin Callbacks
// ============================================================================

async fn echo(event: Event) -> CallbackResult {
    let text = event.body().trim_start_matches("!echo").trim();
    if !text.is_empty() {
        event.reply(text).await?;
    }
    Ok(())
}

async fn ping(event: Event) -> CallbackResult {
    event.reply("pong").await?;
    Ok(())
}

async fn info(event: Event) -> CallbackResult {
    let instance = event
        .instance()
        .map(ToString::to_string)
        .unwrap_or_default();

    let text = format!(
        "{} in {} via {} at {} UTC (handled by {instance})",
        event.user(),
        event.room(),
        event.broker_name(),
        event.time().format("%H:%M:%S"),
    );
    event.reply(text).await?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = HalRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    runtime.register_plugin(
        PluginDefinition::new("echo", "^!echo", echo).help("!echo <text> - repeat text back"),
    );
    runtime.register_plugin(PluginDefinition::new("ping", "^!ping$", ping).help("!ping - pong"));
    runtime.register_plugin(
        PluginDefinition::new("info", "^!info$", info).help("!info - who, where and when"),
    );
    runtime.load_builtin_plugins();

    runtime.add_configured_broker::<ConsoleBroker>()?;

    if runtime.load_instances()? == 0 {
        warn!("No [[instances]] configured; attach plugins with `!plugin attach <name>`");
        runtime.attach(hal::framework::PLUGINMGR, &console_room(&runtime))?;
    }

    runtime.run().await?;

    Ok(())
}

/// The room the console broker posts into.
fn console_room(runtime: &HalRuntime) -> String {
    runtime
        .config()
        .brokers
        .get("console")
        .and_then(|value| value.deserialize::<ConsoleConfig>().ok())
        .unwrap_or_default()
        .room
}
