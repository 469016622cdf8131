use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::BoxError;
use crate::event::Event;
use crate::plugin::instance::{Instance, PluginInstance};

/// What a plugin callback resolves to.
pub type CallbackResult = Result<(), BoxError>;

/// Type-erased plugin callback.
pub type CallbackFn = Arc<dyn Fn(Event) -> BoxFuture<'static, CallbackResult> + Send + Sync>;

/// Hook run once for every instance as it is registered.
///
/// May start background work (e.g. `tokio::spawn`); must not block.
pub type InitFn = Arc<dyn Fn(&Arc<PluginInstance>) + Send + Sync>;

/// Reusable chat-command handler logic plus its default matching pattern.
///
/// # Example
///
/// ```rust,ignore
/// let echo = PluginDefinition::new("echo", "^!echo", |event: Event| async move {
///     let text = event.body().trim_start_matches("!echo").trim();
///     event.reply(text).await?;
///     Ok(())
/// })
/// .help("!echo <text> - repeat text back");
/// ```
#[derive(Clone)]
pub struct PluginDefinition {
    name: String,
    regex: String,
    help: Option<String>,
    callback: CallbackFn,
    init: Option<InitFn>,
}

impl PluginDefinition {
    /// Creates a definition. An empty `regex` matches every message.
    pub fn new<F, Fut>(name: impl Into<String>, regex: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            regex: regex.into(),
            help: None,
            callback: Arc::new(move |event| callback(event).boxed()),
            init: None,
        }
    }

    /// Sets the init hook.
    pub fn on_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&Arc<PluginInstance>) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// Sets the one-line help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default pattern new instances start with.
    pub fn regex(&self) -> &str {
        &self.regex
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Starts a pending instance bound to `room_id`.
    ///
    /// Nothing is live until the instance is registered.
    pub fn instantiate(self: &Arc<Self>, room_id: impl Into<String>) -> Instance {
        Instance::new(Arc::clone(self), room_id.into())
    }

    /// Invokes the callback.
    pub fn call(&self, event: Event) -> BoxFuture<'static, CallbackResult> {
        (self.callback)(event)
    }

    pub(crate) fn init_hook(&self) -> Option<&InitFn> {
        self.init.as_ref()
    }
}

impl fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("name", &self.name)
            .field("regex", &self.regex)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}
