//! The event router.
//!
//! ```text
//!  broker A ──stream──▶ [A channel] ──forward──┐
//!                                              ├──▶ [inbound] ──route──▶ dispatch task per event
//!  broker B ──stream──▶ [B channel] ──forward──┘
//! ```
//!
//! Each attached broker gets a stream task and a forwarding task, both bound
//! to a per-broker [`CancellationToken`]. The route loop only receives and
//! spawns; all matching happens in [`Router::dispatch`], one task per event.
//!
//! A dispatch walks a snapshot of the registry taken when it starts, so
//! registry changes made while it runs affect only later events. Every
//! callback runs behind its own failure boundary: an error, a panic or (when
//! configured) a timeout is logged with the plugin name and the walk
//! continues with the next instance.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use hal_core::{BoxError, BoxedBroker, Event, Registry};
use hal_framework::{BoxedFallback, Fallback, NotUnderstood, looks_like_command};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use crate::config::RouterConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::forward::forward;

/// What happened to one dispatched event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Instances whose room and pattern matched.
    pub matched: usize,
    /// Callbacks that returned an error or panicked.
    pub failed: usize,
    /// Callbacks cut off by the callback timeout.
    pub timed_out: usize,
    /// Whether the fallback handled the event.
    pub fallback: bool,
}

enum Outcome {
    Completed,
    Failed,
    TimedOut,
}

struct Attachment {
    id: u64,
    broker: BoxedBroker,
    token: CancellationToken,
}

/// Routes broker events to plugin instances.
pub struct Router {
    registry: Arc<Registry>,
    config: RouterConfig,
    inbound_tx: mpsc::Sender<Event>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    brokers: Mutex<HashMap<String, Attachment>>,
    next_attachment: AtomicU64,
    fallback: RwLock<Option<BoxedFallback>>,
    shutdown: CancellationToken,
}

impl Router {
    /// Creates a router over `registry`.
    ///
    /// With `fallback_reply` set, unmatched commands get a [`NotUnderstood`]
    /// reply listing the room's plugins.
    pub fn new(registry: Arc<Registry>, config: RouterConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let fallback: Option<BoxedFallback> = config
            .fallback_reply
            .then(|| Arc::new(NotUnderstood::with_registry(Arc::clone(&registry))) as BoxedFallback);

        Self {
            registry,
            config,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            brokers: Mutex::new(HashMap::new()),
            next_attachment: AtomicU64::new(0),
            fallback: RwLock::new(fallback),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Replaces the handler for unmatched commands.
    pub fn set_fallback<F: Fallback + 'static>(&self, fallback: F) {
        *self.fallback.write() = Some(Arc::new(fallback));
    }

    /// Removes the fallback; unmatched commands are then ignored.
    pub fn clear_fallback(&self) {
        *self.fallback.write() = None;
    }

    // =========================================================================
    // Broker Management
    // =========================================================================

    /// Attaches a broker and starts its stream and forwarding tasks.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`RuntimeError::DuplicateBroker`] if a broker with the same name is
    /// already attached, and with [`RuntimeError::ShutDown`] once the router
    /// has been shut down.
    pub fn add_broker(self: &Arc<Self>, broker: BoxedBroker) -> RuntimeResult<()> {
        let name = broker.name().to_string();
        let mut brokers = self.brokers.lock();
        // Checked under the lock: `shutdown` cancels before it clears.
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::ShutDown);
        }
        if brokers.contains_key(&name) {
            return Err(RuntimeError::DuplicateBroker(name));
        }

        let id = self.next_attachment.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(self.config.broker_capacity.max(1));

        brokers.insert(
            name.clone(),
            Attachment {
                id,
                broker: Arc::clone(&broker),
                token: token.clone(),
            },
        );

        tokio::spawn({
            let name = name.clone();
            let sink = self.inbound_tx.clone();
            let token = token.clone();
            async move {
                let forwarded = forward(&name, rx, sink, token).await;
                debug!(broker = %name, forwarded, "Forwarding task finished");
            }
        });

        let router = Arc::downgrade(self);
        tokio::spawn({
            let name = name.clone();
            async move {
                tokio::select! {
                    result = Arc::clone(&broker).stream(tx) => match result {
                        Ok(()) => info!(broker = %name, "Broker stream ended"),
                        Err(e) => error!(broker = %name, error = %e, "Broker stream failed"),
                    },
                    () = token.cancelled() => {
                        debug!(broker = %name, "Broker stream cancelled");
                        return;
                    }
                }
                Self::release(&router, &name, id);
            }
        });

        info!(broker = %name, "Broker attached");
        Ok(())
    }

    /// Detaches a broker, cancelling its tasks. Returns the broker.
    pub fn detach_broker(&self, name: &str) -> RuntimeResult<BoxedBroker> {
        let attachment = self
            .brokers
            .lock()
            .remove(name)
            .ok_or_else(|| RuntimeError::UnknownBroker(name.to_string()))?;

        attachment.token.cancel();
        info!(broker = %name, "Broker detached");
        Ok(attachment.broker)
    }

    /// Drops the attachment of a broker whose stream ended on its own.
    fn release(router: &Weak<Self>, name: &str, id: u64) {
        let Some(router) = router.upgrade() else {
            return;
        };
        let mut brokers = router.brokers.lock();
        if brokers.get(name).is_some_and(|a| a.id == id) {
            brokers.remove(name);
            warn!(broker = %name, "Broker attachment released");
        }
    }

    /// Returns the attached broker with this name.
    pub fn broker(&self, name: &str) -> Option<BoxedBroker> {
        self.brokers.lock().get(name).map(|a| Arc::clone(&a.broker))
    }

    /// Returns the names of all attached brokers, sorted.
    pub fn broker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.brokers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Runs the route loop until [`shutdown`](Self::shutdown).
    ///
    /// Each inbound event is handed to its own dispatch task; the loop never
    /// waits for a dispatch to finish. Only one route loop may run.
    pub async fn route(self: &Arc<Self>) -> RuntimeResult<()> {
        let mut inbound = self
            .inbound_rx
            .lock()
            .take()
            .ok_or(RuntimeError::AlreadyRouting)?;

        info!("Router started");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                event = inbound.recv() => {
                    let Some(event) = event else { break };
                    let router = Arc::clone(self);
                    tokio::spawn(async move {
                        router.dispatch(event).await;
                    });
                }
            }
        }

        info!("Router stopped");
        Ok(())
    }

    /// Stops the route loop and every broker attachment.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.brokers.lock().clear();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Dispatches one event to every matching instance, in registry order.
    ///
    /// Each matching callback is awaited before the next instance is
    /// considered. Callback failures never escape; they are counted in the
    /// returned report.
    pub async fn dispatch(&self, event: Event) -> DispatchReport {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            broker = %event.broker_name(),
            room = %event.room_id(),
        );

        async move {
            let instances = self.registry.snapshot();
            let mut report = DispatchReport::default();

            for instance in instances {
                if !instance.matches(&event) {
                    continue;
                }
                report.matched += 1;

                let definition = Arc::clone(instance.plugin());
                let scoped = event.with_instance(Arc::clone(&instance));
                trace!(plugin = instance.name(), "Invoking plugin");

                let outcome = self
                    .guarded(instance.name(), self.config.callback_timeout(), async move {
                        definition.call(scoped).await
                    })
                    .await;
                match outcome {
                    Outcome::Completed => {}
                    Outcome::Failed => report.failed += 1,
                    Outcome::TimedOut => report.timed_out += 1,
                }
            }

            if report.matched == 0 && looks_like_command(event.body(), &self.config.command_prefix)
            {
                let fallback = self.fallback.read().clone();
                if let Some(fallback) = fallback {
                    report.fallback = true;
                    let prefix = self.config.command_prefix.clone();
                    let limit = Some(self.config.fallback_timeout());
                    let outcome = self
                        .guarded("fallback", limit, async move {
                            fallback.handle(event, &prefix).await
                        })
                        .await;
                    match outcome {
                        Outcome::Completed => {}
                        Outcome::Failed => report.failed += 1,
                        Outcome::TimedOut => report.timed_out += 1,
                    }
                }
            }

            debug!(
                matched = report.matched,
                failed = report.failed,
                timed_out = report.timed_out,
                fallback = report.fallback,
                "Dispatch finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Runs one callback behind the failure boundary, cut off after `limit`.
    async fn guarded<F>(&self, plugin: &str, limit: Option<Duration>, callback: F) -> Outcome
    where
        F: Future<Output = Result<(), BoxError>>,
    {
        let callback = AssertUnwindSafe(callback).catch_unwind();

        let result = match limit {
            Some(limit) => match tokio::time::timeout(limit, callback).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        plugin,
                        timeout_ms = limit.as_millis() as u64,
                        "Plugin callback timed out"
                    );
                    return Outcome::TimedOut;
                }
            },
            None => callback.await,
        };

        match result {
            Ok(Ok(())) => Outcome::Completed,
            Ok(Err(e)) => {
                error!(plugin, error = %e, "Plugin callback failed");
                Outcome::Failed
            }
            Err(panic) => {
                error!(plugin, panic = panic_message(&*panic), "Plugin callback panicked");
                Outcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("brokers", &self.broker_names())
            .field("instances", &self.registry.instance_count())
            .field("config", &self.config)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use hal_core::test_util::RecordingBroker;
    use hal_core::{CallbackResult, PluginDefinition};
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    fn router_with(config: RouterConfig) -> (Arc<Registry>, Arc<Router>) {
        let registry = Arc::new(Registry::new());
        let router = Arc::new(Router::new(Arc::clone(&registry), config));
        (registry, router)
    }

    fn router() -> (Arc<Registry>, Arc<Router>) {
        router_with(RouterConfig::default())
    }

    /// A plugin that records the bodies it sees.
    fn recorder(name: &str, regex: &str) -> (PluginDefinition, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let def = PluginDefinition::new(name, regex, move |event: Event| {
            log.lock().push(event.body().to_string());
            async { Ok(()) }
        });
        (def, seen)
    }

    async fn echo(event: Event) -> CallbackResult {
        let text = event.body().trim_start_matches("!echo").trim().to_string();
        event.reply(text).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_room_scoping() {
        let (registry, router) = router();
        let (def, seen) = recorder("rec", "");
        let def = registry.register_definition(def);
        assert_ok!(def.instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("test");
        let other = router.dispatch(broker.event("kitchen", "hi")).await;
        let same = router.dispatch(broker.event("lobby", "hi")).await;

        assert_eq!(other.matched, 0);
        assert_eq!(same.matched, 1);
        assert_eq!(*seen.lock(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_pattern_matching() {
        let (registry, router) = router();
        let (def, seen) = recorder("rec", "^!echo");
        let def = registry.register_definition(def);
        assert_ok!(def.instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("test");
        router.dispatch(broker.event("lobby", "hello")).await;
        router.dispatch(broker.event("lobby", "!echo hi")).await;

        assert_eq!(*seen.lock(), vec!["!echo hi"]);
    }

    #[tokio::test]
    async fn test_instances_run_in_registry_order() {
        let (registry, router) = router();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            let def = registry.register_definition(PluginDefinition::new(
                name,
                "",
                move |_| {
                    order.lock().push(name);
                    async { Ok(()) }
                },
            ));
            assert_ok!(def.instantiate("lobby").register(&registry));
        }

        let broker = RecordingBroker::new("test");
        let report = router.dispatch(broker.event("lobby", "x")).await;

        assert_eq!(report.matched, 3);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_callback() {
        let (registry, router) = router();

        let panics = registry.register_definition(PluginDefinition::new("panics", "", |_| async {
            panic!("boom")
        }));
        let panics_early = registry.register_definition(PluginDefinition::new(
            "panics-early",
            "",
            |_event: Event| -> futures::future::Ready<CallbackResult> { panic!("before future") },
        ));
        let errors = registry.register_definition(PluginDefinition::new("errors", "", |_| async {
            Err::<(), BoxError>("nope".into())
        }));
        let (def, seen) = recorder("rec", "");
        let rec = registry.register_definition(def);

        for def in [&panics, &panics_early, &errors, &rec] {
            assert_ok!(def.instantiate("lobby").register(&registry));
        }

        let broker = RecordingBroker::new("test");
        let report = router.dispatch(broker.event("lobby", "one")).await;
        assert_eq!(report.matched, 4);
        assert_eq!(report.failed, 3);

        // Later events are still dispatched.
        router.dispatch(broker.event("lobby", "two")).await;
        assert_eq!(*seen.lock(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_snapshot_taken_at_dispatch_start() {
        let (registry, router) = router();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let blocker = {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            PluginDefinition::new("blocker", "^block", move |_| {
                let started = Arc::clone(&started);
                let release = Arc::clone(&release);
                async move {
                    started.notify_one();
                    release.notified().await;
                    Ok(())
                }
            })
        };
        let blocker = registry.register_definition(blocker);
        assert_ok!(blocker.instantiate("lobby").register(&registry));

        let (def, seen) = recorder("rec", "");
        let rec = registry.register_definition(def);
        let live = assert_ok!(rec.instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("test");
        let in_flight = tokio::spawn({
            let router = Arc::clone(&router);
            let event = broker.event("lobby", "block");
            async move { router.dispatch(event).await }
        });

        started.notified().await;
        assert_ok!(registry.unregister(&live));

        let after = router.dispatch(broker.event("lobby", "after")).await;
        assert_eq!(after.matched, 0);

        release.notify_one();
        let report = in_flight.await.unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(*seen.lock(), vec!["block"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_timeout() {
        let (registry, router) = router_with(RouterConfig {
            callback_timeout_ms: 50,
            ..Default::default()
        });
        let slow = registry.register_definition(PluginDefinition::new("slow", "", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));
        assert_ok!(slow.instantiate("lobby").register(&registry));
        let (def, seen) = recorder("rec", "");
        assert_ok!(registry.register_definition(def).instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("test");
        let report = router.dispatch(broker.event("lobby", "x")).await;

        assert_eq!(report.timed_out, 1);
        assert_eq!(*seen.lock(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_fallback_for_unmatched_commands() {
        let (_registry, router) = router();
        let broker = RecordingBroker::new("test");

        let chatter = router.dispatch(broker.event("lobby", "hello")).await;
        assert!(!chatter.fallback);

        let command = router.dispatch(broker.event("lobby", "!frob it")).await;
        assert!(command.fallback);
        assert_eq!(
            broker.sent_bodies(),
            vec!["Sorry, I don't understand `!frob`."]
        );
    }

    #[tokio::test]
    async fn test_fallback_disabled_and_custom() {
        let (_registry, router) = router_with(RouterConfig {
            fallback_reply: false,
            ..Default::default()
        });
        let broker = RecordingBroker::new("test");

        let report = router.dispatch(broker.event("lobby", "!frob")).await;
        assert!(!report.fallback);

        struct Shrug;

        #[async_trait]
        impl Fallback for Shrug {
            async fn handle(&self, event: Event, _prefix: &str) -> Result<(), BoxError> {
                event.reply("¯\\_(ツ)_/¯").await?;
                Ok(())
            }
        }

        router.set_fallback(Shrug);
        let report = router.dispatch(broker.event("lobby", "!frob")).await;
        assert!(report.fallback);
        assert_eq!(broker.sent_bodies(), vec!["¯\\_(ツ)_/¯"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_fallback_is_cut_off() {
        struct Stuck;

        #[async_trait]
        impl Fallback for Stuck {
            async fn handle(&self, _event: Event, _prefix: &str) -> Result<(), BoxError> {
                std::future::pending().await
            }
        }

        let (_registry, router) = router();
        assert!(router.config().callback_timeout().is_none());
        router.set_fallback(Stuck);

        let broker = RecordingBroker::new("test");
        let report = tokio::time::timeout(
            Duration::from_secs(3600),
            router.dispatch(broker.event("lobby", "!frob")),
        )
        .await
        .expect("dispatch blocked on the fallback");

        assert!(report.fallback);
        assert_eq!(report.timed_out, 1);
    }

    #[tokio::test]
    async fn test_duplicate_broker_rejected() {
        let (_registry, router) = router();

        assert_ok!(router.add_broker(RecordingBroker::new("chat")));
        let err = assert_err!(router.add_broker(RecordingBroker::new("chat")));
        assert!(matches!(err, RuntimeError::DuplicateBroker(name) if name == "chat"));

        assert_ok!(router.detach_broker("chat"));
        assert_ok!(router.add_broker(RecordingBroker::new("chat")));
        assert_eq!(router.broker_names(), vec!["chat"]);
    }

    #[tokio::test]
    async fn test_detach_unknown_broker() {
        let (_registry, router) = router();
        let Err(err) = router.detach_broker("ghost") else {
            panic!("detaching an unknown broker succeeded");
        };
        assert!(matches!(err, RuntimeError::UnknownBroker(_)));
    }

    #[tokio::test]
    async fn test_route_only_once() {
        let (_registry, router) = router();
        let running = tokio::spawn({
            let router = Arc::clone(&router);
            async move { router.route().await }
        });
        // Let the spawned loop take the inbound channel.
        tokio::task::yield_now().await;

        let err = assert_err!(router.route().await);
        assert!(matches!(err, RuntimeError::AlreadyRouting));

        router.shutdown();
        assert_ok!(running.await.unwrap());
        assert!(router.is_shut_down());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_echo() {
        let (registry, router) = router();
        let def = registry.register_definition(PluginDefinition::new("echo", "^!echo", echo));
        assert_ok!(def.instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("console");
        assert_ok!(router.add_broker(broker.clone()));
        let routing = tokio::spawn({
            let router = Arc::clone(&router);
            async move { router.route().await }
        });

        broker.inject("lobby", "hello");
        broker.inject("lobby", "!echo hi");

        let sent = tokio::time::timeout(Duration::from_secs(5), broker.wait_for_sent(1))
            .await
            .expect("no reply");
        assert_eq!(sent[0].body(), "hi");
        assert_eq!(sent[0].room_id(), "lobby");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.sent_bodies(), vec!["hi"]);

        router.shutdown();
        assert_ok!(routing.await.unwrap());
    }

    #[tokio::test]
    async fn test_detached_broker_stops_delivering() {
        let (registry, router) = router();
        let (def, seen) = recorder("rec", "");
        assert_ok!(registry.register_definition(def).instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("test");
        assert_ok!(router.add_broker(broker.clone()));
        tokio::spawn({
            let router = Arc::clone(&router);
            async move { router.route().await }
        });

        broker.inject("lobby", "before");
        for _ in 0..100 {
            if !seen.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*seen.lock(), vec!["before"]);

        assert_ok!(router.detach_broker("test"));
        broker.inject("lobby", "after");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*seen.lock(), vec!["before"]);
        assert!(router.broker_names().is_empty());
    }

    #[tokio::test]
    async fn test_failed_stream_releases_attachment() {
        let (_registry, router) = router();
        let broker = RecordingBroker::new("test");
        assert_ok!(router.add_broker(broker.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_ok!(router.detach_broker("test"));

        // The recording broker can only stream once, so this attachment
        // fails right away and is released.
        assert_ok!(router.add_broker(broker));
        for _ in 0..100 {
            if router.broker_names().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(router.broker_names().is_empty());
    }

    #[tokio::test]
    async fn test_add_broker_after_shutdown() {
        let (_registry, router) = router();
        router.shutdown();

        let err = assert_err!(router.add_broker(RecordingBroker::new("late")));
        assert!(matches!(err, RuntimeError::ShutDown));
        assert!(router.broker_names().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_event_does_not_stop_routing() {
        let (registry, router) = router();
        let boom = registry.register_definition(PluginDefinition::new("boom", "^!boom", |_| async {
            panic!("boom")
        }));
        assert_ok!(boom.instantiate("lobby").register(&registry));
        let (def, seen) = recorder("rec", "");
        assert_ok!(registry.register_definition(def).instantiate("lobby").register(&registry));

        let broker = RecordingBroker::new("test");
        assert_ok!(router.add_broker(broker.clone()));
        let routing = tokio::spawn({
            let router = Arc::clone(&router);
            async move { router.route().await }
        });

        broker.inject("lobby", "!boom");
        broker.inject("lobby", "after");
        for _ in 0..200 {
            if seen.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let mut bodies = seen.lock().clone();
        bodies.sort();
        assert_eq!(bodies, vec!["!boom", "after"]);

        router.shutdown();
        assert_ok!(routing.await.unwrap());
    }
}
