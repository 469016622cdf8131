//! The plugin registry.
//!
//! A [`Registry`] is the single source of truth for which plugin code exists
//! and which instances are subscribed to which rooms. One `parking_lot` mutex
//! guards both lists. It is held only while a list is copied or mutated;
//! callbacks and init hooks always run outside it, so a plugin may register
//! or unregister instances from inside its own callback.
//!
//! Dispatch never iterates the live list. It takes a [`snapshot`](Registry::snapshot)
//! and works on that, so registration never waits on a slow plugin and
//! dispatch never sees a half-mutated list.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{PluginError, PluginResult};
use crate::plugin::definition::PluginDefinition;
use crate::plugin::instance::{Instance, PluginInstance};

#[derive(Default)]
struct RegistryInner {
    definitions: Vec<Arc<PluginDefinition>>,
    instances: Vec<Arc<PluginInstance>>,
    /// Claimed by `register_if_absent`, init hook still running.
    pending: Vec<Arc<PluginInstance>>,
}

/// Releases a pending claim, also when the init hook panics.
struct PendingClaim<'a> {
    inner: &'a Mutex<RegistryInner>,
    instance: Arc<PluginInstance>,
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        self.inner
            .lock()
            .pending
            .retain(|i| !Arc::ptr_eq(i, &self.instance));
    }
}

/// Concurrently accessible store of plugin definitions and live instances.
///
/// Share it as `Arc<Registry>`. Independent registries can coexist (tests
/// create one each).
#[derive(Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Definitions ─────────────────────────────────────────────────────────

    /// Adds a definition unless one with the same name exists.
    ///
    /// Returns the registered definition: the new one, or the first one
    /// registered under that name. Repeating this is harmless.
    pub fn register_definition(&self, definition: PluginDefinition) -> Arc<PluginDefinition> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .definitions
            .iter()
            .find(|d| d.name() == definition.name())
        {
            debug!(plugin = %definition.name(), "Plugin already registered, keeping the first");
            return Arc::clone(existing);
        }

        let definition = Arc::new(definition);
        inner.definitions.push(Arc::clone(&definition));
        info!(plugin = %definition.name(), "Plugin registered");
        definition
    }

    /// Looks up a definition by name.
    pub fn definition(&self, name: &str) -> Option<Arc<PluginDefinition>> {
        self.inner
            .lock()
            .definitions
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    /// All definitions, in registration order.
    pub fn definitions(&self) -> Vec<Arc<PluginDefinition>> {
        self.inner.lock().definitions.clone()
    }

    // ─── Instances ───────────────────────────────────────────────────────────

    /// Makes a pending instance live.
    ///
    /// Compiles the effective pattern (an invalid pattern is returned as
    /// [`PluginError::InvalidPattern`]), runs the definition's init hook, then
    /// appends the instance to the live list.
    pub fn register(&self, instance: Instance) -> PluginResult<Arc<PluginInstance>> {
        let live = Arc::new(instance.compile()?);

        if let Some(init) = live.plugin().init_hook() {
            init(&live);
        }

        self.inner.lock().instances.push(Arc::clone(&live));
        info!(instance = %live, "Plugin instance registered");
        Ok(live)
    }

    /// Like [`register`](Self::register), but returns the existing instance
    /// when one with the same plugin, room and pattern is present.
    ///
    /// The binding is claimed under the lock before the init hook runs, so
    /// concurrent callers run the hook once between them. A caller that loses
    /// the race gets the winner's instance, which may still be initializing.
    /// Used when replaying stored instance configuration, where the same
    /// binding may be requested more than once.
    pub fn register_if_absent(&self, instance: Instance) -> PluginResult<Arc<PluginInstance>> {
        let live = Arc::new(instance.clone().compile()?);

        {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner
                .instances
                .iter()
                .chain(&inner.pending)
                .find(|i| i.same_binding(&instance))
            {
                debug!(instance = %existing, "Plugin instance already present");
                return Ok(Arc::clone(existing));
            }
            inner.pending.push(Arc::clone(&live));
        }

        let claim = PendingClaim {
            inner: &self.inner,
            instance: Arc::clone(&live),
        };
        if let Some(init) = live.plugin().init_hook() {
            init(&live);
        }
        self.inner.lock().instances.push(Arc::clone(&live));
        drop(claim);

        info!(instance = %live, "Plugin instance registered");
        Ok(live)
    }

    /// Removes a live instance, by identity.
    pub fn unregister(&self, instance: &Arc<PluginInstance>) -> PluginResult<()> {
        let mut inner = self.inner.lock();
        let Some(pos) = inner
            .instances
            .iter()
            .position(|i| Arc::ptr_eq(i, instance))
        else {
            return Err(PluginError::InstanceNotFound {
                plugin: instance.name().to_string(),
                room: instance.room_id().to_string(),
            });
        };
        inner.instances.remove(pos);
        drop(inner);

        info!(instance = %instance, "Plugin instance unregistered");
        Ok(())
    }

    /// A point-in-time copy of the live instance list.
    pub fn snapshot(&self) -> Vec<Arc<PluginInstance>> {
        self.inner.lock().instances.clone()
    }

    /// Live instances of plugin `name` in room `room_id`.
    pub fn find_instances(&self, room_id: &str, name: &str) -> Vec<Arc<PluginInstance>> {
        self.inner
            .lock()
            .instances
            .iter()
            .filter(|i| i.room_id() == room_id && i.name() == name)
            .cloned()
            .collect()
    }

    /// Live instances bound to `room_id`.
    pub fn instances_in_room(&self, room_id: &str) -> Vec<Arc<PluginInstance>> {
        self.inner
            .lock()
            .instances
            .iter()
            .filter(|i| i.room_id() == room_id)
            .cloned()
            .collect()
    }

    pub fn instance_count(&self) -> usize {
        self.inner.lock().instances.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Registry")
            .field("definitions", &inner.definitions.len())
            .field("instances", &inner.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn noop(name: &str, regex: &str) -> PluginDefinition {
        PluginDefinition::new(name, regex, |_| async { Ok(()) })
    }

    #[test]
    fn test_duplicate_definition_keeps_first() {
        let registry = Registry::new();
        let first = registry.register_definition(noop("echo", "^!echo"));
        let second = registry.register_definition(noop("echo", "^!other"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.definitions().len(), 1);
        assert_eq!(second.regex(), "^!echo");
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = Registry::new();
        let def = registry.register_definition(noop("echo", "^!echo"));

        let a = assert_ok!(def.instantiate("lobby").register(&registry));
        let b = assert_ok!(def.instantiate("kitchen").register(&registry));
        assert_eq!(registry.instance_count(), 2);

        assert_ok!(registry.unregister(&a));
        let remaining = registry.snapshot();
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &b));

        // Second removal of the same instance reports it.
        let err = assert_err!(registry.unregister(&a));
        assert!(matches!(err, PluginError::InstanceNotFound { .. }));
    }

    #[test]
    fn test_unregister_is_by_identity() {
        let registry = Registry::new();
        let def = registry.register_definition(noop("echo", ""));

        let a = assert_ok!(def.instantiate("lobby").register(&registry));
        let b = assert_ok!(def.instantiate("lobby").register(&registry));

        assert_ok!(registry.unregister(&b));
        let remaining = registry.snapshot();
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &a));
    }

    #[test]
    fn test_invalid_pattern_is_not_registered() {
        let registry = Registry::new();
        let def = registry.register_definition(noop("broken", "[a-"));

        let err = assert_err!(def.instantiate("lobby").register(&registry));
        assert!(matches!(err, PluginError::InvalidPattern { .. }));
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn test_init_hook_runs_once_per_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let registry = Registry::new();
        let def = registry.register_definition(noop("counted", "").on_init(move |instance| {
            assert_eq!(instance.name(), "counted");
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_ok!(def.instantiate("lobby").register(&registry));
        assert_ok!(def.instantiate("kitchen").register(&registry));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_attach_runs_init_hook_once() {
        let hooks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hooks);

        let registry = Arc::new(Registry::new());
        let def = registry.register_definition(noop("slow", "").on_init(move |_| {
            std::thread::sleep(std::time::Duration::from_millis(50));
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let barrier = Arc::new(std::sync::Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let def = Arc::clone(&def);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.register_if_absent(def.instantiate("lobby")).unwrap()
                })
            })
            .collect();
        let attached: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(hooks.load(Ordering::SeqCst), 1);
        assert_eq!(registry.instance_count(), 1);
        assert!(attached.iter().all(|i| Arc::ptr_eq(i, &attached[0])));
    }

    #[test]
    fn test_panicking_init_hook_releases_claim() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let hook_fail = Arc::clone(&fail);

        let registry = Registry::new();
        let def = registry.register_definition(noop("flaky", "").on_init(move |_| {
            if hook_fail.swap(false, Ordering::SeqCst) {
                panic!("init failed");
            }
        }));

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            registry.register_if_absent(def.instantiate("lobby"))
        }));
        assert!(first.is_err());
        assert_eq!(registry.instance_count(), 0);

        assert_ok!(registry.register_if_absent(def.instantiate("lobby")));
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn test_init_hook_may_use_registry() {
        let registry = Arc::new(Registry::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let hook_registry = Arc::clone(&registry);
        let hook_seen = Arc::clone(&seen);
        let def = registry.register_definition(noop("reentrant", "").on_init(move |_| {
            hook_seen.store(hook_registry.instance_count() + 1, Ordering::SeqCst);
        }));

        assert_ok!(def.instantiate("lobby").register(&registry));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_is_detached_from_live_list() {
        let registry = Registry::new();
        let def = registry.register_definition(noop("echo", ""));
        let a = assert_ok!(def.instantiate("lobby").register(&registry));

        let snapshot = registry.snapshot();
        assert_ok!(registry.unregister(&a));
        assert_ok!(def.instantiate("kitchen").register(&registry));

        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &a));
    }

    #[test]
    fn test_find_instances() {
        let registry = Registry::new();
        let echo = registry.register_definition(noop("echo", ""));
        let ping = registry.register_definition(noop("ping", ""));

        assert_ok!(echo.instantiate("lobby").register(&registry));
        assert_ok!(echo.instantiate("kitchen").register(&registry));
        assert_ok!(ping.instantiate("lobby").register(&registry));

        assert_eq!(registry.find_instances("lobby", "echo").len(), 1);
        assert_eq!(registry.find_instances("lobby", "nope").len(), 0);
        assert_eq!(registry.instances_in_room("lobby").len(), 2);
    }

    #[test]
    fn test_register_if_absent_is_idempotent() {
        let registry = Registry::new();
        let def = registry.register_definition(noop("echo", "^!echo"));

        let first = assert_ok!(registry.register_if_absent(def.instantiate("lobby")));
        let again = assert_ok!(registry.register_if_absent(def.instantiate("lobby")));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.instance_count(), 1);

        // A different pattern is a different binding.
        assert_ok!(registry.register_if_absent(def.instantiate("lobby").regex("^!say")));
        assert_eq!(registry.instance_count(), 2);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let def = registry.register_definition(noop("echo", ""));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let registry = Arc::clone(&registry);
                let def = Arc::clone(&def);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let room = format!("room-{n}-{i}");
                        let live = def.instantiate(room).register(&registry).unwrap();
                        if i % 2 == 0 {
                            registry.unregister(&live).unwrap();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.instance_count(), 8 * 12);
    }
}
