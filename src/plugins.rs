//! Plugin registry and plugin stack.
//!
//! Plugins are registered by name with a factory. At startup the names listed
//! in the `plugins` configuration variable are instantiated in order and
//! initialized; at shutdown they are finalized in reverse order. A plugin may
//! read the configuration store and register executor hooks while it
//! initializes. It never writes configuration.

use crate::config::{ConfigStore, keys};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Name of the built-in plugin that reports the configuration at startup.
pub const STATUS_PLUGIN: &str = "status";

/// A unit of functionality loaded into the host.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    /// Called once, in load order.
    fn init(&mut self, ctx: &mut PluginContext<'_>) -> Result<()>;

    /// Called once, in reverse load order.
    fn fini(&mut self) {}
}

/// Executor hook registered by a plugin.
pub type Hook = Box<dyn FnMut(&ConfigStore) -> Result<()> + Send>;

/// Hooks run when the executor starts and stops.
#[derive(Default)]
pub struct ExecutorHooks {
    start: Vec<(String, Hook)>,
    end: Vec<(String, Hook)>,
}

impl ExecutorHooks {
    pub fn start_count(&self) -> usize {
        self.start.len()
    }

    pub fn end_count(&self) -> usize {
        self.end.len()
    }
}

/// What a plugin may touch during `init`.
pub struct PluginContext<'a> {
    plugin: &'a str,
    store: &'a ConfigStore,
    hooks: &'a mut ExecutorHooks,
}

impl<'a> PluginContext<'a> {
    pub fn store(&self) -> &ConfigStore {
        self.store
    }

    pub fn on_executor_start<F>(&mut self, hook: F)
    where
        F: FnMut(&ConfigStore) -> Result<()> + Send + 'static,
    {
        self.hooks.start.push((self.plugin.to_string(), Box::new(hook)));
    }

    pub fn on_executor_end<F>(&mut self, hook: F)
    where
        F: FnMut(&ConfigStore) -> Result<()> + Send + 'static,
    {
        self.hooks.end.push((self.plugin.to_string(), Box::new(hook)));
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Plugin factories by name.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, Factory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing the plugins shipped with the host.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(STATUS_PLUGIN, || Box::new(StatusPlugin));
        registry
    }

    /// Register `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    fn create(&self, name: &str) -> Result<Box<dyn Plugin>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownPlugin(name.to_string()))
    }
}

/// Loaded plugins, in load order.
#[derive(Default)]
pub struct PluginStack {
    loaded: Vec<Box<dyn Plugin>>,
    hooks: ExecutorHooks,
}

impl PluginStack {
    /// Load the plugins named by the `plugins` variable of `store`.
    pub fn from_config(registry: &PluginRegistry, store: &ConfigStore) -> Result<Self> {
        let names = store.get_strings(keys::PLUGINS)?.unwrap_or_default();
        Self::load(registry, store, &names)
    }

    /// Instantiate and initialize `names` in order.
    ///
    /// If any plugin fails, the ones already initialized are finalized in
    /// reverse order before the error is returned.
    pub fn load(registry: &PluginRegistry, store: &ConfigStore, names: &[String]) -> Result<Self> {
        let mut stack = Self::default();
        for name in names {
            if stack.get(name).is_some() {
                warn!(plugin = %name, "plugin listed twice, skipping");
                continue;
            }
            // Dropping `stack` on the error path finalizes what was loaded.
            let mut plugin = registry.create(name)?;
            let mut ctx = PluginContext {
                plugin: name,
                store,
                hooks: &mut stack.hooks,
            };
            plugin.init(&mut ctx).map_err(|e| match e {
                Error::Plugin { .. } => e,
                other => Error::Plugin {
                    name: name.clone(),
                    message: other.to_string(),
                },
            })?;
            debug!(plugin = %name, "plugin initialized");
            stack.loaded.push(plugin);
        }
        Ok(stack)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Names in load order.
    pub fn names(&self) -> Vec<String> {
        self.loaded.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.loaded
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn hooks(&self) -> &ExecutorHooks {
        &self.hooks
    }

    /// Run every start hook in registration order.
    pub fn start_executor(&mut self, store: &ConfigStore) -> Result<()> {
        run_hooks(&mut self.hooks.start, store)
    }

    /// Run every end hook in registration order.
    pub fn stop_executor(&mut self, store: &ConfigStore) -> Result<()> {
        run_hooks(&mut self.hooks.end, store)
    }

    /// Finalize every plugin in reverse load order.
    pub fn close(&mut self) {
        self.hooks = ExecutorHooks::default();
        while let Some(mut plugin) = self.loaded.pop() {
            debug!(plugin = %plugin.name(), "plugin finalized");
            plugin.fini();
        }
    }
}

impl Drop for PluginStack {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_hooks(hooks: &mut [(String, Hook)], store: &ConfigStore) -> Result<()> {
    for (plugin, hook) in hooks.iter_mut() {
        hook(store).map_err(|e| Error::Plugin {
            name: plugin.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Logs a summary of the configuration when the executor starts.
struct StatusPlugin;

impl Plugin for StatusPlugin {
    fn name(&self) -> &str {
        STATUS_PLUGIN
    }

    fn init(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        ctx.on_executor_start(|store| {
            let config = store.get_string(keys::CONFIG)?.unwrap_or_default();
            info!(variables = store.len()?, config = %config, "executor started");
            Ok(())
        });
        ctx.on_executor_end(|_| {
            info!("executor stopped");
            Ok(())
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variable;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: String,
        events: Events,
        fail: bool,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn init(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
            if self.fail {
                return Err(Error::Other("refused".to_string()));
            }
            self.events.lock().unwrap().push(format!("init {}", self.name));
            let events = Arc::clone(&self.events);
            let name = self.name.clone();
            ctx.on_executor_start(move |_| {
                events.lock().unwrap().push(format!("start {}", name));
                Ok(())
            });
            Ok(())
        }

        fn fini(&mut self) {
            self.events.lock().unwrap().push(format!("fini {}", self.name));
        }
    }

    fn registry(events: &Events) -> PluginRegistry {
        let mut registry = PluginRegistry::with_builtins();
        for (name, fail) in [("auth", false), ("cache", false), ("broken", true)] {
            let events = Arc::clone(events);
            registry.register(name, move || {
                Box::new(Recorder {
                    name: name.to_string(),
                    events: Arc::clone(&events),
                    fail,
                })
            });
        }
        registry
    }

    fn ready_store() -> ConfigStore {
        let store = ConfigStore::new();
        store.init().unwrap();
        store
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry_builtins() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.contains(STATUS_PLUGIN));
        assert_eq!(registry.names(), [STATUS_PLUGIN]);
    }

    #[test]
    fn test_load_order_and_reverse_fini() {
        let events = Events::default();
        let store = ready_store();
        let mut stack = PluginStack::load(&registry(&events), &store, &names(&["auth", "cache"]))
            .unwrap();
        assert_eq!(stack.names(), ["auth", "cache"]);
        assert!(stack.get("cache").is_some());

        stack.start_executor(&store).unwrap();
        stack.close();
        assert!(stack.is_empty());
        assert_eq!(
            *events.lock().unwrap(),
            [
                "init auth",
                "init cache",
                "start auth",
                "start cache",
                "fini cache",
                "fini auth"
            ]
        );
    }

    #[test]
    fn test_failed_init_finalizes_loaded_plugins() {
        let events = Events::default();
        let store = ready_store();
        let err = PluginStack::load(&registry(&events), &store, &names(&["auth", "broken"]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Plugin { ref name, .. } if name == "broken"));
        assert_eq!(*events.lock().unwrap(), ["init auth", "fini auth"]);
    }

    #[test]
    fn test_unknown_plugin() {
        let events = Events::default();
        let store = ready_store();
        let err = PluginStack::load(&registry(&events), &store, &names(&["auth", "nope"]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownPlugin(ref name) if name == "nope"));
        assert_eq!(*events.lock().unwrap(), ["init auth", "fini auth"]);
    }

    #[test]
    fn test_from_config() {
        let events = Events::default();
        let store = ready_store();
        store
            .set(&Variable::strings(keys::PLUGINS, ["status", "auth", "auth"]))
            .unwrap();
        let mut stack = PluginStack::from_config(&registry(&events), &store).unwrap();
        assert_eq!(stack.names(), ["status", "auth"]);
        assert_eq!(stack.hooks().start_count(), 2);
        assert_eq!(stack.hooks().end_count(), 1);
        stack.start_executor(&store).unwrap();
        stack.stop_executor(&store).unwrap();
    }

    #[test]
    fn test_no_plugins_configured() {
        let store = ready_store();
        let stack = PluginStack::from_config(&PluginRegistry::with_builtins(), &store).unwrap();
        assert!(stack.is_empty());
    }
}
