//! Plugin catalog and registry.
//!
//! The [`PluginCatalog`] maps plugin names to factories compiled into the
//! binary. The [`PluginRegistry`] owns the loaded instances in load order and
//! fans events out to them. A plugin that fails to load, or fails inside a
//! callback, is logged and skipped; it never takes the others down with it.

use super::{DispatchEnv, Effect, Invocation, LoadedPlugin, PluginEvent, Tier, guarded};
use crate::config::Config;
use crate::error::PluginError;
use crate::persistence::Database;
use crate::telemetry::spans;
use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Arguments handed to a plugin factory.
pub struct PluginInit<'a> {
    /// Name the plugin was requested under.
    pub name: &'a str,
    pub config: &'a Config,
    /// Contents of `<plugins.root>/<name>/plugin.toml`; empty when absent.
    pub settings: toml::Table,
    /// The plugin database, when persistence is configured.
    pub database: Option<Database>,
}

pub type PluginFactory =
    Arc<dyn Fn(&PluginInit<'_>) -> Result<Box<dyn LoadedPlugin>, PluginError> + Send + Sync>;

/// Ordered set of available plugin factories.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: Vec<(String, PluginFactory)>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugins shipped with the crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("echo", super::echo::factory);
        catalog
    }

    /// Add a factory, replacing any factory of the same name in place.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&PluginInit<'_>) -> Result<Box<dyn LoadedPlugin>, PluginError> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: PluginFactory = Arc::new(factory);
        match self.factories.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = factory,
            None => self.factories.push((name, factory)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&PluginFactory> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(n, _)| n.as_str())
    }
}

/// Result of running a plugin command handler.
pub struct CommandOutcome {
    /// Effects queued before the handler returned, applied even on failure.
    pub effects: Vec<Effect>,
    pub result: Result<(), PluginError>,
}

/// Loaded plugins in load order. Never holds two plugins with the same name.
pub struct PluginRegistry {
    catalog: PluginCatalog,
    plugins: Vec<Box<dyn LoadedPlugin>>,
    database: Option<Database>,
}

impl PluginRegistry {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog,
            plugins: Vec::new(),
            database: None,
        }
    }

    /// Hand `database` to plugins constructed from now on.
    pub fn set_database(&mut self, database: Option<Database>) {
        self.database = database;
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut PluginCatalog {
        &mut self.catalog
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&dyn LoadedPlugin> {
        self.plugins.get(index).map(|p| p.as_ref())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn LoadedPlugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    /// Replace the loaded set with every candidate plugin.
    ///
    /// With `plugins.root` set, each sub-directory of the root is a candidate
    /// (sorted by name). Otherwise the `plugins.enabled` list is used, or the
    /// whole catalog. Returns the number of plugins loaded.
    pub fn load_all(&mut self, config: &Config) -> usize {
        self.plugins.clear();
        let candidates = match self.candidates(config) {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Failed to enumerate plugins");
                return 0;
            }
        };

        for name in &candidates {
            self.load(name, config);
        }
        info!(
            loaded = self.plugins.len(),
            candidates = candidates.len(),
            "Plugins loaded"
        );
        self.plugins.len()
    }

    fn candidates(&self, config: &Config) -> Result<Vec<String>, PluginError> {
        if let Some(root) = &config.plugins.root {
            let mut names = Vec::new();
            for entry in fs::read_dir(root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            names.sort();
            return Ok(names);
        }

        Ok(match &config.plugins.enabled {
            Some(enabled) => enabled.clone(),
            None => self.catalog.names().map(str::to_string).collect(),
        })
    }

    /// Load (or reload) one plugin, logging any failure.
    pub fn load(&mut self, name: &str, config: &Config) -> bool {
        match self.try_load(name, config) {
            Ok(declared) => {
                info!(plugin = %declared, requested = %name, "Loaded plugin");
                true
            }
            Err(e) => {
                error!(plugin = %name, error = %e, code = e.error_code(), "Failed to load plugin");
                false
            }
        }
    }

    /// Load one plugin, returning its declared name.
    pub fn try_load(&mut self, name: &str, config: &Config) -> Result<String, PluginError> {
        let factory = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;
        let init = PluginInit {
            name,
            config,
            settings: read_plugin_settings(config, name)?,
            database: self.database.clone(),
        };

        let plugin = guarded(|| factory(&init))?;
        let declared = plugin.name().to_string();
        self.insert(plugin);
        Ok(declared)
    }

    /// Add a constructed plugin, replacing any plugin with the same declared
    /// name. The old instance is removed before the new one is appended.
    pub fn insert(&mut self, plugin: Box<dyn LoadedPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.retain(|p| p.name() != name);
        self.plugins.push(plugin);
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    /// Queue every loaded plugin's schema on the database.
    pub fn create_tables(&self) {
        let Some(database) = &self.database else {
            return;
        };
        for plugin in &self.plugins {
            if let Err(e) = database.create_tables(plugin.name(), plugin.schema()) {
                error!(plugin = %plugin.name(), error = %e, code = e.error_code(), "Failed to queue plugin schema");
            }
        }
    }

    /// Deliver `event` to every plugin in load order.
    pub fn dispatch(&mut self, event: &PluginEvent, env: &mut DispatchEnv<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for plugin in &mut self.plugins {
            deliver(plugin.as_mut(), event, env, &mut effects);
        }
        effects
    }

    /// Deliver `event` to the plugin declared as `name` only.
    pub fn dispatch_to(&mut self, name: &str, event: &PluginEvent, env: &mut DispatchEnv<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.plugins.iter_mut().find(|p| p.name() == name) {
            Some(plugin) => deliver(plugin.as_mut(), event, env, &mut effects),
            None => debug!(plugin = %name, callback = event.callback_name(), "Plugin no longer loaded"),
        }
        effects
    }

    /// Run the `tier` handler of `inv.command` on the plugin at `index`.
    pub fn call_command(
        &mut self,
        index: usize,
        tier: Tier,
        inv: &Invocation<'_>,
        env: &mut DispatchEnv<'_>,
    ) -> CommandOutcome {
        let Some(plugin) = self.plugins.get_mut(index) else {
            return CommandOutcome {
                effects: Vec::new(),
                result: Err(PluginError::MissingHandler {
                    tier: tier.as_str(),
                    command: inv.command.to_string(),
                }),
            };
        };

        let name = plugin.name().to_string();
        let span = spans::plugin(&name, inv.command);
        let _enter = span.enter();
        let mut ctx = env.context(&name);
        let result = guarded(|| plugin.call(tier, &mut ctx, inv));
        CommandOutcome {
            effects: ctx.into_effects(),
            result,
        }
    }
}

fn deliver(
    plugin: &mut dyn LoadedPlugin,
    event: &PluginEvent,
    env: &mut DispatchEnv<'_>,
    effects: &mut Vec<Effect>,
) {
    let name = plugin.name().to_string();
    let callback = event.callback_name();
    let span = spans::plugin(&name, callback);
    let _enter = span.enter();

    let mut ctx = env.context(&name);
    let result = guarded(|| plugin.on_event(&mut ctx, event));
    effects.extend(ctx.into_effects());

    if let Err(e) = result {
        error!(
            plugin = %name,
            callback = callback,
            code = e.error_code(),
            error = %e,
            "Plugin callback failed"
        );
    }
}

/// Read `<root>/<name>/plugin.toml`. Without a root there is nothing to read.
fn read_plugin_settings(config: &Config, name: &str) -> Result<toml::Table, PluginError> {
    let Some(root) = &config.plugins.root else {
        return Ok(toml::Table::new());
    };
    let dir = root.join(name);
    if !dir.is_dir() {
        return Err(PluginError::UnknownPlugin(name.to_string()));
    }

    match fs::read_to_string(dir.join("plugin.toml")) {
        Ok(raw) => Ok(toml::from_str(&raw)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(toml::Table::new()),
        Err(e) => Err(e.into()),
    }
}
