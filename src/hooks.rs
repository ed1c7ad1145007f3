// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bundler hook seam.
//!
//! The bundler itself is an external collaborator. It drives a session
//! through a fixed set of hooks, and this crate hooks into them through the
//! [`BundlerPlugin`] trait:
//!
//! | Hook              | When                                    |
//! |-------------------|-----------------------------------------|
//! | `config`          | before the bundler configuration is final |
//! | `config_resolved` | once the configuration is final         |
//! | `build_start`     | before modules are scanned              |
//! | `resolve_id`      | for every import                        |
//! | `load`            | for every module about to be read       |
//! | `write_bundle`    | after output is written                 |
//! | `server_close`    | when the dev server shuts down          |
//!
//! [`PluginPipeline`] assembles the plugins of a session in order and
//! dispatches hooks to them the way the bundler would.

use crate::{
    config::ClientConfig,
    env::EnvLoaderPlugin,
    path::PathConfig,
    resolve::{ClientPathResolver, ModuleRequest},
    routes::RouteManagerPlugin,
    toggle::ModuleTogglerPlugin,
};

use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Plugin participating in a bundler session.
///
/// Every hook defaults to doing nothing. Hooks never fail: plugins log
/// their own problems and fall back to default behavior.
pub trait BundlerPlugin {
    /// Name of the plugin, for diagnostics.
    fn name(&self) -> &'static str;

    /// Contribute to the bundler configuration.
    fn config(&mut self) -> ConfigPatch {
        ConfigPatch::default()
    }

    /// React to the final bundler configuration.
    fn config_resolved(&mut self) {}

    /// Prepare for module scanning.
    fn build_start(&mut self) {}

    /// Redirect an import. `None` defers to the next plugin.
    fn resolve_id(&self, _id: &str, _importer: Option<&Path>) -> Option<ModuleRequest> {
        None
    }

    /// Provide module content. `None` defers to the next plugin.
    fn load(&self, _request: &ModuleRequest) -> Option<String> {
        None
    }

    /// Clean up after output is written.
    fn write_bundle(&mut self) {}

    /// Clean up when the dev server shuts down.
    fn server_close(&mut self) {}
}

/// Configuration contributed by plugins.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ConfigPatch {
    /// Constants substituted at build time.
    pub defines: BTreeMap<String, String>,

    /// Directory the static build is written to.
    pub out_dir: Option<PathBuf>,
}

impl ConfigPatch {
    /// Merge another patch into this one. Later values win.
    pub fn merge(&mut self, other: ConfigPatch) {
        self.defines.extend(other.defines);
        if other.out_dir.is_some() {
            self.out_dir = other.out_dir;
        }
    }
}

/// Ordered set of plugins for a bundler session.
#[derive(Default)]
pub struct PluginPipeline {
    base: ConfigPatch,
    plugins: Vec<Box<dyn BundlerPlugin>>,
}

impl PluginPipeline {
    /// Construct empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the plugins of a session.
    ///
    /// Order matters: the environment file is selected first, toggles are
    /// defined next, routes are hidden before the resolver ever runs.
    /// Routes are only managed, and imports only redirected, for a client
    /// build.
    pub fn for_session(paths: &PathConfig, env: Option<String>) -> Self {
        let config = ClientConfig::load(paths);
        let mut pipeline = Self {
            base: ConfigPatch {
                out_dir: Some(paths.build_output_dir()),
                ..ConfigPatch::default()
            },
            plugins: Vec::new(),
        }
        .with_plugin(EnvLoaderPlugin::new(paths, env))
        .with_plugin(ModuleTogglerPlugin::new(paths, config.clone()));

        if let Some(routes) = RouteManagerPlugin::new(paths, &config) {
            pipeline.push(routes);
        }
        if let Some(resolver) = ClientPathResolver::new(paths.clone()) {
            pipeline.push(resolver);
        }

        pipeline
    }

    /// Append a plugin.
    pub fn with_plugin(mut self, plugin: impl BundlerPlugin + 'static) -> Self {
        self.push(plugin);
        self
    }

    /// Append a plugin in place.
    pub fn push(&mut self, plugin: impl BundlerPlugin + 'static) {
        debug!("register plugin {}", plugin.name());
        self.plugins.push(Box::new(plugin));
    }

    /// Names of registered plugins, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// Collect configuration from every plugin.
    pub fn config(&mut self) -> ConfigPatch {
        let mut patch = self.base.clone();
        for plugin in &mut self.plugins {
            patch.merge(plugin.config());
        }

        patch
    }

    pub fn config_resolved(&mut self) {
        self.plugins
            .iter_mut()
            .for_each(|plugin| plugin.config_resolved());
    }

    pub fn build_start(&mut self) {
        self.plugins.iter_mut().for_each(|plugin| plugin.build_start());
    }

    /// Resolve an import through the first plugin that claims it.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve_id(&self, id: &str, importer: Option<&Path>) -> Option<ModuleRequest> {
        self.plugins
            .iter()
            .find_map(|plugin| plugin.resolve_id(id, importer))
    }

    /// Load a module through the first plugin that provides it.
    pub fn load(&self, request: &ModuleRequest) -> Option<String> {
        self.plugins.iter().find_map(|plugin| plugin.load(request))
    }

    pub fn write_bundle(&mut self) {
        self.plugins
            .iter_mut()
            .for_each(|plugin| plugin.write_bundle());
    }

    pub fn server_close(&mut self) {
        self.plugins
            .iter_mut()
            .for_each(|plugin| plugin.server_close());
    }
}

impl Debug for PluginPipeline {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("PluginPipeline")
            .field("base", &self.base)
            .field("plugins", &self.names())
            .finish()
    }
}
