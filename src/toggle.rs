// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Compile-time plugin toggles.
//!
//! Application code gates plugin features behind boolean constants named
//! `__IS_<PLUGIN>_ENABLED__`. The bundler substitutes their values at build
//! time through its defines mechanism, and a generated type declaration file
//! keeps the type checker aware of them.

use crate::{
    config::ClientConfig,
    hooks::{BundlerPlugin, ConfigPatch},
    path::PathConfig,
    registry::AVAILABLE_PLUGINS,
};

use std::{collections::BTreeMap, fs, path::PathBuf};
use tracing::{debug, warn};

/// Location of the generated declarations, relative to the application root.
pub const DECLARATIONS_FILE: &str = "src/lib/client-plugins.d.ts";

/// Name of the define constant for a plugin.
pub fn constant_name(plugin: &str) -> String {
    format!("__IS_{}_ENABLED__", plugin.to_uppercase())
}

/// Define constants for every registry plugin and every configured plugin.
///
/// Values are JSON literals, ready for textual substitution.
pub fn defines(config: &ClientConfig) -> BTreeMap<String, String> {
    AVAILABLE_PLUGINS
        .iter()
        .copied()
        .chain(config.plugins.names())
        .map(|plugin| {
            let enabled = config.plugins.is_enabled(plugin);
            (constant_name(plugin), enabled.to_string())
        })
        .collect()
}

/// Type declarations for a set of define constants.
pub fn type_declarations<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(|name| format!("declare const {name}: boolean;"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bundler plugin injecting plugin toggle constants.
#[derive(Debug, Clone)]
pub struct ModuleTogglerPlugin {
    config: ClientConfig,
    declarations_path: PathBuf,
}

impl ModuleTogglerPlugin {
    pub fn new(paths: &PathConfig, config: ClientConfig) -> Self {
        Self {
            config,
            declarations_path: paths.app_root().join(DECLARATIONS_FILE),
        }
    }

    /// Write type declarations and return the defines to inject.
    ///
    /// Failure to write declarations is logged and does not prevent the
    /// defines from being injected.
    pub fn apply(&self) -> BTreeMap<String, String> {
        let defines = defines(&self.config);
        let declarations = type_declarations(defines.keys());

        let written = self
            .declarations_path
            .parent()
            .map_or(Ok(()), |dir| mkdirp::mkdirp(dir).map(drop))
            .and_then(|_| fs::write(&self.declarations_path, declarations));
        match written {
            Ok(()) => debug!(
                "wrote plugin declarations to {:?}",
                self.declarations_path.display()
            ),
            Err(err) => warn!(
                "failed to write plugin declarations {:?}: {err}",
                self.declarations_path.display()
            ),
        }

        defines
    }
}

impl BundlerPlugin for ModuleTogglerPlugin {
    fn name(&self) -> &'static str {
        "client-module-toggler"
    }

    fn config(&mut self) -> ConfigPatch {
        ConfigPatch {
            defines: self.apply(),
            ..ConfigPatch::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientId, Layout, PluginToggles};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::default_for(None);
        config.plugins = PluginToggles::from_iter([("payment", false), ("chat", true)]);
        config
    }

    #[test]
    fn defines_cover_registry_and_configured_plugins() {
        let result = defines(&config());
        let expect = BTreeMap::from([
            ("__IS_ANALYTICS_ENABLED__".to_owned(), "true".to_owned()),
            ("__IS_CHAT_ENABLED__".to_owned(), "true".to_owned()),
            ("__IS_LOBBY_ENABLED__".to_owned(), "true".to_owned()),
            ("__IS_PAYMENT_ENABLED__".to_owned(), "false".to_owned()),
        ]);
        assert_eq!(result, expect);
    }

    #[test]
    fn plugin_writes_declarations() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let paths = PathConfig::new(
            root.path(),
            &Layout::default(),
            Some(ClientId::new("client-a")?),
        );
        let mut plugin = ModuleTogglerPlugin::new(&paths, config());

        let patch = plugin.config();
        assert_eq!(patch.defines.len(), 4);

        let result = fs::read_to_string(root.path().join("app").join(DECLARATIONS_FILE))?;
        let expect = indoc! {"
            declare const __IS_ANALYTICS_ENABLED__: boolean;
            declare const __IS_CHAT_ENABLED__: boolean;
            declare const __IS_LOBBY_ENABLED__: boolean;
            declare const __IS_PAYMENT_ENABLED__: boolean;"};
        assert_eq!(result, expect);

        Ok(())
    }
}
