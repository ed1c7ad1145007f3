// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Two kinds of configuration drive a build session:
//!
//! 1. The __client descriptor__, a JSON file at `clients/<id>/config.json`
//!    (or `app/config.json` for the default build) that lists which feature
//!    plugins a client has enabled.
//! 2. The optional __project settings__ file `tenantkit.toml` at the
//!    project root that describes the directory layout and overlay rules.
//!
//! Neither kind of configuration is allowed to abort a build. Missing or
//! malformed files are logged and replaced by defaults.
//!
//! # Default Plugin Policy
//!
//! A plugin that a client descriptor does not mention is enabled. A missing
//! or unreadable descriptor therefore enables every plugin. The one
//! exception is a descriptor that lists plugins as an array of names, which
//! is an explicit allow-list: registry plugins not listed are disabled.

use crate::{
    path::PathConfig,
    registry::{is_valid_plugin, AVAILABLE_PLUGINS},
};

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, error, warn};

/// File name of the project settings file.
pub const SETTINGS_FILE: &str = "tenantkit.toml";

/// File name of a client descriptor.
pub const CLIENT_CONFIG_FILE: &str = "config.json";

/// Identifier of the default, override-free build.
pub const DEFAULT_CLIENT: &str = "app";

/// Validated client identifier.
///
/// Client identifiers name a directory under the clients root, so they may
/// not contain path separators or be a relative path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Construct new client identifier.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidClientId`] if the identifier is empty,
    ///   is a relative path component, or contains a path separator.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(ConfigError::InvalidClientId(id));
        }

        Ok(Self(id))
    }

    /// Interpret value of the `CLIENT` environment variable.
    ///
    /// Absent, empty, and `"app"` all select the default build, i.e., no
    /// client at all.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidClientId`] if the value is not a valid
    ///   client identifier.
    pub fn from_env_value(value: Option<&str>) -> Result<Option<Self>> {
        match value.map(str::trim) {
            None | Some("") | Some(DEFAULT_CLIENT) => Ok(None),
            Some(id) => Self::new(id).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ClientId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

/// Enabled state of feature plugins.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PluginToggles(BTreeMap<String, bool>);

impl PluginToggles {
    /// Toggle set where every registry plugin is enabled.
    pub fn all_enabled() -> Self {
        Self(
            AVAILABLE_PLUGINS
                .iter()
                .map(|name| ((*name).to_owned(), true))
                .collect(),
        )
    }

    /// Toggle set built from an allow-list of plugin names.
    pub fn allow_list(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut toggles: BTreeMap<String, bool> = AVAILABLE_PLUGINS
            .iter()
            .map(|name| ((*name).to_owned(), false))
            .collect();
        toggles.extend(names.into_iter().map(|name| (name.into(), true)));
        Self(toggles)
    }

    /// Explicitly set enabled state of a plugin.
    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }

    /// Check if plugin is enabled. Unmentioned plugins are enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(true)
    }

    /// Names of plugins that were explicitly mentioned.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for PluginToggles {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Client descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Identifier of the client, `"app"` for the default build.
    pub client_id: String,

    /// Human readable client name.
    pub client_name: String,

    /// Enabled state of feature plugins.
    pub plugins: PluginToggles,
}

impl ClientConfig {
    /// Default descriptor for a client, with every plugin enabled.
    pub fn default_for(client: Option<&ClientId>) -> Self {
        let id = client.map_or(DEFAULT_CLIENT, ClientId::as_str).to_owned();
        Self {
            client_name: id.clone(),
            client_id: id,
            plugins: PluginToggles::all_enabled(),
        }
    }

    /// Load descriptor of the session's client.
    ///
    /// Never fails. A missing descriptor is logged as a warning, and an
    /// unreadable one as an error, before falling back to
    /// [`ClientConfig::default_for`].
    pub fn load(paths: &PathConfig) -> Self {
        let client = paths.client();
        let config_path = config_path(paths);
        if !config_path.exists() {
            warn!(
                "client config not found at {:?}, using defaults",
                config_path.display()
            );
            return Self::default_for(client);
        }

        match read_to_string(&config_path)
            .map_err(|source| ConfigError::Read {
                source,
                path: config_path.clone(),
            })
            .and_then(|data| data.parse::<ClientConfigFile>())
        {
            Ok(file) => {
                debug!("loaded client config from {:?}", config_path.display());
                file.into_config(client)
            }
            Err(err) => {
                error!(
                    "failed to parse client config {:?}: {err}",
                    config_path.display()
                );
                Self::default_for(client)
            }
        }
    }

    /// Names of enabled plugins, registry plugins and extra names alike.
    pub fn enabled_plugins(&self) -> BTreeSet<String> {
        AVAILABLE_PLUGINS
            .iter()
            .copied()
            .chain(self.plugins.names())
            .filter(|name| self.plugins.is_enabled(name))
            .map(str::to_owned)
            .collect()
    }

    /// Mentioned plugin names that the registry does not know about.
    pub fn unknown_plugins(&self) -> Vec<&str> {
        self.plugins
            .names()
            .filter(|name| !is_valid_plugin(name))
            .collect()
    }
}

/// Location of the session's client descriptor.
///
/// `clients/<id>/config.json` for a client, `<app>/config.json` otherwise.
pub fn config_path(paths: &PathConfig) -> PathBuf {
    match paths.client_dir() {
        Some(dir) => dir.join(CLIENT_CONFIG_FILE),
        None => paths.app_root().join(CLIENT_CONFIG_FILE),
    }
}

/// On-disk layout of a client descriptor.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigFile {
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub plugins: Option<PluginsField>,
}

/// Plugin listing, either as toggles or as an allow-list.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum PluginsField {
    Toggles(BTreeMap<String, bool>),
    AllowList(Vec<String>),
}

impl ClientConfigFile {
    fn into_config(self, client: Option<&ClientId>) -> ClientConfig {
        let default = ClientConfig::default_for(client);
        let client_id = self.client_id.unwrap_or(default.client_id);
        let client_name = self.client_name.unwrap_or_else(|| client_id.clone());
        let plugins = match self.plugins {
            None => default.plugins,
            Some(PluginsField::Toggles(toggles)) => {
                let mut plugins = default.plugins;
                for (name, enabled) in toggles {
                    plugins.set(name, enabled);
                }
                plugins
            }
            Some(PluginsField::AllowList(names)) => PluginToggles::allow_list(names),
        };

        let config = ClientConfig {
            client_id,
            client_name,
            plugins,
        };
        for name in config.unknown_plugins() {
            warn!(
                "client {} mentions unknown plugin {name:?}, it owns no routes",
                config.client_id
            );
        }

        config
    }
}

impl FromStr for ClientConfigFile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(ConfigError::Json)
    }
}

/// Project settings layout.
///
/// Read from `tenantkit.toml` at the project root. Every field is optional,
/// so an empty file is equivalent to no file at all.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Directory layout of the project.
    pub layout: Layout,

    /// Workspace overlay rules.
    pub overlay: OverlaySettings,
}

impl ProjectSettings {
    /// Load project settings from a project root.
    ///
    /// Never fails. Missing settings mean defaults, and malformed settings
    /// are logged before falling back to defaults.
    pub fn load(project_root: impl AsRef<Path>) -> Self {
        let path = project_root.as_ref().join(SETTINGS_FILE);
        if !path.exists() {
            debug!("no project settings at {:?}", path.display());
            return Self::default();
        }

        match read_to_string(&path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.clone(),
            })
            .and_then(|data| data.parse())
        {
            Ok(settings) => settings,
            Err(err) => {
                warn!("ignoring project settings {:?}: {err}", path.display());
                Self::default()
            }
        }
    }
}

impl FromStr for ProjectSettings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: ProjectSettings = toml::from_str(data).map_err(ConfigError::Toml)?;

        // INVARIANT: Perform shell expansion on every layout directory.
        let layout = &mut settings.layout;
        for dir in [
            &mut layout.app_dir,
            &mut layout.clients_dir,
            &mut layout.modules_dir,
            &mut layout.backup_dir,
            &mut layout.workspace_dir,
            &mut layout.build_dir,
        ] {
            *dir = shellexpand::full(dir.as_str())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned();
        }

        Ok(settings)
    }
}

/// Directory layout, relative to the project root.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Layout {
    pub app_dir: String,
    pub clients_dir: String,
    pub modules_dir: String,
    pub backup_dir: String,
    pub workspace_dir: String,
    pub build_dir: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            app_dir: "app".into(),
            clients_dir: "clients".into(),
            modules_dir: "modules".into(),
            backup_dir: ".route-backups".into(),
            workspace_dir: ".temp".into(),
            build_dir: "build".into(),
        }
    }
}

/// Workspace overlay rules.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Extra gitignore-style patterns to leave out of the workspace copy.
    pub exclude: Vec<String>,

    /// Client directories to layer on top of the application tree.
    #[serde(rename = "layer")]
    pub layers: Vec<OverlayLayer>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            layers: vec![OverlayLayer {
                from: "plugin".into(),
                to: "src/plugin".into(),
            }],
        }
    }
}

/// Mapping from a client directory to an application directory.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct OverlayLayer {
    /// Directory relative to `clients/<id>`.
    pub from: String,

    /// Directory relative to the application root.
    pub to: String,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Client identifier cannot name a client directory.
    #[error("invalid client identifier {0:?}")]
    InvalidClientId(String),

    /// Configuration file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Client descriptor is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Project settings are not valid TOML.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Failed to perform shell expansion on project settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
