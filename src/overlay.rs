// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace overlay building.
//!
//! Route hiding mutates the shared project tree. The overlay strategy leaves
//! the project alone instead: the project is copied into a scratch workspace,
//! client overrides are layered on top of the copy, and disabled routes are
//! deleted from the copy. The bundler then runs inside the workspace.
//!
//! # Workspace Layout
//!
//! The workspace mirrors the project root. With default settings:
//!
//! ```text
//! <project>/.temp/
//! ├── node_modules -> <project>/node_modules
//! ├── modules/...
//! └── app/
//!     ├── node_modules -> <project>/app/node_modules
//!     ├── .env              copy of <project>/app/.env.<ENV>
//!     ├── package.json      scripts rewritten to plain bundler commands
//!     └── src/plugin/...    layered with clients/<id>/plugin/...
//! ```

use crate::{
    config::{ClientConfig, OverlaySettings},
    env::{copy_env_file, env_file_name},
    path::{to_slash, PathConfig},
    registry::disabled_routes,
};

use ignore::{
    gitignore::{Gitignore, GitignoreBuilder},
    WalkBuilder,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Value};
use std::{
    fs,
    path::{Component, Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Entries never copied into the workspace, in gitignore syntax.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".svelte-kit",
    "build",
    "dist",
    ".git",
    "scripts",
    "pnpm-lock.yaml",
    "*README.md",
];

/// Entries never layered from a client directory, in gitignore syntax.
pub const LAYER_EXCLUDES: &[&str] = &["node_modules", ".git", "dist", "build"];

/// Scripts of the workspace's package manifest.
pub const WORKSPACE_SCRIPTS: &[(&str, &str)] = &[
    ("dev", "vite dev"),
    ("build", "vite build"),
    ("preview", "vite preview"),
    ("test", "vitest run && playwright test"),
];

const TSCONFIG_EXTENDS: &str = r#""extends": "../../../app/tsconfig.json""#;
const WORKSPACE_TSCONFIG_EXTENDS: &str = r#""extends": "../../tsconfig.json""#;
const PACKAGE_DIRS: &[&str] = &["plugin", "core", "shared"];

/// Materialize client workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceBuilder {
    paths: PathConfig,
    settings: OverlaySettings,
    bar: ProgressBar,
}

impl WorkspaceBuilder {
    /// Construct new workspace builder with progress reporting hidden.
    pub fn new(paths: PathConfig, settings: OverlaySettings) -> Self {
        Self {
            paths,
            settings,
            bar: ProgressBar::hidden(),
        }
    }

    /// Report progress through a progress bar.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.bar = bar;
        self
    }

    pub fn workspace_dir(&self) -> &Path {
        self.paths.workspace_dir()
    }

    /// Application root inside the workspace.
    pub fn workspace_app_root(&self) -> PathBuf {
        match self
            .paths
            .app_root()
            .strip_prefix(self.paths.project_root())
        {
            Ok(relative) => self.workspace_dir().join(relative),
            Err(_) => self.workspace_dir().to_path_buf(),
        }
    }

    /// Build workspace for the session's client.
    ///
    /// Returns path to the finished workspace. `env` selects the
    /// environment file copied into the workspace, `None` skips it.
    ///
    /// # Errors
    ///
    /// - Return [`OverlayError::Remove`] if stale workspace cannot be
    ///   removed.
    /// - Return [`OverlayError::CreateDir`] if workspace cannot be created.
    /// - Return [`OverlayError::Exclude`] if exclusion patterns are invalid.
    /// - Return [`OverlayError::IndicatifStyleTemplate`] if progress style is
    ///   invalid.
    #[instrument(skip(self), level = "debug")]
    pub fn build(&self, env: Option<&str>) -> Result<PathBuf> {
        let client = self
            .paths
            .client()
            .map_or("app", |client| client.as_str())
            .to_owned();
        let workspace = self.workspace_dir().to_path_buf();
        info!(
            "building workspace for client {client}, env {}",
            env.unwrap_or("<none>")
        );

        let style = ProgressStyle::with_template("{spinner:.green} {elapsed_precise:.green}  {msg}")?;
        self.bar.set_style(style);
        self.bar.enable_steady_tick(Duration::from_millis(100));

        self.bar.set_message("cleaning workspace");
        self.reset_workspace()?;

        self.bar.set_message("copying project files");
        let excludes = self.project_excludes()?;
        let copied = self.copy_tree(self.paths.project_root(), &workspace, excludes, true);
        debug!("copied {copied} entries into workspace");

        self.bar.set_message("layering client overrides");
        self.apply_layers()?;

        self.bar.set_message("excluding disabled routes");
        self.exclude_disabled_routes();

        self.bar.set_message("finishing workspace");
        self.link_node_modules();
        let source = self.paths.app_root().join("package.json");
        let target = self.workspace_app_root().join("package.json");
        match rewrite_package_json(&source, &target) {
            Ok(()) => debug!("rewrote workspace package manifest"),
            Err(err) => warn!("failed to rewrite package manifest: {err}"),
        }
        self.copy_env(env);

        self.bar.finish_and_clear();
        info!("workspace ready at {:?}", workspace.display());
        Ok(workspace)
    }

    /// Remove workspace unless it should be kept for debugging.
    ///
    /// # Errors
    ///
    /// - Return [`OverlayError::Remove`] if workspace cannot be removed.
    pub fn clean(&self, keep: bool) -> Result<()> {
        let workspace = self.workspace_dir();
        if !workspace.exists() {
            debug!("no workspace at {:?}", workspace.display());
            return Ok(());
        }

        if keep {
            info!("keeping workspace for debugging: {:?}", workspace.display());
            return Ok(());
        }

        remove_dir(workspace)?;
        info!("cleaned workspace {:?}", workspace.display());
        Ok(())
    }

    fn reset_workspace(&self) -> Result<()> {
        let workspace = self.workspace_dir();
        if workspace.exists() {
            debug!("removing stale workspace {:?}", workspace.display());
            remove_dir(workspace)?;
        }

        mkdirp::mkdirp(workspace).map_err(|source| OverlayError::CreateDir {
            source,
            path: workspace.to_path_buf(),
        })?;

        Ok(())
    }

    fn project_excludes(&self) -> Result<Gitignore> {
        let root = self.paths.project_root();
        let build_output = self.paths.build_output_dir();
        let build_dir = build_output.parent().unwrap_or(root);

        // INVARIANT: Scratch directories and client trees are anchored to the
        // project root, everything else matches at any depth.
        let anchored = [
            self.paths.workspace_dir(),
            self.paths.backup_dir(),
            self.paths.clients_root(),
            build_dir,
        ]
        .into_iter()
        .filter_map(|dir| dir.strip_prefix(root).ok())
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(|relative| format!("/{}", to_slash(relative)))
        .collect::<Vec<_>>();

        build_excludes(
            root,
            DEFAULT_EXCLUDES
                .iter()
                .map(|pattern| (*pattern).to_owned())
                .chain(anchored)
                .chain(self.settings.exclude.iter().cloned()),
        )
    }

    fn apply_layers(&self) -> Result<()> {
        let Some(client_dir) = self.paths.client_dir() else {
            debug!("default build, no client overrides to layer");
            return Ok(());
        };

        let app = self.workspace_app_root();
        for layer in &self.settings.layers {
            let from = client_dir.join(&layer.from);
            if !from.is_dir() {
                debug!("no client overrides at {:?}", from.display());
                continue;
            }

            info!("applying client overrides from {:?}", from.display());
            let excludes = build_excludes(&from, LAYER_EXCLUDES.iter().copied())?;
            let copied = self.copy_tree(&from, &app.join(&layer.to), excludes, false);
            debug!("layered {copied} entries onto {}", layer.to);
        }

        Ok(())
    }

    fn exclude_disabled_routes(&self) {
        let config = ClientConfig::load(&self.paths);
        let routes = disabled_routes(&config.plugins);
        if routes.is_empty() {
            return;
        }

        let app = self.workspace_app_root();
        info!("excluding disabled routes: {}", routes.join(", "));
        for route in routes {
            let path = app.join(&route);
            if !path.exists() {
                continue;
            }

            match fs::remove_dir_all(&path) {
                Ok(()) => debug!("excluded route {route}"),
                Err(err) => warn!("failed to exclude route {route}: {err}"),
            }
        }
    }

    fn link_node_modules(&self) {
        let pairs = [
            (self.paths.project_root(), self.workspace_dir().to_path_buf()),
            (self.paths.app_root(), self.workspace_app_root()),
        ];

        for (source_root, target_root) in pairs {
            let source = source_root.join("node_modules");
            let target = target_root.join("node_modules");
            if !source.exists() || target.exists() {
                continue;
            }

            match symlink(&source, &target) {
                Ok(()) => debug!("linked node_modules from {:?}", source_root.display()),
                Err(err) => warn!(
                    "failed to link node_modules from {:?}: {err}",
                    source_root.display()
                ),
            }
        }
    }

    fn copy_env(&self, env: Option<&str>) {
        let Some(env) = env else {
            warn!("environment not specified, skipping environment file");
            return;
        };

        copy_env_file(
            &self.paths.app_root().join(env_file_name(env)),
            &self.workspace_app_root().join(".env"),
        );
    }

    /// Copy a tree file by file, overwriting existing files.
    ///
    /// Returns number of entries copied. Failed entries are logged and
    /// skipped.
    fn copy_tree(&self, from: &Path, to: &Path, excludes: Gitignore, rewrite: bool) -> usize {
        let walker = WalkBuilder::new(from)
            .standard_filters(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
                entry.depth() == 0 || !excludes.matched(entry.path(), is_dir).is_ignore()
            })
            .build();

        let mut copied = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("failed to walk {:?}: {err}", from.display());
                    continue;
                }
            };

            // INVARIANT: Walked entries always live under the walk root.
            let Ok(relative) = entry.path().strip_prefix(from) else {
                continue;
            };
            let target = to.join(relative);
            let Some(kind) = entry.file_type() else {
                continue;
            };

            let result = if kind.is_dir() {
                mkdirp::mkdirp(&target).map(drop)
            } else if kind.is_symlink() {
                copy_symlink(entry.path(), &target)
            } else if rewrite && is_package_tsconfig(relative) {
                copy_tsconfig(entry.path(), &target)
            } else {
                fs::copy(entry.path(), &target).map(drop)
            };

            match result {
                Ok(()) => {
                    copied += 1;
                    self.bar.inc(1);
                }
                Err(err) => warn!("failed to copy {:?}: {err}", entry.path().display()),
            }
        }

        copied
    }
}

/// Point the workspace package manifest's scripts at the bundler directly.
///
/// Existing scripts keep their position, and scripts the manifest lacks are
/// appended.
pub fn apply_workspace_scripts(manifest: &mut Value) {
    let Some(object) = manifest.as_object_mut() else {
        return;
    };

    let scripts = object
        .entry("scripts")
        .or_insert_with(|| Value::Object(Default::default()));
    if !scripts.is_object() {
        *scripts = Value::Object(Default::default());
    }

    if let Some(scripts) = scripts.as_object_mut() {
        for (name, command) in WORKSPACE_SCRIPTS {
            scripts.insert((*name).to_owned(), Value::String((*command).to_owned()));
        }
    }
}

/// Rewrite package manifest at `source` into `target`, tab indented.
///
/// # Errors
///
/// - Return [`OverlayError::Read`] if source cannot be read.
/// - Return [`OverlayError::Json`] if source is not valid JSON.
/// - Return [`OverlayError::Write`] if target cannot be written.
pub fn rewrite_package_json(source: &Path, target: &Path) -> Result<()> {
    let data = fs::read_to_string(source).map_err(|source_err| OverlayError::Read {
        source: source_err,
        path: source.to_path_buf(),
    })?;
    let mut manifest: Value = serde_json::from_str(&data)?;
    apply_workspace_scripts(&mut manifest);

    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"\t"));
    manifest.serialize(&mut serializer)?;

    fs::write(target, buffer).map_err(|source| OverlayError::Write {
        source,
        path: target.to_path_buf(),
    })
}

fn build_excludes(
    root: &Path,
    patterns: impl IntoIterator<Item = impl Into<String>>,
) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns.into_iter().map(Into::into) {
        builder.add_line(None, &pattern)?;
    }

    Ok(builder.build()?)
}

fn is_package_tsconfig(relative: &Path) -> bool {
    relative.file_name().is_some_and(|name| name == "tsconfig.json")
        && relative.components().any(|component| {
            matches!(component, Component::Normal(name)
                if PACKAGE_DIRS.iter().any(|dir| name == *dir))
        })
}

fn copy_tsconfig(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::read_to_string(from) {
        Ok(data) => fs::write(
            to,
            data.replacen(TSCONFIG_EXTENDS, WORKSPACE_TSCONFIG_EXTENDS, 1),
        ),
        Err(_) => fs::copy(from, to).map(drop),
    }
}

fn copy_symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    let target = fs::read_link(from)?;
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to)?;
    }

    symlink(&target, to)
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|source| OverlayError::Remove {
        source,
        path: path.to_path_buf(),
    })
}

/// Workspace overlay error types.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Directory cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Package manifest is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Exclusion pattern is invalid.
    #[error(transparent)]
    Exclude(#[from] ignore::Error),

    /// Progress bar style template is invalid.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = OverlayError> = std::result::Result<T, E>;
