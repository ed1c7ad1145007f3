// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine the absolute locations a build session works with: the project
//! root, the application source tree, the active client's source tree, the
//! shared modules tree, and the scratch directories used for route backups
//! and workspace overlays.
//!
//! # Project Layout
//!
//! ```text
//! <project>/
//! ├── app/                  application root (package.json, .env.*, src/)
//! │   └── src/routes/...    file-based routes
//! ├── clients/<id>/         per-client descriptor and overrides
//! │   ├── config.json
//! │   └── src/              client source tree (src/lib mirrors modules/)
//! ├── modules/              shared packages (@shared/*, @core/*, @plugin/*)
//! ├── .route-backups/       hidden route directories
//! └── .temp/                materialized workspace overlay
//! ```
//!
//! Every directory name above can be changed through
//! [`Layout`](crate::config::Layout).

use crate::config::{ClientId, Layout, ProjectSettings};

use std::path::{Component, Path, PathBuf};

/// Resolved absolute paths for a single build session.
///
/// Computed once when a session starts, and treated as read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    project_root: PathBuf,
    app_root: PathBuf,
    clients_root: PathBuf,
    modules_root: PathBuf,
    backup_dir: PathBuf,
    workspace_dir: PathBuf,
    build_dir: PathBuf,
    client: Option<ClientId>,
}

impl PathConfig {
    /// Construct path configuration rooted at `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        layout: &Layout,
        client: Option<ClientId>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            app_root: normalize_lexically(&project_root.join(&layout.app_dir)),
            clients_root: project_root.join(&layout.clients_dir),
            modules_root: project_root.join(&layout.modules_dir),
            backup_dir: project_root.join(&layout.backup_dir),
            workspace_dir: project_root.join(&layout.workspace_dir),
            build_dir: project_root.join(&layout.build_dir),
            project_root,
            client,
        }
    }

    /// Construct path configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::CurrentDir`] if the working directory cannot be
    ///   determined.
    pub fn discover(layout: &Layout, client: Option<ClientId>) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(PathError::CurrentDir)?;
        Ok(Self::new(project_root_from(&cwd, layout), layout, client))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Application source tree, i.e., `<app>/src`.
    pub fn app_src(&self) -> PathBuf {
        self.app_root.join("src")
    }

    pub fn modules_root(&self) -> &Path {
        &self.modules_root
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn client(&self) -> Option<&ClientId> {
        self.client.as_ref()
    }

    /// Directory holding every client's descriptor and overrides.
    pub fn clients_root(&self) -> &Path {
        &self.clients_root
    }

    /// Directory of the active client, if any.
    pub fn client_dir(&self) -> Option<PathBuf> {
        self.client
            .as_ref()
            .map(|client| self.clients_root.join(client.as_str()))
    }

    /// Source tree of the active client, i.e., `clients/<id>/src`.
    pub fn client_src(&self) -> Option<PathBuf> {
        self.client_dir().map(|dir| dir.join("src"))
    }

    /// Output directory of the static build, `build/<id>` or `build/app`.
    pub fn build_output_dir(&self) -> PathBuf {
        let id = self.client.as_ref().map_or("app", ClientId::as_str);
        self.build_dir.join(id)
    }
}

/// Discover project settings and session paths from the working directory.
///
/// The project root is located with the default layout first, since the
/// settings that may change the layout live inside the project root.
///
/// # Errors
///
/// - Return [`PathError::CurrentDir`] if the working directory cannot be
///   determined.
pub fn discover_session(client: Option<ClientId>) -> Result<(ProjectSettings, PathConfig)> {
    let cwd = std::env::current_dir().map_err(PathError::CurrentDir)?;
    let settings = ProjectSettings::load(project_root_from(&cwd, &Layout::default()));
    let root = project_root_from(&cwd, &settings.layout);
    let paths = PathConfig::new(root, &settings.layout, client);
    Ok((settings, paths))
}

/// Determine project root from a working directory.
///
/// Bundler sessions are usually started from inside the application
/// directory, so a working directory named after the application directory
/// is treated as one level below the project root.
pub fn project_root_from(cwd: &Path, layout: &Layout) -> PathBuf {
    let app_name = Path::new(&layout.app_dir).file_name();
    match (cwd.file_name(), cwd.parent()) {
        (Some(name), Some(parent)) if Some(name) == app_name => parent.to_path_buf(),
        _ => cwd.to_path_buf(),
    }
}

/// Normalize `.` and `..` components without touching the file system.
///
/// Import targets often lack file extensions, so they cannot be
/// canonicalized through the file system.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // INVARIANT: Never pop past the root or a prefix.
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir | Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Render a path with forward slashes for use inside generated source text.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Working directory cannot be determined.
    #[error("cannot determine current working directory")]
    CurrentDir(#[source] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
