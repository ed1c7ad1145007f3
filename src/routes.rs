// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Route hiding and restoring.
//!
//! The web framework discovers routes by directory presence, and offers no
//! declarative way to switch a route off. So the routes of disabled plugins
//! are physically moved out of the application tree before the bundler scans
//! it, and moved back once the bundler is done.
//!
//! # Backup Layout
//!
//! Hidden routes live in `.route-backups/` at the project root, outside the
//! application tree. A route's backup name is its path with the leading
//! `src/routes/` removed and the remaining separators replaced by
//! underscores, e.g., `src/routes/admin/users` becomes `admin_users`.
//!
//! # Transitions
//!
//! ```text
//! Live ──hide──▶ Hidden ──restore──▶ Live
//! ```
//!
//! Both transitions are idempotent. Hiding a hidden or absent route, and
//! restoring a live or absent route, touch nothing on disk. See
//! [`ledger`] for how route states are tracked.
//!
//! # Pitfalls
//!
//! Route hiding mutates the shared project tree. Two sessions for different
//! clients running against the same project at once will corrupt each
//! other's backups. Prefer [`WorkspaceBuilder`](crate::overlay::WorkspaceBuilder)
//! when builds must run side by side.

pub mod ledger;

use crate::{
    config::ClientConfig,
    hooks::BundlerPlugin,
    path::PathConfig,
    registry::disabled_routes,
    resolve::ModuleRequest,
};
use ledger::{RouteLedger, RouteState};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Prefix stripped from route paths to form backup names.
pub const ROUTES_PREFIX: &str = "src/routes/";

/// Page component served in place of a disabled route.
pub const NOT_FOUND_PAGE: &str = "<script>
\timport { error } from '@sveltejs/kit';

\tthrow error(404, 'Page not found');
</script>
";

/// Backup directory name of a route.
pub fn backup_name(route: &str) -> String {
    route
        .strip_prefix(ROUTES_PREFIX)
        .unwrap_or(route)
        .replace('/', "_")
}

/// Live and backup location of a managed route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLocation {
    /// Route path relative to the application root.
    pub route: String,

    /// Route directory inside the application tree.
    pub live: PathBuf,

    /// Route directory inside the backup directory.
    pub backup: PathBuf,
}

/// Hide and restore route directories of disabled plugins.
#[derive(Debug, Clone)]
pub struct RouteManager {
    backup_dir: PathBuf,
    locations: Vec<RouteLocation>,
    ledger: RouteLedger,
}

impl RouteManager {
    /// Construct new route manager over a set of routes.
    pub fn new(paths: &PathConfig, routes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let backup_dir = paths.backup_dir().to_path_buf();
        let locations = routes
            .into_iter()
            .map(Into::into)
            .map(|route: String| RouteLocation {
                live: paths.app_root().join(&route),
                backup: backup_dir.join(backup_name(&route)),
                route,
            })
            .collect();

        let mut manager = Self {
            backup_dir,
            locations,
            ledger: RouteLedger::new(),
        };
        manager.refresh();
        manager
    }

    /// Construct route manager for the disabled routes of a client.
    pub fn for_client(paths: &PathConfig, config: &ClientConfig) -> Self {
        Self::new(paths, disabled_routes(&config.plugins))
    }

    /// Managed routes, relative to the application root.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.locations.iter().map(|location| location.route.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn ledger(&self) -> &RouteLedger {
        &self.ledger
    }

    /// Observe state of every managed route from disk.
    pub fn refresh(&mut self) {
        for location in &self.locations {
            let state = RouteState::observe(&location.live, &location.backup);
            self.ledger.record(location.route.clone(), state);
        }
    }

    /// Move live routes into the backup directory.
    ///
    /// Returns the routes that were moved. Failures are logged per route and
    /// do not stop the remaining routes from being hidden.
    #[instrument(skip(self), level = "debug")]
    pub fn hide(&mut self) -> Vec<String> {
        self.refresh();
        let mut moved = Vec::new();

        for location in &self.locations {
            match self.ledger.state(&location.route) {
                RouteState::Live => {}
                RouteState::Conflicted => {
                    warn!(
                        "route {} exists live and in backup, leaving it alone",
                        location.route
                    );
                    continue;
                }
                state => {
                    debug!("route {} is {state:?}, nothing to hide", location.route);
                    continue;
                }
            }

            match move_dir(&location.live, &location.backup) {
                Ok(()) => {
                    info!(
                        "backed up route {} -> {}",
                        location.route,
                        location.backup.display()
                    );
                    self.ledger
                        .record(location.route.clone(), RouteState::Hidden);
                    moved.push(location.route.clone());
                }
                Err(err) => warn!("failed to back up route {}: {err}", location.route),
            }
        }

        moved
    }

    /// Move hidden routes back into the application tree.
    ///
    /// Returns the routes that were moved. Removes the backup directory
    /// afterwards if nothing is left in it.
    #[instrument(skip(self), level = "debug")]
    pub fn restore(&mut self) -> Vec<String> {
        self.refresh();
        let mut moved = Vec::new();

        for location in &self.locations {
            match self.ledger.state(&location.route) {
                RouteState::Hidden => {}
                RouteState::Conflicted => {
                    warn!(
                        "route {} exists live and in backup, leaving it alone",
                        location.route
                    );
                    continue;
                }
                state => {
                    debug!("route {} is {state:?}, nothing to restore", location.route);
                    continue;
                }
            }

            match move_dir(&location.backup, &location.live) {
                Ok(()) => {
                    info!(
                        "restored route {} <- {}",
                        location.route,
                        location.backup.display()
                    );
                    self.ledger.record(location.route.clone(), RouteState::Live);
                    moved.push(location.route.clone());
                }
                Err(err) => warn!("failed to restore route {}: {err}", location.route),
            }
        }

        remove_if_empty(&self.backup_dir);
        moved
    }

    /// Page component to serve for a module inside a disabled route.
    ///
    /// Only catches routes that slipped past hiding, e.g., modules loaded
    /// directly by path.
    pub fn stub_for(&self, id: &str) -> Option<&'static str> {
        let id = id.replace('\\', "/");
        let disabled = self.routes().any(|route| id.contains(route));
        (disabled && id.ends_with("+page.svelte")).then_some(NOT_FOUND_PAGE)
    }
}

/// Bundler plugin hiding disabled routes for the length of a session.
#[derive(Debug)]
pub struct RouteManagerPlugin {
    manager: RouteManager,
}

impl RouteManagerPlugin {
    /// Construct plugin, hiding disabled routes right away.
    ///
    /// Returns `None` for the default build, and for clients without
    /// disabled routes.
    pub fn new(paths: &PathConfig, config: &ClientConfig) -> Option<Self> {
        let client = paths.client()?;
        let mut manager = RouteManager::for_client(paths, config);
        if manager.is_empty() {
            debug!("no routes to manage for client {client}");
            return None;
        }

        info!(
            "managing routes for client {client}: {}",
            manager.routes().collect::<Vec<_>>().join(", ")
        );

        // INVARIANT: Hide before the bundler gets a chance to scan routes.
        manager.hide();
        Some(Self { manager })
    }

    pub fn manager(&self) -> &RouteManager {
        &self.manager
    }
}

impl BundlerPlugin for RouteManagerPlugin {
    fn name(&self) -> &'static str {
        "route-manager"
    }

    fn build_start(&mut self) {
        self.manager.hide();
    }

    fn load(&self, request: &ModuleRequest) -> Option<String> {
        let ModuleRequest::File(path) = request else {
            return None;
        };

        self.manager
            .stub_for(&path.to_string_lossy())
            .map(str::to_owned)
    }

    fn write_bundle(&mut self) {
        self.manager.restore();
    }

    fn server_close(&mut self) {
        self.manager.restore();
    }
}

fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        mkdirp::mkdirp(parent).map_err(|source| RouteError::CreateDir {
            source,
            path: parent.to_path_buf(),
        })?;
    }

    fs::rename(from, to).map_err(|source| RouteError::Rename {
        source,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })
}

fn remove_if_empty(dir: &Path) {
    let is_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);

    if is_empty {
        match fs::remove_dir(dir) {
            Ok(()) => debug!("removed empty backup directory {:?}", dir.display()),
            Err(err) => debug!("cannot remove backup directory {:?}: {err}", dir.display()),
        }
    }
}

/// Route management error types.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Route directory cannot be moved.
    #[error("failed to move {:?} to {:?}", from.display(), to.display())]
    Rename {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = RouteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientId, Layout, PluginToggles};
    use ignore::WalkBuilder;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn project() -> anyhow::Result<(TempDir, PathConfig)> {
        let root = tempfile::tempdir()?;
        let paths = PathConfig::new(
            root.path(),
            &Layout::default(),
            Some(ClientId::new("client-a")?),
        );
        for (file, contents) in [
            ("app/src/routes/+page.svelte", "home"),
            ("app/src/routes/lobby/+page.svelte", "lobby"),
            ("app/src/routes/lobby/rooms/+page.ts", "export const load = () => ({});"),
            ("app/src/routes/payment/+page.svelte", "pay"),
        ] {
            let path = root.path().join(file);
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(path, contents)?;
        }

        Ok((root, paths))
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkBuilder::new(dir)
            .standard_filters(false)
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
            .map(|entry| {
                let relative = entry.path().strip_prefix(dir).unwrap().to_path_buf();
                (relative, fs::read(entry.path()).unwrap())
            })
            .collect()
    }

    #[test_case("src/routes/lobby", "lobby"; "top level")]
    #[test_case("src/routes/admin/users", "admin_users"; "nested")]
    #[test_case("pages/extra", "pages_extra"; "outside routes")]
    #[test]
    fn backup_names(route: &str, expect: &str) {
        pretty_assertions::assert_eq!(backup_name(route), expect);
    }

    #[test]
    fn hide_moves_routes_into_backup() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        let mut manager = RouteManager::new(&paths, ["src/routes/lobby"]);

        assert_eq!(manager.hide(), vec!["src/routes/lobby".to_owned()]);
        assert!(!root.path().join("app/src/routes/lobby").exists());
        assert!(root.path().join(".route-backups/lobby/+page.svelte").exists());
        assert_eq!(manager.ledger().state("src/routes/lobby"), RouteState::Hidden);

        Ok(())
    }

    #[test]
    fn hide_twice_is_idempotent() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        let mut manager = RouteManager::new(&paths, ["src/routes/lobby"]);
        manager.hide();
        let before = snapshot(root.path());

        assert_eq!(manager.hide(), Vec::<String>::new());
        assert_eq!(snapshot(root.path()), before);

        Ok(())
    }

    #[test]
    fn restore_of_never_hidden_route_is_noop() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        let before = snapshot(root.path());
        let mut manager = RouteManager::new(&paths, ["src/routes/payment", "src/routes/checkout"]);

        assert_eq!(manager.restore(), Vec::<String>::new());
        assert_eq!(snapshot(root.path()), before);
        assert!(!root.path().join(".route-backups").exists());

        Ok(())
    }

    #[test]
    fn hide_restore_round_trip_is_lossless() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        let before = snapshot(root.path());

        let mut manager = RouteManager::new(&paths, ["src/routes/lobby", "src/routes/payment"]);
        manager.hide();
        assert_ne!(snapshot(root.path()), before);

        // INVARIANT: A fresh manager sees hidden routes, like a separate process would.
        let mut manager = RouteManager::new(&paths, ["src/routes/lobby", "src/routes/payment"]);
        assert_eq!(
            manager.restore(),
            vec!["src/routes/lobby".to_owned(), "src/routes/payment".to_owned()]
        );
        assert_eq!(snapshot(root.path()), before);
        assert!(!root.path().join(".route-backups").exists());

        Ok(())
    }

    #[test]
    fn conflicted_routes_are_left_alone() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        fs::create_dir_all(root.path().join(".route-backups/lobby"))?;
        let mut manager = RouteManager::new(&paths, ["src/routes/lobby"]);

        assert_eq!(
            manager.ledger().state("src/routes/lobby"),
            RouteState::Conflicted
        );
        assert!(manager.hide().is_empty());
        assert!(manager.restore().is_empty());
        assert!(root.path().join("app/src/routes/lobby/+page.svelte").exists());

        Ok(())
    }

    #[test]
    fn stub_served_for_disabled_pages_only() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        let manager = RouteManager::new(&paths, ["src/routes/payment"]);
        let page = root.path().join("app/src/routes/payment/+page.svelte");

        assert_eq!(
            manager.stub_for(&page.to_string_lossy()),
            Some(NOT_FOUND_PAGE)
        );
        assert_eq!(
            manager.stub_for(&root.path().join("app/src/routes/payment/+page.ts").to_string_lossy()),
            None
        );
        assert_eq!(
            manager.stub_for(&root.path().join("app/src/routes/lobby/+page.svelte").to_string_lossy()),
            None
        );

        Ok(())
    }

    #[test]
    fn plugin_hides_on_construction_and_restores_after_write() -> anyhow::Result<()> {
        let (root, paths) = project()?;
        let mut config = ClientConfig::default_for(paths.client());
        config.plugins = PluginToggles::from_iter([("lobby", false)]);

        let mut plugin = RouteManagerPlugin::new(&paths, &config).expect("routes to manage");
        assert!(!root.path().join("app/src/routes/lobby").exists());

        plugin.build_start();
        assert!(!root.path().join("app/src/routes/lobby").exists());

        plugin.write_bundle();
        assert!(root.path().join("app/src/routes/lobby/rooms/+page.ts").exists());
        assert!(!root.path().join(".route-backups").exists());

        Ok(())
    }

    #[test]
    fn plugin_is_skipped_without_disabled_routes() -> anyhow::Result<()> {
        let (_root, paths) = project()?;
        let config = ClientConfig::default_for(paths.client());
        assert!(RouteManagerPlugin::new(&paths, &config).is_none());

        let paths = PathConfig::new(paths.project_root(), &Layout::default(), None);
        let mut config = ClientConfig::default_for(None);
        config.plugins = PluginToggles::from_iter([("lobby", false)]);
        assert!(RouteManagerPlugin::new(&paths, &config).is_none());

        Ok(())
    }
}
