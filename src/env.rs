// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment file selection.
//!
//! Each deployment environment has its own `.env.<ENV>` file in the
//! application root. The bundler only reads `.env`, so the selected variant
//! is copied over it when a session starts.

use crate::{hooks::BundlerPlugin, path::PathConfig};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

/// Environment used when `ENV` is not set.
pub const DEFAULT_ENV: &str = "dev";

/// File name of an environment variant.
pub fn env_file_name(env: &str) -> String {
    format!(".env.{env}")
}

/// Outcome of selecting an environment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvCopy {
    /// Variant was copied over the target.
    Copied,

    /// Target already had the variant's content.
    Unchanged,

    /// Variant does not exist.
    Missing,

    /// Variant could not be copied.
    Failed,
}

/// Copy an environment variant onto a target file.
///
/// Skips the write when the target already holds the same content, so file
/// watchers do not see a spurious change.
pub fn copy_env_file(source: &Path, target: &Path) -> EnvCopy {
    if !source.is_file() {
        warn!("environment file not found: {:?}", source.display());
        return EnvCopy::Missing;
    }

    if let (Ok(wanted), Ok(current)) = (fs::read(source), fs::read(target)) {
        if wanted == current {
            debug!("{:?} already up to date", target.display());
            return EnvCopy::Unchanged;
        }
    }

    match fs::copy(source, target) {
        Ok(_) => {
            info!("copied {:?} to {:?}", source.display(), target.display());
            EnvCopy::Copied
        }
        Err(err) => {
            error!(
                "failed to copy environment file {:?}: {err}",
                source.display()
            );
            EnvCopy::Failed
        }
    }
}

/// Bundler plugin selecting the environment file once per session.
#[derive(Debug, Clone)]
pub struct EnvLoaderPlugin {
    app_root: PathBuf,
    env: Option<String>,
    initialized: bool,
}

impl EnvLoaderPlugin {
    /// Construct plugin for an environment. `None` leaves `.env` alone.
    pub fn new(paths: &PathConfig, env: Option<String>) -> Self {
        Self {
            app_root: paths.app_root().to_path_buf(),
            env,
            initialized: false,
        }
    }
}

impl BundlerPlugin for EnvLoaderPlugin {
    fn name(&self) -> &'static str {
        "env-loader"
    }

    fn config_resolved(&mut self) {
        // INVARIANT: Only run once, a rewritten .env restarts the dev server.
        if self.initialized {
            return;
        }
        self.initialized = true;

        let Some(env) = self.env.as_deref() else {
            return;
        };

        copy_env_file(
            &self.app_root.join(env_file_name(env)),
            &self.app_root.join(".env"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use pretty_assertions::assert_eq;

    #[test]
    fn copy_skips_identical_target() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join(".env.prod");
        let target = dir.path().join(".env");
        fs::write(&source, "API_URL=https://api.example.com\n")?;

        assert_eq!(copy_env_file(&source, &target), EnvCopy::Copied);
        assert_eq!(copy_env_file(&source, &target), EnvCopy::Unchanged);
        assert_eq!(
            copy_env_file(&dir.path().join(".env.qa"), &target),
            EnvCopy::Missing
        );
        assert_eq!(
            fs::read_to_string(&target)?,
            "API_URL=https://api.example.com\n"
        );

        Ok(())
    }

    #[test]
    fn plugin_runs_only_once() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let app = root.path().join("app");
        fs::create_dir_all(&app)?;
        fs::write(app.join(".env.staging"), "STAGE=1\n")?;
        let paths = PathConfig::new(root.path(), &Layout::default(), None);
        let mut plugin = EnvLoaderPlugin::new(&paths, Some("staging".into()));

        plugin.config_resolved();
        assert_eq!(fs::read_to_string(app.join(".env"))?, "STAGE=1\n");

        fs::write(app.join(".env.staging"), "STAGE=2\n")?;
        plugin.config_resolved();
        assert_eq!(fs::read_to_string(app.join(".env"))?, "STAGE=1\n");

        Ok(())
    }
}
