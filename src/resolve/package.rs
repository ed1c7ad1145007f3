// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shared package re-export modules.
//!
//! A shared package such as `@shared/ui` lives at `modules/shared/ui`, and
//! exposes its public surface through re-export statements in its entry
//! file. Clients override parts of that surface without forking the whole
//! package: loading a [`PackageRequest`] produces a module that re-exports
//! every statement of the package, pointing each one at a client override
//! when one exists.
//!
//! # Export Manifest
//!
//! The public surface of a package is described by an __export manifest__.
//! Packages may ship one explicitly as `exports.toml`:
//!
//! ```toml
//! version = 1
//!
//! [[export]]
//! from = "./src/Button.svelte"
//! names = ["default as Button"]
//!
//! [[export]]
//! from = "./src/stores"
//! ```
//!
//! An `[[export]]` without names re-exports everything, and one with a
//! `namespace` re-exports everything under that name. Paths are relative to
//! the package directory.
//!
//! Packages without a manifest get one derived by lexical scanning of their
//! entry file, which recognizes `export { ... } from '...'` and
//! `export * [as ns] from '...'` statements. Paths are then relative to the
//! entry file. Bindings the entry declares itself are kept by re-exporting
//! the entry as well, after the scanned statements, since explicit
//! re-exports shadow star re-exports.
//!
//! # Override Lookup
//!
//! A client replaces a package wholesale by providing
//! `clients/<id>/src/lib/<scope>/<name>/index.{ts,js}`. Otherwise each
//! export statement is checked on its own against the same relative location
//! under `clients/<id>/src/lib/<scope>/<name>`, trying the suffixes in
//! [`OVERRIDE_SUFFIXES`] in order.

use crate::{
    path::{normalize_lexically, to_slash},
    resolve::PackageRequest,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};
use tracing::{debug, info, instrument, warn};

/// File name of an explicit export manifest.
pub const MANIFEST_FILE: &str = "exports.toml";

/// Export manifest version this crate understands.
pub const MANIFEST_VERSION: u32 = 1;

/// Package entry files, in lookup order.
pub const ENTRY_CANDIDATES: &[&str] = &[
    "src/index.ts",
    "src/index.js",
    "src/lib/index.ts",
    "index.ts",
    "index.js",
];

/// Suffixes tried when looking for a per-export override, in order.
pub const OVERRIDE_SUFFIXES: &[&str] = &["", ".ts", ".js", ".svelte", "/index.ts", "/index.js"];

const INDEX_SUFFIXES: &[&str] = &[".ts", ".js"];

static EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bexport\b\s*(?:\{(?P<names>[^}]*)\}|\*\s*(?:as\s+(?P<ns>[A-Za-z_$][\w$]*)\s*)?)\s*from\s*['"](?P<from>[^'"]+)['"]"#,
    )
    .expect("export pattern is valid")
});

static EXPORT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexport\b").expect("export keyword pattern is valid"));

static EXPORT_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bexport\s+default\b").expect("default export pattern is valid")
});

/// Where the export surface of a package was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOrigin {
    /// Explicit `exports.toml`.
    Manifest,

    /// Lexical scan of the entry file.
    Scanned {
        /// Entry exports bindings beyond its re-export statements.
        local_exports: bool,

        /// Entry has a default export of its own.
        local_default: bool,
    },
}

impl ExportOrigin {
    /// Classify the local exports of a scanned entry file.
    pub fn scanned(source: &str) -> Self {
        let reexports = EXPORT_FROM.find_iter(source).count();
        Self::Scanned {
            local_exports: EXPORT_KEYWORD.find_iter(source).count() > reexports,
            local_default: EXPORT_DEFAULT.is_match(source),
        }
    }
}

/// Export surface of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageExports {
    /// Directory the manifest's paths are relative to.
    pub base_dir: PathBuf,

    pub manifest: ExportManifest,
    pub origin: ExportOrigin,
}

/// Public surface of a shared package.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ExportManifest {
    /// Manifest format version.
    pub version: u32,

    /// Re-export statements, in source order.
    #[serde(default, rename = "export")]
    pub exports: Vec<ExportStatement>,
}

impl ExportManifest {
    /// Derive manifest from the re-export statements of a source file.
    pub fn scan(source: &str) -> Self {
        let exports = EXPORT_FROM
            .captures_iter(source)
            .filter_map(|caps| {
                let from = caps.name("from")?.as_str().to_owned();
                let names = caps
                    .name("names")
                    .map(|names| {
                        names
                            .as_str()
                            .split(',')
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(str::to_owned)
                            .collect()
                    })
                    .unwrap_or_default();
                let namespace = caps.name("ns").map(|ns| ns.as_str().to_owned());

                Some(ExportStatement {
                    from,
                    names,
                    namespace,
                })
            })
            .collect();

        Self {
            version: MANIFEST_VERSION,
            exports,
        }
    }
}

impl FromStr for ExportManifest {
    type Err = PackageError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let manifest: ExportManifest = toml::from_str(data)?;

        // INVARIANT: Refuse manifests written for a format we do not know.
        if manifest.version != MANIFEST_VERSION {
            return Err(PackageError::UnsupportedVersion(manifest.version));
        }

        Ok(manifest)
    }
}

/// Single re-export statement.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ExportStatement {
    /// Module specifier the statement re-exports from.
    pub from: String,

    /// Exported bindings, e.g., `Button` or `default as Button`. Empty means
    /// every binding.
    #[serde(default)]
    pub names: Vec<String>,

    /// Namespace name for `export * as <ns>` statements.
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ExportStatement {
    /// Render statement as source text re-exporting from `target`.
    pub fn render(&self, target: &str) -> String {
        let target = quote(target);
        match (&self.namespace, self.names.is_empty()) {
            (Some(ns), _) => format!("export * as {ns} from {target};"),
            (None, true) => format!("export * from {target};"),
            (None, false) => format!("export {{ {} }} from {target};", self.names.join(", ")),
        }
    }
}

/// Produce re-export module of a shared package for a client.
///
/// Returns `None` when the package has no entry file. Failures to read the
/// package's export surface degrade to re-exporting the untouched entry
/// file.
#[instrument(skip(modules_root, client_src), level = "debug")]
pub fn load_package(
    modules_root: &Path,
    client_src: &Path,
    request: &PackageRequest,
) -> Option<String> {
    let package_dir = modules_root.join(&request.scope).join(&request.name);
    let client_dir = client_src
        .join("lib")
        .join(&request.scope)
        .join(&request.name);

    if let Some(index) = find_with_suffixes(&client_dir.join("index"), INDEX_SUFFIXES) {
        info!(
            "client {} replaces @{}/{} entirely",
            request.client, request.scope, request.name
        );
        return Some(render_module([ExportStatement::default().render(&to_slash(&index))]));
    }

    let Some(entry) = locate_entry(&package_dir) else {
        warn!(
            "package @{}/{} has no entry file under {:?}",
            request.scope,
            request.name,
            package_dir.display()
        );
        return None;
    };

    let exports = match read_exports(&package_dir, &entry) {
        Ok(exports) => exports,
        Err(err) => {
            warn!(
                "cannot read exports of @{}/{}, using package as is: {err}",
                request.scope, request.name
            );
            return Some(render_module([ExportStatement::default().render(&to_slash(&entry))]));
        }
    };

    let mut lines: Vec<String> = exports
        .manifest
        .exports
        .iter()
        .map(|statement| {
            let target =
                export_target(&exports.base_dir, &package_dir, &client_dir, &statement.from);
            statement.render(&target)
        })
        .collect();

    if let ExportOrigin::Scanned {
        local_exports,
        local_default,
    } = exports.origin
    {
        let entry = to_slash(&entry);
        if local_exports {
            lines.push(ExportStatement::default().render(&entry));
        }
        if local_default {
            let default = ExportStatement {
                names: vec!["default".into()],
                ..ExportStatement::default()
            };
            lines.push(default.render(&entry));
        }
    }

    Some(render_module(lines))
}

/// Locate the entry file of a package.
pub fn locate_entry(package_dir: &Path) -> Option<PathBuf> {
    ENTRY_CANDIDATES
        .iter()
        .map(|candidate| package_dir.join(candidate))
        .find(|path| path.is_file())
}

/// Read the export surface of a package.
///
/// # Errors
///
/// - Return [`PackageError::Read`] if the manifest or entry cannot be read.
/// - Return [`PackageError::Manifest`] if the manifest is not valid TOML.
/// - Return [`PackageError::UnsupportedVersion`] for unknown manifest
///   versions.
pub fn read_exports(package_dir: &Path, entry: &Path) -> Result<PackageExports> {
    let manifest_path = package_dir.join(MANIFEST_FILE);
    if manifest_path.is_file() {
        debug!("using export manifest {:?}", manifest_path.display());
        let manifest: ExportManifest = read(&manifest_path)?.parse()?;
        return Ok(PackageExports {
            base_dir: package_dir.to_path_buf(),
            manifest,
            origin: ExportOrigin::Manifest,
        });
    }

    let source = read(entry)?;
    Ok(PackageExports {
        base_dir: entry.parent().unwrap_or(package_dir).to_path_buf(),
        manifest: ExportManifest::scan(&source),
        origin: ExportOrigin::scanned(&source),
    })
}

fn export_target(base_dir: &Path, package_dir: &Path, client_dir: &Path, from: &str) -> String {
    // INVARIANT: Bare specifiers point into other packages, never overridden.
    if !from.starts_with('.') {
        return from.to_owned();
    }

    let original = normalize_lexically(&base_dir.join(from));
    let overridden = original
        .strip_prefix(package_dir)
        .ok()
        .and_then(|relative| find_with_suffixes(&client_dir.join(relative), OVERRIDE_SUFFIXES));

    match overridden {
        Some(path) => {
            debug!("override export {from} with {:?}", path.display());
            to_slash(&path)
        }
        None => to_slash(&original),
    }
}

fn find_with_suffixes(base: &Path, suffixes: &[&str]) -> Option<PathBuf> {
    suffixes.iter().find_map(|suffix| {
        let mut candidate = OsString::from(base.as_os_str());
        candidate.push(suffix);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

fn render_module(lines: impl IntoIterator<Item = String>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }

    out
}

fn quote(specifier: &str) -> String {
    serde_json::Value::String(specifier.to_owned()).to_string()
}

fn read(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|source| PackageError::Read {
        source,
        path: path.to_path_buf(),
    })
}

/// Package export error types.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Package file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Export manifest is not valid TOML.
    #[error(transparent)]
    Manifest(#[from] toml::de::Error),

    /// Export manifest uses an unknown format version.
    #[error("unsupported export manifest version {0}")]
    UnsupportedVersion(u32),
}

/// Friendly result alias :3
pub type Result<T, E = PackageError> = std::result::Result<T, E>;
