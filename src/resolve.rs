// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Client override resolution.
//!
//! Every client can shadow files of the shared code base by placing a file
//! at the same relative location inside its own source tree:
//!
//! | Shared file                  | Client override                         |
//! |------------------------------|-----------------------------------------|
//! | `modules/<rel>`              | `clients/<id>/src/lib/<rel>`            |
//! | `app/src/<rel>`              | `clients/<id>/src/<rel>`                |
//! | `@<scope>/<name>` re-exports | `clients/<id>/src/lib/<scope>/<name>/…` |
//!
//! The bundler asks [`ClientPathResolver::resolve_id`] about every import it
//! encounters, and [`ClientPathResolver::load`] about every module it is
//! about to read. Both re-check the file system on each call. Nothing is
//! cached, since inputs are static for a build session.
//!
//! # Package Modules
//!
//! Imports of shared packages such as `@shared/ui` resolve to a
//! [`ModuleRequest::Package`] instead of a file. Loading that request
//! produces a re-export module whose exports point at client overrides
//! where they exist, and at the shared package otherwise. See [`package`].
//!
//! # Style Sheets
//!
//! Style sheet overrides of shared modules do not replace the shared style
//! sheet. The override is appended to it instead. See [`style`].

pub mod package;
pub mod style;

use crate::{
    config::ClientId,
    hooks::BundlerPlugin,
    path::{normalize_lexically, PathConfig},
};

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Scopes of shared package identifiers, e.g., `@shared/ui`.
pub const PACKAGE_SCOPES: &[&str] = &["shared", "core", "plugin"];

/// Module the bundler should load.
///
/// Takes the place of string-encoded virtual module identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleRequest {
    /// Plain file on disk.
    File(PathBuf),

    /// Synthetic re-export module of a shared package for a client.
    Package(PackageRequest),
}

impl ModuleRequest {
    /// Interpret a module identifier handed out by the bundler.
    ///
    /// Query strings such as `?inline` are dropped.
    pub fn from_id(id: &str) -> Self {
        let clean = id.split_once('?').map_or(id, |(path, _)| path);
        Self::File(PathBuf::from(clean))
    }
}

/// Shared package requested on behalf of a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    pub scope: String,
    pub name: String,
    pub client: ClientId,
}

/// Redirect imports to client overrides.
#[derive(Debug, Clone)]
pub struct ClientPathResolver {
    paths: PathConfig,
    client: ClientId,
    client_src: PathBuf,
}

impl ClientPathResolver {
    /// Construct new resolver for the session's client.
    ///
    /// Returns `None` for the default build, which has nothing to override.
    pub fn new(paths: PathConfig) -> Option<Self> {
        let client = paths.client()?.clone();
        let client_src = paths.client_src()?;
        Some(Self {
            paths,
            client,
            client_src,
        })
    }

    /// Decide where an import should resolve to.
    ///
    /// Returns `None` to let the bundler's default resolution handle the
    /// identifier unchanged.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve_id(&self, id: &str, importer: Option<&Path>) -> Option<ModuleRequest> {
        let importer = importer?;
        if should_skip_resolution(id) {
            return None;
        }

        if let Some((scope, name)) = parse_package_id(id) {
            debug!("redirect package {id} for client {}", self.client);
            return Some(ModuleRequest::Package(PackageRequest {
                scope: scope.to_owned(),
                name: name.to_owned(),
                client: self.client.clone(),
            }));
        }

        let base = importer.parent().unwrap_or(importer);
        let resolved = normalize_lexically(&base.join(id));

        match self.classify(&resolved) {
            ImportTarget::Module(relative) => {
                // INVARIANT: Shared module imports always resolve here, so the
                // bundler never resolves the same identifier twice.
                let target = self
                    .module_override(&relative)
                    .unwrap_or_else(|| resolved.clone());
                Some(ModuleRequest::File(target))
            }
            ImportTarget::App(relative) => self.app_override(&relative).map(ModuleRequest::File),
            ImportTarget::Outside => None,
        }
    }

    /// Produce module content for requests that need it.
    ///
    /// Returns `None` to let the bundler read the module itself.
    pub fn load(&self, request: &ModuleRequest) -> Option<String> {
        match request {
            ModuleRequest::Package(package) => package::load_package(
                self.paths.modules_root(),
                &self.client_src,
                package,
            ),
            ModuleRequest::File(path) => {
                let relative = path.strip_prefix(self.paths.modules_root()).ok()?;
                if !style::is_style_sheet(path) {
                    return None;
                }

                let override_path = self.module_override(relative)?;
                style::merge_style_sheets(path, &override_path)
            }
        }
    }

    /// Client override of a path relative to the shared modules root.
    pub fn module_override(&self, relative: &Path) -> Option<PathBuf> {
        let candidate = self.client_src.join("lib").join(relative);
        candidate.exists().then_some(candidate)
    }

    /// Client override of a path relative to the application source root.
    pub fn app_override(&self, relative: &Path) -> Option<PathBuf> {
        let candidate = self.client_src.join(relative);
        candidate.exists().then_some(candidate)
    }

    fn classify(&self, resolved: &Path) -> ImportTarget {
        if let Ok(relative) = resolved.strip_prefix(self.paths.modules_root()) {
            return ImportTarget::Module(relative.to_path_buf());
        }

        match resolved.strip_prefix(self.paths.app_src()) {
            Ok(relative) => ImportTarget::App(relative.to_path_buf()),
            Err(_) => ImportTarget::Outside,
        }
    }
}

impl BundlerPlugin for ClientPathResolver {
    fn name(&self) -> &'static str {
        "client-path-resolver"
    }

    fn resolve_id(&self, id: &str, importer: Option<&Path>) -> Option<ModuleRequest> {
        ClientPathResolver::resolve_id(self, id, importer)
    }

    fn load(&self, request: &ModuleRequest) -> Option<String> {
        ClientPathResolver::load(self, request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ImportTarget {
    Module(PathBuf),
    App(PathBuf),
    Outside,
}

/// Identifiers the resolver never touches.
///
/// Absolute paths, virtual and internal identifiers, anything inside a
/// dependency package directory, and bare specifiers other than shared
/// package identifiers, e.g., `svelte/store` or `$lib/util`.
pub fn should_skip_resolution(id: &str) -> bool {
    id.starts_with("virtual:")
        || id.starts_with('\0')
        || Path::new(id).is_absolute()
        || id.contains("node_modules")
        || (!is_relative_specifier(id) && parse_package_id(id).is_none())
}

/// Check if identifier is relative to its importer.
pub fn is_relative_specifier(id: &str) -> bool {
    id == "." || id == ".." || id.starts_with("./") || id.starts_with("../")
}

/// Split a shared package identifier into its scope and name.
///
/// Only bare package identifiers qualify. Deep imports such as
/// `@shared/ui/button` are left to default resolution.
pub fn parse_package_id(id: &str) -> Option<(&str, &str)> {
    let (scope, name) = id.strip_prefix('@')?.split_once('/')?;
    let valid = PACKAGE_SCOPES.contains(&scope) && !name.is_empty() && !name.contains('/');
    valid.then_some((scope, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        resolver: ClientPathResolver,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let root = tempfile::tempdir()?;
            let paths = PathConfig::new(
                root.path(),
                &Layout::default(),
                Some(ClientId::new("client-a")?),
            );
            let resolver = ClientPathResolver::new(paths).expect("client resolver");
            Ok(Self { root, resolver })
        }

        fn path(&self, relative: &str) -> PathBuf {
            self.root.path().join(relative)
        }

        fn write(&self, relative: &str, contents: &str) -> anyhow::Result<PathBuf> {
            let path = self.path(relative);
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(&path, contents)?;
            Ok(path)
        }
    }

    #[test_case("virtual:client-plugins"; "virtual module")]
    #[test_case("\0commonjs-helper"; "internal")]
    #[test_case("/abs/path.ts"; "absolute")]
    #[test_case("../node_modules/svelte/index.js"; "dependency")]
    #[test_case("svelte/store"; "bare dependency")]
    #[test_case("@sveltejs/kit"; "foreign scope")]
    #[test_case("@shared/ui/button"; "deep package import")]
    #[test_case("$lib/x"; "alias")]
    #[test]
    fn skipped_identifiers(id: &str) {
        assert!(should_skip_resolution(id));
    }

    #[test_case("./Button.svelte"; "sibling")]
    #[test_case("../lib/Header.svelte"; "parent")]
    #[test_case("@shared/ui"; "shared package")]
    #[test]
    fn resolvable_identifiers(id: &str) {
        assert!(!should_skip_resolution(id));
    }

    #[test_case("@shared/ui", Some(("shared", "ui")); "shared")]
    #[test_case("@plugin/lobby", Some(("plugin", "lobby")); "plugin")]
    #[test_case("@shared/ui/button", None; "deep import")]
    #[test_case("@sveltejs/kit", None; "foreign scope")]
    #[test_case("./ui", None; "relative")]
    #[test]
    fn package_identifiers(id: &str, expect: Option<(&str, &str)>) {
        pretty_assertions::assert_eq!(parse_package_id(id), expect);
    }

    #[test]
    fn default_build_has_no_resolver() {
        let paths = PathConfig::new("/work/site", &Layout::default(), None);
        assert!(ClientPathResolver::new(paths).is_none());
    }

    #[test]
    fn entry_points_are_not_resolved() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        assert_eq!(fixture.resolver.resolve_id("./main.ts", None), None);
        Ok(())
    }

    #[test]
    fn shared_module_without_override_passes_through() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let importer = fixture.write("modules/shared/ui/src/index.ts", "")?;
        fixture.write("modules/shared/ui/src/Button.svelte", "<button/>")?;

        let result = fixture
            .resolver
            .resolve_id("./Button.svelte", Some(importer.as_path()));
        let expect = ModuleRequest::File(fixture.path("modules/shared/ui/src/Button.svelte"));
        assert_eq!(result, Some(expect));

        Ok(())
    }

    #[test]
    fn bare_specifiers_from_shared_module_are_declined() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let importer = fixture.write("modules/shared/ui/src/index.ts", "")?;

        for id in ["svelte/store", "@sveltejs/kit", "$lib/util"] {
            let result = fixture.resolver.resolve_id(id, Some(importer.as_path()));
            assert_eq!(result, None, "{id} should be left to default resolution");
        }

        Ok(())
    }

    #[test]
    fn shared_module_with_override_resolves_to_client() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let importer = fixture.write("modules/shared/ui/src/index.ts", "")?;
        fixture.write("modules/shared/ui/src/Button.svelte", "<button/>")?;
        let override_path = fixture.write(
            "clients/client-a/src/lib/shared/ui/src/Button.svelte",
            "<button class=\"acme\"/>",
        )?;

        let result = fixture
            .resolver
            .resolve_id("./Button.svelte", Some(importer.as_path()));
        assert_eq!(result, Some(ModuleRequest::File(override_path)));

        Ok(())
    }

    #[test]
    fn app_import_resolves_only_with_override() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let importer = fixture.write("app/src/routes/+page.svelte", "")?;
        fixture.write("app/src/lib/Header.svelte", "<header/>")?;

        let result = fixture
            .resolver
            .resolve_id("../lib/Header.svelte", Some(importer.as_path()));
        assert_eq!(result, None);

        let override_path =
            fixture.write("clients/client-a/src/lib/Header.svelte", "<header/>")?;
        let result = fixture
            .resolver
            .resolve_id("../lib/Header.svelte", Some(importer.as_path()));
        assert_eq!(result, Some(ModuleRequest::File(override_path)));

        Ok(())
    }

    #[test]
    fn imports_outside_known_trees_are_declined() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let importer = fixture.write("tools/gen.ts", "")?;
        assert_eq!(
            fixture.resolver.resolve_id("./util.ts", Some(importer.as_path())),
            None
        );
        Ok(())
    }

    #[test]
    fn package_identifiers_become_package_requests() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let importer = fixture.write("app/src/routes/+page.svelte", "")?;

        let result = fixture.resolver.resolve_id("@shared/ui", Some(importer.as_path()));
        let expect = ModuleRequest::Package(PackageRequest {
            scope: "shared".into(),
            name: "ui".into(),
            client: ClientId::new("client-a")?,
        });
        assert_eq!(result, Some(expect));

        Ok(())
    }

    #[test]
    fn style_sheet_override_is_appended() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let base = fixture.write("modules/shared/ui/theme.css", ".btn { color: black; }")?;
        fixture.write(
            "clients/client-a/src/lib/shared/ui/theme.css",
            ".btn { color: red; }",
        )?;

        let result = fixture.resolver.load(&ModuleRequest::File(base));
        assert_eq!(
            result.as_deref(),
            Some(".btn { color: black; }\n.btn { color: red; }")
        );

        Ok(())
    }

    #[test]
    fn style_sheet_without_override_is_left_alone() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let base = fixture.write("modules/shared/ui/theme.css", ".btn {}")?;
        assert_eq!(fixture.resolver.load(&ModuleRequest::File(base)), None);
        Ok(())
    }

    #[test]
    fn module_ids_drop_query_strings() {
        assert_eq!(
            ModuleRequest::from_id("/site/modules/ui/theme.css?inline"),
            ModuleRequest::File(PathBuf::from("/site/modules/ui/theme.css"))
        );
    }
}
