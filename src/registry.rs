// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Feature plugin registry.
//!
//! A __plugin__ is an optional feature area of the application, e.g., the
//! lobby or the payment flow. Each plugin owns one or more route
//! directories. The web framework discovers routes purely by directory
//! presence, so disabling a plugin means making its route directories
//! disappear from the tree the bundler sees.
//!
//! The registry is a fixed table. It is never mutated at runtime.

use crate::config::PluginToggles;

use glob::Pattern;

/// Every plugin known to the registry, in registry order.
pub const AVAILABLE_PLUGINS: &[&str] = &["lobby", "payment", "analytics"];

const PLUGIN_ROUTES: &[(&str, &[&str])] = &[
    ("lobby", &["src/routes/lobby"]),
    ("payment", &["src/routes/payment", "src/routes/checkout"]),
    ("analytics", &["src/routes/analytics", "src/routes/reports"]),
];

/// List route directories owned by a plugin.
///
/// Route paths are relative to the application root. Unknown plugins own
/// no routes.
pub fn routes_for(plugin: &str) -> &'static [&'static str] {
    PLUGIN_ROUTES
        .iter()
        .find(|(name, _)| *name == plugin)
        .map(|(_, routes)| *routes)
        .unwrap_or(&[])
}

/// Check if plugin name is known to the registry.
pub fn is_valid_plugin(name: &str) -> bool {
    AVAILABLE_PLUGINS.contains(&name)
}

/// List route directories of every disabled plugin.
///
/// Routes come out in registry order. Plugins outside the registry are
/// ignored.
pub fn disabled_routes(toggles: &PluginToggles) -> Vec<String> {
    AVAILABLE_PLUGINS
        .iter()
        .filter(|plugin| !toggles.is_enabled(plugin))
        .flat_map(|plugin| routes_for(plugin).iter())
        .map(|route| (*route).to_owned())
        .collect()
}

/// Check if an arbitrary path falls inside a disabled plugin's routes.
///
/// Matches anywhere in the path, so absolute module identifiers work as
/// well as relative route paths.
pub fn is_route_disabled(path: &str, toggles: &PluginToggles) -> bool {
    let path = path.replace('\\', "/");
    disabled_routes(toggles).iter().any(|route| {
        Pattern::new(&format!("*{}*", Pattern::escape(route)))
            .map(|pattern| pattern.matches(&path))
            .unwrap_or(false)
    })
}
