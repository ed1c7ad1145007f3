// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Route visibility ledger.
//!
//! Keeps track of whether each managed route currently lives in the
//! application tree or in the backup directory. Hiding and restoring usually
//! happen in different processes, e.g., `route-manager hide` followed later
//! by `route-manager restore`, so the ledger is always observed from disk
//! before it is acted upon. Within a process it is updated after every
//! successful transition.

use std::{collections::BTreeMap, path::Path};

/// Visibility state of a single route.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// Route directory is in the application tree.
    Live,

    /// Route directory sits in the backup directory.
    Hidden,

    /// Route directory exists nowhere. The route was never created.
    #[default]
    Absent,

    /// Route directory exists both live and in the backup directory.
    ///
    /// Neither hiding nor restoring touches a conflicted route, since either
    /// would overwrite one of the two copies.
    Conflicted,
}

impl RouteState {
    /// Determine state from what exists on disk.
    pub fn observe(live: &Path, backup: &Path) -> Self {
        match (live.exists(), backup.exists()) {
            (true, false) => Self::Live,
            (false, true) => Self::Hidden,
            (false, false) => Self::Absent,
            (true, true) => Self::Conflicted,
        }
    }
}

/// Visibility state of every managed route.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteLedger {
    states: BTreeMap<String, RouteState>,
}

impl RouteLedger {
    /// Construct empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record state of a route.
    pub fn record(&mut self, route: impl Into<String>, state: RouteState) {
        self.states.insert(route.into(), state);
    }

    /// Current state of a route. Unknown routes are absent.
    pub fn state(&self, route: &str) -> RouteState {
        self.states.get(route).copied().unwrap_or_default()
    }

    /// Routes currently in a given state.
    pub fn routes_in(&self, state: RouteState) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(move |(_, current)| **current == state)
            .map(|(route, _)| route.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn observe_reflects_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let live = dir.path().join("live");
        let backup = dir.path().join("backup");

        assert_eq!(RouteState::observe(&live, &backup), RouteState::Absent);
        fs::create_dir(&live)?;
        assert_eq!(RouteState::observe(&live, &backup), RouteState::Live);
        fs::create_dir(&backup)?;
        assert_eq!(RouteState::observe(&live, &backup), RouteState::Conflicted);
        fs::remove_dir(&live)?;
        assert_eq!(RouteState::observe(&live, &backup), RouteState::Hidden);

        Ok(())
    }

    #[test]
    fn ledger_filters_by_state() {
        let mut ledger = RouteLedger::new();
        ledger.record("src/routes/lobby", RouteState::Hidden);
        ledger.record("src/routes/payment", RouteState::Live);
        ledger.record("src/routes/checkout", RouteState::Hidden);

        let hidden: Vec<_> = ledger.routes_in(RouteState::Hidden).collect();
        assert_eq!(hidden, vec!["src/routes/checkout", "src/routes/lobby"]);
        assert_eq!(ledger.state("src/routes/reports"), RouteState::Absent);
    }
}
