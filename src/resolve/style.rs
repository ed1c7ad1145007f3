// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Style sheet merging.
//!
//! A client style sheet override extends the shared style sheet rather than
//! replacing it. Later rules win in the cascade, so the override is appended
//! after the shared content.

use std::{fs::read_to_string, path::Path};
use tracing::{debug, warn};

/// Check if path names a style sheet.
pub fn is_style_sheet(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "css")
}

/// Concatenate shared style sheet and client override.
///
/// Returns `None`, after logging a warning, if either file cannot be read.
pub fn merge_style_sheets(base: &Path, override_path: &Path) -> Option<String> {
    let read = |path: &Path| {
        read_to_string(path)
            .map_err(|err| warn!("failed to read style sheet {:?}: {err}", path.display()))
            .ok()
    };

    let base_css = read(base)?;
    let override_css = read(override_path)?;
    debug!(
        "append {:?} to {:?}",
        override_path.display(),
        base.display()
    );

    Some(format!("{base_css}\n{override_css}"))
}
