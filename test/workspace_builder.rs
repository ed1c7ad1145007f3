// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{command, ProjectFixture};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn build_materializes_client_workspace() -> Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write("clients/client-a/plugin/lobby/Lobby.svelte", "<h1>A</h1>")?;
    let before = fixture.snapshot()?;

    command("workspace-builder", &fixture)?
        .arg("build")
        .env("CLIENT", "client-a")
        .assert()
        .success();

    let app = fixture.join(".temp/app");
    assert!(app.join("src/routes/lobby/+page.svelte").exists());
    assert!(!app.join("src/routes/payment").exists());
    assert!(!app.join("src/routes/checkout").exists());
    assert_eq!(
        fs::read_to_string(app.join("src/plugin/lobby/Lobby.svelte"))?,
        "<h1>A</h1>"
    );
    assert_eq!(fs::read_to_string(app.join(".env"))?, "MODE=dev\n");
    assert!(fs::read_to_string(app.join("package.json"))?.contains("\"dev\": \"vite dev\""));
    assert!(!fixture.join(".temp/clients").exists());

    // Project files stay as they were, only the workspace is new.
    let mut after = fixture.snapshot()?;
    after.retain(|path, _| !path.starts_with(".temp"));
    assert_eq!(after, before);

    Ok(())
}

#[test]
fn clean_removes_workspace_unless_kept() -> Result<()> {
    let fixture = ProjectFixture::new()?;

    command("workspace-builder", &fixture)?
        .arg("build")
        .assert()
        .success();
    assert!(fixture.join(".temp/app/src/routes/payment").exists());

    command("workspace-builder", &fixture)?
        .args(["clean", "--keep"])
        .assert()
        .success();
    assert!(fixture.join(".temp").exists());

    command("workspace-builder", &fixture)?
        .arg("clean")
        .assert()
        .success();
    assert!(!fixture.join(".temp").exists());

    Ok(())
}

#[test]
fn missing_command_fails() -> Result<()> {
    let fixture = ProjectFixture::new()?;
    command("workspace-builder", &fixture)?.assert().failure();
    Ok(())
}
