// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{command, ProjectFixture};

use anyhow::Result;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn hide_without_client_changes_nothing() -> Result<()> {
    let fixture = ProjectFixture::new()?;
    let before = fixture.snapshot()?;

    command("route-manager", &fixture)?.arg("hide").assert().success();

    assert_eq!(fixture.snapshot()?, before);
    assert!(!fixture.join(".route-backups").exists());
    Ok(())
}

#[test]
fn default_client_changes_nothing() -> Result<()> {
    let fixture = ProjectFixture::new()?;
    let before = fixture.snapshot()?;

    command("route-manager", &fixture)?
        .arg("hide")
        .env("CLIENT", "app")
        .assert()
        .success();

    assert_eq!(fixture.snapshot()?, before);
    Ok(())
}

#[test]
fn hide_then_restore_round_trips() -> Result<()> {
    let fixture = ProjectFixture::new()?;
    let before = fixture.snapshot()?;

    command("route-manager", &fixture)?
        .arg("hide")
        .env("CLIENT", "client-a")
        .assert()
        .success();
    assert!(!fixture.join("app/src/routes/payment").exists());
    assert!(!fixture.join("app/src/routes/checkout").exists());
    assert!(fixture.join("app/src/routes/lobby/+page.svelte").exists());
    assert!(fixture.join(".route-backups/payment/+page.svelte").exists());
    assert!(fixture.join(".route-backups/checkout/+page.svelte").exists());

    command("route-manager", &fixture)?
        .arg("restore")
        .env("CLIENT", "client-a")
        .assert()
        .success();
    assert_eq!(fixture.snapshot()?, before);
    assert!(!fixture.join(".route-backups").exists());

    Ok(())
}

#[test]
fn restore_without_hide_is_noop() -> Result<()> {
    let fixture = ProjectFixture::new()?;
    let before = fixture.snapshot()?;

    command("route-manager", &fixture)?
        .args(["restore", "--client", "client-a"])
        .assert()
        .success();

    assert_eq!(fixture.snapshot()?, before);
    Ok(())
}

#[test]
fn invalid_client_fails() -> Result<()> {
    let fixture = ProjectFixture::new()?;

    command("route-manager", &fixture)?
        .arg("hide")
        .env("CLIENT", "../escape")
        .assert()
        .failure()
        .code(1);

    Ok(())
}

#[test]
fn unknown_command_fails() -> Result<()> {
    let fixture = ProjectFixture::new()?;

    command("route-manager", &fixture)?
        .arg("shuffle")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
    command("route-manager", &fixture)?.assert().failure();

    Ok(())
}
