// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use tenantkit::{env::DEFAULT_ENV, path::discover_session, ClientId, WorkspaceBuilder};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::process::exit;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "workspace-builder [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Client to build workspace for. Default build if unset.
    #[arg(long, env = "CLIENT", global = true, value_name = "client")]
    pub client: Option<String>,

    /// Environment whose `.env.<env>` file is copied into the workspace.
    #[arg(long, env = "ENV", global = true, value_name = "env", default_value = DEFAULT_ENV)]
    pub env: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let client = ClientId::from_env_value(self.client.as_deref())?;
        let (settings, paths) = discover_session(client)?;
        let builder = WorkspaceBuilder::new(paths, settings.overlay);

        match self.command {
            Command::Build => {
                builder
                    .with_progress(ProgressBar::new_spinner())
                    .build(Some(self.env.as_str()))?;
            }
            Command::Clean(opts) => builder.clean(opts.keep)?,
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Materialize client workspace.
    Build,

    /// Remove client workspace.
    #[command(override_usage = "workspace-builder clean [options]")]
    Clean(CleanOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanOptions {
    /// Keep workspace around for debugging.
    #[arg(short, long)]
    pub keep: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}
