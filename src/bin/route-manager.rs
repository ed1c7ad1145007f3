// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use tenantkit::{path::discover_session, ClientConfig, ClientId, RouteManager};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "route-manager [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Client whose disabled routes should be managed.
    #[arg(long, env = "CLIENT", global = true, value_name = "client")]
    pub client: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let Some(client) = ClientId::from_env_value(self.client.as_deref())? else {
            info!("no client specified, nothing to manage");
            return Ok(());
        };

        let (_, paths) = discover_session(Some(client))?;
        let config = ClientConfig::load(&paths);
        let mut manager = RouteManager::for_client(&paths, &config);
        if manager.is_empty() {
            info!("client {} has no disabled routes", config.client_id);
            return Ok(());
        }

        match self.command {
            Command::Hide => {
                let moved = manager.hide();
                info!("hid {} route(s) for client {}", moved.len(), config.client_id);
            }
            Command::Restore => {
                let moved = manager.restore();
                info!(
                    "restored {} route(s) for client {}",
                    moved.len(),
                    config.client_id
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Move routes of disabled plugins into the backup directory.
    Hide,

    /// Move hidden routes back into the application tree.
    Restore,
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
