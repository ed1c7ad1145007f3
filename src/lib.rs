// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Multi-tenant build configuration for a single web application.
//!
//! One code base serves many __clients__. Each client can switch feature
//! __plugins__ off, and can shadow files of the shared code base with its
//! own versions. This crate turns a client's descriptor into a build of the
//! application that only contains what that client should get.
//!
//! # Strategies
//!
//! Two strategies are provided:
//!
//! 1. __In place__: a [`PluginPipeline`](hooks::PluginPipeline) hooks into a
//!    bundler session. Routes of disabled plugins are hidden by moving them
//!    into a backup directory for the length of the session, imports are
//!    redirected to client overrides, and plugin toggles are injected as
//!    build-time constants.
//! 2. __Overlay__: a [`WorkspaceBuilder`](overlay::WorkspaceBuilder) copies
//!    the project into a scratch workspace, layers client overrides on top of
//!    it, and deletes disabled routes from the copy. The project tree is
//!    never touched.
//!
//! Both strategies are also available from the command line through the
//! `route-manager` and `workspace-builder` binaries.

pub mod config;
pub mod env;
pub mod hooks;
pub mod overlay;
pub mod path;
pub mod registry;
pub mod resolve;
pub mod routes;
pub mod toggle;

pub use config::{ClientConfig, ClientId, PluginToggles, ProjectSettings};
pub use hooks::{BundlerPlugin, ConfigPatch, PluginPipeline};
pub use overlay::WorkspaceBuilder;
pub use path::PathConfig;
pub use resolve::{ClientPathResolver, ModuleRequest};
pub use routes::{RouteManager, RouteManagerPlugin};
