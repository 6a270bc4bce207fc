// Copyright 2026 Chartwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chartwatch runtime library — incremental collection & reconciliation
//! engine for browser-driven chart rankings and news-volume counts.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(
    dead_code,
    unused_imports,
    clippy::new_without_default,
    clippy::should_implement_trait
)]

pub mod browser;
pub mod cli;
pub mod extract;
pub mod feed;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod record;
pub mod resolver;
pub mod store;
