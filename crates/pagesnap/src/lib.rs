// Copyright 2026 Pagesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pagesnap: single-page web snapshot archiver.
//!
//! Renders a page in headless Chromium, downloads the images, stylesheets,
//! scripts and fonts it references under content-hashed names, rewrites the
//! markup to point at the local copies, and captures desktop and mobile
//! screenshots. [`snapshot::Archiver`] is the entry point.

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod renderer;
pub mod snapshot;
pub mod types;

pub use config::SnapshotRequest;
pub use error::{FetchError, SnapshotError, SnapshotResult};
pub use snapshot::{Archiver, SnapshotOutcome};
