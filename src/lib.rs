//! `ultimate_portfolio` - issue and tag store with filters and a change feed
//!
//! This crate provides the data layer behind the `upt` CLI: issues, tags and
//! their many-to-many association, named filters over issues, observable
//! selection state, and change notifications.
//!
//! # Architecture
//!
//! - [`controller`] - `StoreController`, selection state and the change feed
//! - [`model`] - Data types (Issue, Tag, Filter, Priority)
//! - [`storage`] - `SQLite` editing context and change log
//! - [`config`] - Workspace discovery and layered configuration
//! - [`error`] - Error types and structured error output
//! - [`format`] - Text output helpers
//! - [`cli`] - Command-line interface using clap
//! - [`util`] - Time and id helpers

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod storage;
pub mod util;

pub use controller::{ChangeFeed, DeleteAllSummary, StoreChange, StoreController};
pub use error::{ErrorCode, Result, StructuredError, TrackerError};
