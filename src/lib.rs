//! Memo Tracker Library
//!
//! This module exports the core components for testing and integration.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod order;
pub mod reconcile;
pub mod status;
pub mod time;
pub mod types;
