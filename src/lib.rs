//! Sentra - a natural-language analytics agent over Athena catalogs.
//!
//! This library exposes the core modules for the `sentra` binary and for
//! integration tests.

pub mod app;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod query;
pub mod safety;
pub mod server;
