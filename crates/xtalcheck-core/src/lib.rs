//! Core library for the `xtalcheck` structure-group verification tool.
//!
//! The engine in [`engine`] cross-checks canonical structures of deduplicated
//! structure groups against each other, resolving group records through a
//! cached [`store`] accessor, classifying pairs with a tolerance-based
//! [`matcher`], and reporting verdicts through the [`sink`] abstractions.

pub mod config;
pub mod domain;
pub mod engine;
pub mod matcher;
pub mod sink;
pub mod store;
pub mod structure;

pub use config::RunConfig;
pub use domain::{CheckError, CheckResult};
