//! # tollgate-types
//!
//! Core type definitions for the tollgate admission-control library.
//!
//! This crate is the foundation of the dependency graph -- the engine crate
//! depends on it. It contains:
//!
//! - **[`error`]** -- [`TollgateError`] and the shared [`Result`] alias
//! - **[`config`]** -- Configuration schema with serde defaults and the
//!   startup validation check
//! - **[`admission`]** -- Decision, estimate, validation, and consumption
//!   value objects exchanged with callers

pub mod admission;
pub mod config;
pub mod error;

pub use error::{Result, TollgateError};
