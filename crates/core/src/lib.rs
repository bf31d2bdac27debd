//! Pharmadesk Core - Shared types library.
//!
//! This crate provides common types used across all Pharmadesk components:
//! - `session` - Client-side authentication session and route guards
//! - `cli` - Command-line front end driving the session
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and user roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
