//! Cartwright Core - Shared types library.
//!
//! This crate provides the types shared by every Cartwright component:
//! - `engine` - The client-side cart engine (store, notifier, checkout)
//! - `cli` - Command-line driver for a file-backed cart profile
//!
//! # Architecture
//!
//! The core crate contains only types and their invariants - no storage, no
//! HTTP clients, no async runtime. This keeps it lightweight and allows it to
//! be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, cart lines, carts and order payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
