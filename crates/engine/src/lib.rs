//! Cartwright Engine - client-side cart engine.
//!
//! A locally persisted, stock-aware cart shared by every open tab of one
//! storage profile, plus a checkout coordinator that survives an interleaved
//! login.
//!
//! # Architecture
//!
//! - [`storage`] - Per-profile key-value storage with cross-tab change events
//! - [`store`] - Durable cart slot; every save broadcasts
//! - [`notifier`] - "Cart changed" topic merging same-tab and other-tab wakes
//! - [`catalog`] - Field resolution over heterogeneous catalog records
//! - [`reconciler`] - Pure stock arithmetic
//! - [`mutator`] - Add/adjust/remove operations
//! - [`views`] - Badge, product grid and cart page state
//! - [`auth`] - Session credential and the "auth changed" topic
//! - [`checkout`] - Order submission deferred across login
//! - [`api`] - Remote catalog, order and login endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use cartwright_engine::{EngineConfig, Tab, storage::Profile};
//!
//! let profile = Profile::in_memory(64);
//! let tab = Tab::open(&profile, &EngineConfig::default());
//!
//! let mut mutator = tab.mutator();
//! mutator.set_desired_quantity(&product, "3");
//! mutator.add_staged(&product)?;
//! assert_eq!(tab.store().item_count(), 3);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod mutator;
pub mod notifier;
pub mod reconciler;
pub mod storage;
pub mod store;
pub mod tab;
pub mod telemetry;
pub mod views;

pub use config::EngineConfig;
pub use error::{CartError, Result};
pub use tab::Tab;
