//! Surplus - a solvent personal ledger
//!
//! This library tracks one-off and recurring income and expenses per owner
//! and refuses every change that would let total expenses exceed total
//! income. Surplus from closed months is distributed across savings goals.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Core data models (transactions, recurring rules, goals, budgets)
//! - `storage`: JSON file storage behind the `LedgerStore` trait
//! - `services`: Business logic: solvency guard, recurrence scheduler, goal allocator
//! - `events`: Domain events and their dispatch to the allocator
//! - `audit`: Audit logging system
//! - `cli` / `display`: The command-line driver and its output
//!
//! # Example
//!
//! ```rust,ignore
//! use surplus::clock::SystemClock;
//! use surplus::config::SurplusPaths;
//! use surplus::notify::TracingSink;
//! use surplus::services::{RecurringService, ServiceContext};
//! use surplus::storage::Storage;
//!
//! let storage = Storage::open(SurplusPaths::new()?)?;
//! let ctx = ServiceContext::new(&storage, &SystemClock, &TracingSink);
//! let report = RecurringService::new(ctx).process(owner)?;
//! ```

pub mod audit;
pub mod cli;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod models;
pub mod notify;
pub mod services;
pub mod storage;
pub mod validation;

pub use error::{LedgerError, LedgerResult};
