//! Audit logging
//!
//! Every create, update and delete of a ledger record is appended to
//! `audit.log` as a JSON line with before/after snapshots.
//!
//! - [`AuditEntry`]: one operation on one record
//! - [`AuditLogger`]: the append-only writer and reader

mod entry;
mod logger;

pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
