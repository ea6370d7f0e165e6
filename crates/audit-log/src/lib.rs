//! Append-only audit trail for the access-control simulator.
//!
//! Every component that makes or observes a security decision records an
//! [`AuditEntry`] into a shared [`AuditLog`]. The log assigns each entry a
//! strictly increasing sequence number at append time; that number, not the
//! timestamp, is the trail's ordering guarantee.
//!
//! The log lives in memory. [`start_file_mirror`] additionally streams every
//! entry to a [JSON Lines](https://jsonlines.org/) file from a background
//! task.
//!
//! # Quick start
//!
//! ```rust
//! use audit_log::{AuditEntry, AuditEventType, AuditLog};
//!
//! let log = AuditLog::new();
//! let seq = log.record(
//!     AuditEntry::new(AuditEventType::Login, "alice", true, "login succeeded"),
//! );
//! assert_eq!(seq, 1);
//! ```

pub mod entry;
pub mod log;
pub mod sink;
pub mod writer;

// Re-export primary public types at the crate root for convenience.
pub use entry::{AuditEntry, AuditEventType, PolicyDecisionRecord};
pub use log::AuditLog;
pub use sink::start_file_mirror;
pub use writer::{AuditWriteError, AuditWriter};
