//! # policy-engine
//!
//! Access-control core for the simulator. A request passes a mandatory
//! Bell-LaPadula gate on security levels first; only then is the
//! discretionary effective set (matrix grant plus the resource's owner or
//! others defaults) consulted. Every decision is recorded in an
//! [`audit_log::AuditLog`].
//!
//! Alongside the engine, the [`IntegrityMonitor`] detects matrix changes that
//! bypassed the engine, such as those made by the [`AdversarySimulator`].
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use audit_log::AuditLog;
//! use policy_engine::{
//!     AccessControlMatrix, Permission, PermissionSet, PolicyEngine, Resource, SecurityLevel,
//!     Subject,
//! };
//!
//! let matrix = Arc::new(AccessControlMatrix::new());
//! let engine = PolicyEngine::new(Arc::clone(&matrix), AuditLog::new());
//!
//! let alice = Subject::new("alice", "alice123", false, SecurityLevel::Confidential);
//! let report = Resource::new("report", "alice", SecurityLevel::Confidential, false)
//!     .with_owner_permissions(PermissionSet::READ | PermissionSet::WRITE);
//!
//! assert!(engine.check_access(&alice, &report, Permission::Write));
//! ```

mod adversary;
mod auth;
mod decision;
mod directory;
mod entity;
mod error;
mod evaluator;
pub mod integrity;
mod level;
pub mod loader;
pub mod matrix;
mod permission;
mod schema;

// Re-export primary public API at crate root.
pub use adversary::AdversarySimulator;
pub use auth::Authenticator;
pub use decision::{AccessDecision, DecisionReason};
pub use directory::Directory;
pub use entity::{Resource, Subject};
pub use error::{DirectoryError, ParseError};
pub use evaluator::{mac_permits, ModifyOutcome, PolicyEngine};
pub use integrity::{Divergence, IntegrityMonitor, IntegrityReport, INTEGRITY_ACTOR};
pub use level::SecurityLevel;
pub use matrix::{AccessControlMatrix, MatrixKey, Snapshot};
pub use permission::{MacClass, Permission, PermissionSet};
pub use schema::{GrantSpec, ResourceSpec, ScenarioConfig, SubjectSpec};
