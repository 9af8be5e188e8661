//! Audit trail of snapshot runs.

pub mod logger;

pub use logger::{AuditLogger, SnapshotEvent};
