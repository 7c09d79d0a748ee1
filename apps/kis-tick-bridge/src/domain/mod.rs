//! Domain Layer - Core streaming types and business logic.
//!
//! Types here hold no I/O: the desired-set registry and its intent channel,
//! the decoded tick, and the reconciliation bookkeeping for one upstream
//! connection.

/// Tick, remote subscription bookkeeping, and connection state.
pub mod streaming;

/// Desired-set registry and intent channel.
pub mod subscription;
