//! Value model and schema descriptors for the write path.
//!
//! # Responsibility
//! - Define the records exchanged between the persistence core and storage.
//! - Define the read-only schema descriptors every other module consumes.
//!
//! # Invariants
//! - Every instance is identified by an opaque `InstanceId` assigned before
//!   its `InstanceValue` is constructed.
//! - Descriptors are never mutated once a `Schema` is built.

pub mod graph;
pub mod metadata;
pub mod schema;
pub mod value;

/// Opaque instance identifier (string or UUID-like).
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type InstanceId = String;
