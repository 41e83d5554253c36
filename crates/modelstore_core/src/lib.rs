//! Model-driven persistence core.
//!
//! Turns loosely typed JSON payloads into validated, signed and fully
//! resolved write plans against a schema of entity types, attributes and
//! references. The bundled SQLite store is the reference sink.

pub mod config;
pub mod db;
pub mod dialect;
pub mod graph;
pub mod logging;
pub mod model;
pub mod payload;
pub mod sequence;
pub mod signing;
pub mod store;
pub mod validation;
pub mod write;

pub use config::{load_config, ConfigError, EngineConfig, GraphCollection, SequenceBackend};
pub use dialect::{Dialect, SqlValue, TypeMapper};
pub use graph::{ContainmentGraphCollector, GraphCollector, GraphError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::graph::InstanceGraph;
pub use model::metadata::Metadata;
pub use model::schema::{
    AttributeDescriptor, EntityTypeDescriptor, FeatureRef, ReferenceDescriptor, RuntimeType,
    Schema, SchemaService,
};
pub use model::value::{InstanceValue, ReferenceValue, Value};
pub use model::InstanceId;
pub use payload::Payload;
pub use sequence::{InMemorySequences, SequenceAllocator, SequenceError, SequenceSpec};
pub use signing::{IdentifierSigner, SignedIdentifier, SigningError};
pub use store::{InstanceQuery, SqliteInstanceStore, StoreError, WriteSink};
pub use validation::{FeedbackItem, FeedbackLevel, Validator, ValidatorRegistry};
pub use write::{WriteError, WriteOrchestrator, WriteOutcome, WritePlan};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
