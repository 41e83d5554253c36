//! Read and write seams between the write path and storage.
//!
//! # Responsibility
//! - Define `InstanceQuery` (reads needed by graph collection and version
//!   checks) and `WriteSink` (applies a resolved `WritePlan`).
//! - Provide the SQLite reference implementation over generic tables.
//!
//! # Invariants
//! - Query methods accept id batches; callers never loop per id.
//! - `WriteSink::apply` is all-or-nothing.

pub mod sqlite;

use crate::db::DbError;
use crate::model::schema::ReferenceDescriptor;
use crate::model::value::{InstanceValue, ModelError, ReferenceValue};
use crate::model::InstanceId;
use crate::write::WritePlan;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use sqlite::SqliteInstanceStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    UnknownEntityType(String),
    Model(ModelError),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownEntityType(name) => write!(f, "unknown entity type `{name}`"),
            Self::Model(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored instance data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Model(err) => Some(err),
            Self::UnknownEntityType(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ModelError> for StoreError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

/// One persisted instance with its optimistic-lock version.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredInstance {
    pub value: InstanceValue,
    pub version: i64,
}

/// Batched reads over persisted instances and links.
pub trait InstanceQuery: Send + Sync {
    /// Subset of `ids` that exist as `entity_type` instances.
    fn find_existing(
        &self,
        entity_type: &str,
        ids: &BTreeSet<InstanceId>,
    ) -> StoreResult<BTreeSet<InstanceId>>;

    /// Outgoing links through `reference`, one value per source that has any.
    fn find_links(
        &self,
        reference: &Arc<ReferenceDescriptor>,
        source_ids: &BTreeSet<InstanceId>,
    ) -> StoreResult<Vec<ReferenceValue>>;

    /// Instances linking to any of `target_ids` through `reference`.
    ///
    /// Each value is the referrer's link set restricted to `target_ids`.
    fn find_referrers(
        &self,
        reference: &Arc<ReferenceDescriptor>,
        target_ids: &BTreeSet<InstanceId>,
    ) -> StoreResult<Vec<ReferenceValue>>;

    fn load_instance(&self, entity_type: &str, id: &str) -> StoreResult<Option<StoredInstance>>;
}

/// External executor for a fully resolved write.
pub trait WriteSink: Send + Sync {
    fn apply(&self, plan: &WritePlan) -> StoreResult<()>;
}
