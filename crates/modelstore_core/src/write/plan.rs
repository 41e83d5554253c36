//! Fully resolved write handed to a `WriteSink`.

use crate::dialect::{Dialect, SqlValue};
use crate::model::metadata::Metadata;
use crate::model::value::ReferenceValue;
use crate::model::InstanceId;
use serde_json::Map;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
}

impl WriteOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for WriteOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    pub entity_type: String,
    pub id: InstanceId,
}

impl InstanceKey {
    pub fn new(entity_type: impl Into<String>, id: impl Into<InstanceId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl Display for InstanceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.entity_type, self.id)
    }
}

impl From<(String, InstanceId)> for InstanceKey {
    fn from((entity_type, id): (String, InstanceId)) -> Self {
        Self { entity_type, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Insert,
    Update,
}

/// One attribute in storage form.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedColumn {
    pub attribute: String,
    pub sql_type: String,
    pub value: SqlValue,
}

/// One row to insert or update.
///
/// `columns` replace every stored attribute of the row. Each entry of
/// `links` replaces the row's links through that reference feature.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedInstance {
    pub key: InstanceKey,
    pub version: i64,
    pub change: RowChange,
    pub columns: Vec<RenderedColumn>,
    pub links: Vec<ReferenceValue>,
}

/// Everything a sink must apply, in order: `unlinks`, then `deletes`
/// (children before parents), then `upserts` (parents before children).
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub operation: WriteOperation,
    pub dialect: Dialect,
    pub metadata: Metadata,
    pub root: InstanceKey,
    pub upserts: Vec<RenderedInstance>,
    pub deletes: Vec<InstanceKey>,
    /// Incoming links to remove because their target is deleted.
    pub unlinks: Vec<ReferenceValue>,
}

impl WritePlan {
    pub fn new(
        operation: WriteOperation,
        dialect: Dialect,
        metadata: Metadata,
        root: InstanceKey,
    ) -> Self {
        Self {
            operation,
            dialect,
            metadata,
            root,
            upserts: Vec::new(),
            deletes: Vec::new(),
            unlinks: Vec::new(),
        }
    }

    pub fn upsert(&self, key: &InstanceKey) -> Option<&RenderedInstance> {
        self.upserts.iter().find(|row| &row.key == key)
    }
}

/// Result of one orchestrated write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub id: InstanceId,
    pub version: i64,
    pub plan: WritePlan,
    /// Input payload echoed back with freshly signed identifiers.
    pub response: Map<String, serde_json::Value>,
}
