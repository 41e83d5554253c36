//! Instance graph produced by graph collection.
//!
//! # Invariants
//! - A node's identity is its `(entity_type, id)` pair.
//! - Edge collections are kept sorted by `(feature, target id)` so two
//!   collections of the same store state compare equal.
//! - Only containment edges carry non-leaf targets.

use crate::model::schema::FeatureRef;
use crate::model::InstanceId;

/// One edge of an instance graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReference {
    pub feature: FeatureRef,
    pub target: InstanceGraph,
}

impl InstanceReference {
    pub fn new(feature: FeatureRef, target: InstanceGraph) -> Self {
        Self { feature, target }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceGraph {
    entity_type: String,
    id: InstanceId,
    containments: Vec<InstanceReference>,
    references: Vec<InstanceReference>,
    back_references: Vec<InstanceReference>,
}

impl InstanceGraph {
    /// Node without edges.
    pub fn leaf(entity_type: impl Into<String>, id: impl Into<InstanceId>) -> Self {
        Self::from_parts(entity_type, id, Vec::new(), Vec::new(), Vec::new())
    }

    pub fn from_parts(
        entity_type: impl Into<String>,
        id: impl Into<InstanceId>,
        mut containments: Vec<InstanceReference>,
        mut references: Vec<InstanceReference>,
        mut back_references: Vec<InstanceReference>,
    ) -> Self {
        for edges in [&mut containments, &mut references, &mut back_references] {
            edges.sort_by(|left, right| {
                (&left.feature, &left.target.entity_type, &left.target.id).cmp(&(
                    &right.feature,
                    &right.target.entity_type,
                    &right.target.id,
                ))
            });
        }
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            containments,
            references,
            back_references,
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Owned children, cascade-deleted with this node.
    pub fn containments(&self) -> &[InstanceReference] {
        &self.containments
    }

    /// Outgoing non-owning links.
    pub fn references(&self) -> &[InstanceReference] {
        &self.references
    }

    /// Incoming links found by reverse lookup.
    pub fn back_references(&self) -> &[InstanceReference] {
        &self.back_references
    }

    pub fn is_leaf(&self) -> bool {
        self.containments.is_empty()
            && self.references.is_empty()
            && self.back_references.is_empty()
    }

    /// Containment closure in delete order: children before their parent,
    /// this node last.
    pub fn cascade_set(&self) -> Vec<(String, InstanceId)> {
        let mut out = Vec::new();
        self.push_cascade(&mut out);
        out
    }

    fn push_cascade(&self, out: &mut Vec<(String, InstanceId)>) {
        for edge in &self.containments {
            edge.target.push_cascade(out);
        }
        out.push((self.entity_type.clone(), self.id.clone()));
    }
}
