//! Instance graph collection for update and delete cascades.
//!
//! # Responsibility
//! - Resolve, for a batch of root ids, the contained children (recursive),
//!   outgoing references and incoming back-references.
//! - Offer a no-op strategy for deployments without cascading writes.
//!
//! # Invariants
//! - Containment recurses; references and back-references stop after one
//!   hop and appear as leaf nodes.
//! - Ids that do not exist are absent from the result.
//! - Queries are batched per reference feature and containment level.

mod collector;

use crate::model::graph::InstanceGraph;
use crate::model::InstanceId;
use crate::store::StoreError;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use collector::ContainmentGraphCollector;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug)]
pub enum GraphError {
    UnknownEntityType(String),
    Store(StoreError),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntityType(name) => write!(f, "unknown entity type `{name}`"),
            Self::Store(err) => write!(f, "graph query failed: {err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownEntityType(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for GraphError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Strategy for resolving instance graphs.
pub trait GraphCollector: Send + Sync {
    /// Graphs for every id in `ids` that exists, keyed by id.
    fn collect_graphs(
        &self,
        entity_type: &str,
        ids: &BTreeSet<InstanceId>,
    ) -> GraphResult<BTreeMap<InstanceId, InstanceGraph>>;

    /// Graph of one instance; `None` when it does not exist.
    fn collect_graph(&self, entity_type: &str, id: &str) -> GraphResult<Option<InstanceGraph>> {
        let ids = BTreeSet::from([id.to_string()]);
        Ok(self.collect_graphs(entity_type, &ids)?.remove(id))
    }
}

/// Collector that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGraphCollector;

impl GraphCollector for NoopGraphCollector {
    fn collect_graphs(
        &self,
        _entity_type: &str,
        _ids: &BTreeSet<InstanceId>,
    ) -> GraphResult<BTreeMap<InstanceId, InstanceGraph>> {
        Ok(BTreeMap::new())
    }
}

/// Containment closure of `graph` in delete order, children first.
pub fn collect_cascade_set(graph: &InstanceGraph) -> Vec<(String, InstanceId)> {
    graph.cascade_set()
}

#[cfg(test)]
mod tests {
    use super::{GraphCollector, NoopGraphCollector};
    use std::collections::BTreeSet;

    #[test]
    fn noop_collector_yields_nothing() {
        let ids = BTreeSet::from(["o-1".to_string()]);
        assert!(NoopGraphCollector
            .collect_graphs("Order", &ids)
            .unwrap()
            .is_empty());
        assert_eq!(NoopGraphCollector.collect_graph("Order", "o-1").unwrap(), None);
    }
}
