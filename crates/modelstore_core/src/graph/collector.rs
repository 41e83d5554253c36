use crate::graph::{GraphCollector, GraphError, GraphResult};
use crate::model::graph::{InstanceGraph, InstanceReference};
use crate::model::schema::{EntityTypeDescriptor, SchemaService};
use crate::model::InstanceId;
use crate::store::InstanceQuery;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// Edges gathered for one node before it is frozen into an `InstanceGraph`.
#[derive(Default)]
struct PendingEdges {
    containments: Vec<InstanceReference>,
    references: Vec<InstanceReference>,
    back_references: Vec<InstanceReference>,
}

/// Collector that follows containment recursively over an `InstanceQuery`.
pub struct ContainmentGraphCollector {
    schema: Arc<dyn SchemaService>,
    query: Arc<dyn InstanceQuery>,
}

impl ContainmentGraphCollector {
    pub fn new(schema: Arc<dyn SchemaService>, query: Arc<dyn InstanceQuery>) -> Self {
        Self { schema, query }
    }

    fn entity_type(&self, name: &str) -> GraphResult<Arc<EntityTypeDescriptor>> {
        self.schema
            .entity_type_of(name)
            .ok_or_else(|| GraphError::UnknownEntityType(name.to_string()))
    }

    /// Builds graphs for one containment level, then recurses into the next.
    ///
    /// `visited` holds the nodes already placed in the current root's
    /// graph and cuts cyclic containment data.
    fn collect_level(
        &self,
        entity_type: &EntityTypeDescriptor,
        ids: &BTreeSet<InstanceId>,
        visited: &mut BTreeSet<(String, InstanceId)>,
    ) -> GraphResult<BTreeMap<InstanceId, InstanceGraph>> {
        let mut pending: BTreeMap<InstanceId, PendingEdges> = ids
            .iter()
            .map(|id| (id.clone(), PendingEdges::default()))
            .collect();
        for id in ids {
            visited.insert((entity_type.name().to_string(), id.clone()));
        }

        for reference in entity_type.references() {
            let links = self.query.find_links(reference, ids)?;
            if !reference.is_containment() {
                for link in links {
                    let Some(edges) = pending.get_mut(link.id()) else {
                        continue;
                    };
                    for target in link.opposite_ids() {
                        edges.references.push(InstanceReference::new(
                            reference.feature_ref(),
                            InstanceGraph::leaf(reference.target(), target.clone()),
                        ));
                    }
                }
                continue;
            }

            let linked: BTreeSet<InstanceId> = links
                .iter()
                .flat_map(|link| link.opposite_ids().iter())
                .filter(|id| !visited.contains(&(reference.target().to_string(), (*id).clone())))
                .cloned()
                .collect();
            let child_type = self.entity_type(reference.target())?;
            // Dangling links name rows that no longer exist.
            let child_ids = if linked.is_empty() {
                linked
            } else {
                self.query.find_existing(child_type.name(), &linked)?
            };
            let mut children = if child_ids.is_empty() {
                BTreeMap::new()
            } else {
                self.collect_level(&child_type, &child_ids, visited)?
            };
            for link in links {
                let Some(edges) = pending.get_mut(link.id()) else {
                    continue;
                };
                for child in link.opposite_ids() {
                    if let Some(graph) = children.remove(child) {
                        edges
                            .containments
                            .push(InstanceReference::new(reference.feature_ref(), graph));
                    }
                }
            }
        }

        for incoming in self.schema.incoming_references(entity_type.name()) {
            for referrer in self.query.find_referrers(&incoming, ids)? {
                for target in referrer.opposite_ids() {
                    if let Some(edges) = pending.get_mut(target) {
                        edges.back_references.push(InstanceReference::new(
                            incoming.feature_ref(),
                            InstanceGraph::leaf(referrer.entity_type(), referrer.id().clone()),
                        ));
                    }
                }
            }
        }

        Ok(pending
            .into_iter()
            .map(|(id, edges)| {
                let graph = InstanceGraph::from_parts(
                    entity_type.name(),
                    id.clone(),
                    edges.containments,
                    edges.references,
                    edges.back_references,
                );
                (id, graph)
            })
            .collect())
    }
}

impl GraphCollector for ContainmentGraphCollector {
    fn collect_graphs(
        &self,
        entity_type: &str,
        ids: &BTreeSet<InstanceId>,
    ) -> GraphResult<BTreeMap<InstanceId, InstanceGraph>> {
        let started_at = Instant::now();
        let descriptor = self.entity_type(entity_type)?;
        let existing = self.query.find_existing(entity_type, ids)?;
        if existing.is_empty() {
            return Ok(BTreeMap::new());
        }

        // Each root walks its own closure, so a root that is also contained
        // by another requested root still appears under it.
        let mut graphs = BTreeMap::new();
        let mut nodes = 0;
        for id in existing {
            let mut visited = BTreeSet::new();
            graphs.extend(self.collect_level(
                &descriptor,
                &BTreeSet::from([id]),
                &mut visited,
            )?);
            nodes += visited.len();
        }
        debug!(
            "event=graph_collect module=graph status=ok entity_type={} roots={} nodes={} duration_ms={}",
            entity_type,
            graphs.len(),
            nodes,
            started_at.elapsed().as_millis()
        );
        Ok(graphs)
    }
}
