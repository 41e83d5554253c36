use crate::config::{EngineConfig, GraphCollection, SequenceBackend};
use crate::db::SqliteDataSource;
use crate::dialect::{Dialect, TypeMapper};
use crate::graph::{ContainmentGraphCollector, GraphCollector, NoopGraphCollector};
use crate::model::graph::InstanceGraph;
use crate::model::metadata::Metadata;
use crate::model::schema::{
    EntityTypeDescriptor, FeatureRef, ReferenceDescriptor, SchemaService,
};
use crate::model::value::{InstanceValue, ReferenceValue, Value};
use crate::model::InstanceId;
use crate::payload::{decode_value, Payload, ID_KEY, TYPE_KEY, VERSION_KEY};
use crate::sequence::{BackendSequences, InMemorySequences, SequenceAllocator};
use crate::signing::{check_version, IdentifierSigner, SignedIdentifier, SigningError};
use crate::store::{InstanceQuery, SqliteInstanceStore, WriteSink};
use crate::validation::{
    has_errors, FeedbackItem, ValidatorRegistry, REFERENCE_TARGET_NOT_FOUND,
};
use crate::write::{
    InstanceKey, RenderedColumn, RenderedInstance, RowChange, WriteError, WriteOperation,
    WriteOutcome, WritePlan, WriteResult,
};
use log::{info, warn};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// One payload node after identifier resolution.
struct ResolvedNode {
    descriptor: Arc<EntityTypeDescriptor>,
    /// `None` until minted for inserts.
    id: Option<InstanceId>,
    version: i64,
    change: RowChange,
    /// Containment feature this node was reached through.
    via: Option<Arc<ReferenceDescriptor>>,
    attributes: Vec<(usize, Value)>,
    /// Containment features present in the payload, possibly empty.
    containments: Vec<Arc<ReferenceDescriptor>>,
    /// Non-containment links present in the payload, in payload order.
    references: Vec<(Arc<ReferenceDescriptor>, Vec<SignedIdentifier>)>,
    /// Contained children in (feature, payload) order.
    children: Vec<ResolvedNode>,
}

impl ResolvedNode {
    fn key(&self) -> WriteResult<InstanceKey> {
        let id = self.id.clone().ok_or_else(|| {
            WriteError::Invariant(format!(
                "invariant violation: `{}` node has no identifier",
                self.descriptor.name()
            ))
        })?;
        Ok(InstanceKey::new(self.descriptor.name(), id))
    }
}

/// Reference target awaiting the batched existence check.
struct PendingTarget {
    entity_type: String,
    id: InstanceId,
    location: String,
    feature: FeatureRef,
}

/// Composes validation, signing, graph collection, sequences and type
/// mapping into create/update/delete.
pub struct WriteOrchestrator {
    schema: Arc<dyn SchemaService>,
    validators: ValidatorRegistry,
    signer: IdentifierSigner,
    graphs: Arc<dyn GraphCollector>,
    query: Arc<dyn InstanceQuery>,
    sequences: Arc<dyn SequenceAllocator>,
    mapper: TypeMapper,
    sink: Arc<dyn WriteSink>,
}

impl WriteOrchestrator {
    /// Orchestrator with the built-in validators and containment graph
    /// collection over `query`.
    pub fn new(
        schema: Arc<dyn SchemaService>,
        query: Arc<dyn InstanceQuery>,
        sink: Arc<dyn WriteSink>,
        sequences: Arc<dyn SequenceAllocator>,
        signer: IdentifierSigner,
        dialect: Dialect,
    ) -> Self {
        Self {
            validators: ValidatorRegistry::with_defaults(Arc::clone(&schema)),
            graphs: Arc::new(ContainmentGraphCollector::new(
                Arc::clone(&schema),
                Arc::clone(&query),
            )),
            schema,
            signer,
            query,
            sequences,
            mapper: TypeMapper::for_dialect(dialect),
            sink,
        }
    }

    /// Orchestrator over the bundled SQLite store, wired from `config`.
    ///
    /// Database sequences run against `source`, so they use SQLite
    /// statements whatever dialect the plan is rendered for.
    pub fn with_sqlite_store(
        config: &EngineConfig,
        schema: Arc<dyn SchemaService>,
        source: SqliteDataSource,
    ) -> WriteResult<Self> {
        let dialect = config
            .dialect()
            .map_err(|err| WriteError::Invariant(err.to_string()))?;
        let signer = config
            .signer()
            .map_err(|err| WriteError::Invariant(err.to_string()))?;
        let sequences: Arc<dyn SequenceAllocator> = match config.sequence_backend {
            SequenceBackend::Memory => Arc::new(InMemorySequences::new()),
            SequenceBackend::Database => Arc::new(BackendSequences::new(
                Dialect::Sqlite,
                Arc::new(source.clone()),
            )?),
        };
        let store = Arc::new(SqliteInstanceStore::new(source, Arc::clone(&schema)));
        let orchestrator = Self::new(schema, store.clone(), store, sequences, signer, dialect);
        Ok(match config.graph_collection {
            GraphCollection::Containment => orchestrator,
            GraphCollection::Disabled => orchestrator.with_graph_collector(Arc::new(NoopGraphCollector)),
        })
    }

    pub fn with_graph_collector(mut self, graphs: Arc<dyn GraphCollector>) -> Self {
        self.graphs = graphs;
        self
    }

    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    pub fn signer(&self) -> &IdentifierSigner {
        &self.signer
    }

    pub fn dialect(&self) -> Dialect {
        self.mapper.dialect()
    }

    /// Creates a new root instance and its contained children.
    ///
    /// Contained children carrying a signed `@id` are updated in place;
    /// unsigned ones are created.
    pub fn create(
        &self,
        entity_type: &str,
        payload: &Payload,
        metadata: Metadata,
    ) -> WriteResult<WriteOutcome> {
        self.logged(WriteOperation::Create, entity_type, || {
            let descriptor = self.entity_type(entity_type)?;
            self.validate(entity_type, payload)?;
            if payload.get(ID_KEY).is_some_and(|id| !id.is_null()) {
                return Err(WriteError::InvalidPayload(
                    "create payload must not carry `@id`".to_string(),
                ));
            }

            let mut pending = Vec::new();
            let mut root =
                self.resolve(descriptor, payload, None, RowChange::Insert, "", &mut pending)?;
            self.check_targets(pending)?;
            self.check_containers(&root)?;
            self.allocate(&mut root)?;

            let key = root.key()?;
            let mut plan = WritePlan::new(WriteOperation::Create, self.dialect(), metadata, key);
            self.render(&root, &mut plan)?;
            self.finish(root, payload, plan)
        })
    }

    /// Replaces the attributes of a signed root and the links of every
    /// feature present in the payload.
    ///
    /// Contained children dropped from a present containment feature are
    /// cascade-deleted.
    pub fn update(
        &self,
        entity_type: &str,
        payload: &Payload,
        metadata: Metadata,
    ) -> WriteResult<WriteOutcome> {
        self.logged(WriteOperation::Update, entity_type, || {
            let descriptor = self.entity_type(entity_type)?;
            self.validate(entity_type, payload)?;
            let (signed, _) = self.load_signed_root(entity_type, payload)?;

            let mut pending = Vec::new();
            let mut root =
                self.resolve(descriptor, payload, None, RowChange::Update, "", &mut pending)?;
            root.id = Some(signed.identifier.clone());
            self.check_targets(pending)?;
            self.check_containers(&root)?;
            let graph = self.graphs.collect_graph(entity_type, &signed.identifier)?;
            self.allocate(&mut root)?;

            let key = root.key()?;
            let mut plan = WritePlan::new(WriteOperation::Update, self.dialect(), metadata, key);
            if let Some(graph) = &graph {
                self.plan_dropped_children(&root, graph, &mut plan)?;
            }
            self.render(&root, &mut plan)?;
            self.finish(root, payload, plan)
        })
    }

    /// Deletes a signed root with its containment closure and removes
    /// incoming links to every deleted instance.
    pub fn delete(
        &self,
        entity_type: &str,
        payload: &Payload,
        metadata: Metadata,
    ) -> WriteResult<WriteOutcome> {
        self.logged(WriteOperation::Delete, entity_type, || {
            self.entity_type(entity_type)?;
            let (signed, stored_version) = self.load_signed_root(entity_type, payload)?;
            let key = InstanceKey::new(entity_type, signed.identifier.clone());

            let mut plan =
                WritePlan::new(WriteOperation::Delete, self.dialect(), metadata, key.clone());
            match self.graphs.collect_graph(entity_type, &signed.identifier)? {
                Some(graph) => self.plan_cascade(&graph, &mut plan)?,
                None => plan.deletes.push(key),
            }
            self.sink.apply(&plan)?;

            let mut response = Payload::new();
            response.insert(ID_KEY.to_string(), Json::String(signed.identifier.clone()));
            response.insert(TYPE_KEY.to_string(), Json::String(entity_type.to_string()));
            response.insert(VERSION_KEY.to_string(), Json::from(stored_version));
            self.signer.sign(None, &mut response, true)?;
            Ok(WriteOutcome {
                id: signed.identifier,
                version: stored_version,
                plan,
                response,
            })
        })
    }

    fn logged<F>(&self, operation: WriteOperation, entity_type: &str, run: F) -> WriteResult<WriteOutcome>
    where
        F: FnOnce() -> WriteResult<WriteOutcome>,
    {
        let started_at = Instant::now();
        let result = run();
        match &result {
            Ok(outcome) => info!(
                "event=write_{} module=write status=ok entity_type={} id={} version={} upserts={} deletes={} duration_ms={}",
                operation,
                entity_type,
                outcome.id,
                outcome.version,
                outcome.plan.upserts.len(),
                outcome.plan.deletes.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=write_{} module=write status={} entity_type={} error_code={} duration_ms={}",
                operation,
                if err.is_client_error() { "rejected" } else { "error" },
                entity_type,
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn entity_type(&self, name: &str) -> WriteResult<Arc<EntityTypeDescriptor>> {
        self.schema
            .entity_type_of(name)
            .ok_or_else(|| WriteError::UnknownEntityType(name.to_string()))
    }

    fn validate(&self, entity_type: &str, payload: &Payload) -> WriteResult<()> {
        let feedback = self.validators.validate(entity_type, payload)?;
        if has_errors(&feedback) {
            return Err(WriteError::Validation(feedback));
        }
        Ok(())
    }

    /// Verifies the root token is mutable, exists and is current.
    fn load_signed_root(
        &self,
        entity_type: &str,
        payload: &Payload,
    ) -> WriteResult<(SignedIdentifier, i64)> {
        let signed = self
            .signer
            .extract_for_feature(entity_type, None, payload)?
            .ok_or(SigningError::MissingIdentifier)?;
        if signed.immutable {
            return Err(SigningError::TamperDetected(
                "immutable identifier cannot address a write".to_string(),
            )
            .into());
        }
        let stored = self
            .query
            .load_instance(entity_type, &signed.identifier)?
            .ok_or_else(|| WriteError::NotFound(InstanceKey::new(entity_type, signed.identifier.clone())))?;
        check_version(&signed, stored.version)?;
        Ok((signed, stored.version))
    }

    fn resolve(
        &self,
        descriptor: Arc<EntityTypeDescriptor>,
        payload: &Payload,
        via: Option<Arc<ReferenceDescriptor>>,
        change: RowChange,
        location: &str,
        pending: &mut Vec<PendingTarget>,
    ) -> WriteResult<ResolvedNode> {
        let locate = |segment: &str| {
            if location.is_empty() {
                segment.to_string()
            } else {
                format!("{location}.{segment}")
            }
        };

        let mut attributes = Vec::new();
        for (index, attribute) in descriptor.attributes().iter().enumerate() {
            if let Some(json) = payload.get(attribute.name()) {
                let value = decode_value(attribute, json).map_err(|err| {
                    WriteError::InvalidPayload(format!("{}: {err}", locate(attribute.name())))
                })?;
                attributes.push((index, value));
            }
        }

        let mut containments = Vec::new();
        let mut references = Vec::new();
        let mut children = Vec::new();
        for reference in descriptor.references() {
            let Some(json) = payload.get(reference.name()) else {
                continue;
            };
            let items = link_objects(reference, json, &locate(reference.name()))?;

            if reference.is_containment() {
                let child_type = self.entity_type(reference.target())?;
                for (segment, child) in items {
                    children.push(self.resolve_child(
                        reference,
                        &child_type,
                        child,
                        &locate(&segment),
                        pending,
                    )?);
                }
                containments.push(Arc::clone(reference));
                continue;
            }

            let mut linked = Vec::with_capacity(items.len());
            for (segment, target) in items {
                let signed = self
                    .signer
                    .extract_for_feature(reference.target(), Some(reference.as_ref()), target)?
                    .ok_or_else(|| {
                        SigningError::TamperDetected(format!(
                            "reference `{}` carries an unsigned identifier",
                            locate(&segment)
                        ))
                    })?;
                pending.push(PendingTarget {
                    entity_type: reference.target().to_string(),
                    id: signed.identifier.clone(),
                    location: locate(&segment),
                    feature: reference.feature_ref(),
                });
                linked.push(signed);
            }
            references.push((Arc::clone(reference), linked));
        }

        Ok(ResolvedNode {
            descriptor,
            id: None,
            version: 0,
            change,
            via,
            attributes,
            containments,
            references,
            children,
        })
    }

    /// Signed children are existing rows updated in place; unsigned ones are new.
    fn resolve_child(
        &self,
        reference: &Arc<ReferenceDescriptor>,
        child_type: &Arc<EntityTypeDescriptor>,
        child: &Payload,
        location: &str,
        pending: &mut Vec<PendingTarget>,
    ) -> WriteResult<ResolvedNode> {
        let signed = self
            .signer
            .extract_for_feature(child_type.name(), Some(reference.as_ref()), child)?;
        let change = match &signed {
            Some(signed) => {
                let stored = self
                    .query
                    .load_instance(child_type.name(), &signed.identifier)?
                    .ok_or_else(|| {
                        WriteError::NotFound(InstanceKey::new(
                            child_type.name(),
                            signed.identifier.clone(),
                        ))
                    })?;
                check_version(signed, stored.version)?;
                RowChange::Update
            }
            None => RowChange::Insert,
        };
        let mut node = self.resolve(
            Arc::clone(child_type),
            child,
            Some(Arc::clone(reference)),
            change,
            location,
            pending,
        )?;
        node.id = signed.map(|signed| signed.identifier);
        Ok(node)
    }

    /// Rejects signed children currently contained by an instance whose
    /// links through that feature this write does not replace.
    ///
    /// A child may move between containers rewritten by the same payload;
    /// any other container would keep a second containment link.
    fn check_containers(&self, root: &ResolvedNode) -> WriteResult<()> {
        let mut rewritten = BTreeSet::new();
        let mut children: BTreeMap<String, BTreeSet<InstanceId>> = BTreeMap::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.change == RowChange::Update {
                let key = node.key()?;
                for reference in &node.containments {
                    rewritten.insert((key.clone(), reference.feature_ref()));
                }
            }
            for child in &node.children {
                if child.change == RowChange::Update {
                    let key = child.key()?;
                    children.entry(key.entity_type).or_default().insert(key.id);
                }
                stack.push(child);
            }
        }

        for (entity_type, ids) in &children {
            for reference in self.schema.containers_of(entity_type) {
                for container in self.query.find_referrers(&reference, ids)? {
                    let key = InstanceKey::new(container.entity_type(), container.id().clone());
                    if rewritten.contains(&(key.clone(), reference.feature_ref())) {
                        continue;
                    }
                    return Err(SigningError::TamperDetected(format!(
                        "{key} already contains this `{entity_type}` through `{}`",
                        reference.name()
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Rejects the write when any linked target does not exist.
    fn check_targets(&self, pending: Vec<PendingTarget>) -> WriteResult<()> {
        let mut by_type: BTreeMap<&str, BTreeSet<InstanceId>> = BTreeMap::new();
        for target in &pending {
            by_type
                .entry(target.entity_type.as_str())
                .or_default()
                .insert(target.id.clone());
        }
        let mut existing: BTreeMap<&str, BTreeSet<InstanceId>> = BTreeMap::new();
        for (entity_type, ids) in by_type {
            existing.insert(entity_type, self.query.find_existing(entity_type, &ids)?);
        }

        let feedback: Vec<FeedbackItem> = pending
            .iter()
            .filter(|target| {
                !existing
                    .get(target.entity_type.as_str())
                    .is_some_and(|ids| ids.contains(&target.id))
            })
            .map(|target| {
                FeedbackItem::error(REFERENCE_TARGET_NOT_FOUND, target.location.clone())
                    .with_detail("feature", target.feature.to_string())
                    .with_detail("target", target.entity_type.clone())
            })
            .collect();
        if feedback.is_empty() {
            Ok(())
        } else {
            Err(WriteError::Validation(feedback))
        }
    }

    /// Mints ids for new nodes and a fresh version for every node.
    fn allocate(&self, node: &mut ResolvedNode) -> WriteResult<()> {
        let entity_type = node.descriptor.name().to_string();
        if node.id.is_none() {
            let next = self.sequences.next_value(&format!("{entity_type}.id"))?;
            node.id = Some(next.to_string());
        }
        node.version = self
            .sequences
            .next_value(&format!("{entity_type}.version"))?;
        for child in &mut node.children {
            self.allocate(child)?;
        }
        Ok(())
    }

    /// Appends `node` and its children, parents first.
    fn render(&self, node: &ResolvedNode, plan: &mut WritePlan) -> WriteResult<()> {
        let key = node.key()?;
        let attributes = node.descriptor.attributes();
        let value = node
            .attributes
            .iter()
            .fold(
                InstanceValue::builder()
                    .entity_type(key.entity_type.as_str())
                    .id(key.id.as_str()),
                |builder, (index, value)| {
                    builder.attribute(Arc::clone(&attributes[*index]), value.clone())
                },
            )
            .build()?;
        let columns = value
            .attributes()
            .iter()
            .map(|attribute| RenderedColumn {
                attribute: attribute.attribute().name().to_string(),
                sql_type: self.mapper.sql_type_for(attribute.attribute()),
                value: self.mapper.render_attribute(attribute),
            })
            .collect();

        let mut links = Vec::new();
        for reference in &node.containments {
            let targets = node
                .children
                .iter()
                .filter(|child| {
                    child
                        .via
                        .as_ref()
                        .is_some_and(|via| via.name() == reference.name())
                })
                .map(|child| child.key().map(|key| key.id))
                .collect::<WriteResult<BTreeSet<_>>>()?;
            links.push(ReferenceValue::new(
                key.entity_type.as_str(),
                key.id.as_str(),
                Arc::clone(reference),
                targets,
            ));
        }
        for (reference, linked) in &node.references {
            let targets = linked
                .iter()
                .map(|signed| signed.identifier.clone())
                .collect();
            links.push(ReferenceValue::new(
                key.entity_type.as_str(),
                key.id.as_str(),
                Arc::clone(reference),
                targets,
            ));
        }

        plan.upserts.push(RenderedInstance {
            key,
            version: node.version,
            change: node.change,
            columns,
            links,
        });
        for child in &node.children {
            self.render(child, plan)?;
        }
        Ok(())
    }

    /// Cascades children that an updated node no longer contains.
    ///
    /// Children still updated anywhere in the payload are moved, not dropped.
    fn plan_dropped_children(
        &self,
        root: &ResolvedNode,
        root_graph: &InstanceGraph,
        plan: &mut WritePlan,
    ) -> WriteResult<()> {
        let mut updated = BTreeSet::new();
        collect_updated(root, &mut updated)?;

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            stack.extend(node.children.iter());
            if node.change != RowChange::Update {
                continue;
            }
            let Some(graph) = find_node(root_graph, &node.key()?) else {
                continue;
            };
            for reference in &node.containments {
                let feature = reference.feature_ref();
                for edge in graph.containments() {
                    let key = InstanceKey::new(edge.target.entity_type(), edge.target.id().clone());
                    if edge.feature == feature && !updated.contains(&key) {
                        self.plan_cascade(&edge.target, plan)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Adds `graph`'s containment closure to the deletes and its incoming
    /// links to the unlinks.
    fn plan_cascade(&self, graph: &InstanceGraph, plan: &mut WritePlan) -> WriteResult<()> {
        let mut stack = vec![graph];
        while let Some(node) = stack.pop() {
            for edge in node.back_references() {
                let reference = self.reference(&edge.feature)?;
                plan.unlinks.push(ReferenceValue::new(
                    edge.target.entity_type(),
                    edge.target.id().clone(),
                    reference,
                    BTreeSet::from([node.id().clone()]),
                ));
            }
            stack.extend(node.containments().iter().map(|edge| &edge.target));
        }
        plan.deletes
            .extend(graph.cascade_set().into_iter().map(InstanceKey::from));
        Ok(())
    }

    fn reference(&self, feature: &FeatureRef) -> WriteResult<Arc<ReferenceDescriptor>> {
        self.entity_type(&feature.entity_type)?
            .reference(&feature.feature)
            .cloned()
            .ok_or_else(|| {
                WriteError::Invariant(format!(
                    "invariant violation: schema has no reference {feature}"
                ))
            })
    }

    /// Applies the plan and builds the re-signed response.
    fn finish(&self, root: ResolvedNode, payload: &Payload, plan: WritePlan) -> WriteResult<WriteOutcome> {
        self.sink.apply(&plan)?;
        let response = self.respond(&root, payload, None)?;
        let key = root.key()?;
        Ok(WriteOutcome {
            id: key.id,
            version: root.version,
            plan,
            response,
        })
    }

    fn respond(
        &self,
        node: &ResolvedNode,
        payload: &Payload,
        feature: Option<&FeatureRef>,
    ) -> WriteResult<Payload> {
        let mut response = payload.clone();
        let mut children = node.children.iter();
        for reference in node.descriptor.references() {
            let Some(json) = response.get_mut(reference.name()) else {
                continue;
            };
            let objects: Vec<&mut Payload> = match json {
                Json::Object(object) => vec![object],
                Json::Array(items) => items.iter_mut().filter_map(Json::as_object_mut).collect(),
                _ => Vec::new(),
            };

            if reference.is_containment() {
                let via = reference.feature_ref();
                for object in objects {
                    let child = children.next().ok_or_else(|| {
                        WriteError::Invariant(
                            "invariant violation: response children out of step".to_string(),
                        )
                    })?;
                    *object = self.respond(child, object, Some(&via))?;
                }
                continue;
            }

            let linked = node
                .references
                .iter()
                .find(|(linked_reference, _)| linked_reference.name() == reference.name())
                .map(|(_, linked)| linked.as_slice())
                .unwrap_or_default();
            for (object, signed) in objects.into_iter().zip(linked) {
                object.insert(ID_KEY.to_string(), Json::String(signed.identifier.clone()));
                object.insert(TYPE_KEY.to_string(), Json::String(reference.target().to_string()));
                match signed.version {
                    Some(version) => object.insert(VERSION_KEY.to_string(), Json::from(version)),
                    None => object.remove(VERSION_KEY),
                };
                self.signer
                    .sign(Some(&reference.feature_ref()), object, true)?;
            }
        }

        let key = node.key()?;
        response.insert(ID_KEY.to_string(), Json::String(key.id));
        response.insert(TYPE_KEY.to_string(), Json::String(key.entity_type));
        response.insert(VERSION_KEY.to_string(), Json::from(node.version));
        self.signer.sign(feature, &mut response, false)?;
        Ok(response)
    }
}

/// `(segment, object)` pairs for a reference value: `name` for a single
/// object, `name[i]` for array items. `null` yields nothing.
fn link_objects<'a>(
    reference: &ReferenceDescriptor,
    json: &'a Json,
    location: &str,
) -> WriteResult<Vec<(String, &'a Payload)>> {
    let not_object = || {
        WriteError::InvalidPayload(format!(
            "{location}: reference values must be objects"
        ))
    };
    match json {
        Json::Null => Ok(Vec::new()),
        Json::Object(object) => Ok(vec![(reference.name().to_string(), object)]),
        Json::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_object()
                    .map(|object| (format!("{}[{index}]", reference.name()), object))
                    .ok_or_else(not_object)
            })
            .collect(),
        _ => Err(not_object()),
    }
}

fn collect_updated(node: &ResolvedNode, out: &mut BTreeSet<InstanceKey>) -> WriteResult<()> {
    if node.change == RowChange::Update {
        out.insert(node.key()?);
    }
    for child in &node.children {
        collect_updated(child, out)?;
    }
    Ok(())
}

fn find_node<'a>(graph: &'a InstanceGraph, key: &InstanceKey) -> Option<&'a InstanceGraph> {
    if graph.entity_type() == key.entity_type && graph.id() == &key.id {
        return Some(graph);
    }
    graph
        .containments()
        .iter()
        .find_map(|edge| find_node(&edge.target, key))
}
