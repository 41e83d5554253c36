use modelstore_core::db::SqliteDataSource;
use modelstore_core::model::graph::InstanceReference;
use modelstore_core::{
    AttributeDescriptor, ContainmentGraphCollector, Dialect, EntityTypeDescriptor, FeatureRef,
    GraphCollector, IdentifierSigner, InMemorySequences, InstanceGraph, Metadata, Payload,
    ReferenceDescriptor, RuntimeType, Schema, SchemaService, SqliteInstanceStore,
    WriteOrchestrator,
};
use serde_json::{json, Value as Json};
use std::collections::BTreeSet;
use std::sync::Arc;

struct Seeded {
    collector: ContainmentGraphCollector,
    order: String,
    lines: Vec<String>,
    address: String,
    customer: String,
    product: String,
    variant: String,
}

fn catalog_schema() -> Schema {
    Schema::builder()
        .entity_type(
            EntityTypeDescriptor::new("Product")
                .with_attribute(AttributeDescriptor::new("name", RuntimeType::String))
                .with_reference(ReferenceDescriptor::new("variants", "Variant").containment().many()),
        )
        .entity_type(
            EntityTypeDescriptor::new("Variant")
                .with_attribute(AttributeDescriptor::new("color", RuntimeType::String)),
        )
        .entity_type(
            EntityTypeDescriptor::new("Customer")
                .with_attribute(AttributeDescriptor::new("name", RuntimeType::String)),
        )
        .entity_type(
            EntityTypeDescriptor::new("Address")
                .with_attribute(AttributeDescriptor::new("city", RuntimeType::String)),
        )
        .entity_type(
            EntityTypeDescriptor::new("Line")
                .with_attribute(AttributeDescriptor::new("sku", RuntimeType::String))
                .with_reference(ReferenceDescriptor::new("product", "Product")),
        )
        .entity_type(
            EntityTypeDescriptor::new("Order")
                .with_reference(ReferenceDescriptor::new("lines", "Line").containment().many())
                .with_reference(ReferenceDescriptor::new("shipping", "Address").containment())
                .with_reference(ReferenceDescriptor::new("customer", "Customer")),
        )
        .build()
        .unwrap()
}

fn payload(value: Json) -> Payload {
    value.as_object().cloned().unwrap()
}

fn seed() -> Seeded {
    let schema: Arc<dyn SchemaService> = Arc::new(catalog_schema());
    let store = Arc::new(SqliteInstanceStore::new(
        SqliteDataSource::in_memory().unwrap(),
        Arc::clone(&schema),
    ));
    let engine = WriteOrchestrator::new(
        Arc::clone(&schema),
        store.clone(),
        store.clone(),
        Arc::new(InMemorySequences::new()),
        IdentifierSigner::from_key(b"graph-key").unwrap(),
        Dialect::Sqlite,
    );
    let metadata = || Metadata::new("u-1", "ada");
    let id_of = |token: &Json| {
        engine
            .signer()
            .verify(token.as_str().unwrap())
            .unwrap()
            .identifier
    };

    let product = engine
        .create(
            "Product",
            &payload(json!({"name": "pen", "variants": [{"color": "blue"}]})),
            metadata(),
        )
        .unwrap();
    let customer = engine
        .create("Customer", &payload(json!({"name": "Ada"})), metadata())
        .unwrap();
    let order = engine
        .create(
            "Order",
            &payload(json!({
                "lines": [
                    {"sku": "pen-blue", "product": {"@id": product.response["@id"].clone()}},
                    {"sku": "gift-wrap"}
                ],
                "shipping": {"city": "Oslo"},
                "customer": {"@id": customer.response["@id"].clone()}
            })),
            metadata(),
        )
        .unwrap();

    Seeded {
        collector: ContainmentGraphCollector::new(schema, store),
        lines: order.response["lines"]
            .as_array()
            .unwrap()
            .iter()
            .map(|line| id_of(&line["@id"]))
            .collect(),
        address: id_of(&order.response["shipping"]["@id"]),
        variant: id_of(&product.response["variants"][0]["@id"]),
        order: order.id,
        customer: customer.id,
        product: product.id,
    }
}

fn edge(owner: &str, feature: &str, target: InstanceGraph) -> InstanceReference {
    InstanceReference::new(FeatureRef::new(owner, feature), target)
}

#[test]
fn collected_graph_matches_the_written_structure() {
    let seeded = seed();

    let expected = InstanceGraph::from_parts(
        "Order",
        seeded.order.clone(),
        vec![
            edge(
                "Order",
                "lines",
                InstanceGraph::from_parts(
                    "Line",
                    seeded.lines[0].clone(),
                    Vec::new(),
                    vec![edge("Line", "product", InstanceGraph::leaf("Product", seeded.product.clone()))],
                    Vec::new(),
                ),
            ),
            edge("Order", "lines", InstanceGraph::leaf("Line", seeded.lines[1].clone())),
            edge("Order", "shipping", InstanceGraph::leaf("Address", seeded.address.clone())),
        ],
        vec![edge("Order", "customer", InstanceGraph::leaf("Customer", seeded.customer.clone()))],
        Vec::new(),
    );

    let collected = seeded
        .collector
        .collect_graph("Order", &seeded.order)
        .unwrap()
        .unwrap();
    assert_eq!(collected, expected);
    assert_eq!(
        seeded.collector.collect_graph("Order", &seeded.order).unwrap(),
        Some(collected)
    );
}

#[test]
fn references_and_back_references_stop_after_one_hop() {
    let seeded = seed();

    let product = seeded
        .collector
        .collect_graph("Product", &seeded.product)
        .unwrap()
        .unwrap();
    assert_eq!(
        product.containments(),
        &[edge("Product", "variants", InstanceGraph::leaf("Variant", seeded.variant.clone()))]
    );
    assert_eq!(
        product.back_references(),
        &[edge("Line", "product", InstanceGraph::leaf("Line", seeded.lines[0].clone()))]
    );

    let order = seeded
        .collector
        .collect_graph("Order", &seeded.order)
        .unwrap()
        .unwrap();
    let linked_product = &order.containments()[0].target.references()[0].target;
    assert!(linked_product.is_leaf(), "variants must not be traversed through a reference");
}

#[test]
fn cascade_set_lists_children_before_the_root() {
    let seeded = seed();
    let order = seeded
        .collector
        .collect_graph("Order", &seeded.order)
        .unwrap()
        .unwrap();

    let cascade = order.cascade_set();
    assert_eq!(cascade.len(), 4);
    assert_eq!(cascade.last(), Some(&("Order".to_string(), seeded.order.clone())));
    assert!(!cascade.contains(&("Customer".to_string(), seeded.customer.clone())));
}

#[test]
fn unknown_ids_are_absent_from_the_result() {
    let seeded = seed();
    let ids = BTreeSet::from([seeded.order.clone(), "missing".to_string()]);

    let graphs = seeded.collector.collect_graphs("Order", &ids).unwrap();
    assert_eq!(graphs.keys().cloned().collect::<Vec<_>>(), vec![seeded.order.clone()]);
    assert!(seeded.collector.collect_graph("Order", "missing").unwrap().is_none());
}

#[test]
fn batched_roots_keep_their_own_containments() {
    let schema: Arc<dyn SchemaService> = Arc::new(
        Schema::builder()
            .entity_type(
                EntityTypeDescriptor::new("Folder")
                    .with_attribute(AttributeDescriptor::new("title", RuntimeType::String))
                    .with_reference(
                        ReferenceDescriptor::new("children", "Folder").containment().many(),
                    ),
            )
            .build()
            .unwrap(),
    );
    let store = Arc::new(SqliteInstanceStore::new(
        SqliteDataSource::in_memory().unwrap(),
        Arc::clone(&schema),
    ));
    let engine = WriteOrchestrator::new(
        Arc::clone(&schema),
        store.clone(),
        store.clone(),
        Arc::new(InMemorySequences::new()),
        IdentifierSigner::from_key(b"graph-key").unwrap(),
        Dialect::Sqlite,
    );
    let parent = engine
        .create(
            "Folder",
            &payload(json!({"title": "docs", "children": [{"title": "drafts"}]})),
            Metadata::new("u-1", "ada"),
        )
        .unwrap();
    let child = engine
        .signer()
        .verify(parent.response["children"][0]["@id"].as_str().unwrap())
        .unwrap()
        .identifier;

    let collector = ContainmentGraphCollector::new(schema, store);
    let alone = collector.collect_graph("Folder", &parent.id).unwrap().unwrap();
    assert_eq!(alone.containments().len(), 1);

    let batched = collector
        .collect_graphs("Folder", &BTreeSet::from([parent.id.clone(), child.clone()]))
        .unwrap();
    assert_eq!(batched.get(&parent.id), Some(&alone));
    assert_eq!(
        batched.get(&child),
        collector.collect_graph("Folder", &child).unwrap().as_ref()
    );
}
