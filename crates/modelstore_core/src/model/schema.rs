//! Read-only schema descriptors.
//!
//! # Responsibility
//! - Describe entity types, attributes and references as plain data.
//! - Serve descriptors to the write path through `SchemaService`.
//!
//! # Invariants
//! - Descriptors are frozen behind `Arc` once `SchemaBuilder::build` returns.
//! - Every reference target names a registered entity type.
//! - Every declared opposite names a reference on the target type.
//! - Feature names are unique per entity type.

use crate::dialect::decimal::{DecimalType, DecimalTypeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Annotation key carrying a minimum string length.
pub const MIN_LENGTH_ANNOTATION: &str = "minLength";
/// Annotation key carrying a maximum string length.
pub const MAX_LENGTH_ANNOTATION: &str = "maxLength";
/// Annotation key carrying a regular expression the whole value must match.
pub const PATTERN_ANNOTATION: &str = "pattern";

/// Logical attribute type, independent of any SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeType {
    String,
    Integer,
    Long,
    Double,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    Bytes,
    Json,
}

impl RuntimeType {
    pub const ALL: [RuntimeType; 11] = [
        RuntimeType::String,
        RuntimeType::Integer,
        RuntimeType::Long,
        RuntimeType::Double,
        RuntimeType::Decimal,
        RuntimeType::Boolean,
        RuntimeType::Timestamp,
        RuntimeType::Date,
        RuntimeType::Uuid,
        RuntimeType::Bytes,
        RuntimeType::Json,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Bytes => "bytes",
            Self::Json => "json",
        }
    }
}

impl Display for RuntimeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable reference to one feature of one entity type, rendered `Type.feature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureRef {
    pub entity_type: String,
    pub feature: String,
}

impl FeatureRef {
    pub fn new(entity_type: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            feature: feature.into(),
        }
    }

    /// Parses the `Type.feature` form. The feature part is everything after
    /// the last dot so namespaced type names survive.
    pub fn parse(value: &str) -> Option<Self> {
        let (entity_type, feature) = value.rsplit_once('.')?;
        if entity_type.is_empty() || feature.is_empty() {
            return None;
        }
        Some(Self::new(entity_type, feature))
    }
}

impl Display for FeatureRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.entity_type, self.feature)
    }
}

/// Attribute (column-like feature) of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    name: String,
    runtime_type: RuntimeType,
    length: Option<u32>,
    decimal: Option<DecimalType>,
    required: bool,
    annotations: BTreeMap<String, String>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, runtime_type: RuntimeType) -> Self {
        Self {
            name: name.into(),
            runtime_type,
            length: None,
            decimal: None,
            required: false,
            annotations: BTreeMap::new(),
        }
    }

    /// Decimal attribute with validated precision/scale.
    ///
    /// # Errors
    /// Propagates `DecimalTypeError` for out-of-range declarations, so a bad
    /// schema fails at construction rather than at render time.
    pub fn decimal(
        name: impl Into<String>,
        precision: Option<u32>,
        scale: Option<u32>,
    ) -> Result<Self, DecimalTypeError> {
        let decimal = DecimalType::new(precision, scale)?;
        let mut attribute = Self::new(name, RuntimeType::Decimal);
        attribute.decimal = Some(decimal);
        Ok(attribute)
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    pub fn length(&self) -> Option<u32> {
        self.length
    }

    /// Decimal declaration; unbounded for decimal attributes built with `new`.
    pub fn decimal_type(&self) -> Option<DecimalType> {
        match self.runtime_type {
            RuntimeType::Decimal => Some(self.decimal.unwrap_or_default()),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }
}

/// Reference (edge-like feature) from an owning entity type to a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    name: String,
    owner: String,
    target: String,
    containment: bool,
    many: bool,
    required: bool,
    opposite: Option<String>,
}

impl ReferenceDescriptor {
    /// Creates a single-valued, non-containment reference. The owner is
    /// assigned when the reference is added to an `EntityTypeDescriptor`.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: String::new(),
            target: target.into(),
            containment: false,
            many: false,
            required: false,
            opposite: None,
        }
    }

    pub fn containment(mut self) -> Self {
        self.containment = true;
        self
    }

    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_opposite(mut self, opposite: impl Into<String>) -> Self {
        self.opposite = Some(opposite.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_containment(&self) -> bool {
        self.containment
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn opposite(&self) -> Option<&str> {
        self.opposite.as_deref()
    }

    pub fn feature_ref(&self) -> FeatureRef {
        FeatureRef::new(self.owner.as_str(), self.name.as_str())
    }
}

/// One feature of an entity type, as seen by validators.
#[derive(Debug, Clone, Copy)]
pub enum Feature<'a> {
    Attribute(&'a AttributeDescriptor),
    Reference(&'a ReferenceDescriptor),
}

impl Feature<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Attribute(attribute) => attribute.name(),
            Self::Reference(reference) => reference.name(),
        }
    }
}

/// Entity type descriptor: name plus ordered attributes and references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeDescriptor {
    name: String,
    attributes: Vec<Arc<AttributeDescriptor>>,
    references: Vec<Arc<ReferenceDescriptor>>,
}

impl EntityTypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    pub fn with_reference(mut self, mut reference: ReferenceDescriptor) -> Self {
        reference.owner = self.name.clone();
        self.references.push(Arc::new(reference));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Arc<AttributeDescriptor>] {
        &self.attributes
    }

    pub fn references(&self) -> &[Arc<ReferenceDescriptor>] {
        &self.references
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<AttributeDescriptor>> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name() == name)
    }

    pub fn reference(&self, name: &str) -> Option<&Arc<ReferenceDescriptor>> {
        self.references
            .iter()
            .find(|reference| reference.name() == name)
    }

    /// All features in declaration order: attributes first, then references.
    pub fn features(&self) -> impl Iterator<Item = Feature<'_>> {
        self.attributes
            .iter()
            .map(|attribute| Feature::Attribute(attribute.as_ref()))
            .chain(
                self.references
                    .iter()
                    .map(|reference| Feature::Reference(reference.as_ref())),
            )
    }
}

/// Read-only schema access used by every write-path component.
pub trait SchemaService: Send + Sync {
    /// Looks up one entity type by name.
    fn entity_type_of(&self, name: &str) -> Option<Arc<EntityTypeDescriptor>>;
    /// Non-containment references, owned by any type, that target `target`.
    fn incoming_references(&self, target: &str) -> Vec<Arc<ReferenceDescriptor>>;
    /// Containment references, owned by any type, that target `target`.
    fn containers_of(&self, target: &str) -> Vec<Arc<ReferenceDescriptor>>;
}

/// Schema declaration errors raised by `SchemaBuilder::build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyName,
    DuplicateEntityType(String),
    DuplicateFeature {
        entity_type: String,
        feature: String,
    },
    UnknownReferenceTarget {
        reference: FeatureRef,
        target: String,
    },
    UnknownOpposite {
        reference: FeatureRef,
        opposite: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "schema names must not be empty"),
            Self::DuplicateEntityType(name) => write!(f, "entity type declared twice: {name}"),
            Self::DuplicateFeature {
                entity_type,
                feature,
            } => write!(f, "feature `{feature}` declared twice on `{entity_type}`"),
            Self::UnknownReferenceTarget { reference, target } => {
                write!(f, "reference {reference} targets unknown type `{target}`")
            }
            Self::UnknownOpposite {
                reference,
                opposite,
            } => write!(
                f,
                "reference {reference} declares unknown opposite `{opposite}`"
            ),
        }
    }
}

impl Error for SchemaError {}

/// Collects entity type declarations and freezes them into a `Schema`.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entity_types: Vec<EntityTypeDescriptor>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_type(mut self, entity_type: EntityTypeDescriptor) -> Self {
        self.entity_types.push(entity_type);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types: BTreeMap<String, Arc<EntityTypeDescriptor>> = BTreeMap::new();
        for entity_type in self.entity_types {
            if entity_type.name().trim().is_empty() {
                return Err(SchemaError::EmptyName);
            }
            let mut seen = BTreeSet::new();
            for feature in entity_type.features() {
                if feature.name().trim().is_empty() {
                    return Err(SchemaError::EmptyName);
                }
                if !seen.insert(feature.name().to_string()) {
                    return Err(SchemaError::DuplicateFeature {
                        entity_type: entity_type.name().to_string(),
                        feature: feature.name().to_string(),
                    });
                }
            }
            let name = entity_type.name().to_string();
            if types.contains_key(name.as_str()) {
                return Err(SchemaError::DuplicateEntityType(name));
            }
            types.insert(name, Arc::new(entity_type));
        }

        let mut incoming: BTreeMap<String, Vec<Arc<ReferenceDescriptor>>> = BTreeMap::new();
        let mut containers: BTreeMap<String, Vec<Arc<ReferenceDescriptor>>> = BTreeMap::new();
        for entity_type in types.values() {
            for reference in entity_type.references() {
                let Some(target) = types.get(reference.target()) else {
                    return Err(SchemaError::UnknownReferenceTarget {
                        reference: reference.feature_ref(),
                        target: reference.target().to_string(),
                    });
                };
                if let Some(opposite) = reference.opposite() {
                    if target.reference(opposite).is_none() {
                        return Err(SchemaError::UnknownOpposite {
                            reference: reference.feature_ref(),
                            opposite: opposite.to_string(),
                        });
                    }
                }
                let index = if reference.is_containment() {
                    &mut containers
                } else {
                    &mut incoming
                };
                index
                    .entry(reference.target().to_string())
                    .or_default()
                    .push(Arc::clone(reference));
            }
        }

        Ok(Schema {
            types,
            incoming,
            containers,
        })
    }
}

/// In-memory schema, immutable after build.
#[derive(Debug, Clone)]
pub struct Schema {
    types: BTreeMap<String, Arc<EntityTypeDescriptor>>,
    incoming: BTreeMap<String, Vec<Arc<ReferenceDescriptor>>>,
    containers: BTreeMap<String, Vec<Arc<ReferenceDescriptor>>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn entity_type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

impl SchemaService for Schema {
    fn entity_type_of(&self, name: &str) -> Option<Arc<EntityTypeDescriptor>> {
        self.types.get(name).cloned()
    }

    fn incoming_references(&self, target: &str) -> Vec<Arc<ReferenceDescriptor>> {
        self.incoming.get(target).cloned().unwrap_or_default()
    }

    fn containers_of(&self, target: &str) -> Vec<Arc<ReferenceDescriptor>> {
        self.containers.get(target).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AttributeDescriptor, EntityTypeDescriptor, FeatureRef, ReferenceDescriptor,
        RuntimeType, Schema, SchemaError, SchemaService,
    };

    fn order_schema() -> Schema {
        Schema::builder()
            .entity_type(
                EntityTypeDescriptor::new("Order")
                    .with_attribute(AttributeDescriptor::new("code", RuntimeType::String))
                    .with_reference(ReferenceDescriptor::new("lines", "Line").containment().many())
                    .with_reference(ReferenceDescriptor::new("customer", "Customer")),
            )
            .entity_type(EntityTypeDescriptor::new("Line"))
            .entity_type(EntityTypeDescriptor::new("Customer"))
            .build()
            .expect("valid schema")
    }

    #[test]
    fn assigns_reference_owner_on_declaration() {
        let schema = order_schema();
        let order = schema.entity_type_of("Order").expect("order type");
        let lines = order.reference("lines").expect("lines reference");
        assert_eq!(lines.owner(), "Order");
        assert_eq!(lines.feature_ref(), FeatureRef::new("Order", "lines"));
    }

    #[test]
    fn indexes_containers_apart_from_incoming_references() {
        let schema = order_schema();
        let incoming = schema.incoming_references("Customer");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].name(), "customer");
        assert!(schema.incoming_references("Line").is_empty());
        let containers = schema.containers_of("Line");
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].feature_ref(), FeatureRef::new("Order", "lines"));
    }

    #[test]
    fn rejects_unknown_reference_target() {
        let err = Schema::builder()
            .entity_type(
                EntityTypeDescriptor::new("Order")
                    .with_reference(ReferenceDescriptor::new("customer", "Nobody")),
            )
            .build()
            .expect_err("unknown target must fail");
        assert!(matches!(err, SchemaError::UnknownReferenceTarget { .. }));
    }

    #[test]
    fn rejects_duplicate_feature_names() {
        let err = Schema::builder()
            .entity_type(
                EntityTypeDescriptor::new("Order")
                    .with_attribute(AttributeDescriptor::new("code", RuntimeType::String))
                    .with_attribute(AttributeDescriptor::new("code", RuntimeType::Long)),
            )
            .build()
            .expect_err("duplicate feature must fail");
        assert!(matches!(err, SchemaError::DuplicateFeature { .. }));
    }

    #[test]
    fn feature_ref_parses_namespaced_types() {
        let parsed = FeatureRef::parse("sales.Order.lines").expect("parse");
        assert_eq!(parsed.entity_type, "sales.Order");
        assert_eq!(parsed.feature, "lines");
        assert!(FeatureRef::parse("nodot").is_none());
    }
}
