//! Instance, attribute and reference values.
//!
//! # Responsibility
//! - Carry one row's logical content between the write path and storage.
//! - Reject construction that would break the value-model invariants.
//!
//! # Invariants
//! - Every `AttributeValue` has a descriptor and an assignable value.
//! - `InstanceValue` attribute order is call order; it drives diagnostics
//!   and column ordering.
//! - Values are immutable; `with_*` methods return new values.

use crate::model::schema::{AttributeDescriptor, ReferenceDescriptor, RuntimeType};
use crate::model::InstanceId;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Value-model invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    MissingEntityType,
    MissingIdentifier,
    NotAssignable {
        attribute: String,
        expected: RuntimeType,
        actual: RuntimeType,
    },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEntityType => {
                write!(f, "invariant violation: instance value requires an entity type")
            }
            Self::MissingIdentifier => {
                write!(f, "invariant violation: instance value requires an identifier")
            }
            Self::NotAssignable {
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "invariant violation: `{attribute}` expects {expected}, got {actual}"
            ),
        }
    }
}

impl Error for ModelError {}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    /// Runtime type of this value; `None` for `Null`.
    pub fn runtime_type(&self) -> Option<RuntimeType> {
        match self {
            Self::Null => None,
            Self::String(_) => Some(RuntimeType::String),
            Self::Integer(_) => Some(RuntimeType::Integer),
            Self::Long(_) => Some(RuntimeType::Long),
            Self::Double(_) => Some(RuntimeType::Double),
            Self::Decimal(_) => Some(RuntimeType::Decimal),
            Self::Boolean(_) => Some(RuntimeType::Boolean),
            Self::Timestamp(_) => Some(RuntimeType::Timestamp),
            Self::Date(_) => Some(RuntimeType::Date),
            Self::Uuid(_) => Some(RuntimeType::Uuid),
            Self::Bytes(_) => Some(RuntimeType::Bytes),
            Self::Json(_) => Some(RuntimeType::Json),
        }
    }

    /// Whether this value can be stored in an attribute of `target` type.
    ///
    /// `Null` is assignable everywhere; requiredness is a validation concern.
    /// An `Integer` widens to `Long`.
    pub fn is_assignable_to(&self, target: RuntimeType) -> bool {
        match self.runtime_type() {
            None => true,
            Some(RuntimeType::Integer) => {
                matches!(target, RuntimeType::Integer | RuntimeType::Long)
            }
            Some(actual) => actual == target,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::String(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Timestamp(value) => {
                f.write_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Self::Uuid(value) => write!(f, "{value}"),
            Self::Bytes(value) => write!(f, "<{} bytes>", value.len()),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

/// One attribute of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    attribute: Arc<AttributeDescriptor>,
    value: Value,
}

impl AttributeValue {
    /// # Errors
    /// `NotAssignable` when `value` does not fit the declared runtime type.
    pub fn new(attribute: Arc<AttributeDescriptor>, value: Value) -> Result<Self, ModelError> {
        if !value.is_assignable_to(attribute.runtime_type()) {
            return Err(ModelError::NotAssignable {
                attribute: attribute.name().to_string(),
                expected: attribute.runtime_type(),
                actual: value.runtime_type().unwrap_or(attribute.runtime_type()),
            });
        }
        Ok(Self { attribute, value })
    }

    pub fn attribute(&self) -> &AttributeDescriptor {
        &self.attribute
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Logical content of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceValue {
    entity_type: String,
    id: InstanceId,
    attributes: Vec<AttributeValue>,
}

impl InstanceValue {
    pub fn builder() -> InstanceValueBuilder {
        InstanceValueBuilder::default()
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn attributes(&self) -> &[AttributeValue] {
        &self.attributes
    }

    /// Value of the first attribute named `name`.
    pub fn attribute_value(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|attribute| attribute.attribute().name() == name)
            .map(AttributeValue::value)
    }

    /// Returns a copy with one attribute appended after the existing ones.
    pub fn with_attribute_value(
        &self,
        attribute: Arc<AttributeDescriptor>,
        value: Value,
    ) -> Result<Self, ModelError> {
        let mut next = self.clone();
        next.attributes.push(AttributeValue::new(attribute, value)?);
        Ok(next)
    }
}

impl Display for InstanceValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.entity_type, self.id)
    }
}

/// Builder for `InstanceValue`; entity type and identifier are mandatory.
#[derive(Debug, Default)]
pub struct InstanceValueBuilder {
    entity_type: Option<String>,
    id: Option<InstanceId>,
    attributes: Vec<(Arc<AttributeDescriptor>, Value)>,
}

impl InstanceValueBuilder {
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn id(mut self, id: impl Into<InstanceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn attribute(mut self, attribute: Arc<AttributeDescriptor>, value: Value) -> Self {
        self.attributes.push((attribute, value));
        self
    }

    /// # Errors
    /// - `MissingEntityType` / `MissingIdentifier` when either is unset or blank.
    /// - `NotAssignable` for the first attribute whose value does not fit.
    pub fn build(self) -> Result<InstanceValue, ModelError> {
        let entity_type = self
            .entity_type
            .filter(|value| !value.trim().is_empty())
            .ok_or(ModelError::MissingEntityType)?;
        let id = self
            .id
            .filter(|value| !value.trim().is_empty())
            .ok_or(ModelError::MissingIdentifier)?;
        let attributes = self
            .attributes
            .into_iter()
            .map(|(attribute, value)| AttributeValue::new(attribute, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InstanceValue {
            entity_type,
            id,
            attributes,
        })
    }
}

/// Links from one instance through one reference feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceValue {
    entity_type: String,
    id: InstanceId,
    reference: Arc<ReferenceDescriptor>,
    opposite_ids: BTreeSet<InstanceId>,
}

impl ReferenceValue {
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<InstanceId>,
        reference: Arc<ReferenceDescriptor>,
        opposite_ids: BTreeSet<InstanceId>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            reference,
            opposite_ids,
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn reference(&self) -> &Arc<ReferenceDescriptor> {
        &self.reference
    }

    pub fn opposite_ids(&self) -> &BTreeSet<InstanceId> {
        &self.opposite_ids
    }

    /// `true` when the instance has no links through this feature.
    pub fn is_empty(&self) -> bool {
        self.opposite_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{InstanceValue, ModelError, Value};
    use crate::model::schema::{AttributeDescriptor, RuntimeType};
    use std::sync::Arc;

    fn name_attribute() -> Arc<AttributeDescriptor> {
        Arc::new(AttributeDescriptor::new("name", RuntimeType::String))
    }

    #[test]
    fn builder_rejects_missing_entity_type_and_identifier() {
        let err = InstanceValue::builder().id("a-1").build().unwrap_err();
        assert_eq!(err, ModelError::MissingEntityType);

        let err = InstanceValue::builder()
            .entity_type("Order")
            .id("  ")
            .build()
            .unwrap_err();
        assert_eq!(err, ModelError::MissingIdentifier);
    }

    #[test]
    fn attributes_keep_call_order() {
        let code = Arc::new(AttributeDescriptor::new("code", RuntimeType::Long));
        let value = InstanceValue::builder()
            .entity_type("Order")
            .id("a-1")
            .attribute(name_attribute(), Value::String("first".into()))
            .attribute(code, Value::Integer(7))
            .build()
            .unwrap();

        let names: Vec<&str> = value
            .attributes()
            .iter()
            .map(|attribute| attribute.attribute().name())
            .collect();
        assert_eq!(names, vec!["name", "code"]);
    }

    #[test]
    fn with_attribute_value_returns_new_value() {
        let original = InstanceValue::builder()
            .entity_type("Order")
            .id("a-1")
            .build()
            .unwrap();
        let next = original
            .with_attribute_value(name_attribute(), Value::String("x".into()))
            .unwrap();

        assert!(original.attributes().is_empty());
        assert_eq!(next.attribute_value("name"), Some(&Value::String("x".into())));
        assert_ne!(original, next);
    }

    #[test]
    fn rejects_unassignable_values() {
        let err = InstanceValue::builder()
            .entity_type("Order")
            .id("a-1")
            .attribute(name_attribute(), Value::Boolean(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::NotAssignable { .. }));
    }
}
