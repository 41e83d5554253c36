//! Logical type → SQL type mapping and value rendering.
//!
//! # Responsibility
//! - Keep a per-dialect registry of SQL type renderers keyed by runtime type.
//! - Convert typed attribute values into their storage representation.
//!
//! # Invariants
//! - Every dialect starts from the base mapping and only overrides entries.
//! - Rendering never fails; invalid declarations are rejected when the
//!   descriptor is built.
//! - Overrides are registered before the mapper is shared across threads.

use crate::dialect::Dialect;
use crate::model::schema::{AttributeDescriptor, RuntimeType};
use crate::model::value::{AttributeValue, Value};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Renders the SQL type token for one attribute.
pub type SqlTypeRenderer = Box<dyn Fn(&AttributeDescriptor) -> String + Send + Sync>;

/// Storage representation of one attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Json(serde_json::Value),
}

pub struct TypeMapper {
    dialect: Dialect,
    registry: HashMap<RuntimeType, SqlTypeRenderer>,
}

impl TypeMapper {
    /// Base mapping with the dialect's overrides applied.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let mut mapper = Self {
            dialect,
            registry: HashMap::new(),
        };
        for runtime_type in RuntimeType::ALL {
            mapper.register(runtime_type, base_sql_type);
        }
        for (runtime_type, renderer) in dialect.strategy().sql_type_overrides {
            mapper.register(*runtime_type, *renderer);
        }
        mapper
    }

    /// Replaces the renderer for one runtime type.
    pub fn register<F>(&mut self, runtime_type: RuntimeType, renderer: F)
    where
        F: Fn(&AttributeDescriptor) -> String + Send + Sync + 'static,
    {
        self.registry.insert(runtime_type, Box::new(renderer));
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn sql_type_for(&self, attribute: &AttributeDescriptor) -> String {
        match self.registry.get(&attribute.runtime_type()) {
            Some(renderer) => renderer(attribute),
            None => base_sql_type(attribute),
        }
    }

    pub fn render_attribute(&self, attribute: &AttributeValue) -> SqlValue {
        self.render_value(attribute.value())
    }

    /// Storage representation of `value` for this mapper's dialect.
    pub fn render_value(&self, value: &Value) -> SqlValue {
        let rules = self.dialect.strategy().storage;
        match value {
            Value::Null => SqlValue::Null,
            Value::String(value) => SqlValue::Text(value.clone()),
            Value::Integer(value) => SqlValue::Integer(i64::from(*value)),
            Value::Long(value) => SqlValue::Integer(*value),
            Value::Double(value) => SqlValue::Real(*value),
            Value::Decimal(value) if rules.decimal_as_text => SqlValue::Text(value.to_string()),
            Value::Decimal(value) => SqlValue::Decimal(*value),
            Value::Boolean(value) if rules.boolean_as_integer => {
                SqlValue::Integer(i64::from(*value))
            }
            Value::Boolean(value) => SqlValue::Boolean(*value),
            Value::Timestamp(value) if rules.temporal_as_text => {
                SqlValue::Text(value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Timestamp(value) => SqlValue::Timestamp(*value),
            Value::Date(value) if rules.temporal_as_text => {
                SqlValue::Text(value.format("%Y-%m-%d").to_string())
            }
            Value::Date(value) => SqlValue::Date(*value),
            Value::Uuid(value) if rules.uuid_as_text => SqlValue::Text(value.to_string()),
            Value::Uuid(value) => SqlValue::Uuid(*value),
            Value::Bytes(value) => SqlValue::Bytes(value.clone()),
            Value::Json(value) if rules.json_as_text => SqlValue::Text(value.to_string()),
            Value::Json(value) => SqlValue::Json(value.clone()),
        }
    }
}

/// SQL type token for `attribute` under `dialect`.
pub fn sql_type_for(attribute: &AttributeDescriptor, dialect: Dialect) -> String {
    TypeMapper::for_dialect(dialect).sql_type_for(attribute)
}

fn base_sql_type(attribute: &AttributeDescriptor) -> String {
    match attribute.runtime_type() {
        RuntimeType::String => format!("VARCHAR({})", attribute.length().unwrap_or(255)),
        RuntimeType::Integer => "INTEGER".to_string(),
        RuntimeType::Long => "BIGINT".to_string(),
        RuntimeType::Double => "DOUBLE PRECISION".to_string(),
        RuntimeType::Decimal => attribute.decimal_type().unwrap_or_default().to_sql(),
        RuntimeType::Boolean => "BOOLEAN".to_string(),
        RuntimeType::Timestamp => "TIMESTAMP".to_string(),
        RuntimeType::Date => "DATE".to_string(),
        RuntimeType::Uuid => "UUID".to_string(),
        RuntimeType::Bytes => "BLOB".to_string(),
        RuntimeType::Json => "CLOB".to_string(),
    }
}
