//! SQLite reference implementation of `InstanceQuery` and `WriteSink`.
//!
//! # Invariants
//! - Rows live in the generic `instances`, `attribute_values` and
//!   `reference_links` tables created by `crate::db::migrations`.
//! - Values are stored with SQLite's storage rules regardless of the plan's
//!   dialect, and decoded back by the attribute's runtime type.
//! - `apply` runs in one transaction.

use crate::db::SqliteDataSource;
use crate::dialect::SqlValue;
use crate::model::schema::{AttributeDescriptor, ReferenceDescriptor, RuntimeType, SchemaService};
use crate::model::value::{InstanceValue, ReferenceValue, Value};
use crate::model::InstanceId;
use crate::store::{InstanceQuery, StoreError, StoreResult, StoredInstance, WriteSink};
use crate::write::{RowChange, WritePlan};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::{debug, error};
use rusqlite::types::Value as SqliteValue;
use rusqlite::{params, params_from_iter, OptionalExtension, Transaction};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub struct SqliteInstanceStore {
    source: SqliteDataSource,
    schema: Arc<dyn SchemaService>,
}

impl SqliteInstanceStore {
    pub fn new(source: SqliteDataSource, schema: Arc<dyn SchemaService>) -> Self {
        Self { source, schema }
    }

    pub fn source(&self) -> &SqliteDataSource {
        &self.source
    }

    /// Groups `(source_id, target_id)` rows into one value per source.
    fn grouped_links(
        &self,
        sql: &str,
        params: Vec<SqliteValue>,
        reference: &Arc<ReferenceDescriptor>,
    ) -> StoreResult<Vec<ReferenceValue>> {
        let conn = self.source.connection();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut grouped: BTreeMap<InstanceId, BTreeSet<InstanceId>> = BTreeMap::new();
        for row in rows {
            let (source_id, target_id) = row?;
            grouped.entry(source_id).or_default().insert(target_id);
        }
        Ok(grouped
            .into_iter()
            .map(|(source_id, targets)| {
                ReferenceValue::new(reference.owner(), source_id, Arc::clone(reference), targets)
            })
            .collect())
    }
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn text_params<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<SqliteValue> {
    values
        .into_iter()
        .map(|value| SqliteValue::Text(value.to_string()))
        .collect()
}

impl InstanceQuery for SqliteInstanceStore {
    fn find_existing(
        &self,
        entity_type: &str,
        ids: &BTreeSet<InstanceId>,
    ) -> StoreResult<BTreeSet<InstanceId>> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let sql = format!(
            "SELECT id FROM instances WHERE entity_type = ?1 AND id IN ({})",
            placeholders(2, ids.len())
        );
        let mut params = text_params([entity_type]);
        params.extend(text_params(ids.iter().map(String::as_str)));

        let conn = self.source.connection();
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(params), |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(found)
    }

    fn find_links(
        &self,
        reference: &Arc<ReferenceDescriptor>,
        source_ids: &BTreeSet<InstanceId>,
    ) -> StoreResult<Vec<ReferenceValue>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT source_id, target_id FROM reference_links
             WHERE source_type = ?1 AND feature = ?2 AND source_id IN ({})",
            placeholders(3, source_ids.len())
        );
        let mut params = text_params([reference.owner(), reference.name()]);
        params.extend(text_params(source_ids.iter().map(String::as_str)));
        self.grouped_links(&sql, params, reference)
    }

    fn find_referrers(
        &self,
        reference: &Arc<ReferenceDescriptor>,
        target_ids: &BTreeSet<InstanceId>,
    ) -> StoreResult<Vec<ReferenceValue>> {
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT source_id, target_id FROM reference_links
             WHERE source_type = ?1 AND feature = ?2 AND target_type = ?3 AND target_id IN ({})",
            placeholders(4, target_ids.len())
        );
        let mut params = text_params([reference.owner(), reference.name(), reference.target()]);
        params.extend(text_params(target_ids.iter().map(String::as_str)));
        self.grouped_links(&sql, params, reference)
    }

    fn load_instance(&self, entity_type: &str, id: &str) -> StoreResult<Option<StoredInstance>> {
        let descriptor = self
            .schema
            .entity_type_of(entity_type)
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))?;

        let conn = self.source.connection();
        let version = conn
            .query_row(
                "SELECT version FROM instances WHERE entity_type = ?1 AND id = ?2",
                params![entity_type, id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let Some(version) = version else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT attribute, value FROM attribute_values
             WHERE entity_type = ?1 AND instance_id = ?2
             ORDER BY position",
        )?;
        let rows = stmt.query_map(params![entity_type, id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, SqliteValue>(1)?))
        })?;

        let mut builder = InstanceValue::builder().entity_type(entity_type).id(id);
        for row in rows {
            let (name, stored) = row?;
            let attribute = descriptor.attribute(&name).ok_or_else(|| {
                StoreError::InvalidData(format!("`{entity_type}` has no attribute `{name}`"))
            })?;
            let value = decode_stored(attribute, stored)?;
            builder = builder.attribute(Arc::clone(attribute), value);
        }
        Ok(Some(StoredInstance {
            value: builder.build()?,
            version,
        }))
    }
}

impl WriteSink for SqliteInstanceStore {
    fn apply(&self, plan: &WritePlan) -> StoreResult<()> {
        let started_at = Instant::now();
        let mut conn = self.source.connection();
        let tx = conn.transaction()?;
        match apply_plan(&tx, plan) {
            Ok(()) => {
                tx.commit()?;
                debug!(
                    "event=sink_apply module=store status=ok operation={} upserts={} deletes={} duration_ms={}",
                    plan.operation,
                    plan.upserts.len(),
                    plan.deletes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=sink_apply module=store status=error operation={} error={}",
                    plan.operation, err
                );
                Err(err)
            }
        }
    }
}

fn apply_plan(tx: &Transaction<'_>, plan: &WritePlan) -> StoreResult<()> {
    for unlink in &plan.unlinks {
        let reference = unlink.reference();
        for target in unlink.opposite_ids() {
            tx.execute(
                "DELETE FROM reference_links
                 WHERE source_type = ?1 AND source_id = ?2 AND feature = ?3 AND target_id = ?4",
                params![unlink.entity_type(), unlink.id(), reference.name(), target],
            )?;
        }
    }

    for key in &plan.deletes {
        tx.execute(
            "DELETE FROM instances WHERE entity_type = ?1 AND id = ?2",
            params![key.entity_type, key.id],
        )?;
    }

    let actor = plan.metadata.user_id();
    let at = plan
        .metadata
        .timestamp()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    for row in &plan.upserts {
        let key = &row.key;
        match row.change {
            RowChange::Insert => {
                tx.execute(
                    "INSERT INTO instances (entity_type, id, version, created_by, updated_by, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
                    params![key.entity_type, key.id, row.version, actor, at],
                )?;
            }
            RowChange::Update => {
                let changed = tx.execute(
                    "UPDATE instances SET version = ?3, updated_by = ?4, updated_at = ?5
                     WHERE entity_type = ?1 AND id = ?2",
                    params![key.entity_type, key.id, row.version, actor, at],
                )?;
                if changed == 0 {
                    return Err(StoreError::InvalidData(format!("{key} vanished before update")));
                }
            }
        }

        tx.execute(
            "DELETE FROM attribute_values WHERE entity_type = ?1 AND instance_id = ?2",
            params![key.entity_type, key.id],
        )?;
        for (position, column) in row.columns.iter().enumerate() {
            tx.execute(
                "INSERT INTO attribute_values (entity_type, instance_id, attribute, position, sql_type, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key.entity_type,
                    key.id,
                    column.attribute,
                    position as i64,
                    column.sql_type,
                    to_sqlite(&column.value)
                ],
            )?;
        }

        for link in &row.links {
            let reference = link.reference();
            tx.execute(
                "DELETE FROM reference_links WHERE source_type = ?1 AND source_id = ?2 AND feature = ?3",
                params![key.entity_type, key.id, reference.name()],
            )?;
            for target in link.opposite_ids() {
                tx.execute(
                    "INSERT INTO reference_links (source_type, source_id, feature, target_type, target_id, containment)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        key.entity_type,
                        key.id,
                        reference.name(),
                        reference.target(),
                        target,
                        i64::from(reference.is_containment())
                    ],
                )?;
            }
        }
    }
    Ok(())
}

fn to_sqlite(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Boolean(flag) => SqliteValue::Integer(i64::from(*flag)),
        SqlValue::Integer(number) => SqliteValue::Integer(*number),
        SqlValue::Real(number) => SqliteValue::Real(*number),
        SqlValue::Text(text) => SqliteValue::Text(text.clone()),
        SqlValue::Bytes(bytes) => SqliteValue::Blob(bytes.clone()),
        SqlValue::Decimal(decimal) => SqliteValue::Text(decimal.to_string()),
        SqlValue::Timestamp(at) => {
            SqliteValue::Text(at.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        SqlValue::Date(date) => SqliteValue::Text(date.format("%Y-%m-%d").to_string()),
        SqlValue::Uuid(uuid) => SqliteValue::Text(uuid.to_string()),
        SqlValue::Json(json) => SqliteValue::Text(json.to_string()),
    }
}

fn decode_stored(attribute: &AttributeDescriptor, stored: SqliteValue) -> StoreResult<Value> {
    let invalid = |stored: &SqliteValue| {
        StoreError::InvalidData(format!(
            "attribute `{}` ({}) holds {:?}",
            attribute.name(),
            attribute.runtime_type(),
            stored.data_type()
        ))
    };
    let value = match (attribute.runtime_type(), stored) {
        (_, SqliteValue::Null) => Value::Null,
        (RuntimeType::String, SqliteValue::Text(text)) => Value::String(text),
        (RuntimeType::Integer, SqliteValue::Integer(number)) => {
            let narrow = i32::try_from(number)
                .map_err(|_| invalid(&SqliteValue::Integer(number)))?;
            Value::Integer(narrow)
        }
        (RuntimeType::Long, SqliteValue::Integer(number)) => Value::Long(number),
        (RuntimeType::Double, SqliteValue::Real(number)) => Value::Double(number),
        (RuntimeType::Double, SqliteValue::Integer(number)) => Value::Double(number as f64),
        (RuntimeType::Boolean, SqliteValue::Integer(number)) => Value::Boolean(number != 0),
        (RuntimeType::Bytes, SqliteValue::Blob(bytes)) => Value::Bytes(bytes),
        (runtime_type, SqliteValue::Text(text)) => {
            decode_text(runtime_type, &text).ok_or_else(|| invalid(&SqliteValue::Text(text)))?
        }
        (_, other) => return Err(invalid(&other)),
    };
    Ok(value)
}

fn decode_text(runtime_type: RuntimeType, text: &str) -> Option<Value> {
    match runtime_type {
        RuntimeType::Decimal => Decimal::from_str(text).ok().map(Value::Decimal),
        RuntimeType::Timestamp => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| Value::Timestamp(at.with_timezone(&Utc))),
        RuntimeType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        RuntimeType::Uuid => Uuid::parse_str(text).ok().map(Value::Uuid),
        RuntimeType::Json => serde_json::from_str(text).ok().map(Value::Json),
        _ => None,
    }
}
