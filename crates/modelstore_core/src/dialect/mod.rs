//! Relational dialect strategies.
//!
//! # Responsibility
//! - Name the supported backends and parse their tags.
//! - Hold per-dialect behavior as plain data: SQL type overrides, storage
//!   representation rules and sequence statements.
//!
//! # Invariants
//! - Strategy tables are `'static` and never mutated.
//! - A dialect without `sequence` statements cannot back durable sequences.

pub mod decimal;
pub mod types;

use crate::model::schema::{AttributeDescriptor, RuntimeType};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use decimal::{render_decimal, DecimalType, DecimalTypeError, MAX_PRECISION, MAX_SCALE};
pub use types::{sql_type_for, SqlValue, TypeMapper};

/// Supported relational backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    Postgres,
    H2,
    Sqlite,
    MySql,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [Dialect::Postgres, Dialect::H2, Dialect::Sqlite, Dialect::MySql];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::H2 => "h2",
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }

    /// Static strategy table for this dialect.
    pub fn strategy(self) -> &'static DialectStrategy {
        match self {
            Self::Postgres => &POSTGRES,
            Self::H2 => &H2,
            Self::Sqlite => &SQLITE,
            Self::MySql => &MYSQL,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = DialectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "h2" => Ok(Self::H2),
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::MySql),
            other => Err(DialectError::UnknownDialect(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialectError {
    UnknownDialect(String),
}

impl Display for DialectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownDialect(value) => write!(
                f,
                "unknown dialect `{value}`; expected postgres|h2|sqlite|mysql"
            ),
        }
    }
}

impl Error for DialectError {}

/// Maps one attribute descriptor to a SQL type token.
pub type SqlTypeFn = fn(&AttributeDescriptor) -> String;

/// How typed values are stored when the backend lacks a native column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageRules {
    pub boolean_as_integer: bool,
    pub decimal_as_text: bool,
    pub temporal_as_text: bool,
    pub uuid_as_text: bool,
    pub json_as_text: bool,
}

/// Statement builders for durable sequences. Names passed in are already
/// sanitized identifiers.
#[derive(Clone, Copy)]
pub struct SequenceStatements {
    /// Statements creating the sequence if absent: `(name, start, increment)`.
    pub create: fn(&str, i64, i64) -> Vec<String>,
    /// Single statement allocating and returning the next value.
    pub next_value: fn(&str) -> String,
    /// Single statement returning the last allocated value.
    pub current_value: fn(&str) -> String,
}

/// Per-dialect behavior as data.
pub struct DialectStrategy {
    pub dialect: Dialect,
    pub sql_type_overrides: &'static [(RuntimeType, SqlTypeFn)],
    pub storage: StorageRules,
    pub sequence: Option<SequenceStatements>,
}

/// Counter table used where the backend has no native sequences.
pub const SEQUENCE_TABLE: &str = "modelstore_sequences";

fn create_sequence_standard(name: &str, start: i64, increment: i64) -> Vec<String> {
    vec![format!(
        "CREATE SEQUENCE IF NOT EXISTS {name} START WITH {start} INCREMENT BY {increment}"
    )]
}

fn postgres_next_value(name: &str) -> String {
    format!("SELECT nextval('{name}')")
}

fn postgres_current_value(name: &str) -> String {
    format!("SELECT last_value FROM {name}")
}

fn h2_next_value(name: &str) -> String {
    format!("SELECT NEXT VALUE FOR {name}")
}

fn h2_current_value(name: &str) -> String {
    format!("SELECT CURRENT VALUE FOR {name}")
}

fn sqlite_create_sequence(name: &str, start: i64, increment: i64) -> Vec<String> {
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {SEQUENCE_TABLE} (
                name TEXT PRIMARY KEY NOT NULL,
                value INTEGER NOT NULL,
                increment INTEGER NOT NULL
            )"
        ),
        format!(
            "INSERT OR IGNORE INTO {SEQUENCE_TABLE} (name, value, increment)
             VALUES ('{name}', {}, {increment})",
            start - increment
        ),
    ]
}

fn sqlite_next_value(name: &str) -> String {
    format!(
        "UPDATE {SEQUENCE_TABLE} SET value = value + increment WHERE name = '{name}' RETURNING value"
    )
}

fn sqlite_current_value(name: &str) -> String {
    format!("SELECT value FROM {SEQUENCE_TABLE} WHERE name = '{name}'")
}

fn postgres_string(attribute: &AttributeDescriptor) -> String {
    match attribute.length() {
        Some(length) => format!("VARCHAR({length})"),
        None => "TEXT".to_string(),
    }
}

fn text(_: &AttributeDescriptor) -> String {
    "TEXT".to_string()
}

fn integer(_: &AttributeDescriptor) -> String {
    "INTEGER".to_string()
}

fn timestamptz(_: &AttributeDescriptor) -> String {
    "TIMESTAMPTZ".to_string()
}

fn timestamp_with_time_zone(_: &AttributeDescriptor) -> String {
    "TIMESTAMP WITH TIME ZONE".to_string()
}

fn bytea(_: &AttributeDescriptor) -> String {
    "BYTEA".to_string()
}

fn jsonb(_: &AttributeDescriptor) -> String {
    "JSONB".to_string()
}

fn json(_: &AttributeDescriptor) -> String {
    "JSON".to_string()
}

fn real(_: &AttributeDescriptor) -> String {
    "REAL".to_string()
}

fn double(_: &AttributeDescriptor) -> String {
    "DOUBLE".to_string()
}

fn datetime_millis(_: &AttributeDescriptor) -> String {
    "DATETIME(3)".to_string()
}

fn char_uuid(_: &AttributeDescriptor) -> String {
    "CHAR(36)".to_string()
}

static POSTGRES: DialectStrategy = DialectStrategy {
    dialect: Dialect::Postgres,
    sql_type_overrides: &[
        (RuntimeType::String, postgres_string),
        (RuntimeType::Timestamp, timestamptz),
        (RuntimeType::Bytes, bytea),
        (RuntimeType::Json, jsonb),
    ],
    storage: StorageRules {
        boolean_as_integer: false,
        decimal_as_text: false,
        temporal_as_text: false,
        uuid_as_text: false,
        json_as_text: false,
    },
    sequence: Some(SequenceStatements {
        create: create_sequence_standard,
        next_value: postgres_next_value,
        current_value: postgres_current_value,
    }),
};

static H2: DialectStrategy = DialectStrategy {
    dialect: Dialect::H2,
    sql_type_overrides: &[
        (RuntimeType::Timestamp, timestamp_with_time_zone),
        (RuntimeType::Json, json),
    ],
    storage: StorageRules {
        boolean_as_integer: false,
        decimal_as_text: false,
        temporal_as_text: false,
        uuid_as_text: false,
        json_as_text: false,
    },
    sequence: Some(SequenceStatements {
        create: create_sequence_standard,
        next_value: h2_next_value,
        current_value: h2_current_value,
    }),
};

static SQLITE: DialectStrategy = DialectStrategy {
    dialect: Dialect::Sqlite,
    sql_type_overrides: &[
        (RuntimeType::String, text),
        (RuntimeType::Integer, integer),
        (RuntimeType::Long, integer),
        (RuntimeType::Double, real),
        (RuntimeType::Decimal, text),
        (RuntimeType::Boolean, integer),
        (RuntimeType::Timestamp, text),
        (RuntimeType::Date, text),
        (RuntimeType::Uuid, text),
        (RuntimeType::Json, text),
    ],
    storage: StorageRules {
        boolean_as_integer: true,
        decimal_as_text: true,
        temporal_as_text: true,
        uuid_as_text: true,
        json_as_text: true,
    },
    sequence: Some(SequenceStatements {
        create: sqlite_create_sequence,
        next_value: sqlite_next_value,
        current_value: sqlite_current_value,
    }),
};

static MYSQL: DialectStrategy = DialectStrategy {
    dialect: Dialect::MySql,
    sql_type_overrides: &[
        (RuntimeType::Double, double),
        (RuntimeType::Timestamp, datetime_millis),
        (RuntimeType::Uuid, char_uuid),
        (RuntimeType::Json, json),
    ],
    storage: StorageRules {
        boolean_as_integer: false,
        decimal_as_text: false,
        temporal_as_text: false,
        uuid_as_text: true,
        json_as_text: false,
    },
    sequence: None,
};

#[cfg(test)]
mod tests {
    use super::Dialect;

    #[test]
    fn parses_dialect_tags_case_insensitively() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!(" h2 ".parse::<Dialect>().unwrap(), Dialect::H2);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn sequence_statements_use_the_given_parameters() {
        let statements = Dialect::Postgres
            .strategy()
            .sequence
            .expect("postgres sequences");
        assert_eq!(
            (statements.create)("Order_id", 10, 5),
            vec!["CREATE SEQUENCE IF NOT EXISTS Order_id START WITH 10 INCREMENT BY 5".to_string()]
        );
        assert_eq!((statements.next_value)("Order_id"), "SELECT nextval('Order_id')");
    }

    #[test]
    fn mysql_has_no_sequence_strategy() {
        assert!(Dialect::MySql.strategy().sequence.is_none());
    }
}
