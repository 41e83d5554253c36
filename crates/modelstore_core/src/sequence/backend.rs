//! Sequences delegated to the database's native (or emulated) sequences.
//!
//! # Invariants
//! - Atomicity is the backend's: every allocation is one statement.
//! - The create statements run at most once per sanitized name per
//!   allocator instance.
//! - Logical names that sanitize to the same identifier share one backend
//!   sequence.

use crate::db::{DbError, SqlExecutor};
use crate::dialect::{Dialect, SequenceStatements};
use crate::sequence::{
    sanitize_sequence_name, SequenceAllocator, SequenceError, SequenceResult, SequenceSpec,
};
use log::{debug, error};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct BackendSequences {
    dialect: Dialect,
    statements: SequenceStatements,
    executor: Arc<dyn SqlExecutor>,
    specs: Mutex<HashMap<String, SequenceSpec>>,
    created: Mutex<HashSet<String>>,
}

impl BackendSequences {
    /// # Errors
    /// `UnsupportedDialect` when `dialect` has no sequence statements.
    pub fn new(dialect: Dialect, executor: Arc<dyn SqlExecutor>) -> SequenceResult<Self> {
        let statements = dialect
            .strategy()
            .sequence
            .ok_or(SequenceError::UnsupportedDialect(dialect))?;
        Ok(Self {
            dialect,
            statements,
            executor,
            specs: Mutex::new(HashMap::new()),
            created: Mutex::new(HashSet::new()),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn spec_for(&self, name: &str) -> SequenceResult<SequenceSpec> {
        let mut specs = self.specs.lock();
        if let Some(spec) = specs.get(name) {
            return Ok(spec.clone());
        }
        let spec = SequenceSpec::new(name);
        spec.validate()?;
        specs.insert(name.to_string(), spec.clone());
        Ok(spec)
    }

    /// Runs the create statements once and returns the backend identifier.
    fn ensure_created(&self, spec: &SequenceSpec) -> SequenceResult<String> {
        let sanitized = sanitize_sequence_name(&spec.name);
        if !spec.create_if_not_exists {
            return Ok(sanitized);
        }

        let mut created = self.created.lock();
        if created.contains(&sanitized) {
            return Ok(sanitized);
        }
        let statements = (self.statements.create)(
            &sanitized,
            spec.start,
            spec.effective_increment(),
        );
        for statement in statements {
            self.executor
                .execute(&statement)
                .map_err(|err| unavailable(&spec.name, "create", err))?;
        }
        debug!(
            "event=sequence_define module=sequence status=ok backend={} name={}",
            self.dialect, sanitized
        );
        created.insert(sanitized.clone());
        Ok(sanitized)
    }

    fn query(&self, name: &str, op: &str, sql: &str) -> SequenceResult<i64> {
        match self.executor.query_i64(sql) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                error!(
                    "event=sequence_{op} module=sequence status=error backend={} name={} error_code=no_row",
                    self.dialect, name
                );
                Err(SequenceError::SequenceUnavailable {
                    name: name.to_string(),
                    message: "statement returned no value".to_string(),
                })
            }
            Err(err) => Err(unavailable(name, op, err)),
        }
    }
}

fn unavailable(name: &str, op: &str, err: DbError) -> SequenceError {
    error!(
        "event=sequence_{op} module=sequence status=error name={name} error_code=backend_failed error={err}"
    );
    SequenceError::SequenceUnavailable {
        name: name.to_string(),
        message: err.to_string(),
    }
}

impl SequenceAllocator for BackendSequences {
    fn define(&self, spec: SequenceSpec) -> SequenceResult<()> {
        spec.validate()?;
        let spec = {
            let mut specs = self.specs.lock();
            specs.entry(spec.name.clone()).or_insert(spec).clone()
        };
        self.ensure_created(&spec)?;
        Ok(())
    }

    fn next_value(&self, name: &str) -> SequenceResult<i64> {
        let spec = self.spec_for(name)?;
        let sanitized = self.ensure_created(&spec)?;
        self.query(name, "next", &(self.statements.next_value)(&sanitized))
    }

    fn current_value(&self, name: &str) -> SequenceResult<i64> {
        let spec = self.spec_for(name)?;
        let sanitized = self.ensure_created(&spec)?;
        self.query(name, "current", &(self.statements.current_value)(&sanitized))
    }
}

#[cfg(test)]
mod tests {
    use super::BackendSequences;
    use crate::db::{DbError, DbResult, SqlExecutor, SqliteDataSource};
    use crate::dialect::Dialect;
    use crate::sequence::{SequenceAllocator, SequenceError, SequenceSpec};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records statements and fails every call.
    #[derive(Default)]
    struct RejectingExecutor {
        seen: Mutex<Vec<String>>,
    }

    impl SqlExecutor for RejectingExecutor {
        fn execute(&self, sql: &str) -> DbResult<()> {
            self.seen.lock().push(sql.to_string());
            Err(DbError::Sqlite(rusqlite::Error::InvalidQuery))
        }

        fn query_i64(&self, sql: &str) -> DbResult<Option<i64>> {
            self.seen.lock().push(sql.to_string());
            Err(DbError::Sqlite(rusqlite::Error::InvalidQuery))
        }
    }

    fn sqlite_sequences() -> BackendSequences {
        let source = SqliteDataSource::in_memory().unwrap();
        BackendSequences::new(Dialect::Sqlite, Arc::new(source)).unwrap()
    }

    #[test]
    fn sqlite_emulation_allocates_from_start() {
        let sequences = sqlite_sequences();
        sequences
            .define(SequenceSpec::new("Order.id").starting_at(10).incrementing_by(5))
            .unwrap();
        assert_eq!(sequences.next_value("Order.id").unwrap(), 10);
        assert_eq!(sequences.next_value("Order.id").unwrap(), 15);
        assert_eq!(sequences.current_value("Order.id").unwrap(), 15);
    }

    #[test]
    fn undefined_names_are_created_on_first_use() {
        let sequences = sqlite_sequences();
        assert_eq!(sequences.next_value("Line.version").unwrap(), 1);
        assert_eq!(sequences.next_value("Line.version").unwrap(), 2);
    }

    #[test]
    fn mysql_is_unsupported() {
        let source = SqliteDataSource::in_memory().unwrap();
        let err = BackendSequences::new(Dialect::MySql, Arc::new(source))
            .err()
            .unwrap();
        assert_eq!(err, SequenceError::UnsupportedDialect(Dialect::MySql));
    }

    #[test]
    fn backend_failure_is_sequence_unavailable() {
        let executor = Arc::new(RejectingExecutor::default());
        let sequences = BackendSequences::new(Dialect::Postgres, executor.clone()).unwrap();

        let err = sequences.next_value("Order.id").unwrap_err();
        assert!(matches!(err, SequenceError::SequenceUnavailable { ref name, .. } if name == "Order.id"));
        assert_eq!(
            executor.seen.lock().as_slice(),
            ["CREATE SEQUENCE IF NOT EXISTS Order_id START WITH 1 INCREMENT BY 1".to_string()]
        );
    }

    #[test]
    fn without_create_skips_create_statement() {
        let executor = Arc::new(RejectingExecutor::default());
        let sequences = BackendSequences::new(Dialect::H2, executor.clone()).unwrap();
        sequences
            .define(SequenceSpec::new("Order.id").without_create())
            .unwrap();

        assert!(sequences.next_value("Order.id").is_err());
        assert_eq!(
            executor.seen.lock().as_slice(),
            ["SELECT NEXT VALUE FOR Order_id".to_string()]
        );
    }
}
