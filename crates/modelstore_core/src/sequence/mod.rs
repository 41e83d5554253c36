//! Named monotonic sequences for surrogate ids and version numbers.
//!
//! # Responsibility
//! - Define the allocator contract shared by every backend.
//! - Sanitize logical sequence names into SQL identifiers.
//!
//! # Invariants
//! - Allocation is atomic per name: concurrent `next_value` calls never
//!   return the same value.
//! - Values for one name form an arithmetic progression with its increment.
//! - Failed backend calls propagate immediately; allocation is never retried.

pub mod backend;
pub mod memory;

use crate::dialect::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use backend::BackendSequences;
pub use memory::InMemorySequences;

static NON_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid identifier regex"));

pub type SequenceResult<T> = Result<T, SequenceError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// Backend rejected the create or select statement.
    SequenceUnavailable { name: String, message: String },
    /// No execution strategy is registered for the dialect.
    UnsupportedDialect(Dialect),
    /// Sequence spec is unusable (blank name, zero increment).
    InvalidSpec(String),
}

impl Display for SequenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SequenceUnavailable { name, message } => {
                write!(f, "sequence `{name}` unavailable: {message}")
            }
            Self::UnsupportedDialect(dialect) => {
                write!(f, "dialect `{dialect}` has no sequence strategy")
            }
            Self::InvalidSpec(message) => write!(f, "invalid sequence spec: {message}"),
        }
    }
}

impl Error for SequenceError {}

/// Declaration of one named sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSpec {
    pub name: String,
    pub start: i64,
    /// `None` means an increment of 1.
    pub increment: Option<i64>,
    pub create_if_not_exists: bool,
}

impl SequenceSpec {
    /// Sequence starting at 1 with increment 1, created on first use.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 1,
            increment: None,
            create_if_not_exists: true,
        }
    }

    pub fn starting_at(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    pub fn incrementing_by(mut self, increment: i64) -> Self {
        self.increment = Some(increment);
        self
    }

    pub fn without_create(mut self) -> Self {
        self.create_if_not_exists = false;
        self
    }

    pub fn effective_increment(&self) -> i64 {
        self.increment.unwrap_or(1)
    }

    pub(crate) fn validate(&self) -> SequenceResult<()> {
        if self.name.trim().is_empty() {
            return Err(SequenceError::InvalidSpec(
                "sequence name must not be blank".to_string(),
            ));
        }
        if self.effective_increment() == 0 {
            return Err(SequenceError::InvalidSpec(format!(
                "sequence `{}` has a zero increment",
                self.name
            )));
        }
        Ok(())
    }
}

/// Allocator contract shared by the in-memory and backend variants.
pub trait SequenceAllocator: Send + Sync {
    /// Registers a sequence declaration. The first declaration of a name
    /// wins; undeclared names are declared with `SequenceSpec::new` on
    /// first use.
    fn define(&self, spec: SequenceSpec) -> SequenceResult<()>;
    /// Allocates and returns the next value.
    fn next_value(&self, name: &str) -> SequenceResult<i64>;
    /// Returns the last allocated value without allocating.
    fn current_value(&self, name: &str) -> SequenceResult<i64>;
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_sequence_name(name: &str) -> String {
    NON_IDENTIFIER_RE.replace_all(name, "_").into_owned()
}
