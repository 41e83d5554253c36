//! Write orchestration: validation, identifier verification, graph
//! resolution, id/version allocation and rendering in one pass.
//!
//! # Responsibility
//! - Turn a create/update/delete payload into a `WritePlan` and hand it to
//!   a `WriteSink`.
//! - Re-sign every identifier in the response payload.
//!
//! # Invariants
//! - ERROR feedback, tampering, version conflicts and missing targets all
//!   reject the write before the sink is touched.
//! - Roots and contained children receive mutable tokens; non-owning
//!   references receive immutable ones.
//! - Ids come from `<Type>.id` sequences and versions from `<Type>.version`.

mod orchestrator;
mod plan;

use crate::graph::GraphError;
use crate::model::value::ModelError;
use crate::sequence::SequenceError;
use crate::signing::SigningError;
use crate::store::StoreError;
use crate::validation::{FeedbackItem, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use orchestrator::WriteOrchestrator;
pub use plan::{
    InstanceKey, RenderedColumn, RenderedInstance, RowChange, WriteOperation, WriteOutcome,
    WritePlan,
};

pub type WriteResult<T> = Result<T, WriteError>;

#[derive(Debug)]
pub enum WriteError {
    UnknownEntityType(String),
    /// Payload shape the write path cannot interpret.
    InvalidPayload(String),
    /// Aggregated ERROR feedback.
    Validation(Vec<FeedbackItem>),
    Signing(SigningError),
    NotFound(InstanceKey),
    /// Schema authoring or value-model invariant broken.
    Invariant(String),
    Sequence(SequenceError),
    Graph(GraphError),
    Store(StoreError),
}

impl WriteError {
    /// HTTP-style status class for callers mapping errors to responses.
    pub fn status_class(&self) -> u16 {
        match self {
            Self::UnknownEntityType(_) | Self::NotFound(_) => 404,
            Self::InvalidPayload(_) => 400,
            Self::Validation(_) => 422,
            Self::Signing(SigningError::MissingIdentifier) => 400,
            Self::Signing(SigningError::TamperDetected(_)) => 403,
            Self::Signing(SigningError::VersionConflict { .. }) => 409,
            Self::Signing(SigningError::InvalidKey(_) | SigningError::Encoding(_)) => 500,
            Self::Sequence(SequenceError::SequenceUnavailable { .. }) => 503,
            Self::Sequence(_) | Self::Invariant(_) | Self::Graph(_) | Self::Store(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_class())
    }

    /// Stable code for log lines.
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::UnknownEntityType(_) => "unknown_entity_type",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Validation(_) => "validation_failed",
            Self::Signing(SigningError::VersionConflict { .. }) => "version_conflict",
            Self::Signing(SigningError::TamperDetected(_)) => "tamper_detected",
            Self::Signing(_) => "signing_failed",
            Self::NotFound(_) => "not_found",
            Self::Invariant(_) => "invariant_violation",
            Self::Sequence(_) => "sequence_failed",
            Self::Graph(_) => "graph_failed",
            Self::Store(_) => "sink_failed",
        }
    }
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntityType(name) => write!(f, "unknown entity type `{name}`"),
            Self::InvalidPayload(message) => write!(f, "invalid payload: {message}"),
            Self::Validation(feedback) => {
                write!(f, "validation failed with {} item(s)", feedback.len())
            }
            Self::Signing(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "instance not found: {key}"),
            Self::Invariant(message) => write!(f, "{message}"),
            Self::Sequence(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Signing(err) => Some(err),
            Self::Sequence(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::UnknownEntityType(_)
            | Self::InvalidPayload(_)
            | Self::Validation(_)
            | Self::NotFound(_)
            | Self::Invariant(_) => None,
        }
    }
}

impl From<SigningError> for WriteError {
    fn from(value: SigningError) -> Self {
        Self::Signing(value)
    }
}

impl From<SequenceError> for WriteError {
    fn from(value: SequenceError) -> Self {
        Self::Sequence(value)
    }
}

impl From<GraphError> for WriteError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

impl From<StoreError> for WriteError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ModelError> for WriteError {
    fn from(value: ModelError) -> Self {
        Self::Invariant(value.to_string())
    }
}

impl From<ValidationError> for WriteError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::UnknownEntityType(name) => Self::UnknownEntityType(name),
            invariant @ ValidationError::InvariantViolation { .. } => {
                Self::Invariant(invariant.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InstanceKey, WriteError};
    use crate::sequence::SequenceError;
    use crate::signing::SigningError;

    #[test]
    fn status_classes_separate_client_and_server_faults() {
        assert_eq!(WriteError::Validation(Vec::new()).status_class(), 422);
        assert_eq!(
            WriteError::Signing(SigningError::TamperDetected("x".into())).status_class(),
            403
        );
        assert_eq!(
            WriteError::Signing(SigningError::VersionConflict {
                identifier: "o-1".into(),
                presented: 1,
                stored: 2
            })
            .status_class(),
            409
        );
        assert_eq!(WriteError::NotFound(InstanceKey::new("Order", "o-1")).status_class(), 404);
        assert_eq!(
            WriteError::Sequence(SequenceError::SequenceUnavailable {
                name: "Order.id".into(),
                message: "down".into()
            })
            .status_class(),
            503
        );
        assert!(!WriteError::Invariant("broken".into()).is_client_error());
    }
}
