//! Declarative constraint checks over inbound payloads.
//!
//! # Responsibility
//! - Define the `Validator` plug-in contract and the `FeedbackItem` record.
//! - Evaluate every applicable validator for every feature, recursing into
//!   contained child payloads.
//!
//! # Invariants
//! - Feedback is aggregated; one failing rule never hides another.
//! - Broken constraint declarations surface as `InvariantViolation`, not as
//!   feedback for the client.
//! - Feedback details never include signing material.

mod registry;
pub mod rules;

use crate::model::schema::{Feature, FeatureRef};
use crate::payload::Payload;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use registry::ValidatorRegistry;
pub use rules::{
    MaxLengthValidator, MinLengthValidator, PatternValidator, RequiredAttributeValidator,
    RequiredReferenceValidator, TypeValidator,
};

pub const MIN_LENGTH_VALIDATION_FAILED: &str = "MIN_LENGTH_VALIDATION_FAILED";
pub const MAX_LENGTH_VALIDATION_FAILED: &str = "MAX_LENGTH_VALIDATION_FAILED";
pub const PATTERN_VALIDATION_FAILED: &str = "PATTERN_VALIDATION_FAILED";
pub const REQUIRED_VALIDATION_FAILED: &str = "REQUIRED_VALIDATION_FAILED";
pub const REFERENCE_MISSING: &str = "REFERENCE_MISSING";
pub const TYPE_VALIDATION_FAILED: &str = "TYPE_VALIDATION_FAILED";
pub const REFERENCE_TARGET_NOT_FOUND: &str = "REFERENCE_TARGET_NOT_FOUND";

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A constraint declaration cannot be evaluated.
    InvariantViolation { feature: String, message: String },
    UnknownEntityType(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvariantViolation { feature, message } => {
                write!(f, "invariant violation on `{feature}`: {message}")
            }
            Self::UnknownEntityType(name) => write!(f, "unknown entity type `{name}`"),
        }
    }
}

impl Error for ValidationError {}

impl ValidationError {
    pub(crate) fn invariant(feature: &Feature<'_>, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            feature: feature.name().to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackLevel {
    Error,
    Warning,
}

/// One validation finding addressed to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackItem {
    pub code: String,
    pub level: FeedbackLevel,
    /// Dotted feature path, e.g. `items[1].name`.
    pub location: String,
    pub details: BTreeMap<String, serde_json::Value>,
}

impl FeedbackItem {
    pub fn error(code: impl Into<String>, location: impl Into<String>) -> Self {
        Self::with_level(code, FeedbackLevel::Error, location)
    }

    pub fn warning(code: impl Into<String>, location: impl Into<String>) -> Self {
        Self::with_level(code, FeedbackLevel::Warning, location)
    }

    fn with_level(code: impl Into<String>, level: FeedbackLevel, location: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            level,
            location: location.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == FeedbackLevel::Error
    }
}

/// `true` when any item would reject the write.
pub fn has_errors(feedback: &[FeedbackItem]) -> bool {
    feedback.iter().any(FeedbackItem::is_error)
}

/// Where in the payload tree a feature is being validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    entity_type: String,
    prefix: String,
    referrer: Option<FeatureRef>,
}

impl ValidationContext {
    /// Context for a root payload.
    pub fn root(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            prefix: String::new(),
            referrer: None,
        }
    }

    /// Context for a child payload reached through `referrer` at `segment`.
    pub fn child(&self, entity_type: impl Into<String>, segment: &str, referrer: FeatureRef) -> Self {
        Self {
            entity_type: entity_type.into(),
            prefix: self.location_of(segment),
            referrer: Some(referrer),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn referrer(&self) -> Option<&FeatureRef> {
        self.referrer.as_ref()
    }

    pub fn location_of(&self, feature: &str) -> String {
        if self.prefix.is_empty() {
            feature.to_string()
        } else {
            format!("{}.{feature}", self.prefix)
        }
    }

    /// Feedback skeleton located at `feature`, tagged with the referrer.
    pub fn feedback(&self, code: &str, feature: &Feature<'_>) -> FeedbackItem {
        let item = FeedbackItem::error(code, self.location_of(feature.name()))
            .with_detail("feature", feature.name());
        match &self.referrer {
            Some(referrer) => item.with_detail("referrer", referrer.to_string()),
            None => item,
        }
    }
}

/// Pluggable per-feature constraint checker.
pub trait Validator: Send + Sync {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool;

    /// Checks `value`, the payload entry for `feature` (`None` when absent).
    fn validate(
        &self,
        payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&serde_json::Value>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>>;
}
