//! Built-in validators.
//!
//! Each rule owns one concern. A rule that sees a value of the wrong JSON
//! kind stays silent; `TypeValidator` reports it.

use crate::model::schema::{
    AttributeDescriptor, Feature, RuntimeType, MAX_LENGTH_ANNOTATION, MIN_LENGTH_ANNOTATION,
    PATTERN_ANNOTATION,
};
use crate::payload::{decode_value, json_kind, Payload};
use crate::validation::{
    FeedbackItem, ValidationContext, ValidationError, ValidationResult, Validator,
    MAX_LENGTH_VALIDATION_FAILED, MIN_LENGTH_VALIDATION_FAILED, PATTERN_VALIDATION_FAILED,
    REFERENCE_MISSING, REQUIRED_VALIDATION_FAILED, TYPE_VALIDATION_FAILED,
};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value as Json;
use std::collections::HashMap;

fn annotated<'a>(feature: &Feature<'a>, key: &str) -> Option<(&'a AttributeDescriptor, &'a str)> {
    match *feature {
        Feature::Attribute(attribute) => attribute.annotation(key).map(|value| (attribute, value)),
        Feature::Reference(_) => None,
    }
}

/// Annotation value and string-typed attribute, or an invariant violation.
fn string_constraint<'a>(
    feature: &Feature<'a>,
    key: &str,
) -> ValidationResult<(&'a AttributeDescriptor, &'a str)> {
    let Some((attribute, raw)) = annotated(feature, key) else {
        return Err(ValidationError::invariant(feature, format!("`{key}` is not declared")));
    };
    if attribute.runtime_type() != RuntimeType::String {
        return Err(ValidationError::invariant(
            feature,
            format!("`{key}` applies to string attributes, not {}", attribute.runtime_type()),
        ));
    }
    Ok((attribute, raw))
}

fn length_bound(feature: &Feature<'_>, key: &str) -> ValidationResult<usize> {
    let (_, raw) = string_constraint(feature, key)?;
    raw.trim().parse::<usize>().map_err(|_| {
        ValidationError::invariant(feature, format!("`{key}` must be a non-negative integer, got `{raw}`"))
    })
}

fn is_missing(value: Option<&Json>) -> bool {
    matches!(value, None | Some(Json::Null))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MinLengthValidator;

impl Validator for MinLengthValidator {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool {
        annotated(feature, MIN_LENGTH_ANNOTATION).is_some()
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        let min = length_bound(feature, MIN_LENGTH_ANNOTATION)?;
        let Some(Json::String(text)) = value else {
            return Ok(Vec::new());
        };
        if text.chars().count() >= min {
            return Ok(Vec::new());
        }
        Ok(vec![context
            .feedback(MIN_LENGTH_VALIDATION_FAILED, feature)
            .with_detail(MIN_LENGTH_ANNOTATION, min)
            .with_detail("value", text.as_str())])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxLengthValidator;

impl Validator for MaxLengthValidator {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool {
        annotated(feature, MAX_LENGTH_ANNOTATION).is_some()
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        let max = length_bound(feature, MAX_LENGTH_ANNOTATION)?;
        let Some(Json::String(text)) = value else {
            return Ok(Vec::new());
        };
        if text.chars().count() <= max {
            return Ok(Vec::new());
        }
        Ok(vec![context
            .feedback(MAX_LENGTH_VALIDATION_FAILED, feature)
            .with_detail(MAX_LENGTH_ANNOTATION, max)
            .with_detail("value", text.as_str())])
    }
}

/// Whole-value regex match against the `pattern` annotation.
///
/// Compiled patterns are cached per declaration.
#[derive(Debug, Default)]
pub struct PatternValidator {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl PatternValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(&self, feature: &Feature<'_>, pattern: &str, text: &str) -> ValidationResult<bool> {
        let mut compiled = self.compiled.lock();
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.is_match(text));
        }
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            ValidationError::invariant(feature, format!("invalid pattern `{pattern}`: {err}"))
        })?;
        let matched = regex.is_match(text);
        compiled.insert(pattern.to_string(), regex);
        Ok(matched)
    }
}

impl Validator for PatternValidator {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool {
        annotated(feature, PATTERN_ANNOTATION).is_some()
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        let (_, pattern) = string_constraint(feature, PATTERN_ANNOTATION)?;
        let Some(Json::String(text)) = value else {
            return Ok(Vec::new());
        };
        if self.matches(feature, pattern, text)? {
            return Ok(Vec::new());
        }
        Ok(vec![context
            .feedback(PATTERN_VALIDATION_FAILED, feature)
            .with_detail(PATTERN_ANNOTATION, pattern)
            .with_detail("value", text.as_str())])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredAttributeValidator;

impl Validator for RequiredAttributeValidator {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool {
        matches!(feature, Feature::Attribute(attribute) if attribute.is_required())
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        if !is_missing(value) {
            return Ok(Vec::new());
        }
        Ok(vec![context
            .feedback(REQUIRED_VALIDATION_FAILED, feature)
            .with_detail("required", true)])
    }
}

/// Required references must carry at least one link.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredReferenceValidator;

impl Validator for RequiredReferenceValidator {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool {
        matches!(feature, Feature::Reference(reference) if reference.is_required())
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        let missing = match value {
            None | Some(Json::Null) => true,
            Some(Json::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        if !missing {
            return Ok(Vec::new());
        }
        let Feature::Reference(reference) = feature else {
            return Ok(Vec::new());
        };
        Ok(vec![context
            .feedback(REFERENCE_MISSING, feature)
            .with_detail("target", reference.target())])
    }
}

/// Payload values must decode to the declared runtime type; references must
/// be objects (single) or arrays of objects (many).
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeValidator;

impl Validator for TypeValidator {
    fn is_applicable(&self, _feature: &Feature<'_>) -> bool {
        true
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        let Some(json) = value.filter(|json| !json.is_null()) else {
            return Ok(Vec::new());
        };
        let (expected, well_typed) = match feature {
            Feature::Attribute(attribute) => (
                attribute.runtime_type().to_string(),
                decode_value(attribute, json).is_ok(),
            ),
            Feature::Reference(reference) if reference.is_many() => (
                "array of objects".to_string(),
                matches!(json, Json::Array(items) if items.iter().all(Json::is_object)),
            ),
            Feature::Reference(_) => ("object".to_string(), json.is_object()),
        };
        if well_typed {
            return Ok(Vec::new());
        }
        Ok(vec![context
            .feedback(TYPE_VALIDATION_FAILED, feature)
            .with_detail("expected", expected)
            .with_detail("found", json_kind(json))])
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MaxLengthValidator, MinLengthValidator, PatternValidator, RequiredReferenceValidator,
        TypeValidator,
    };
    use crate::model::schema::{AttributeDescriptor, Feature, ReferenceDescriptor, RuntimeType};
    use crate::payload::Payload;
    use crate::validation::{ValidationContext, ValidationError, Validator};
    use serde_json::json;

    fn run(
        validator: &dyn Validator,
        attribute: &AttributeDescriptor,
        value: serde_json::Value,
    ) -> Result<Vec<String>, ValidationError> {
        let feature = Feature::Attribute(attribute);
        let context = ValidationContext::root("Order");
        let items = validator.validate(&Payload::new(), &feature, Some(&value), &context)?;
        Ok(items.into_iter().map(|item| item.code).collect())
    }

    #[test]
    fn min_length_counts_characters_not_bytes() {
        let name = AttributeDescriptor::new("name", RuntimeType::String)
            .with_annotation("minLength", "3");
        assert!(run(&MinLengthValidator, &name, json!("äöü")).unwrap().is_empty());
        assert_eq!(
            run(&MinLengthValidator, &name, json!("äö")).unwrap(),
            vec!["MIN_LENGTH_VALIDATION_FAILED"]
        );
    }

    #[test]
    fn unparseable_bound_is_invariant_violation() {
        let name = AttributeDescriptor::new("name", RuntimeType::String)
            .with_annotation("maxLength", "ten");
        let err = run(&MaxLengthValidator, &name, json!("x")).unwrap_err();
        assert!(matches!(err, ValidationError::InvariantViolation { ref feature, .. } if feature == "name"));
    }

    #[test]
    fn string_rule_on_numeric_attribute_is_invariant_violation() {
        let code = AttributeDescriptor::new("code", RuntimeType::Long)
            .with_annotation("minLength", "2");
        assert!(run(&MinLengthValidator, &code, json!(7)).is_err());
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let sku = AttributeDescriptor::new("sku", RuntimeType::String)
            .with_annotation("pattern", "[A-Z]{3}-[0-9]+");
        let validator = PatternValidator::new();
        assert!(run(&validator, &sku, json!("ABC-12")).unwrap().is_empty());
        assert_eq!(
            run(&validator, &sku, json!("xABC-12")).unwrap(),
            vec!["PATTERN_VALIDATION_FAILED"]
        );
    }

    #[test]
    fn invalid_pattern_is_invariant_violation() {
        let sku = AttributeDescriptor::new("sku", RuntimeType::String)
            .with_annotation("pattern", "([");
        assert!(run(&PatternValidator::new(), &sku, json!("x")).is_err());
    }

    #[test]
    fn type_validator_reports_undecodable_values() {
        let count = AttributeDescriptor::new("count", RuntimeType::Integer);
        assert_eq!(
            run(&TypeValidator, &count, json!("seven")).unwrap(),
            vec!["TYPE_VALIDATION_FAILED"]
        );
        assert!(run(&TypeValidator, &count, json!(null)).unwrap().is_empty());
    }

    #[test]
    fn empty_many_reference_counts_as_missing() {
        let lines = ReferenceDescriptor::new("lines", "Line").many().required();
        let feature = Feature::Reference(&lines);
        let context = ValidationContext::root("Order");
        let items = RequiredReferenceValidator
            .validate(&Payload::new(), &feature, Some(&json!([])), &context)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code, "REFERENCE_MISSING");
        assert_eq!(items[0].details["target"], json!("Line"));
    }
}
