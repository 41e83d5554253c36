use crate::model::schema::{EntityTypeDescriptor, SchemaService};
use crate::payload::Payload;
use crate::validation::{
    has_errors, FeedbackItem, MaxLengthValidator, MinLengthValidator, PatternValidator,
    RequiredAttributeValidator, RequiredReferenceValidator, TypeValidator, ValidationContext,
    ValidationError, ValidationResult, Validator,
};
use log::debug;
use serde_json::Value as Json;
use std::sync::Arc;

/// Ordered validator list evaluated against whole payload trees.
pub struct ValidatorRegistry {
    schema: Arc<dyn SchemaService>,
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Registry with no validators.
    pub fn new(schema: Arc<dyn SchemaService>) -> Self {
        Self {
            schema,
            validators: Vec::new(),
        }
    }

    /// Registry with every built-in rule.
    pub fn with_defaults(schema: Arc<dyn SchemaService>) -> Self {
        let mut registry = Self::new(schema);
        registry.register(TypeValidator);
        registry.register(RequiredAttributeValidator);
        registry.register(RequiredReferenceValidator);
        registry.register(MinLengthValidator);
        registry.register(MaxLengthValidator);
        registry.register(PatternValidator::new());
        registry
    }

    pub fn register(&mut self, validator: impl Validator + 'static) {
        self.validators.push(Box::new(validator));
    }

    /// Validates `payload` and its contained children as `entity_type`.
    ///
    /// # Errors
    /// - `UnknownEntityType` when the root or a contained type is unknown.
    /// - `InvariantViolation` when a constraint declaration is unusable.
    pub fn validate(&self, entity_type: &str, payload: &Payload) -> ValidationResult<Vec<FeedbackItem>> {
        let descriptor = self.entity_type(entity_type)?;
        let mut feedback = Vec::new();
        self.validate_node(
            &descriptor,
            payload,
            &ValidationContext::root(entity_type),
            &mut feedback,
        )?;
        debug!(
            "event=validate module=validation status={} entity_type={} items={}",
            if has_errors(&feedback) { "rejected" } else { "ok" },
            entity_type,
            feedback.len()
        );
        Ok(feedback)
    }

    fn entity_type(&self, name: &str) -> ValidationResult<Arc<EntityTypeDescriptor>> {
        self.schema
            .entity_type_of(name)
            .ok_or_else(|| ValidationError::UnknownEntityType(name.to_string()))
    }

    fn validate_node(
        &self,
        descriptor: &EntityTypeDescriptor,
        payload: &Payload,
        context: &ValidationContext,
        feedback: &mut Vec<FeedbackItem>,
    ) -> ValidationResult<()> {
        for feature in descriptor.features() {
            let value = payload.get(feature.name());
            for validator in &self.validators {
                if validator.is_applicable(&feature) {
                    feedback.extend(validator.validate(payload, &feature, value, context)?);
                }
            }
        }

        for reference in descriptor.references() {
            if !reference.is_containment() {
                continue;
            }
            let children: Vec<(String, &Payload)> = match payload.get(reference.name()) {
                Some(Json::Object(child)) => vec![(reference.name().to_string(), child)],
                Some(Json::Array(items)) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        item.as_object()
                            .map(|child| (format!("{}[{index}]", reference.name()), child))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            if children.is_empty() {
                continue;
            }
            let child_type = self.entity_type(reference.target())?;
            for (segment, child) in children {
                let child_context =
                    context.child(reference.target(), &segment, reference.feature_ref());
                self.validate_node(&child_type, child, &child_context, feedback)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.validators.len())
            .finish()
    }
}
