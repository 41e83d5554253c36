use modelstore_core::db::SqliteDataSource;
use modelstore_core::model::schema::{Feature, MIN_LENGTH_ANNOTATION, PATTERN_ANNOTATION};
use modelstore_core::store::StoreResult;
use modelstore_core::validation::{
    ValidationContext, ValidationResult, MIN_LENGTH_VALIDATION_FAILED, PATTERN_VALIDATION_FAILED,
};
use modelstore_core::{
    AttributeDescriptor, Dialect, EntityTypeDescriptor, FeedbackItem, FeedbackLevel,
    IdentifierSigner, InMemorySequences, Metadata, Payload, RuntimeType, Schema, SchemaService,
    SqliteInstanceStore, Validator, ValidatorRegistry, WriteError, WriteOrchestrator, WritePlan,
    WriteSink,
};
use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use std::sync::Arc;

/// Sink that records plans instead of storing them.
#[derive(Default)]
struct RecordingSink {
    plans: Mutex<Vec<WritePlan>>,
}

impl WriteSink for RecordingSink {
    fn apply(&self, plan: &WritePlan) -> StoreResult<()> {
        self.plans.lock().push(plan.clone());
        Ok(())
    }
}

/// Warns about usernames with upper-case letters.
struct LowercaseUsername;

impl Validator for LowercaseUsername {
    fn is_applicable(&self, feature: &Feature<'_>) -> bool {
        feature.name() == "username"
    }

    fn validate(
        &self,
        _payload: &Payload,
        feature: &Feature<'_>,
        value: Option<&Json>,
        context: &ValidationContext,
    ) -> ValidationResult<Vec<FeedbackItem>> {
        let Some(username) = value.and_then(Json::as_str) else {
            return Ok(Vec::new());
        };
        if username.chars().any(char::is_uppercase) {
            let mut item = context.feedback("USERNAME_NOT_LOWERCASE", feature);
            item.level = FeedbackLevel::Warning;
            return Ok(vec![item]);
        }
        Ok(Vec::new())
    }
}

fn account_schema() -> Arc<dyn SchemaService> {
    Arc::new(
        Schema::builder()
            .entity_type(
                EntityTypeDescriptor::new("Account")
                    .with_attribute(AttributeDescriptor::new("name", RuntimeType::String).required())
                    .with_attribute(
                        AttributeDescriptor::new("username", RuntimeType::String)
                            .with_annotation(MIN_LENGTH_ANNOTATION, "5"),
                    )
                    .with_attribute(
                        AttributeDescriptor::new("email", RuntimeType::String)
                            .with_annotation(PATTERN_ANNOTATION, "[^@]+@[^@]+"),
                    ),
            )
            .build()
            .unwrap(),
    )
}

fn payload(value: Json) -> Payload {
    value.as_object().cloned().unwrap()
}

fn engine(schema: Arc<dyn SchemaService>, sink: Arc<RecordingSink>) -> WriteOrchestrator {
    let store = Arc::new(SqliteInstanceStore::new(
        SqliteDataSource::in_memory().unwrap(),
        Arc::clone(&schema),
    ));
    WriteOrchestrator::new(
        schema,
        store,
        sink,
        Arc::new(InMemorySequences::new()),
        IdentifierSigner::from_key(b"validation-key").unwrap(),
        Dialect::Postgres,
    )
}

#[test]
fn every_failing_rule_is_reported_and_the_sink_stays_untouched() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(account_schema(), Arc::clone(&sink));

    let err = engine
        .create(
            "Account",
            &payload(json!({"name": "Ada", "username": "abcd", "email": "nope"})),
            Metadata::new("u-1", "ada"),
        )
        .unwrap_err();

    let WriteError::Validation(feedback) = &err else {
        panic!("unexpected error: {err}");
    };
    let mut codes: Vec<&str> = feedback.iter().map(|item| item.code.as_str()).collect();
    codes.sort_unstable();
    assert_eq!(codes, vec![MIN_LENGTH_VALIDATION_FAILED, PATTERN_VALIDATION_FAILED]);
    assert!(feedback.iter().all(FeedbackItem::is_error));
    assert!(sink.plans.lock().is_empty());
}

#[test]
fn min_length_boundary_is_inclusive() {
    let registry = ValidatorRegistry::with_defaults(account_schema());

    let short = registry
        .validate("Account", &payload(json!({"name": "Ada", "username": "abcd"})))
        .unwrap();
    assert_eq!(short.len(), 1);
    assert_eq!(short[0].code, MIN_LENGTH_VALIDATION_FAILED);
    assert_eq!(short[0].location, "username");

    let exact = registry
        .validate("Account", &payload(json!({"name": "Ada", "username": "abcde"})))
        .unwrap();
    assert!(exact.is_empty());
}

#[test]
fn registered_warning_validator_does_not_reject_the_write() {
    let schema = account_schema();
    let sink = Arc::new(RecordingSink::default());
    let mut validators = ValidatorRegistry::with_defaults(Arc::clone(&schema));
    validators.register(LowercaseUsername);
    let engine = engine(Arc::clone(&schema), Arc::clone(&sink)).with_validators(validators);

    let accepted = payload(json!({"name": "Ada", "username": "AdaLovelace"}));
    let feedback = ValidatorRegistry::with_defaults(Arc::clone(&schema))
        .validate("Account", &accepted)
        .unwrap();
    assert!(feedback.is_empty());

    let outcome = engine
        .create("Account", &accepted, Metadata::new("u-1", "ada"))
        .unwrap();
    assert_eq!(outcome.plan.dialect, Dialect::Postgres);

    let plans = sink.plans.lock();
    assert_eq!(plans.len(), 1);
    let columns = &plans[0].upserts[0].columns;
    assert_eq!(columns[0].attribute, "name");
    assert_eq!(columns[0].sql_type, "TEXT");
}
