use modelstore_core::model::schema::FeatureRef;
use modelstore_core::{IdentifierSigner, SignedIdentifier, SigningError};

fn signer() -> IdentifierSigner {
    IdentifierSigner::from_base64("bW9kZWxzdG9yZS10ZXN0LWtleQ==").unwrap()
}

fn line_identifier() -> SignedIdentifier {
    SignedIdentifier {
        identifier: "42".to_string(),
        produced_by: Some(FeatureRef::new("Order", "lines")),
        entity_type: Some("Line".to_string()),
        version: Some(3),
        immutable: false,
    }
}

#[test]
fn token_verifies_to_the_signed_claims() {
    let signer = signer();
    let token = signer.sign_identifier(&line_identifier()).unwrap();

    assert_eq!(signer.verify(&token).unwrap(), line_identifier());
    assert!(!token.contains("Line"), "claims must be encoded");
}

#[test]
fn changing_any_single_character_is_detected() {
    let signer = signer();
    let token = signer.sign_identifier(&line_identifier()).unwrap();

    for (index, original) in token.char_indices() {
        let replacement = if original == 'A' { 'B' } else { 'A' };
        let mut tampered = token.clone();
        tampered.replace_range(index..index + 1, &replacement.to_string());

        assert!(
            matches!(signer.verify(&tampered), Err(SigningError::TamperDetected(_))),
            "tampering at position {index} went unnoticed"
        );
    }
}

#[test]
fn truncated_and_foreign_tokens_are_rejected() {
    let signer = signer();
    let token = signer.sign_identifier(&line_identifier()).unwrap();

    assert!(signer.verify(&token[..token.len() - 4]).is_err());
    assert!(signer.verify("not-a-token").is_err());

    let foreign = IdentifierSigner::generate()
        .sign_identifier(&line_identifier())
        .unwrap();
    assert!(matches!(
        signer.verify(&foreign),
        Err(SigningError::TamperDetected(_))
    ));
}

#[test]
fn immutable_flag_survives_the_round_trip() {
    let signer = signer();
    let mut identifier = line_identifier();
    identifier.immutable = true;

    let verified = signer
        .verify(&signer.sign_identifier(&identifier).unwrap())
        .unwrap();
    assert!(verified.immutable);
    assert!(!verified.is_mutable());
}
