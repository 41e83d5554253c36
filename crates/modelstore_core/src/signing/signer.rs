use crate::model::schema::{FeatureRef, ReferenceDescriptor};
use crate::payload::{Payload, ID_KEY, TYPE_KEY, VERSION_KEY};
use crate::signing::{SignedIdentifier, SigningError, SigningResult};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use log::warn;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::Sha256;
use std::fmt::{Debug, Formatter};

type HmacSha256 = Hmac<Sha256>;

const GENERATED_KEY_BYTES: usize = 32;

/// Token claims; short keys keep tokens compact.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: String,
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    feature: Option<String>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    entity_type: Option<String>,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
    #[serde(rename = "im", default, skip_serializing_if = "is_false")]
    immutable: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// HMAC-SHA256 signer for `@id` tokens.
///
/// Token layout: `base64url(claims JSON) "." base64url(mac(claims part))`.
#[derive(Clone)]
pub struct IdentifierSigner {
    key: Vec<u8>,
}

impl Debug for IdentifierSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdentifierSigner { key: <redacted> }")
    }
}

impl IdentifierSigner {
    pub fn from_key(key: &[u8]) -> SigningResult<Self> {
        if key.is_empty() {
            return Err(SigningError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(Self { key: key.to_vec() })
    }

    /// Key given as standard base64, as stored in configuration.
    pub fn from_base64(encoded: &str) -> SigningResult<Self> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|err| SigningError::InvalidKey(err.to_string()))?;
        Self::from_key(&key)
    }

    /// Random per-process key; tokens do not survive a restart.
    pub fn generate() -> Self {
        let mut key = vec![0_u8; GENERATED_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    fn mac(&self, claims_part: &str) -> SigningResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| SigningError::InvalidKey(err.to_string()))?;
        mac.update(claims_part.as_bytes());
        Ok(mac)
    }

    /// Encodes `signed` as a token.
    pub fn sign_identifier(&self, signed: &SignedIdentifier) -> SigningResult<String> {
        let claims = Claims {
            id: signed.identifier.clone(),
            feature: signed.produced_by.as_ref().map(ToString::to_string),
            entity_type: signed.entity_type.clone(),
            version: signed.version,
            immutable: signed.immutable,
        };
        let json =
            serde_json::to_vec(&claims).map_err(|err| SigningError::Encoding(err.to_string()))?;
        let claims_part = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&claims_part)?.finalize().into_bytes());
        Ok(format!("{claims_part}.{signature}"))
    }

    /// Decodes and authenticates a token.
    pub fn verify(&self, token: &str) -> SigningResult<SignedIdentifier> {
        let (claims_part, signature_part) = token
            .split_once('.')
            .ok_or_else(|| tampered("malformed token"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|_| tampered("malformed signature"))?;
        self.mac(claims_part)?
            .verify_slice(&signature)
            .map_err(|_| tampered("signature mismatch"))?;

        let json = URL_SAFE_NO_PAD
            .decode(claims_part)
            .map_err(|_| tampered("malformed claims"))?;
        let claims: Claims =
            serde_json::from_slice(&json).map_err(|_| tampered("malformed claims"))?;
        let produced_by = match claims.feature {
            Some(feature) => Some(
                FeatureRef::parse(&feature).ok_or_else(|| tampered("malformed feature claim"))?,
            ),
            None => None,
        };
        Ok(SignedIdentifier {
            identifier: claims.id,
            produced_by,
            entity_type: claims.entity_type,
            version: claims.version,
            immutable: claims.immutable,
        })
    }

    /// Replaces the raw `@id` in `payload` with a token.
    ///
    /// `@type` and `@version`, when present, are bound into the token.
    pub fn sign(
        &self,
        feature: Option<&FeatureRef>,
        payload: &mut Payload,
        immutable: bool,
    ) -> SigningResult<SignedIdentifier> {
        let identifier = match payload.get(ID_KEY) {
            Some(Json::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Json::Number(id)) => id.to_string(),
            _ => return Err(SigningError::MissingIdentifier),
        };
        let signed = SignedIdentifier {
            identifier,
            produced_by: feature.cloned(),
            entity_type: payload
                .get(TYPE_KEY)
                .and_then(Json::as_str)
                .map(str::to_string),
            version: payload.get(VERSION_KEY).and_then(Json::as_i64),
            immutable,
        };
        let token = self.sign_identifier(&signed)?;
        payload.insert(ID_KEY.to_string(), Json::String(token));
        Ok(signed)
    }

    /// Verified identifier of `payload`, or `None` when `@id` is absent.
    ///
    /// # Errors
    /// `TamperDetected` when the token fails verification or is bound to a
    /// different entity type.
    pub fn extract_signed_identifier(
        &self,
        entity_type: &str,
        payload: &Payload,
    ) -> SigningResult<Option<SignedIdentifier>> {
        let token = match payload.get(ID_KEY) {
            None | Some(Json::Null) => return Ok(None),
            Some(Json::String(token)) => token,
            Some(_) => return Err(tampered("`@id` is not a token")),
        };
        let signed = self.verify(token)?;
        if let Some(bound) = signed.entity_type.as_deref() {
            if bound != entity_type {
                return Err(tampered(&format!(
                    "token bound to `{bound}` presented as `{entity_type}`"
                )));
            }
        }
        Ok(Some(signed))
    }

    /// As `extract_signed_identifier`, additionally rejecting immutable
    /// tokens presented through a containment feature.
    pub fn extract_for_feature(
        &self,
        entity_type: &str,
        feature: Option<&ReferenceDescriptor>,
        payload: &Payload,
    ) -> SigningResult<Option<SignedIdentifier>> {
        let Some(signed) = self.extract_signed_identifier(entity_type, payload)? else {
            return Ok(None);
        };
        if let Some(reference) = feature.filter(|reference| reference.is_containment()) {
            if signed.immutable {
                return Err(tampered(&format!(
                    "immutable identifier presented through `{}`",
                    reference.feature_ref()
                )));
            }
        }
        Ok(Some(signed))
    }
}

fn tampered(reason: &str) -> SigningError {
    warn!("event=identifier_verify module=signing status=rejected reason=\"{reason}\"");
    SigningError::TamperDetected(reason.to_string())
}
