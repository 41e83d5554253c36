//! Tamper-evident identifiers echoed between server and client.
//!
//! # Responsibility
//! - Replace raw `@id` values in outbound payloads with signed tokens.
//! - Verify tokens presented back and classify tampering vs. stale writes.
//!
//! # Invariants
//! - A token binds identifier, producing feature, entity type, version and
//!   the immutable flag; altering any byte fails verification.
//! - Verification compares MACs in constant time.
//! - Keys and raw tokens are never logged.
//!
//! # See also
//! - `crate::write` for where mutable vs. immutable tokens are issued.

mod signer;

use crate::model::schema::FeatureRef;
use crate::model::InstanceId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use signer::IdentifierSigner;

pub type SigningResult<T> = Result<T, SigningError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Payload to sign carries no raw `@id`.
    MissingIdentifier,
    TamperDetected(String),
    /// Signed version differs from the stored one.
    VersionConflict {
        identifier: InstanceId,
        presented: i64,
        stored: i64,
    },
    InvalidKey(String),
    Encoding(String),
}

impl Display for SigningError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingIdentifier => write!(f, "payload has no `@id` to sign"),
            Self::TamperDetected(reason) => write!(f, "tampered identifier: {reason}"),
            Self::VersionConflict {
                identifier,
                presented,
                stored,
            } => write!(
                f,
                "version conflict on `{identifier}`: presented {presented}, stored {stored}"
            ),
            Self::InvalidKey(message) => write!(f, "invalid signing key: {message}"),
            Self::Encoding(message) => write!(f, "identifier encoding failed: {message}"),
        }
    }
}

impl Error for SigningError {}

/// Verified content of a signed `@id` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIdentifier {
    pub identifier: InstanceId,
    pub produced_by: Option<FeatureRef>,
    pub entity_type: Option<String>,
    pub version: Option<i64>,
    /// Immutable tokens may be linked to but not written through.
    pub immutable: bool,
}

impl SignedIdentifier {
    pub fn new(identifier: impl Into<InstanceId>) -> Self {
        Self {
            identifier: identifier.into(),
            produced_by: None,
            entity_type: None,
            version: None,
            immutable: false,
        }
    }

    pub fn is_mutable(&self) -> bool {
        !self.immutable
    }
}

/// Compares the signed version against the stored one.
///
/// A token without a version skips the check.
pub fn check_version(signed: &SignedIdentifier, stored_version: i64) -> SigningResult<()> {
    match signed.version {
        Some(presented) if presented != stored_version => Err(SigningError::VersionConflict {
            identifier: signed.identifier.clone(),
            presented,
            stored: stored_version,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_version, SignedIdentifier, SigningError};

    #[test]
    fn stale_version_is_conflict_not_tampering() {
        let mut signed = SignedIdentifier::new("o-1");
        signed.version = Some(3);
        assert!(check_version(&signed, 3).is_ok());
        assert_eq!(
            check_version(&signed, 4).unwrap_err(),
            SigningError::VersionConflict {
                identifier: "o-1".to_string(),
                presented: 3,
                stored: 4
            }
        );
    }

    #[test]
    fn unversioned_tokens_skip_the_check() {
        assert!(check_version(&SignedIdentifier::new("o-1"), 9).is_ok());
    }
}
