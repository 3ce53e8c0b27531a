//! Identity, document id and content digest value types.
//!
//! # Responsibility
//! - Validate raw boundary input into typed values before it reaches storage.
//! - Provide stable text/byte encodings for persistence and display.
//!
//! # Invariants
//! - `Identity` is never empty and carries no leading or trailing whitespace;
//!   padded input is rejected, never normalized.
//! - `DocumentId` is stored byte-for-byte as supplied; it is never trimmed,
//!   case-folded or otherwise interpreted.
//! - `ContentDigest` holds between 1 and 64 raw bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_IDENTITY_CHARS: usize = 256;
const MAX_DOCUMENT_ID_BYTES: usize = 1024;
const MAX_DIGEST_BYTES: usize = 64;

/// Input validation failures for model value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyIdentity,
    IdentityHasSurroundingWhitespace,
    IdentityTooLong(usize),
    EmptyDocumentId,
    DocumentIdTooLong(usize),
    EmptyDigest,
    DigestTooLong(usize),
    InvalidDigestHex(String),
    UnknownAdminPolicy(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIdentity => write!(f, "identity must not be empty"),
            Self::IdentityHasSurroundingWhitespace => {
                write!(f, "identity must not start or end with whitespace")
            }
            Self::IdentityTooLong(len) => write!(
                f,
                "identity has {len} chars; at most {MAX_IDENTITY_CHARS} are allowed"
            ),
            Self::EmptyDocumentId => write!(f, "document id must not be empty"),
            Self::DocumentIdTooLong(len) => write!(
                f,
                "document id has {len} bytes; at most {MAX_DOCUMENT_ID_BYTES} are allowed"
            ),
            Self::EmptyDigest => write!(f, "content digest must not be empty"),
            Self::DigestTooLong(len) => write!(
                f,
                "content digest has {len} bytes; at most {MAX_DIGEST_BYTES} are allowed"
            ),
            Self::InvalidDigestHex(message) => write!(f, "invalid digest hex: {message}"),
            Self::UnknownAdminPolicy(value) => {
                write!(f, "unknown admin policy `{value}`; expected exclusive|shared")
            }
        }
    }
}

impl Error for ModelValidationError {}

/// Verified caller identity supplied by the authentication boundary.
///
/// Organizations, admins and the registry owner all share this type: an
/// organization is identified by the identity it acts under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parses one identity value exactly as supplied.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ModelValidationError> {
        let value = value.as_ref();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ModelValidationError::EmptyIdentity);
        }
        if trimmed.len() != value.len() {
            return Err(ModelValidationError::IdentityHasSurroundingWhitespace);
        }
        let chars = value.chars().count();
        if chars > MAX_IDENTITY_CHARS {
            return Err(ModelValidationError::IdentityTooLong(chars));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ModelValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

/// Opaque client-chosen document identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Accepts any non-empty value up to the storage limit, unchanged.
    pub fn parse(value: impl Into<String>) -> Result<Self, ModelValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ModelValidationError::EmptyDocumentId);
        }
        if value.len() > MAX_DOCUMENT_ID_BYTES {
            return Err(ModelValidationError::DocumentIdTooLong(value.len()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ModelValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

/// Cryptographic fingerprint of document content.
///
/// The registry compares digests byte-wise and never needs to know which hash
/// function produced them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(Vec<u8>);

impl ContentDigest {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, ModelValidationError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ModelValidationError::EmptyDigest);
        }
        if bytes.len() > MAX_DIGEST_BYTES {
            return Err(ModelValidationError::DigestTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Parses hex text, accepting an optional `0x` prefix and either case.
    pub fn from_hex(value: &str) -> Result<Self, ModelValidationError> {
        let trimmed = value.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(body)
            .map_err(|err| ModelValidationError::InvalidDigestHex(err.to_string()))?;
        Self::from_bytes(bytes)
    }

    /// SHA-256 of `content`, for clients digesting files locally.
    pub fn sha256(content: &[u8]) -> Self {
        Self(Sha256::digest(content).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = ModelValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentDigest> for String {
    fn from(value: ContentDigest) -> Self {
        value.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentDigest, DocumentId, Identity, ModelValidationError};

    #[test]
    fn identity_is_kept_verbatim_and_rejects_padding_or_blank() {
        let identity = Identity::parse("Org A").expect("identity should parse");
        assert_eq!(identity.as_str(), "Org A");
        for padded in [" a", "a ", "\ta", "a\n"] {
            assert_eq!(
                Identity::parse(padded).expect_err("padded identity must fail"),
                ModelValidationError::IdentityHasSurroundingWhitespace
            );
        }
        assert_ne!(
            Identity::parse("a").expect("identity"),
            Identity::parse("A").expect("identity")
        );
        assert_eq!(
            Identity::parse("   ").expect_err("blank identity must fail"),
            ModelValidationError::EmptyIdentity
        );
    }

    #[test]
    fn identity_rejects_overlong_values() {
        let err = Identity::parse("x".repeat(257)).expect_err("overlong identity must fail");
        assert_eq!(err, ModelValidationError::IdentityTooLong(257));
    }

    #[test]
    fn document_id_is_kept_verbatim() {
        let id = DocumentId::parse("  Invoice/2024 ").expect("document id should parse");
        assert_eq!(id.as_str(), "  Invoice/2024 ");
        assert_eq!(
            DocumentId::parse("").expect_err("empty id must fail"),
            ModelValidationError::EmptyDocumentId
        );
    }

    #[test]
    fn digest_hex_accepts_prefix_and_mixed_case() {
        let lower = ContentDigest::from_hex("0xabcdef01").expect("prefixed hex should parse");
        let upper = ContentDigest::from_hex("ABCDEF01").expect("upper hex should parse");
        assert_eq!(lower, upper);
        assert_eq!(lower.to_hex(), "abcdef01");
        assert_eq!(lower.to_string(), "0xabcdef01");
    }

    #[test]
    fn digest_rejects_bad_hex_empty_and_oversized_input() {
        assert!(matches!(
            ContentDigest::from_hex("zz"),
            Err(ModelValidationError::InvalidDigestHex(_))
        ));
        assert_eq!(
            ContentDigest::from_hex("0x").expect_err("empty digest must fail"),
            ModelValidationError::EmptyDigest
        );
        assert_eq!(
            ContentDigest::from_bytes(vec![1u8; 65]).expect_err("oversized digest must fail"),
            ModelValidationError::DigestTooLong(65)
        );
    }

    #[test]
    fn sha256_matches_known_vector() {
        let digest = ContentDigest::sha256(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn serde_uses_plain_strings() {
        let digest = ContentDigest::from_hex("0a0b").expect("digest should parse");
        let json = serde_json::to_string(&digest).expect("serialize digest");
        assert_eq!(json, "\"0a0b\"");
        let identity: Identity = serde_json::from_str("\"owner\"").expect("deserialize");
        assert_eq!(identity.as_str(), "owner");
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
        assert!(serde_json::from_str::<Identity>("\" owner \"").is_err());
    }
}
