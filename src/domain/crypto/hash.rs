//! Hash algorithm domain type.
//!
//! Provides the core `HashAlgorithm` enumeration supporting SHA-256, SHA-384,
//! and SHA-512. Maps between algorithm names, digest OIDs and the OpenSSL
//! message digest used for signing.

use crate::domain::constants;
use crate::infra::error::SigningError;
use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Digest algorithm OID as carried in `AlgorithmIdentifier`.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha256 => constants::SHA256_OID,
            HashAlgorithm::Sha384 => constants::SHA384_OID,
            HashAlgorithm::Sha512 => constants::SHA512_OID,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        match *oid {
            constants::SHA256_OID => Some(HashAlgorithm::Sha256),
            constants::SHA384_OID => Some(HashAlgorithm::Sha384),
            constants::SHA512_OID => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// ECDSA signature algorithm OID paired with this digest.
    pub fn ecdsa_signature_oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha256 => constants::ECDSA_WITH_SHA256_OID,
            HashAlgorithm::Sha384 => constants::ECDSA_WITH_SHA384_OID,
            HashAlgorithm::Sha512 => constants::ECDSA_WITH_SHA512_OID,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    pub fn message_digest(&self) -> openssl::hash::MessageDigest {
        match self {
            HashAlgorithm::Sha256 => openssl::hash::MessageDigest::sha256(),
            HashAlgorithm::Sha384 => openssl::hash::MessageDigest::sha384(),
            HashAlgorithm::Sha512 => openssl::hash::MessageDigest::sha512(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(SigningError::InvalidInput(format!(
                "Unsupported hash algorithm: {s}"
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
