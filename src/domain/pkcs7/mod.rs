//! PKCS#7 `SignedData` domain types.
//!
//! Attribute access, verified signatures, timestamps and chain validation.

use std::fmt;

use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::Any;
use der::{Decode, Encode};

use crate::domain::constants::PKCS7_SIGNED_DATA_OID;
use crate::infra::error::{SigningError, SigningResult};

pub mod attributes;
pub mod chain;
pub mod signature;
pub mod timestamp;

pub use attributes::{AttributeError, Attributes};
pub use chain::{ExtKeyUsage, TrustRoots};
pub use signature::{certificates_of, verify_signer_info, Signature};
pub use timestamp::{
    timestamp_lookup_order, verify_optional_timestamp, verify_timestamp, CounterSignature,
    GenTime, MessageImprint, TimestampKind, TimestampToken, TimestampedSignature, TstInfo,
};

/// DER-encoded `ContentInfo` holding a `SignedData`.
#[derive(Clone, PartialEq, Eq)]
pub struct Pkcs7SignedData {
    der: Vec<u8>,
}

impl Pkcs7SignedData {
    /// Wrap DER bytes after checking they decode as `SignedData`.
    pub fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        let blob = Self { der };
        blob.signed_data()?;
        Ok(blob)
    }

    pub fn from_signed_data(signed_data: &SignedData) -> SigningResult<Self> {
        let content_info = ContentInfo {
            content_type: PKCS7_SIGNED_DATA_OID,
            content: Any::from_der(&signed_data.to_der()?)?,
        };
        Ok(Self {
            der: content_info.to_der()?,
        })
    }

    pub fn signed_data(&self) -> SigningResult<SignedData> {
        let content_info = ContentInfo::from_der(&self.der)
            .map_err(|e| SigningError::Pkcs7Error(format!("Invalid ContentInfo: {e}")))?;
        if content_info.content_type != PKCS7_SIGNED_DATA_OID {
            return Err(SigningError::Pkcs7Error(format!(
                "Content type is {}, expected SignedData",
                content_info.content_type
            )));
        }
        SignedData::from_der(&content_info.content.to_der()?)
            .map_err(|e| SigningError::Pkcs7Error(format!("Invalid SignedData: {e}")))
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.der.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
}

impl fmt::Debug for Pkcs7SignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pkcs7SignedData(len={})", self.der.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_signed_data() {
        assert!(matches!(
            Pkcs7SignedData::from_der(vec![0x30, 0x00]),
            Err(SigningError::Pkcs7Error(_))
        ));
    }
}
