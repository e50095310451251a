//! Timestamp request builder service.
//!
//! Builds RFC 3161 `TimeStampReq` structures over a signature value.

use der::asn1::{Int, ObjectIdentifier};
use der::{Encode, Sequence};
use rand::RngCore;

use crate::domain::constants::TS_REQ_NONCE_LENGTH;
use crate::domain::crypto::HashAlgorithm;
use crate::domain::pkcs7::MessageImprint;
use crate::infra::error::{SigningError, SigningResult};

/// RFC 3161 section 2.4.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: u8,
    pub message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    pub req_policy: Option<ObjectIdentifier>,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(default = "default_false")]
    pub cert_req: bool,
}

fn default_false() -> bool {
    false
}

/// Random positive INTEGER content bytes in minimal two's complement form.
pub fn generate_positive_nonce_bytes() -> Vec<u8> {
    let mut random = [0u8; TS_REQ_NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut random);
    let mut bytes = random.to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0x00);
    }
    bytes
}

/// Service for building RFC3161 timestamp requests.
#[derive(Debug, Clone)]
pub struct TimestampRequestBuilder {
    use_nonce: bool,
    policy: Option<ObjectIdentifier>,
}

impl TimestampRequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            use_nonce: true,
            policy: None,
        }
    }

    #[must_use]
    pub fn without_nonce(mut self) -> Self {
        self.use_nonce = false;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ObjectIdentifier) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build a request whose imprint is `hash(signature_bytes)`.
    pub fn build(
        &self,
        signature_bytes: &[u8],
        hash_algorithm: HashAlgorithm,
    ) -> SigningResult<TimeStampReq> {
        if signature_bytes.is_empty() {
            return Err(SigningError::TimestampError(
                "Cannot create timestamp request for empty signature".into(),
            ));
        }
        let nonce = if self.use_nonce {
            Some(Int::new(&generate_positive_nonce_bytes())?)
        } else {
            None
        };
        Ok(TimeStampReq {
            version: 1,
            message_imprint: MessageImprint::new(hash_algorithm, signature_bytes)?,
            req_policy: self.policy,
            nonce,
            cert_req: true,
        })
    }

    /// Encoded request plus the nonce to expect in the reply.
    pub fn build_request(
        &self,
        signature_bytes: &[u8],
        hash_algorithm: HashAlgorithm,
    ) -> SigningResult<(Vec<u8>, Option<Int>)> {
        let request = self.build(signature_bytes, hash_algorithm)?;
        let der = request.to_der()?;
        log::debug!(
            "Built RFC3161 timestamp request: {} bytes for signature: {} bytes",
            der.len(),
            signature_bytes.len()
        );
        Ok((der, request.nonce))
    }
}

impl Default for TimestampRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
