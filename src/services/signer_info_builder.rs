//! SignerInfo construction with authenticated attributes.

use std::time::SystemTime;

use cms::cert::IssuerAndSerialNumber;
use cms::content_info::CmsVersion;
use cms::signed_data::{SignerIdentifier, SignerInfo};
use der::asn1::{Any, GeneralizedTime, ObjectIdentifier, OctetString, UtcTime};
use der::Encode;
use spki::AlgorithmIdentifierOwned;
use x509_cert::time::Time;

use crate::adapters::key_provider::{KeyAlgorithm, KeySigner};
use crate::domain::constants::{
    PKCS9_CONTENT_TYPE_OID, PKCS9_MESSAGE_DIGEST_OID, PKCS9_SIGNING_TIME_OID, PKCS7_DATA_OID,
    RSA_ENCRYPTION_OID,
};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::pkcs7::attributes::{self, Attributes};
use crate::domain::spc::digest_algorithm_identifier;
use crate::infra::error::{SigningError, SigningResult};

/// `signingTime` value: UTCTime through 2049, GeneralizedTime after.
pub fn signing_time_value(time: SystemTime) -> SigningResult<Time> {
    match UtcTime::from_system_time(time) {
        Ok(utc) => Ok(Time::UtcTime(utc)),
        Err(_) => Ok(Time::GeneralTime(GeneralizedTime::from_system_time(time)?)),
    }
}

fn signature_algorithm(key: KeyAlgorithm, hash: HashAlgorithm) -> AlgorithmIdentifierOwned {
    match key {
        KeyAlgorithm::Rsa => AlgorithmIdentifierOwned {
            oid: RSA_ENCRYPTION_OID,
            parameters: Some(Any::null()),
        },
        KeyAlgorithm::Ec => AlgorithmIdentifierOwned {
            oid: hash.ecdsa_signature_oid(),
            parameters: None,
        },
    }
}

/// Builds one `SignerInfo` whose signature covers the DER attribute set.
pub struct SignerInfoBuilder<'a> {
    signer: &'a dyn KeySigner,
    hash: HashAlgorithm,
    content_type: ObjectIdentifier,
    signing_time: Option<SystemTime>,
    extra: Option<Attributes>,
}

impl<'a> SignerInfoBuilder<'a> {
    pub fn new(signer: &'a dyn KeySigner, hash: HashAlgorithm) -> Self {
        Self {
            signer,
            hash,
            content_type: PKCS7_DATA_OID,
            signing_time: None,
            extra: None,
        }
    }

    #[must_use]
    pub fn content_type(mut self, content_type: ObjectIdentifier) -> Self {
        self.content_type = content_type;
        self
    }

    #[must_use]
    pub fn signing_time(mut self, time: SystemTime) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Add an extra authenticated attribute.
    pub fn attribute<T: Encode>(mut self, oid: ObjectIdentifier, value: &T) -> SigningResult<Self> {
        attributes::add(&mut self.extra, oid, value)?;
        Ok(self)
    }

    /// Sign `content`, which the messageDigest attribute will commit to.
    pub fn build(self, content: &[u8]) -> SigningResult<SignerInfo> {
        let mut signed_attrs = self.extra;
        attributes::add(&mut signed_attrs, PKCS9_CONTENT_TYPE_OID, &self.content_type)?;
        attributes::add(
            &mut signed_attrs,
            PKCS9_MESSAGE_DIGEST_OID,
            &OctetString::new(self.hash.digest(content))?,
        )?;
        if let Some(time) = self.signing_time {
            attributes::add(
                &mut signed_attrs,
                PKCS9_SIGNING_TIME_OID,
                &signing_time_value(time)?,
            )?;
        }
        let signed_attrs = signed_attrs.ok_or_else(|| {
            SigningError::SignatureError("authenticated attributes are empty".to_string())
        })?;

        let signature = self.signer.sign(&signed_attrs.to_der()?, self.hash)?;
        let leaf = self.signer.chain().leaf();
        log::debug!(
            "Built SignerInfo for {} ({} attributes, {} byte signature)",
            leaf.tbs_certificate.subject,
            signed_attrs.len(),
            signature.len()
        );

        Ok(SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: leaf.tbs_certificate.issuer.clone(),
                serial_number: leaf.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: digest_algorithm_identifier(self.hash),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: signature_algorithm(self.signer.key_algorithm(), self.hash),
            signature: OctetString::new(signature)?,
            unsigned_attrs: None,
        })
    }
}
