//! Verified signatures.
//!
//! A [`Signature`] can only be obtained from [`verify_signer_info`]: holding
//! one means the `SignerInfo` was cryptographically checked against the
//! certificate it names.

use std::time::SystemTime;

use cms::cert::CertificateChoices;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::OctetString;
use der::{Decode, Encode};
use openssl::sign::Verifier;
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::Certificate;

use super::attributes;
use super::chain::{self, ExtKeyUsage, TrustRoots};
use crate::domain::constants::PKCS9_MESSAGE_DIGEST_OID;
use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::{SigningError, SigningResult};

const SUBJECT_KEY_IDENTIFIER_OID: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("2.5.29.14");

/// A `SignerInfo` paired with its verified leaf certificate and the
/// intermediates that travelled with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    signer_info: SignerInfo,
    certificate: Certificate,
    intermediates: Vec<Certificate>,
}

impl Signature {
    pub fn signer_info(&self) -> &SignerInfo {
        &self.signer_info
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn intermediates(&self) -> &[Certificate] {
        &self.intermediates
    }

    /// Raw signature value of the `SignerInfo`.
    pub fn encrypted_digest(&self) -> &[u8] {
        self.signer_info.signature.as_bytes()
    }

    pub fn digest_algorithm(&self) -> SigningResult<HashAlgorithm> {
        signer_hash(&self.signer_info)
    }

    /// Validate the signing certificate up to `roots`.
    ///
    /// `reference_time` defaults to now.
    pub fn verify_chain(
        &self,
        roots: &TrustRoots,
        extra: &[Certificate],
        usage: ExtKeyUsage,
        reference_time: Option<SystemTime>,
    ) -> SigningResult<()> {
        let mut pool = self.intermediates.clone();
        pool.extend_from_slice(extra);
        chain::validate_chain(
            &self.certificate,
            &pool,
            roots,
            usage,
            reference_time.unwrap_or_else(SystemTime::now),
        )
    }
}

fn signer_hash(si: &SignerInfo) -> SigningResult<HashAlgorithm> {
    HashAlgorithm::from_oid(&si.digest_alg.oid).ok_or_else(|| {
        SigningError::VerificationError(format!(
            "unsupported digest algorithm {}",
            si.digest_alg.oid
        ))
    })
}

/// Certificates carried in a `SignedData`, in encoded order.
pub fn certificates_of(signed_data: &SignedData) -> Vec<Certificate> {
    signed_data
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert.clone()),
            _ => None,
        })
        .collect()
}

fn find_certificate<'a>(
    sid: &SignerIdentifier,
    certificates: &'a [Certificate],
) -> Option<&'a Certificate> {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(isn) => certificates.iter().find(|c| {
            c.tbs_certificate.issuer == isn.issuer
                && c.tbs_certificate.serial_number == isn.serial_number
        }),
        SignerIdentifier::SubjectKeyIdentifier(ski) => certificates.iter().find(|c| {
            c.tbs_certificate
                .extensions
                .iter()
                .flatten()
                .filter(|e| e.extn_id == SUBJECT_KEY_IDENTIFIER_OID)
                .filter_map(|e| SubjectKeyIdentifier::from_der(e.extn_value.as_bytes()).ok())
                .any(|found| found == *ski)
        }),
    }
}

/// Verify `signer_info` over `content` using a certificate from `certificates`.
///
/// With authenticated attributes present, `content` must match the
/// messageDigest attribute and the signature covers the DER attribute set.
/// Otherwise the signature covers `content` directly.
pub fn verify_signer_info(
    signer_info: &SignerInfo,
    content: &[u8],
    certificates: &[Certificate],
) -> SigningResult<Signature> {
    let certificate = find_certificate(&signer_info.sid, certificates)
        .ok_or_else(|| {
            SigningError::VerificationError(
                "signer certificate not found in certificate set".to_string(),
            )
        })?
        .clone();
    let hash = signer_hash(signer_info)?;

    let signed_bytes = match &signer_info.signed_attrs {
        Some(signed_attrs) => {
            let message_digest: OctetString =
                attributes::get_one(Some(signed_attrs), PKCS9_MESSAGE_DIGEST_OID)?;
            if message_digest.as_bytes() != hash.digest(content).as_slice() {
                return Err(SigningError::VerificationError(
                    "messageDigest attribute does not match content".to_string(),
                ));
            }
            signed_attrs.to_der()?
        }
        None => content.to_vec(),
    };

    let public_key = chain::to_openssl(&certificate)?.public_key()?;
    let mut verifier = Verifier::new(hash.message_digest(), &public_key)?;
    verifier.update(&signed_bytes)?;
    match verifier.verify(signer_info.signature.as_bytes()) {
        Ok(true) => {}
        Ok(false) => {
            return Err(SigningError::VerificationError(format!(
                "signature does not verify with {}",
                certificate.tbs_certificate.subject
            )))
        }
        Err(e) => {
            return Err(SigningError::VerificationError(format!(
                "signature value is malformed: {e}"
            )))
        }
    }

    log::debug!(
        "Verified {} signature by {}",
        hash,
        certificate.tbs_certificate.subject
    );
    Ok(Signature {
        signer_info: signer_info.clone(),
        certificate,
        intermediates: certificates.to_vec(),
    })
}
