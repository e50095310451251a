//! Timestamp applier service.
//!
//! Attaches a timestamp over the signer's encrypted digest as an
//! unauthenticated attribute. Authenticated attributes are never touched.

use std::time::{Duration, SystemTime};

use cms::signed_data::SignerInfo;
use x509_cert::Certificate;

use crate::adapters::key_provider::KeySigner;
use crate::domain::constants::{PKCS7_DATA_OID, PKCS9_COUNTER_SIGNATURE_OID};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::pkcs7::attributes;
use crate::domain::pkcs7::{certificates_of, timestamp_lookup_order, Pkcs7SignedData, TimestampKind};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::pkcs7_builder::{certificate_set, update_signer_info};
use crate::services::signer_info_builder::SignerInfoBuilder;
use crate::services::timestamp_parser::TimestampParserService;

/// Source of RFC 3161 timestamp tokens.
#[allow(async_fn_in_trait)]
pub trait TimestampAuthority {
    /// Obtain a token whose imprint is `hash(data)`; returns the token
    /// `ContentInfo` DER.
    async fn request_token(&self, data: &[u8], hash: HashAlgorithm) -> SigningResult<Vec<u8>>;
}

/// Attribute a token is attached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFlavor {
    /// `id-aa-timeStampToken`
    Rfc3161,
    /// Authenticode RFC 3161 timestamp attribute
    #[default]
    Authenticode,
}

impl TimestampFlavor {
    pub fn kind(&self) -> TimestampKind {
        match self {
            TimestampFlavor::Rfc3161 => TimestampKind::Rfc3161,
            TimestampFlavor::Authenticode => TimestampKind::Authenticode,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimestampPolicy {
    /// Fail the whole operation when no timestamp can be obtained.
    pub required: bool,
    pub flavor: TimestampFlavor,
    pub timeout: Duration,
}

impl Default for TimestampPolicy {
    fn default() -> Self {
        Self {
            required: false,
            flavor: TimestampFlavor::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn has_timestamp(signer_info: &SignerInfo) -> bool {
    timestamp_lookup_order()
        .iter()
        .any(|kind| attributes::contains(signer_info.unsigned_attrs.as_ref(), kind.attribute_oid()))
}

fn signer_hash(signer_info: &SignerInfo) -> SigningResult<HashAlgorithm> {
    HashAlgorithm::from_oid(&signer_info.digest_alg.oid).ok_or_else(|| {
        SigningError::TimestampError(format!(
            "unsupported signer digest algorithm {}",
            signer_info.digest_alg.oid
        ))
    })
}

/// Service for attaching timestamps to PKCS#7 structures.
pub struct TimestampApplier {
    policy: TimestampPolicy,
}

impl TimestampApplier {
    #[must_use]
    pub fn new(policy: TimestampPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TimestampPolicy {
        &self.policy
    }

    /// Request a token from `authority` and attach it.
    ///
    /// When the policy does not require a timestamp, failures are logged and
    /// the unstamped blob is returned.
    pub async fn attach_timestamp<A: TimestampAuthority>(
        &self,
        blob: &Pkcs7SignedData,
        authority: &A,
    ) -> SigningResult<Pkcs7SignedData> {
        match self.request_and_attach(blob, authority).await {
            Ok(stamped) => {
                log::info!("Attached {:?} timestamp", self.policy.flavor);
                Ok(stamped)
            }
            Err(e) if self.policy.required => Err(match e {
                SigningError::TimestampError(_) => e,
                other => SigningError::TimestampError(other.to_string()),
            }),
            Err(e) => {
                log::warn!("Timestamp failed, continuing without one: {e}");
                Ok(blob.clone())
            }
        }
    }

    async fn request_and_attach<A: TimestampAuthority>(
        &self,
        blob: &Pkcs7SignedData,
        authority: &A,
    ) -> SigningResult<Pkcs7SignedData> {
        let signed_data = blob.signed_data()?;
        let signer_info = signed_data.signer_infos.0.iter().next().ok_or_else(|| {
            SigningError::Pkcs7Error("SignedData has no SignerInfo".to_string())
        })?;
        let hash = signer_hash(signer_info)?;
        let encrypted_digest = signer_info.signature.as_bytes().to_vec();

        let token_der = tokio::time::timeout(
            self.policy.timeout,
            authority.request_token(&encrypted_digest, hash),
        )
        .await
        .map_err(|_| {
            SigningError::TimestampError(format!(
                "timestamp request timed out after {:?}",
                self.policy.timeout
            ))
        })??;

        self.attach_token(blob, &token_der)
    }

    /// Attach an already obtained token after checking it attests the
    /// signer's encrypted digest.
    pub fn attach_token(
        &self,
        blob: &Pkcs7SignedData,
        token_der: &[u8],
    ) -> SigningResult<Pkcs7SignedData> {
        let oid = self.policy.flavor.kind().attribute_oid();
        update_signer_info(blob, |_, signer_info| {
            if has_timestamp(signer_info) {
                return Err(SigningError::TimestampError(
                    "signature already carries a timestamp".to_string(),
                ));
            }
            let token =
                TimestampParserService::parse_and_validate(token_der, signer_info.signature.as_bytes())?;
            attributes::add(&mut signer_info.unsigned_attrs, oid, &token.to_any()?)?;
            log::debug!(
                "Attached timestamp token ({} bytes) under {oid}",
                token.as_der().len()
            );
            Ok(())
        })
    }

    /// Counter-sign the signer's encrypted digest with `counter_signer`
    /// (legacy PKCS#9 form).
    pub fn attach_counter_signature(
        &self,
        blob: &Pkcs7SignedData,
        counter_signer: &dyn KeySigner,
        signing_time: SystemTime,
    ) -> SigningResult<Pkcs7SignedData> {
        let signed_data = blob.signed_data()?;
        let parent = signed_data.signer_infos.0.iter().next().ok_or_else(|| {
            SigningError::Pkcs7Error("SignedData has no SignerInfo".to_string())
        })?;
        let counter = SignerInfoBuilder::new(counter_signer, signer_hash(parent)?)
            .content_type(PKCS7_DATA_OID)
            .signing_time(signing_time)
            .build(parent.signature.as_bytes())?;
        let certs: Vec<Certificate> = counter_signer.chain().iter().cloned().collect();
        self.attach_counter_signer_info(blob, &counter, &certs)
    }

    /// Attach a prepared counter-signer and merge its certificates into the
    /// envelope's certificate set.
    pub fn attach_counter_signer_info(
        &self,
        blob: &Pkcs7SignedData,
        counter: &SignerInfo,
        certificates: &[Certificate],
    ) -> SigningResult<Pkcs7SignedData> {
        update_signer_info(blob, |signed_data, signer_info| {
            if has_timestamp(signer_info) {
                return Err(SigningError::TimestampError(
                    "signature already carries a timestamp".to_string(),
                ));
            }
            attributes::add(
                &mut signer_info.unsigned_attrs,
                PKCS9_COUNTER_SIGNATURE_OID,
                counter,
            )?;
            let mut merged = certificates_of(signed_data);
            merged.extend_from_slice(certificates);
            signed_data.certificates = Some(certificate_set(merged.iter())?);
            Ok(())
        })
    }
}

impl Default for TimestampApplier {
    fn default() -> Self {
        Self::new(TimestampPolicy::default())
    }
}
