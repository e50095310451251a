//! `VerifyWorkflow`: high-level facade for verifying signed scripts.
//!
//! Extracts the embedded envelope, checks that it commits to the artifact's
//! canonical digest, verifies the signer and any timestamp. Trust chain
//! validation is left to the caller through [`VerifiedArtifact::verify_chain`].

use std::path::Path;

use cms::signed_data::SignedData;
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::domain::carrier::{CarrierDigest, CarrierFormat};
use crate::domain::constants::SPC_INDIRECT_DATA_OID;
use crate::domain::crypto::HashAlgorithm;
use crate::domain::pkcs7::{
    certificates_of, verify_optional_timestamp, verify_signer_info, ExtKeyUsage,
    Pkcs7SignedData, TimestampedSignature, TrustRoots,
};
use crate::domain::spc::SpcIndirectDataContent;
use crate::domain::style::{resolve_style, unknown_style, Style};
use crate::infra::error::{SigningError, SigningResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    /// Do not compare the signed digest with the artifact's content.
    pub skip_digests: bool,
}

/// A cryptographically verified, possibly timestamped, artifact signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedArtifact {
    hash: HashAlgorithm,
    signature: TimestampedSignature,
}

impl VerifiedArtifact {
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn signature(&self) -> &TimestampedSignature {
        &self.signature
    }

    /// Validate the code signing chain (and the timestamp chain, if any)
    /// against `roots`.
    pub fn verify_chain(&self, roots: &TrustRoots, extra: &[Certificate]) -> SigningResult<()> {
        self.signature
            .verify_chain(roots, extra, ExtKeyUsage::CodeSigning)
    }
}

/// Orchestrates verification steps for a signed script.
#[derive(Debug, Default)]
pub struct VerifyWorkflow {
    options: VerifyOptions,
    style: Option<Style>,
    fallback_style: Option<Style>,
}

impl VerifyWorkflow {
    #[must_use]
    pub fn new(options: VerifyOptions) -> Self {
        Self {
            options,
            style: None,
            fallback_style: None,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    /// Style used only when none resolves from the artifact name.
    #[must_use]
    pub fn with_fallback_style(mut self, style: Style) -> Self {
        self.fallback_style = Some(style);
        self
    }

    pub fn resolve(&self, name: &str) -> SigningResult<Style> {
        self.style
            .or_else(|| resolve_style(name))
            .or(self.fallback_style)
            .ok_or_else(|| unknown_style(name))
    }

    /// Verify the signature embedded in `artifact`, named `name` for style
    /// resolution.
    pub fn verify(&self, artifact: &[u8], name: &str) -> SigningResult<VerifiedArtifact> {
        let style = self.resolve(name)?;
        self.verify_carrier(&style, artifact, name)
    }

    pub async fn verify_file(&self, path: &Path) -> SigningResult<VerifiedArtifact> {
        let artifact = tokio::fs::read(path)
            .await
            .map_err(|e| SigningError::IoError(format!("Failed to read {}: {e}", path.display())))?;
        self.verify(&artifact, &path.to_string_lossy())
    }

    fn verify_carrier<C: CarrierFormat>(
        &self,
        carrier: &C,
        artifact: &[u8],
        name: &str,
    ) -> SigningResult<VerifiedArtifact> {
        let digest = carrier.digest(artifact, HashAlgorithm::default())?;
        let embedded = digest
            .embedded_signature()
            .ok_or_else(|| SigningError::NotSignedError(format!("{name}: signature not found")))?;
        let blob = Pkcs7SignedData::from_der(embedded.to_vec())?;
        let signed_data = blob.signed_data()?;

        let content = signed_content(&signed_data)?;
        let hash = content.digest_algorithm()?;
        log::debug!("{name}: envelope of {} bytes, {hash}", blob.len());

        if !self.options.skip_digests {
            let digest = if hash == digest.imprint().algorithm() {
                digest
            } else {
                carrier.digest(artifact, hash)?
            };
            if digest.imprint().as_slice() != content.digest() {
                return Err(SigningError::VerificationError(format!(
                    "{name}: digest mismatch, content was modified after signing"
                )));
            }
        }

        let signer_info = match signed_data.signer_infos.0.as_slice() {
            [one] => one,
            infos => {
                return Err(SigningError::VerificationError(format!(
                    "{name}: expected exactly one SignerInfo, found {}",
                    infos.len()
                )))
            }
        };
        let econtent = signed_data.encap_content_info.econtent.as_ref().ok_or_else(|| {
            SigningError::Pkcs7Error("SignedData has no encapsulated content".to_string())
        })?;

        let signature = verify_signer_info(
            signer_info,
            econtent.value(),
            &certificates_of(&signed_data),
        )?;
        let signature = verify_optional_timestamp(signature)?;
        log::info!(
            "{name}: signature by {} verified{}",
            signature.signature().certificate().tbs_certificate.subject,
            if signature.counter_signature().is_some() {
                " (timestamped)"
            } else {
                ""
            }
        );
        Ok(VerifiedArtifact { hash, signature })
    }
}

fn signed_content(signed_data: &SignedData) -> SigningResult<SpcIndirectDataContent> {
    let info = &signed_data.encap_content_info;
    if info.econtent_type != SPC_INDIRECT_DATA_OID {
        return Err(SigningError::Pkcs7Error(format!(
            "content type is {}, expected SpcIndirectDataContent",
            info.econtent_type
        )));
    }
    let econtent = info.econtent.as_ref().ok_or_else(|| {
        SigningError::Pkcs7Error("SignedData has no encapsulated content".to_string())
    })?;
    SpcIndirectDataContent::from_der(&econtent.to_der()?)
        .map_err(|e| SigningError::Pkcs7Error(format!("Invalid SpcIndirectDataContent: {e}")))
}
