//! `SignWorkflow` orchestrates core signing steps.
//!
//! artifact → style → canonical digest → Authenticode envelope → optional
//! timestamp → patch. The original bytes are never modified; a failure at any
//! stage leaves the caller with the untouched artifact.

use std::path::Path;
use std::time::SystemTime;

use x509_cert::Certificate;

use crate::adapters::key_provider::KeySigner;
use crate::domain::carrier::{CarrierDigest, CarrierFormat};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::patch::apply_patch;
use crate::domain::pkcs7::Pkcs7SignedData;
use crate::domain::style::{resolve_style, unknown_style, Style};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::pkcs7_builder::Pkcs7BuilderService;
use crate::services::timestamp_applier::{TimestampApplier, TimestampAuthority, TimestampPolicy};

/// Stand-in authority type for signing without a timestamp.
pub struct NoTimestampAuthority;

impl TimestampAuthority for NoTimestampAuthority {
    async fn request_token(&self, _data: &[u8], _hash: HashAlgorithm) -> SigningResult<Vec<u8>> {
        Err(SigningError::TimestampError(
            "no timestamp authority configured".to_string(),
        ))
    }
}

/// Whether a style can be resolved for `path`.
pub fn test_path(path: &Path) -> bool {
    path.to_str().and_then(resolve_style).is_some()
}

pub struct SignWorkflow {
    hash_algorithm: HashAlgorithm,
    style: Option<Style>,
    fallback_style: Option<Style>,
    builder: Pkcs7BuilderService,
    applier: TimestampApplier,
}

impl Default for SignWorkflow {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl SignWorkflow {
    #[must_use]
    pub fn new(hash_algorithm: HashAlgorithm) -> Self {
        Self {
            hash_algorithm,
            style: None,
            fallback_style: None,
            builder: Pkcs7BuilderService::new(),
            applier: TimestampApplier::default(),
        }
    }

    /// Force a style instead of resolving it from the artifact name.
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

    #[must_use]
    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.applier = TimestampApplier::new(policy);
        self
    }

    /// Extra certificates to embed in the envelope.
    #[must_use]
    pub fn with_additional_certs(mut self, certs: Vec<Certificate>) -> Self {
        self.builder = Pkcs7BuilderService::new().with_additional_certs(certs);
        self
    }

    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    /// Style for an artifact called `name`.
    pub fn resolve(&self, name: &str) -> SigningResult<Style> {
        self.style
            .or_else(|| resolve_style(name))
            .or(self.fallback_style)
            .ok_or_else(|| unknown_style(name))
    }

    fn envelope<C: CarrierFormat>(
        &self,
        carrier: &C,
        artifact: &[u8],
        signer: &dyn KeySigner,
    ) -> SigningResult<(C::Digest, Pkcs7SignedData)> {
        let digest = carrier.digest(artifact, self.hash_algorithm)?;
        log::debug!("Canonical digest: {}", digest.imprint().to_hex());
        let blob = self.builder.sign(digest.imprint(), signer)?;
        Ok((digest, blob))
    }

    fn embed<C: CarrierFormat>(
        carrier: &C,
        artifact: &[u8],
        digest: &C::Digest,
        blob: &Pkcs7SignedData,
    ) -> SigningResult<Vec<u8>> {
        let patch = carrier.build_patch(digest, blob.as_der())?;
        let signed = apply_patch(artifact, &patch)?;
        log::info!(
            "Embedded {} byte signature, artifact is now {} bytes",
            blob.len(),
            signed.len()
        );
        Ok(signed)
    }

    /// Sign `artifact` and return the patched bytes.
    ///
    /// With an authority, a timestamp is attached according to the policy.
    pub async fn sign<A: TimestampAuthority>(
        &self,
        artifact: &[u8],
        name: &str,
        signer: &dyn KeySigner,
        authority: Option<&A>,
    ) -> SigningResult<Vec<u8>> {
        let style = self.resolve(name)?;
        log::info!("Signing {name} as {style} style with {}", self.hash_algorithm);

        let (digest, blob) = self.envelope(&style, artifact, signer)?;
        let blob = match authority {
            Some(authority) => self.applier.attach_timestamp(&blob, authority).await?,
            None => blob,
        };
        Self::embed(&style, artifact, &digest, &blob)
    }

    /// Sign `artifact` and attach a legacy counter-signature made by
    /// `counter_signer` at `signing_time`.
    pub fn sign_with_counter_signature(
        &self,
        artifact: &[u8],
        name: &str,
        signer: &dyn KeySigner,
        counter_signer: &dyn KeySigner,
        signing_time: SystemTime,
    ) -> SigningResult<Vec<u8>> {
        let style = self.resolve(name)?;
        let (digest, blob) = self.envelope(&style, artifact, signer)?;
        let blob = self
            .applier
            .attach_counter_signature(&blob, counter_signer, signing_time)?;
        Self::embed(&style, artifact, &digest, &blob)
    }

    /// Sign `input` and write the result to `output`.
    pub async fn sign_file<A: TimestampAuthority>(
        &self,
        input: &Path,
        output: &Path,
        signer: &dyn KeySigner,
        authority: Option<&A>,
    ) -> SigningResult<()> {
        let artifact = tokio::fs::read(input)
            .await
            .map_err(|e| SigningError::IoError(format!("Failed to read {}: {e}", input.display())))?;
        let name = input.to_string_lossy();
        let signed = self.sign(&artifact, &name, signer, authority).await?;
        tokio::fs::write(output, signed)
            .await
            .map_err(|e| SigningError::IoError(format!("Failed to write {}: {e}", output.display())))?;
        Ok(())
    }
}
