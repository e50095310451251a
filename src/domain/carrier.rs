//! Carrier format capability.
//!
//! A carrier knows how to canonicalize an artifact into a digest and how to
//! embed a signed blob back into it. Signing and verification only talk to
//! carriers through this trait.

use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use crate::domain::patch::Patch;
use crate::infra::error::SigningResult;

pub trait CarrierFormat {
    type Digest: CarrierDigest;

    /// Strip any embedded signature and hash the remaining canonical content.
    fn digest(&self, artifact: &[u8], hash: HashAlgorithm) -> SigningResult<Self::Digest>;

    /// Encode `signed_blob` in the carrier syntax as a patch over the artifact
    /// that produced `digest`.
    fn build_patch(&self, digest: &Self::Digest, signed_blob: &[u8]) -> SigningResult<Patch>;
}

/// Read access to a computed carrier digest.
pub trait CarrierDigest {
    fn imprint(&self) -> &DigestBytes;

    /// Signature blob found in the artifact while digesting, if any.
    fn embedded_signature(&self) -> Option<&[u8]>;
}
