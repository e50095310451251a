//! Script Signer Library
//!
//! Authenticode signing and verification for PowerShell-family scripts
//! (`.ps1`, `.psm1`, `.ps1xml`, `.mof`, ...). Signatures are PKCS#7
//! `SignedData` envelopes embedded as comment blocks, optionally carrying an
//! RFC 3161 timestamp or a legacy counter-signature.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use adapters::key_provider::{KeyAlgorithm, KeySigner, OpenSslKeySigner};
pub use adapters::timestamp_http_client::{TimestampHttpClient, TimestampHttpConfig};
pub use domain::carrier::{CarrierDigest, CarrierFormat};
pub use domain::crypto::{CertChain, DigestBytes, HashAlgorithm};
pub use domain::patch::{apply_patch, Patch};
pub use domain::pkcs7::{
    verify_optional_timestamp, verify_timestamp, CounterSignature, ExtKeyUsage, Pkcs7SignedData,
    Signature, TimestampKind, TimestampedSignature, TrustRoots,
};
pub use domain::style::{all_styles, resolve_style, Style};
pub use domain::types::TimestampUrl;
pub use infra::config::{ConfigManager, ExportFormat, SigningConfiguration};
pub use infra::error::{SigningError, SigningResult};
pub use pipelines::{
    test_path, NoTimestampAuthority, SignWorkflow, VerifiedArtifact, VerifyOptions,
    VerifyWorkflow,
};
pub use services::timestamp_applier::{
    TimestampApplier, TimestampAuthority, TimestampFlavor, TimestampPolicy,
};
