//! Certificate chain validation at a fixed reference time.
//!
//! Every call builds its own OpenSSL store from the caller's roots, so caller
//! owned root sets are never mutated and validations can run concurrently.

use std::time::{SystemTime, UNIX_EPOCH};

use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyParam;
use openssl::x509::{X509StoreContext, X509};
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::Certificate;

use crate::domain::constants::{
    ANY_EXT_KEY_USAGE_OID, CODE_SIGNING_EKU_OID, EXT_KEY_USAGE_OID, TIME_STAMPING_EKU_OID,
};
use crate::infra::error::{SigningError, SigningResult};

/// Trust anchors for chain validation.
#[derive(Clone, Default)]
pub struct TrustRoots {
    roots: Vec<X509>,
}

impl TrustRoots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every certificate in a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> SigningResult<Self> {
        let roots = X509::stack_from_pem(pem)
            .map_err(|e| SigningError::CertificateError(format!("Invalid root bundle: {e}")))?;
        if roots.is_empty() {
            return Err(SigningError::CertificateError(
                "Root bundle contains no certificates".to_string(),
            ));
        }
        Ok(Self { roots })
    }

    pub fn from_certificates(certs: &[Certificate]) -> SigningResult<Self> {
        let roots = certs.iter().map(to_openssl).collect::<SigningResult<Vec<_>>>()?;
        Ok(Self { roots })
    }

    pub fn add(&mut self, root: X509) {
        self.roots.push(root);
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl std::fmt::Debug for TrustRoots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrustRoots(count={})", self.roots.len())
    }
}

/// Extended key usage required along the certificate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtKeyUsage {
    CodeSigning,
    TimeStamping,
    Any,
}

impl ExtKeyUsage {
    fn oid(&self) -> Option<ObjectIdentifier> {
        match self {
            ExtKeyUsage::CodeSigning => Some(CODE_SIGNING_EKU_OID),
            ExtKeyUsage::TimeStamping => Some(TIME_STAMPING_EKU_OID),
            ExtKeyUsage::Any => None,
        }
    }
}

pub(crate) fn to_openssl(cert: &Certificate) -> SigningResult<X509> {
    Ok(X509::from_der(&cert.to_der()?)?)
}

/// Validate `leaf` up to `roots` as of `reference_time`, requiring `usage`.
pub fn validate_chain(
    leaf: &Certificate,
    intermediates: &[Certificate],
    roots: &TrustRoots,
    usage: ExtKeyUsage,
    reference_time: SystemTime,
) -> SigningResult<()> {
    let subject = leaf.tbs_certificate.subject.to_string();
    let secs = reference_time
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SigningError::ChainValidationError(format!("reference time: {e}")))?
        .as_secs();

    let mut param = X509VerifyParam::new()?;
    param.set_time(secs as _);

    let mut store = X509StoreBuilder::new()?;
    for root in &roots.roots {
        store.add_cert(root.clone())?;
    }
    store.set_param(&param)?;
    let store = store.build();

    let mut chain = Stack::new()?;
    for cert in intermediates {
        chain.push(to_openssl(cert)?)?;
    }
    let leaf_x509 = to_openssl(leaf)?;

    let mut ctx = X509StoreContext::new()?;
    let (verified, result, path) = ctx.init(&store, &leaf_x509, &chain, |c| {
        let verified = c.verify_cert()?;
        let path = match c.chain() {
            Some(built) => built
                .iter()
                .map(|cert| cert.to_der())
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok((verified, c.error(), path))
    })?;
    if !verified {
        return Err(SigningError::ChainValidationError(format!(
            "{subject}: {}",
            result.error_string()
        )));
    }

    // Issuers restrict usage too: every EKU on the path must allow it.
    check_ext_key_usage(leaf, usage)?;
    for der in path.iter().skip(1) {
        check_ext_key_usage(&Certificate::from_der(der)?, usage)?;
    }
    log::debug!("Validated chain for {subject} at unix time {secs} ({usage:?})");
    Ok(())
}

/// A certificate without an EKU extension is unrestricted.
fn check_ext_key_usage(cert: &Certificate, usage: ExtKeyUsage) -> SigningResult<()> {
    let Some(required) = usage.oid() else {
        return Ok(());
    };
    let Some(ext) = cert
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|e| e.extn_id == EXT_KEY_USAGE_OID)
    else {
        return Ok(());
    };
    let eku = ExtendedKeyUsage::from_der(ext.extn_value.as_bytes())?;
    if eku
        .0
        .iter()
        .any(|oid| *oid == required || *oid == ANY_EXT_KEY_USAGE_OID)
    {
        Ok(())
    } else {
        Err(SigningError::ChainValidationError(format!(
            "{}: certificate is not valid for {usage:?} (extended key usage {required} missing)",
            cert.tbs_certificate.subject
        )))
    }
}
