use std::fmt;

use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::infra::error::{SigningError, SigningResult};

/// Ordered certificate chain (leaf first, then intermediates). Root excluded.
#[derive(Clone, PartialEq, Eq)]
pub struct CertChain {
    leaf: Certificate,
    intermediates: Vec<Certificate>,
}

impl CertChain {
    #[must_use]
    pub fn new(leaf: Certificate) -> Self {
        Self {
            leaf,
            intermediates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_intermediates(mut self, list: Vec<Certificate>) -> Self {
        self.intermediates = list;
        self
    }

    /// Build from DER certificates, leaf first.
    pub fn from_der_list<I, B>(ders: I) -> SigningResult<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut certs = ders
            .into_iter()
            .map(|der| {
                Certificate::from_der(der.as_ref())
                    .map_err(|e| SigningError::CertificateError(format!("Invalid certificate: {e}")))
            })
            .collect::<SigningResult<Vec<_>>>()?
            .into_iter();
        let leaf = certs
            .next()
            .ok_or_else(|| SigningError::CertificateError("Empty certificate chain".into()))?;
        Ok(Self::new(leaf).with_intermediates(certs.collect()))
    }

    #[must_use]
    pub fn leaf(&self) -> &Certificate {
        &self.leaf
    }

    #[must_use]
    pub fn intermediates(&self) -> &[Certificate] {
        &self.intermediates
    }

    /// Leaf followed by intermediates.
    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        std::iter::once(&self.leaf).chain(self.intermediates.iter())
    }

    pub fn leaf_der(&self) -> SigningResult<Vec<u8>> {
        Ok(self.leaf.to_der()?)
    }
}

impl fmt::Debug for CertChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CertChain(leaf={}, intermediates={})",
            self.leaf.tbs_certificate.subject,
            self.intermediates.len()
        )
    }
}
