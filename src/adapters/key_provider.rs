//! Key and certificate provider boundary.
//!
//! The signing core never sees key material: it asks a [`KeySigner`] to sign
//! bytes and to hand over its certificate chain. [`OpenSslKeySigner`] is the
//! software implementation backed by PEM files.

use std::fmt;
use std::path::Path;

use openssl::pkey::{Id, PKey, Private};
use openssl::sign::Signer;
use openssl::x509::X509;

use crate::domain::crypto::{CertChain, HashAlgorithm};
use crate::infra::error::{SigningError, SigningResult};

/// Public key family of a signer, which selects the signature algorithm OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
}

pub trait KeySigner: Send + Sync {
    /// Hash `data` with `hash` and sign it.
    fn sign(&self, data: &[u8], hash: HashAlgorithm) -> SigningResult<Vec<u8>>;

    /// Signing certificate first, then intermediates.
    fn chain(&self) -> &CertChain;

    fn key_algorithm(&self) -> KeyAlgorithm;
}

/// Software signer holding an OpenSSL private key.
pub struct OpenSslKeySigner {
    key: PKey<Private>,
    chain: CertChain,
    algorithm: KeyAlgorithm,
}

impl fmt::Debug for OpenSslKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSslKeySigner")
            .field("chain", &self.chain)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl OpenSslKeySigner {
    /// Pair `key` with `chain`, checking the leaf certificate matches the key.
    pub fn new(key: PKey<Private>, chain: CertChain) -> SigningResult<Self> {
        let algorithm = match key.id() {
            Id::RSA => KeyAlgorithm::Rsa,
            Id::EC => KeyAlgorithm::Ec,
            other => {
                return Err(SigningError::CryptographicError(format!(
                    "Unsupported key type: {other:?}"
                )))
            }
        };
        let leaf = X509::from_der(&chain.leaf_der()?)?;
        if !leaf.public_key()?.public_eq(&key) {
            return Err(SigningError::CertificateError(
                "certificate public key does not match the provided private key".to_string(),
            ));
        }
        Ok(Self {
            key,
            chain,
            algorithm,
        })
    }

    /// Load a PEM certificate chain (leaf first) and a PEM private key.
    pub fn from_pem(chain_pem: &[u8], key_pem: &[u8]) -> SigningResult<Self> {
        let certs = X509::stack_from_pem(chain_pem)
            .map_err(|e| SigningError::CertificateError(format!("Invalid certificate PEM: {e}")))?;
        let ders = certs
            .iter()
            .map(|c| c.to_der())
            .collect::<Result<Vec<_>, _>>()?;
        let chain = CertChain::from_der_list(ders)?;
        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| SigningError::CryptographicError(format!("Invalid private key PEM: {e}")))?;
        Self::new(key, chain)
    }

    pub fn from_pem_files(chain_path: &Path, key_path: &Path) -> SigningResult<Self> {
        let chain_pem = std::fs::read(chain_path).map_err(|e| {
            SigningError::IoError(format!("Failed to read {}: {e}", chain_path.display()))
        })?;
        let key_pem = std::fs::read(key_path).map_err(|e| {
            SigningError::IoError(format!("Failed to read {}: {e}", key_path.display()))
        })?;
        Self::from_pem(&chain_pem, &key_pem)
    }
}

impl KeySigner for OpenSslKeySigner {
    fn sign(&self, data: &[u8], hash: HashAlgorithm) -> SigningResult<Vec<u8>> {
        let mut signer = Signer::new(hash.message_digest(), &self.key)
            .map_err(|e| SigningError::SignatureError(e.to_string()))?;
        signer
            .update(data)
            .map_err(|e| SigningError::SignatureError(e.to_string()))?;
        signer
            .sign_to_vec()
            .map_err(|e| SigningError::SignatureError(e.to_string()))
    }

    fn chain(&self) -> &CertChain {
        &self.chain
    }

    fn key_algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }
}
