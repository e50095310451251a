//! Foundational cryptographic domain types.
//!
//! - Hash algorithms and digest values with size validation
//! - Certificate chain ordering (leaf first)

mod cert;
mod digest_bytes;
mod hash;

pub use cert::CertChain;
pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::HashAlgorithm;
