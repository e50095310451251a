//! Error types for signing and verification operations.
//!
//! One enum covers the whole pipeline. Structural and integrity failures are
//! surfaced with enough context (attribute OID, expected counts) to diagnose
//! without re-parsing the artifact.

use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Comprehensive error types for signing operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Unknown signature style: {0}")]
    UnknownStyleError(String),

    #[error("Unrecognized artifact structure: {0}")]
    UnrecognizedStyleError(String),

    #[error("Cannot encode signature block: {0}")]
    PatchEncodingError(String),

    #[error("Cannot apply patch: {0}")]
    PatchApplicationError(String),

    #[error("Signature creation error: {0}")]
    SignatureError(String),

    #[error("Signature verification failed: {0}")]
    VerificationError(String),

    #[error("Artifact is not signed: {0}")]
    NotSignedError(String),

    #[error("Timestamp error: {0}")]
    TimestampError(String),

    #[error("Malformed timestamp: {0}")]
    MalformedTimestampError(String),

    #[error("Timestamp integrity failure: {0}")]
    TimestampIntegrityError(String),

    #[error("Timestamp has no signing time: {0}")]
    MissingSigningTimeError(String),

    #[error("Certificate chain validation failed: {0}")]
    ChainValidationError(String),

    #[error("validating timestamp: {0}")]
    TimestampChainError(#[source] Box<SigningError>),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("ASN.1 encoding/decoding error: {0}")]
    Asn1Error(String),

    #[error("PKCS#7 structure error: {0}")]
    Pkcs7Error(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::Asn1Error(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

impl From<reqwest::Error> for SigningError {
    fn from(error: reqwest::Error) -> Self {
        SigningError::NetworkError(error.to_string())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SigningError::UnknownStyleError("foo.txt".to_string());
        assert_eq!(error.to_string(), "Unknown signature style: foo.txt");

        let error = SigningError::InvalidInput("empty artifact".to_string());
        assert_eq!(error.to_string(), "Invalid input: empty artifact");
    }

    #[test]
    fn test_timestamp_chain_error_names_timestamp() {
        let inner = SigningError::ChainValidationError("certificate has expired".to_string());
        let error = SigningError::TimestampChainError(Box::new(inner));
        assert_eq!(
            error.to_string(),
            "validating timestamp: Certificate chain validation failed: certificate has expired"
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_conversion() {
        let der_error = der::Error::from(der::ErrorKind::Failed);
        match SigningError::from(der_error) {
            SigningError::Asn1Error(msg) => assert!(!msg.is_empty()),
            other => panic!("Wrong error type: {other:?}"),
        }
    }
}
