//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Signing keys and certificate chains loaded through OpenSSL
//! - HTTP timestamp authority communication with retry logic

pub mod key_provider;
pub mod timestamp_http_client;

pub use key_provider::{KeyAlgorithm, KeySigner, OpenSslKeySigner};
pub use timestamp_http_client::{TimestampHttpClient, TimestampHttpConfig};
