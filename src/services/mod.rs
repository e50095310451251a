//! Service layer module root.
//! Builds envelopes, signer records and timestamp exchanges.

pub mod pkcs7_builder;
pub mod signer_info_builder;
pub mod timestamp_applier;
pub mod timestamp_parser;
pub mod timestamp_request_builder;

pub use pkcs7_builder::Pkcs7BuilderService;
pub use signer_info_builder::SignerInfoBuilder;
pub use timestamp_applier::{TimestampApplier, TimestampAuthority, TimestampFlavor, TimestampPolicy};
pub use timestamp_parser::TimestampParserService;
pub use timestamp_request_builder::TimestampRequestBuilder;
