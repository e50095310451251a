//! Workflow pipelines orchestrating stateless services.

pub mod sign;
pub mod verify;

pub use sign::{test_path, NoTimestampAuthority, SignWorkflow};
pub use verify::{VerifiedArtifact, VerifyOptions, VerifyWorkflow};
