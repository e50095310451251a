//! Validated value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::infra::error::{SigningError, SigningResult};

/// Timestamp authority URL, restricted to http(s).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimestampUrl(String);

impl TimestampUrl {
    pub fn new(url: impl AsRef<str>) -> SigningResult<Self> {
        let url = url.as_ref().trim();
        Self::validate_url(url)?;
        Ok(TimestampUrl(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate_url(url: &str) -> SigningResult<()> {
        let lower = url.to_ascii_lowercase();
        let Some(rest) = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"))
        else {
            return Err(SigningError::ValidationError(format!(
                "Timestamp URL must start with http:// or https://, got: {url}"
            )));
        };

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(SigningError::ValidationError(format!(
                "Timestamp URL has no host: {url}"
            )));
        }

        for pattern in ["javascript:", "file:", "data:"] {
            if lower.contains(pattern) {
                return Err(SigningError::ValidationError(format!(
                    "Timestamp URL contains suspicious pattern '{pattern}': {url}"
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for TimestampUrl {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TimestampUrl {
    type Error = SigningError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TimestampUrl> for String {
    fn from(url: TimestampUrl) -> Self {
        url.0
    }
}

impl fmt::Display for TimestampUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
