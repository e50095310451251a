//! Timestamp response parser & validator service.

use der::asn1::{Any, BitString, Int};
use der::{Decode, Encode, Sequence};

use crate::domain::pkcs7::TimestampToken;
use crate::infra::error::{SigningError, SigningResult};

/// RFC 3161 section 2.4.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: u8,
    #[asn1(optional = "true")]
    pub status_string: Option<Vec<String>>,
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

impl PkiStatusInfo {
    pub const GRANTED: u8 = 0;
    pub const GRANTED_WITH_MODS: u8 = 1;

    pub fn granted() -> Self {
        Self {
            status: Self::GRANTED,
            status_string: None,
            fail_info: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Self::GRANTED || self.status == Self::GRANTED_WITH_MODS
    }
}

/// RFC 3161 section 2.4.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<Any>,
}

/// Service responsible for turning raw timestamp responses into validated tokens.
pub struct TimestampParserService;

impl TimestampParserService {
    /// Decode a `TimeStampResp`, check its status and nonce, and return the token.
    pub fn parse_response(
        response_der: &[u8],
        expected_nonce: Option<&Int>,
    ) -> SigningResult<TimestampToken> {
        let response = TimeStampResp::from_der(response_der)
            .map_err(|e| SigningError::TimestampError(format!("Invalid timestamp response: {e}")))?;

        if !response.status.is_success() {
            let text = response
                .status
                .status_string
                .map(|s| s.join("; "))
                .unwrap_or_default();
            return Err(SigningError::TimestampError(format!(
                "Timestamp authority rejected the request (status {}) {text}",
                response.status.status
            )));
        }
        let token_any = response.time_stamp_token.ok_or_else(|| {
            SigningError::TimestampError("Granted response carries no token".to_string())
        })?;
        let token = TimestampToken::from_der(&token_any.to_der()?)?;

        if let Some(expected) = expected_nonce {
            if token.tst_info().nonce.as_ref() != Some(expected) {
                return Err(SigningError::TimestampError(
                    "Timestamp nonce does not match the request".to_string(),
                ));
            }
        }
        log::debug!("Parsed timestamp token: {} bytes", token.as_der().len());
        Ok(token)
    }

    /// Parse a token and validate the message imprint against `signature_value`.
    pub fn parse_and_validate(
        token_der: &[u8],
        signature_value: &[u8],
    ) -> SigningResult<TimestampToken> {
        let token = TimestampToken::from_der(token_der)?;
        token.validate_message_imprint(signature_value)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_status_is_reported() {
        let response = TimeStampResp {
            status: PkiStatusInfo {
                status: 2,
                status_string: Some(vec!["bad alg".to_string()]),
                fail_info: None,
            },
            time_stamp_token: None,
        };
        let der = response.to_der().unwrap();
        let err = TimestampParserService::parse_response(&der, None).unwrap_err();
        assert!(matches!(err, SigningError::TimestampError(ref m) if m.contains("bad alg")));
    }

    #[test]
    fn granted_without_token_is_error() {
        let response = TimeStampResp {
            status: PkiStatusInfo::granted(),
            time_stamp_token: None,
        };
        let der = response.to_der().unwrap();
        assert!(TimestampParserService::parse_response(&der, None).is_err());
    }

    #[test]
    fn garbage_is_timestamp_error() {
        assert!(matches!(
            TimestampParserService::parse_response(b"nope", None),
            Err(SigningError::TimestampError(_))
        ));
    }
}
