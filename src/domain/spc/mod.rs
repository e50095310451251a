//! SPC (Software Publisher Certificate) domain module.
//! Strongly-typed `SpcIndirectDataContent` and the authenticated attribute
//! payloads Authenticode expects alongside it.

use der::asn1::{Any, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Sequence};
use spki::AlgorithmIdentifierOwned;

use crate::domain::constants::{
    POWERSHELL_SIP_GUID, SPC_INDIVIDUAL_SP_KEY_PURPOSE_OID, SPC_SIPINFO_OID, SPC_SIPINFO_VERSION,
};
use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use crate::infra::error::{SigningError, SigningResult};

/// Hash `AlgorithmIdentifier` with explicit NULL parameters.
pub fn digest_algorithm_identifier(hash: HashAlgorithm) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: hash.oid(),
        parameters: Some(Any::null()),
    }
}

/// SIP descriptor identifying the subject interface package that hashed the file.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcSipInfo {
    pub version: u32,
    pub uuid: OctetString,
    pub reserved1: u32,
    pub reserved2: u32,
    pub reserved3: u32,
    pub reserved4: u32,
    pub reserved5: u32,
}

impl SpcSipInfo {
    pub fn powershell() -> SigningResult<Self> {
        Ok(Self {
            version: SPC_SIPINFO_VERSION,
            uuid: OctetString::new(POWERSHELL_SIP_GUID.to_vec())?,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            reserved4: 0,
            reserved5: 0,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcAttributeTypeAndOptionalValue {
    pub value_type: ObjectIdentifier,
    #[asn1(optional = "true")]
    pub value: Option<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DigestInfo {
    pub digest_algorithm: AlgorithmIdentifierOwned,
    pub digest: OctetString,
}

/// `SpcIndirectDataContent`: what the Authenticode signature actually covers.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcIndirectDataContent {
    pub data: SpcAttributeTypeAndOptionalValue,
    pub message_digest: DigestInfo,
}

impl SpcIndirectDataContent {
    /// Content for a PowerShell script digest.
    pub fn for_powershell(imprint: &DigestBytes) -> SigningResult<Self> {
        let sip_info = SpcSipInfo::powershell()?;
        Ok(Self {
            data: SpcAttributeTypeAndOptionalValue {
                value_type: SPC_SIPINFO_OID,
                value: Some(Any::from_der(&sip_info.to_der()?)?),
            },
            message_digest: DigestInfo {
                digest_algorithm: digest_algorithm_identifier(imprint.algorithm()),
                digest: OctetString::new(imprint.as_slice())?,
            },
        })
    }

    pub fn digest_algorithm(&self) -> SigningResult<HashAlgorithm> {
        let oid = self.message_digest.digest_algorithm.oid;
        HashAlgorithm::from_oid(&oid).ok_or_else(|| {
            SigningError::VerificationError(format!("unsupported digest algorithm {oid}"))
        })
    }

    pub fn digest(&self) -> &[u8] {
        self.message_digest.digest.as_bytes()
    }

    /// Typed digest, validating the length against the named algorithm.
    pub fn digest_bytes(&self) -> SigningResult<DigestBytes> {
        DigestBytes::new(self.digest_algorithm()?, self.digest().to_vec())
            .map_err(|e| SigningError::VerificationError(e.to_string()))
    }
}

/// `SpcSpOpusInfo` with optional program name and more-info link.
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
pub struct SpcSpOpusInfo {
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    pub program_name: Option<Any>,
    #[asn1(context_specific = "1", optional = "true", tag_mode = "EXPLICIT")]
    pub more_info: Option<Any>,
}

/// `SpcStatementType`: SEQUENCE OF purpose OIDs.
pub type SpcStatementType = Vec<ObjectIdentifier>;

pub fn individual_statement_type() -> SpcStatementType {
    vec![SPC_INDIVIDUAL_SP_KEY_PURPOSE_OID]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sip_info_encoding_carries_guid() {
        let der = SpcSipInfo::powershell().unwrap().to_der().unwrap();
        assert!(der
            .windows(POWERSHELL_SIP_GUID.len())
            .any(|w| w == POWERSHELL_SIP_GUID));
        // INTEGER 65536 = 02 03 01 00 00
        assert!(der.windows(5).any(|w| w == [0x02, 0x03, 0x01, 0x00, 0x00]));
    }

    #[test]
    fn indirect_data_round_trip() {
        let imprint = DigestBytes::compute(HashAlgorithm::Sha384, b"script");
        let content = SpcIndirectDataContent::for_powershell(&imprint).unwrap();
        let decoded = SpcIndirectDataContent::from_der(&content.to_der().unwrap()).unwrap();
        assert_eq!(decoded.digest_algorithm().unwrap(), HashAlgorithm::Sha384);
        assert_eq!(decoded.digest_bytes().unwrap(), imprint);
        assert_eq!(decoded.data.value_type, SPC_SIPINFO_OID);
    }

    #[test]
    fn empty_opus_info_is_empty_sequence() {
        assert_eq!(SpcSpOpusInfo::default().to_der().unwrap(), vec![0x30, 0x00]);
    }

    #[test]
    fn statement_type_encoding() {
        let der = individual_statement_type().to_der().unwrap();
        assert_eq!(
            der,
            vec![0x30, 0x0c, 0x06, 0x0a, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x01, 0x15]
        );
    }
}
