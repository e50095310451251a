//! Centralized constants: object identifiers, SIP identifiers and carrier markers.
//! Keep this intentionally small; only broadly reused literals should live here.

use der::asn1::ObjectIdentifier;

// === PKCS#7/CMS content types ===

/// PKCS#7 `data` content type (1.2.840.113549.1.7.1)
pub const PKCS7_DATA_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

/// PKCS#7 `SignedData` content type (1.2.840.113549.1.7.2)
pub const PKCS7_SIGNED_DATA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

/// RFC 3161 `TSTInfo` content type (1.2.840.113549.1.9.16.1.4)
pub const TST_INFO_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");

// === PKCS#9 attributes ===

/// contentType attribute (1.2.840.113549.1.9.3)
pub const PKCS9_CONTENT_TYPE_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");

/// messageDigest attribute (1.2.840.113549.1.9.4)
pub const PKCS9_MESSAGE_DIGEST_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// signingTime attribute (1.2.840.113549.1.9.5)
pub const PKCS9_SIGNING_TIME_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// Legacy counterSignature attribute (1.2.840.113549.1.9.6)
pub const PKCS9_COUNTER_SIGNATURE_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.6");

/// RFC 3161 timeStampToken unsigned attribute (1.2.840.113549.1.9.16.2.14)
pub const TIMESTAMP_TOKEN_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");

// === Microsoft Authenticode ===

/// Authenticode RFC 3161 timestamp unsigned attribute (1.3.6.1.4.1.311.3.3.1)
pub const MS_TIMESTAMP_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.3.3.1");

/// SPC_INDIRECT_DATA content type (1.3.6.1.4.1.311.2.1.4)
pub const SPC_INDIRECT_DATA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.4");

/// SPC_STATEMENT_TYPE attribute (1.3.6.1.4.1.311.2.1.11)
pub const SPC_STATEMENT_TYPE_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.11");

/// SPC_SP_OPUS_INFO attribute (1.3.6.1.4.1.311.2.1.12)
pub const SPC_SP_OPUS_INFO_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.12");

/// Individual code signing purpose (1.3.6.1.4.1.311.2.1.21)
pub const SPC_INDIVIDUAL_SP_KEY_PURPOSE_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.21");

/// SPC_SIPINFO data type (1.3.6.1.4.1.311.2.1.30)
pub const SPC_SIPINFO_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.30");

/// `SpcSipInfo` version field used by script SIPs.
pub const SPC_SIPINFO_VERSION: u32 = 65536;

/// PowerShell SIP GUID {603BCC1F-4B59-4E08-B724-D2C6297EF351} in wire byte order.
pub const POWERSHELL_SIP_GUID: [u8; 16] = [
    0x1f, 0xcc, 0x3b, 0x60, 0x59, 0x4b, 0x08, 0x4e, 0xb7, 0x24, 0xd2, 0xc6, 0x29, 0x7e, 0xf3, 0x51,
];

// === Algorithms ===

pub const SHA256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const SHA384_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const SHA512_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

/// rsaEncryption (1.2.840.113549.1.1.1)
pub const RSA_ENCRYPTION_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

pub const ECDSA_WITH_SHA256_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub const ECDSA_WITH_SHA384_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub const ECDSA_WITH_SHA512_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

// === X.509 extensions ===

/// extKeyUsage extension (2.5.29.37)
pub const EXT_KEY_USAGE_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");

/// anyExtendedKeyUsage (2.5.29.37.0)
pub const ANY_EXT_KEY_USAGE_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");

/// id-kp-codeSigning (1.3.6.1.5.5.7.3.3)
pub const CODE_SIGNING_EKU_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");

/// id-kp-timeStamping (1.3.6.1.5.5.7.3.8)
pub const TIME_STAMPING_EKU_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");

// === Signature block markers ===

pub const SIGNATURE_BEGIN_MARKER: &str = "SIG # Begin signature block";
pub const SIGNATURE_END_MARKER: &str = "SIG # End signature block";

/// Base64 characters per signature block line.
pub const SIGNATURE_LINE_WIDTH: usize = 64;

// === RFC3161 request ===

/// Random nonce length in bytes.
pub const TS_REQ_NONCE_LENGTH: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use der::Encode;

    #[test]
    fn timestamp_oids_are_distinct() {
        assert_ne!(TIMESTAMP_TOKEN_OID, MS_TIMESTAMP_OID);
        assert_ne!(TIMESTAMP_TOKEN_OID, PKCS9_COUNTER_SIGNATURE_OID);
    }

    #[test]
    fn ms_timestamp_oid_der_encoding() {
        assert_eq!(
            MS_TIMESTAMP_OID.to_der().unwrap(),
            vec![0x06, 0x0A, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x03, 0x03, 0x01]
        );
    }
}
