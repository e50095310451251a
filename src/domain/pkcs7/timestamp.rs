//! Timestamps attached to a signature.
//!
//! A timestamp lives in the signer's unauthenticated attributes in one of
//! three shapes, tried in this order:
//!
//! 1. RFC 3161 token under `id-aa-timeStampToken`
//! 2. RFC 3161 token under the Authenticode timestamp OID
//! 3. Legacy PKCS#9 counter-signature (a bare `SignerInfo`)
//!
//! Tokens must attest the parent's encrypted digest through their message
//! imprint. Counter-signatures sign the encrypted digest directly.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerInfo};
use der::asn1::{Any, Int, ObjectIdentifier, OctetString};
use der::{
    DateTime, Decode, DecodeValue, Encode, EncodeValue, ErrorKind, FixedTag, Header, Length,
    Reader, Sequence, Tag, Writer,
};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::Extensions;
use x509_cert::time::Time;
use x509_cert::Certificate;

use super::attributes::{self, AttributeError};
use super::chain::{ExtKeyUsage, TrustRoots};
use super::signature::{certificates_of, verify_signer_info, Signature};
use crate::domain::constants::{
    MS_TIMESTAMP_OID, PKCS7_SIGNED_DATA_OID, PKCS9_COUNTER_SIGNATURE_OID, PKCS9_SIGNING_TIME_OID,
    TIMESTAMP_TOKEN_OID, TST_INFO_OID,
};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::spc::digest_algorithm_identifier;
use crate::infra::error::{SigningError, SigningResult};

/// Hash algorithm and value a timestamp token attests.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

impl MessageImprint {
    /// Imprint of `data` under `hash`.
    pub fn new(hash: HashAlgorithm, data: &[u8]) -> SigningResult<Self> {
        Ok(Self {
            hash_algorithm: digest_algorithm_identifier(hash),
            hashed_message: OctetString::new(hash.digest(data))?,
        })
    }

    pub fn hash(&self) -> SigningResult<HashAlgorithm> {
        HashAlgorithm::from_oid(&self.hash_algorithm.oid).ok_or_else(|| {
            SigningError::MalformedTimestampError(format!(
                "unsupported message imprint algorithm {}",
                self.hash_algorithm.oid
            ))
        })
    }

    /// Recompute the imprint over `data` and require an exact match.
    pub fn verify(&self, data: &[u8]) -> SigningResult<()> {
        let hash = self.hash()?;
        if hash.digest(data).as_slice() != self.hashed_message.as_bytes() {
            return Err(SigningError::TimestampIntegrityError(format!(
                "message imprint ({hash}) does not match the signature value"
            )));
        }
        Ok(())
    }
}

/// RFC 3161 section 2.4.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    #[asn1(optional = "true")]
    pub seconds: Option<u64>,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "IMPLICIT")]
    pub millis: Option<u16>,
    #[asn1(context_specific = "1", optional = "true", tag_mode = "IMPLICIT")]
    pub micros: Option<u16>,
}

/// `genTime` of a TSTInfo: `YYYYMMDDHHMMSS[.f*]Z`.
///
/// Unlike an RFC 5280 `GeneralizedTime`, fractional seconds are allowed.
/// Digits past nanosecond precision are truncated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GenTime {
    datetime: DateTime,
    nanos: u32,
}

impl GenTime {
    pub fn from_system_time(time: SystemTime) -> der::Result<Self> {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| der::Error::from(ErrorKind::DateTime))?;
        Ok(Self {
            datetime: DateTime::from_unix_duration(Duration::from_secs(since_epoch.as_secs()))?,
            nanos: since_epoch.subsec_nanos(),
        })
    }

    pub fn to_system_time(&self) -> SystemTime {
        self.datetime.to_system_time() + Duration::from_nanos(u64::from(self.nanos))
    }

    fn parse(bytes: &[u8]) -> der::Result<Self> {
        let invalid = || Self::TAG.value_error();
        let Some((&b'Z', body)) = bytes.split_last() else {
            return Err(invalid());
        };
        if body.len() < 14 || !body[..14].iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let (whole, fraction) = body.split_at(14);
        let number = |digits: &[u8]| {
            digits
                .iter()
                .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'))
        };
        let field = |at: usize| u8::try_from(number(&whole[at..at + 2]));

        let nanos = match fraction {
            [] => 0,
            [b'.', digits @ ..] if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) => {
                let padded: Vec<u8> = digits
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(b'0'))
                    .take(9)
                    .collect();
                number(&padded)
            }
            _ => return Err(invalid()),
        };

        let datetime = DateTime::new(
            u16::try_from(number(&whole[..4]))?,
            field(4)?,
            field(6)?,
            field(8)?,
            field(10)?,
            field(12)?,
        )?;
        Ok(Self { datetime, nanos })
    }

    fn encoded(&self) -> String {
        let dt = &self.datetime;
        let mut out = format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minutes(),
            dt.seconds()
        );
        if self.nanos > 0 {
            out.push('.');
            out.push_str(format!("{:09}", self.nanos).trim_end_matches('0'));
        }
        out.push('Z');
        out
    }
}

impl<'a> DecodeValue<'a> for GenTime {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let bytes = reader.read_vec(header.length)?;
        Self::parse(&bytes)
    }
}

impl EncodeValue for GenTime {
    fn value_len(&self) -> der::Result<Length> {
        Length::try_from(self.encoded().len())
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(self.encoded().as_bytes())
    }
}

impl FixedTag for GenTime {
    const TAG: Tag = Tag::GeneralizedTime;
}

/// RFC 3161 section 2.4.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: u8,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: Int,
    pub gen_time: GenTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "default_false")]
    pub ordering: bool,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    pub tsa: Option<GeneralName>,
    #[asn1(context_specific = "1", optional = "true", tag_mode = "IMPLICIT")]
    pub extensions: Option<Extensions>,
}

fn default_false() -> bool {
    false
}

fn malformed(context: &str) -> impl Fn(der::Error) -> SigningError + '_ {
    move |e| SigningError::MalformedTimestampError(format!("{context}: {e}"))
}

/// Parsed RFC 3161 timestamp token (`ContentInfo` wrapping `SignedData`).
#[derive(Clone, Debug)]
pub struct TimestampToken {
    der: Vec<u8>,
    signed_data: SignedData,
    tst_info: TstInfo,
    tst_der: Vec<u8>,
}

impl TimestampToken {
    /// Parse a token and check it carries exactly one `SignerInfo`.
    pub fn from_der(der: &[u8]) -> SigningResult<Self> {
        let content_info = ContentInfo::from_der(der).map_err(malformed("token ContentInfo"))?;
        if content_info.content_type != PKCS7_SIGNED_DATA_OID {
            return Err(SigningError::MalformedTimestampError(format!(
                "token content type is {}, expected SignedData",
                content_info.content_type
            )));
        }
        let signed_data = SignedData::from_der(
            &content_info
                .content
                .to_der()
                .map_err(malformed("token content"))?,
        )
        .map_err(malformed("token SignedData"))?;

        let count = signed_data.signer_infos.0.len();
        if count != 1 {
            return Err(SigningError::MalformedTimestampError(format!(
                "timestamp token must contain exactly one SignerInfo, found {count}"
            )));
        }

        let encap = &signed_data.encap_content_info;
        if encap.econtent_type != TST_INFO_OID {
            return Err(SigningError::MalformedTimestampError(format!(
                "token content type is {}, expected TSTInfo",
                encap.econtent_type
            )));
        }
        let econtent = encap.econtent.as_ref().ok_or_else(|| {
            SigningError::MalformedTimestampError("token has no TSTInfo content".to_string())
        })?;
        let tst_der = econtent.value().to_vec();
        let tst_info = TstInfo::from_der(&tst_der).map_err(malformed("TSTInfo"))?;

        Ok(Self {
            der: der.to_vec(),
            signed_data,
            tst_info,
            tst_der,
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn tst_info(&self) -> &TstInfo {
        &self.tst_info
    }

    /// Encoded `TSTInfo`, the bytes the token signer signed.
    pub fn tst_der(&self) -> &[u8] {
        &self.tst_der
    }

    pub fn signer_info(&self) -> &SignerInfo {
        // Count checked in from_der
        &self.signed_data.signer_infos.0.as_slice()[0]
    }

    pub fn certificates(&self) -> Vec<Certificate> {
        certificates_of(&self.signed_data)
    }

    pub fn gen_time(&self) -> SystemTime {
        self.tst_info.gen_time.to_system_time()
    }

    /// Check the token attests `signature_value`.
    pub fn validate_message_imprint(&self, signature_value: &[u8]) -> SigningResult<()> {
        self.tst_info.message_imprint.verify(signature_value)
    }

    /// The token as an attribute value.
    pub fn to_any(&self) -> SigningResult<Any> {
        Ok(Any::from_der(&self.der)?)
    }
}

/// Attribute shape a timestamp was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampKind {
    Rfc3161,
    Authenticode,
    CounterSignature,
}

impl TimestampKind {
    pub fn attribute_oid(&self) -> ObjectIdentifier {
        match self {
            TimestampKind::Rfc3161 => TIMESTAMP_TOKEN_OID,
            TimestampKind::Authenticode => MS_TIMESTAMP_OID,
            TimestampKind::CounterSignature => PKCS9_COUNTER_SIGNATURE_OID,
        }
    }
}

/// What the nested signer must be verified against.
struct TimestampEvidence {
    signer_info: SignerInfo,
    verify_blob: Vec<u8>,
    hash: HashAlgorithm,
    certificates: Vec<Certificate>,
}

type EvidenceParser = fn(&Any, &Signature) -> SigningResult<TimestampEvidence>;

/// Lookup table in priority order; first attribute present wins.
const TIMESTAMP_ATTRIBUTES: [(TimestampKind, EvidenceParser); 3] = [
    (TimestampKind::Rfc3161, token_evidence),
    (TimestampKind::Authenticode, token_evidence),
    (TimestampKind::CounterSignature, counter_signature_evidence),
];

/// Order in which timestamp attributes are tried.
pub fn timestamp_lookup_order() -> [TimestampKind; 3] {
    TIMESTAMP_ATTRIBUTES.map(|(kind, _)| kind)
}

fn token_evidence(value: &Any, parent: &Signature) -> SigningResult<TimestampEvidence> {
    let token = TimestampToken::from_der(&value.to_der().map_err(malformed("token attribute"))?)?;
    token.validate_message_imprint(parent.encrypted_digest())?;

    let mut certificates = parent.intermediates().to_vec();
    certificates.extend(token.certificates());
    Ok(TimestampEvidence {
        signer_info: token.signer_info().clone(),
        hash: token.tst_info.message_imprint.hash()?,
        verify_blob: token.tst_der,
        certificates,
    })
}

fn counter_signature_evidence(value: &Any, parent: &Signature) -> SigningResult<TimestampEvidence> {
    let signer_info = SignerInfo::from_der(
        &value
            .to_der()
            .map_err(malformed("counter-signature attribute"))?,
    )
    .map_err(malformed("counter-signature SignerInfo"))?;
    Ok(TimestampEvidence {
        signer_info,
        verify_blob: parent.encrypted_digest().to_vec(),
        hash: parent.digest_algorithm()?,
        certificates: parent.intermediates().to_vec(),
    })
}

/// A timestamp verified for integrity against its parent signature, not yet
/// for chain trust.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterSignature {
    signature: Signature,
    hash: HashAlgorithm,
    signing_time: SystemTime,
    kind: TimestampKind,
}

impl CounterSignature {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Imprint algorithm, or the parent's digest algorithm for the legacy form.
    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn signing_time(&self) -> SystemTime {
        self.signing_time
    }

    pub fn kind(&self) -> TimestampKind {
        self.kind
    }

    /// Validate the timestamp authority chain as of the signing time.
    pub fn verify_chain(&self, roots: &TrustRoots, extra: &[Certificate]) -> SigningResult<()> {
        self.signature.verify_chain(
            roots,
            extra,
            ExtKeyUsage::TimeStamping,
            Some(self.signing_time),
        )
    }
}

/// Locate and verify the timestamp on `signature`.
///
/// Returns `Ok(None)` when no timestamp attribute is present.
pub fn verify_timestamp(signature: &Signature) -> SigningResult<Option<CounterSignature>> {
    let unsigned = signature.signer_info().unsigned_attrs.as_ref();

    let mut found = None;
    for (kind, parse) in TIMESTAMP_ATTRIBUTES {
        match attributes::get_one_any(unsigned, kind.attribute_oid()) {
            Ok(value) => {
                found = Some((kind, parse(value, signature)?));
                break;
            }
            Err(AttributeError::NotFound(_)) => continue,
            Err(e) => return Err(SigningError::MalformedTimestampError(e.to_string())),
        }
    }
    let Some((kind, evidence)) = found else {
        return Ok(None);
    };
    log::debug!("Found {kind:?} timestamp");

    let counter = verify_signer_info(
        &evidence.signer_info,
        &evidence.verify_blob,
        &evidence.certificates,
    )
    .map_err(|e| SigningError::TimestampIntegrityError(format!("{kind:?} timestamp: {e}")))?;

    let signing_time: Time = match attributes::get_one(
        counter.signer_info().signed_attrs.as_ref(),
        PKCS9_SIGNING_TIME_OID,
    ) {
        Ok(time) => time,
        Err(AttributeError::NotFound(_)) => {
            return Err(SigningError::MissingSigningTimeError(format!(
                "{kind:?} timestamp signer has no signingTime attribute"
            )))
        }
        Err(e) => return Err(SigningError::MalformedTimestampError(e.to_string())),
    };

    Ok(Some(CounterSignature {
        signature: counter,
        hash: evidence.hash,
        signing_time: signing_time.to_system_time(),
        kind,
    }))
}

/// A signature and its timestamp, if it has one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampedSignature {
    signature: Signature,
    counter_signature: Option<CounterSignature>,
}

impl TimestampedSignature {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn counter_signature(&self) -> Option<&CounterSignature> {
        self.counter_signature.as_ref()
    }

    /// Validate the timestamp chain (if any), then the signing chain.
    ///
    /// The signing chain is checked at the timestamp's signing time when a
    /// timestamp is present, otherwise at the current time.
    pub fn verify_chain(
        &self,
        roots: &TrustRoots,
        extra: &[Certificate],
        usage: ExtKeyUsage,
    ) -> SigningResult<()> {
        let mut reference_time = None;
        if let Some(counter) = &self.counter_signature {
            counter
                .verify_chain(roots, extra)
                .map_err(|e| SigningError::TimestampChainError(Box::new(e)))?;
            reference_time = Some(counter.signing_time);
        }
        self.signature
            .verify_chain(roots, extra, usage, reference_time)
    }
}

/// Like [`verify_timestamp`], folding absence into a signature without timestamp.
pub fn verify_optional_timestamp(signature: Signature) -> SigningResult<TimestampedSignature> {
    let counter_signature = verify_timestamp(&signature)?;
    Ok(TimestampedSignature {
        signature,
        counter_signature,
    })
}
