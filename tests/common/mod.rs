//! Shared fixtures for integration tests.
//!
//! Builds a throwaway EC P-256 PKI with openssl (root, intermediate, code
//! signing and time-stamping leaves) and a local timestamp authority that
//! mints RFC 3161 tokens without a network.

#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cms::content_info::CmsVersion;
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerInfo, SignerInfos};
use der::asn1::{Any, Int, ObjectIdentifier, SetOfVec};
use der::{Decode, Encode, Tag};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, ExtendedKeyUsage, KeyUsage};
use openssl::x509::{X509NameBuilder, X509};
use x509_cert::Certificate;

use script_signer::domain::constants::TST_INFO_OID;
use script_signer::domain::pkcs7::{
    certificates_of, verify_signer_info, GenTime, MessageImprint, TstInfo,
};
use script_signer::domain::spc::digest_algorithm_identifier;
use script_signer::services::pkcs7_builder::{certificate_set, Pkcs7BuilderService};
use script_signer::services::signer_info_builder::SignerInfoBuilder;
use script_signer::{
    CertChain, DigestBytes, HashAlgorithm, KeySigner, OpenSslKeySigner, Pkcs7SignedData,
    Signature, SigningError, SigningResult, TimestampAuthority, TrustRoots,
};

pub const DAY: u64 = 24 * 60 * 60;
pub const YEAR: u64 = 365 * DAY;

pub const SCRIPT: &str = "param([string]$Name)\r\nWrite-Host \"Hello, $Name\"\r\n";

/// Now, truncated to whole seconds so it survives ASN.1 time encoding.
pub fn now() -> SystemTime {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}

pub fn ago(secs: u64) -> SystemTime {
    now() - Duration::from_secs(secs)
}

fn unix(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .expect("time after epoch")
        .as_secs() as i64
}

/// Certificate and private key pair.
#[derive(Clone)]
pub struct Issued {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl Issued {
    pub fn certificate(&self) -> Certificate {
        Certificate::from_der(&self.cert.to_der().expect("cert der")).expect("cert decode")
    }
}

#[derive(Clone, Copy)]
pub enum Usage {
    Ca,
    /// CA restricted to time-stamping through its EKU.
    TimeStampingCa,
    CodeSigning,
    TimeStamping,
}

pub struct CertSpec<'a> {
    pub cn: &'a str,
    pub usage: Usage,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub serial: u32,
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).expect("P-256 group");
    PKey::from_ec_key(EcKey::generate(&group).expect("EC key")).expect("pkey")
}

/// Issue a certificate; self-signed when `issuer` is `None`.
pub fn issue(spec: &CertSpec<'_>, issuer: Option<&Issued>) -> Issued {
    let key = ec_key();
    let mut name = X509NameBuilder::new().expect("name builder");
    name.append_entry_by_text("CN", spec.cn).expect("CN");
    let name = name.build();

    let mut builder = X509::builder().expect("x509 builder");
    builder.set_version(2).expect("version");
    let serial = BigNum::from_u32(spec.serial)
        .and_then(|bn| bn.to_asn1_integer())
        .expect("serial");
    builder.set_serial_number(&serial).expect("set serial");
    builder.set_subject_name(&name).expect("subject");
    match issuer {
        Some(issuer) => builder
            .set_issuer_name(issuer.cert.subject_name())
            .expect("issuer"),
        None => builder.set_issuer_name(&name).expect("issuer"),
    }
    builder.set_pubkey(&key).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::from_unix(unix(spec.not_before)).expect("not before"))
        .expect("set not before");
    builder
        .set_not_after(&Asn1Time::from_unix(unix(spec.not_after)).expect("not after"))
        .expect("set not after");

    match spec.usage {
        Usage::Ca | Usage::TimeStampingCa => {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().expect("bc"))
                .expect("append bc");
            builder
                .append_extension(
                    KeyUsage::new()
                        .critical()
                        .key_cert_sign()
                        .crl_sign()
                        .build()
                        .expect("ku"),
                )
                .expect("append ku");
            if let Usage::TimeStampingCa = spec.usage {
                builder
                    .append_extension(
                        ExtendedKeyUsage::new().time_stamping().build().expect("eku"),
                    )
                    .expect("append eku");
            }
        }
        Usage::CodeSigning => {
            builder
                .append_extension(
                    KeyUsage::new().critical().digital_signature().build().expect("ku"),
                )
                .expect("append ku");
            builder
                .append_extension(ExtendedKeyUsage::new().code_signing().build().expect("eku"))
                .expect("append eku");
        }
        Usage::TimeStamping => {
            builder
                .append_extension(
                    KeyUsage::new().critical().digital_signature().build().expect("ku"),
                )
                .expect("append ku");
            builder
                .append_extension(
                    ExtendedKeyUsage::new()
                        .critical()
                        .time_stamping()
                        .build()
                        .expect("eku"),
                )
                .expect("append eku");
        }
    }

    let signing_key = issuer.map_or(&key, |i| &i.key);
    builder
        .sign(signing_key, MessageDigest::sha256())
        .expect("sign cert");
    Issued {
        cert: builder.build(),
        key,
    }
}

/// Root, intermediate and two leaves, all valid now.
pub struct Pki {
    pub root: Issued,
    pub intermediate: Issued,
    pub code_signing: Issued,
    pub tsa: Issued,
}

impl Pki {
    pub fn new() -> Self {
        let window = (ago(YEAR), now() + Duration::from_secs(YEAR));
        Self::with_leaf_validity(window, window)
    }

    /// PKI whose leaves are valid in the given `(not_before, not_after)` windows.
    pub fn with_leaf_validity(
        code_signing: (SystemTime, SystemTime),
        tsa: (SystemTime, SystemTime),
    ) -> Self {
        let root = issue(
            &CertSpec {
                cn: "Test Root CA",
                usage: Usage::Ca,
                not_before: ago(10 * YEAR),
                not_after: now() + Duration::from_secs(10 * YEAR),
                serial: 1,
            },
            None,
        );
        let intermediate = issue(
            &CertSpec {
                cn: "Test Intermediate CA",
                usage: Usage::Ca,
                not_before: ago(5 * YEAR),
                not_after: now() + Duration::from_secs(5 * YEAR),
                serial: 2,
            },
            Some(&root),
        );
        let code_signing = issue(
            &CertSpec {
                cn: "Test Code Signing",
                usage: Usage::CodeSigning,
                not_before: code_signing.0,
                not_after: code_signing.1,
                serial: 3,
            },
            Some(&intermediate),
        );
        let tsa = issue(
            &CertSpec {
                cn: "Test Time Stamping",
                usage: Usage::TimeStamping,
                not_before: tsa.0,
                not_after: tsa.1,
                serial: 4,
            },
            Some(&intermediate),
        );
        Self {
            root,
            intermediate,
            code_signing,
            tsa,
        }
    }

    pub fn roots(&self) -> TrustRoots {
        let mut roots = TrustRoots::new();
        roots.add(self.root.cert.clone());
        roots
    }

    pub fn signer(&self) -> OpenSslKeySigner {
        self.signer_for(&self.code_signing)
    }

    pub fn tsa_signer(&self) -> OpenSslKeySigner {
        self.signer_for(&self.tsa)
    }

    pub fn signer_for(&self, leaf: &Issued) -> OpenSslKeySigner {
        let chain = CertChain::new(leaf.certificate())
            .with_intermediates(vec![self.intermediate.certificate()]);
        OpenSslKeySigner::new(leaf.key.clone(), chain).expect("key matches certificate")
    }
}

impl Default for Pki {
    fn default() -> Self {
        Self::new()
    }
}

/// TSTInfo attesting `hash(data)` at `gen_time`.
pub fn tst_info(data: &[u8], hash: HashAlgorithm, gen_time: SystemTime) -> TstInfo {
    TstInfo {
        version: 1,
        policy: ObjectIdentifier::new_unwrap("1.2.3.4.1"),
        message_imprint: MessageImprint::new(hash, data).expect("imprint"),
        serial_number: Int::new(&[0x01, 0x23]).expect("serial"),
        gen_time: GenTime::from_system_time(gen_time).expect("gen time"),
        accuracy: None,
        ordering: false,
        nonce: None,
        tsa: None,
        extensions: None,
    }
}

/// Timestamp token ContentInfo DER carrying `signer_infos` over `tst`.
pub fn token_from_parts(tsa: &dyn KeySigner, tst: &TstInfo, signer_infos: Vec<SignerInfo>) -> Vec<u8> {
    let tst_der = tst.to_der().expect("tst der");
    let hash = tst.message_imprint.hash().expect("imprint hash");
    let signed_data = SignedData {
        version: CmsVersion::V3,
        digest_algorithms: SetOfVec::try_from(vec![digest_algorithm_identifier(hash)])
            .expect("digest algorithms"),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: TST_INFO_OID,
            econtent: Some(Any::new(Tag::OctetString, tst_der).expect("econtent")),
        },
        certificates: Some(certificate_set(tsa.chain().iter()).expect("certificates")),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(signer_infos).expect("signer infos")),
    };
    Pkcs7SignedData::from_signed_data(&signed_data)
        .expect("token encode")
        .into_der()
}

/// TSA SignerInfo over the encoded `tst`, optionally with a signingTime.
pub fn tsa_signer_info(tsa: &dyn KeySigner, tst: &TstInfo, signing_time: Option<SystemTime>) -> SignerInfo {
    let tst_der = tst.to_der().expect("tst der");
    let hash = tst.message_imprint.hash().expect("imprint hash");
    let mut builder = SignerInfoBuilder::new(tsa, hash).content_type(TST_INFO_OID);
    if let Some(time) = signing_time {
        builder = builder.signing_time(time);
    }
    builder.build(&tst_der).expect("tsa signer info")
}

/// Well-formed token attesting `hash(data)`.
pub fn mint_token(tsa: &dyn KeySigner, data: &[u8], hash: HashAlgorithm, gen_time: SystemTime) -> Vec<u8> {
    let tst = tst_info(data, hash, gen_time);
    let signer_info = tsa_signer_info(tsa, &tst, Some(gen_time));
    token_from_parts(tsa, &tst, vec![signer_info])
}

/// In-process timestamp authority.
pub struct LocalAuthority {
    pub signer: OpenSslKeySigner,
    pub gen_time: SystemTime,
}

impl LocalAuthority {
    pub fn new(pki: &Pki) -> Self {
        Self {
            signer: pki.tsa_signer(),
            gen_time: now(),
        }
    }

    pub fn at(pki: &Pki, gen_time: SystemTime) -> Self {
        Self {
            signer: pki.tsa_signer(),
            gen_time,
        }
    }
}

impl TimestampAuthority for LocalAuthority {
    async fn request_token(&self, data: &[u8], hash: HashAlgorithm) -> SigningResult<Vec<u8>> {
        Ok(mint_token(&self.signer, data, hash, self.gen_time))
    }
}

/// Authority that always fails.
pub struct FailingAuthority;

impl TimestampAuthority for FailingAuthority {
    async fn request_token(&self, _data: &[u8], _hash: HashAlgorithm) -> SigningResult<Vec<u8>> {
        Err(SigningError::NetworkError("connection refused".to_string()))
    }
}

/// Authority that answers after `delay`.
pub struct SlowAuthority {
    pub inner: LocalAuthority,
    pub delay: Duration,
}

impl TimestampAuthority for SlowAuthority {
    async fn request_token(&self, data: &[u8], hash: HashAlgorithm) -> SigningResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        self.inner.request_token(data, hash).await
    }
}

/// Authenticode envelope over the digest of [`SCRIPT`].
pub fn signed_blob(signer: &dyn KeySigner, hash: HashAlgorithm) -> Pkcs7SignedData {
    let imprint = DigestBytes::compute(hash, SCRIPT.as_bytes());
    Pkcs7BuilderService::new()
        .sign(&imprint, signer)
        .expect("envelope")
}

/// Verify the only SignerInfo of `blob` against its own content.
pub fn verify_blob(blob: &Pkcs7SignedData) -> SigningResult<Signature> {
    let signed_data = blob.signed_data()?;
    let econtent = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .expect("econtent");
    let signer_info = &signed_data.signer_infos.0.as_slice()[0];
    verify_signer_info(signer_info, econtent.value(), &certificates_of(&signed_data))
}
