//! Authenticated attributes of the Authenticode envelope.

mod common;

use der::asn1::{ObjectIdentifier, OctetString};
use script_signer::domain::constants::{
    PKCS9_CONTENT_TYPE_OID, PKCS9_MESSAGE_DIGEST_OID, PKCS9_SIGNING_TIME_OID,
    SPC_INDIRECT_DATA_OID, SPC_SP_OPUS_INFO_OID, SPC_STATEMENT_TYPE_OID,
};
use script_signer::domain::pkcs7::attributes;
use script_signer::domain::spc::SpcStatementType;
use script_signer::HashAlgorithm;

#[test]
fn envelope_carries_authenticode_attributes() {
    let pki = common::Pki::new();
    let blob = common::signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let signed_data = blob.signed_data().expect("signed data");
    let signer_info = &signed_data.signer_infos.0.as_slice()[0];
    let attrs = signer_info.signed_attrs.as_ref();

    let content_type: ObjectIdentifier =
        attributes::get_one(attrs, PKCS9_CONTENT_TYPE_OID).expect("contentType");
    assert_eq!(content_type, SPC_INDIRECT_DATA_OID);

    let statement: SpcStatementType =
        attributes::get_one(attrs, SPC_STATEMENT_TYPE_OID).expect("statement type");
    assert_eq!(statement.len(), 1);
    assert!(attributes::contains(attrs, SPC_SP_OPUS_INFO_OID));
    assert!(!attributes::contains(attrs, PKCS9_SIGNING_TIME_OID));
}

#[test]
fn message_digest_covers_content_octets() {
    let pki = common::Pki::new();
    let blob = common::signed_blob(&pki.signer(), HashAlgorithm::Sha384);
    let signed_data = blob.signed_data().expect("signed data");
    let econtent = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .expect("econtent");
    let signer_info = &signed_data.signer_infos.0.as_slice()[0];

    let digest: OctetString =
        attributes::get_one(signer_info.signed_attrs.as_ref(), PKCS9_MESSAGE_DIGEST_OID)
            .expect("messageDigest");
    assert_eq!(
        digest.as_bytes(),
        HashAlgorithm::Sha384.digest(econtent.value()).as_slice()
    );
}

#[test]
fn missing_attribute_reports_not_found() {
    let pki = common::Pki::new();
    let blob = common::signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let signed_data = blob.signed_data().expect("signed data");
    let signer_info = &signed_data.signer_infos.0.as_slice()[0];

    let err = attributes::get_one::<OctetString>(
        signer_info.unsigned_attrs.as_ref(),
        PKCS9_MESSAGE_DIGEST_OID,
    )
    .unwrap_err();
    assert!(err.is_not_found());
}
