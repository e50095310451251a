//! Timestamp lookup and integrity checks on verified signatures.

mod common;

use common::{
    mint_token, now, signed_blob, token_from_parts, tsa_signer_info, tst_info, verify_blob, Pki,
};
use script_signer::domain::pkcs7::{attributes, TimestampToken};
use script_signer::services::pkcs7_builder::update_signer_info;
use script_signer::services::signer_info_builder::SignerInfoBuilder;
use script_signer::services::TimestampApplier;
use script_signer::{
    verify_optional_timestamp, verify_timestamp, HashAlgorithm, KeySigner, Pkcs7SignedData,
    SigningError, TimestampFlavor, TimestampKind, TimestampPolicy,
};

use std::time::Duration;

use der::asn1::Any;
use der::Decode;

fn applier(flavor: TimestampFlavor) -> TimestampApplier {
    TimestampApplier::new(TimestampPolicy {
        flavor,
        ..TimestampPolicy::default()
    })
}

fn encrypted_digest(blob: &Pkcs7SignedData) -> Vec<u8> {
    let signed_data = blob.signed_data().expect("signed data");
    signed_data.signer_infos.0.as_slice()[0]
        .signature
        .as_bytes()
        .to_vec()
}

/// Add a raw token under `kind` without any checks.
fn add_raw(blob: &Pkcs7SignedData, kind: TimestampKind, token_der: &[u8]) -> Pkcs7SignedData {
    let value = Any::from_der(token_der).expect("token any");
    update_signer_info(blob, |_, si| {
        attributes::add(&mut si.unsigned_attrs, kind.attribute_oid(), &value)?;
        Ok(())
    })
    .expect("attribute added")
}

#[test]
fn absent_timestamp_is_not_an_error() {
    let pki = Pki::new();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let signature = verify_blob(&blob).expect("signature verifies");

    assert!(verify_timestamp(&signature).expect("no error").is_none());
    let timestamped = verify_optional_timestamp(signature).expect("optional");
    assert!(timestamped.counter_signature().is_none());
}

#[test]
fn rfc3161_token_is_verified_against_tst_info() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let gen_time = now();
    let token = mint_token(&tsa, &encrypted_digest(&blob), HashAlgorithm::Sha256, gen_time);
    let stamped = applier(TimestampFlavor::Rfc3161)
        .attach_token(&blob, &token)
        .expect("attach");

    let signature = verify_blob(&stamped).expect("unsigned attributes do not affect signature");
    let counter = verify_timestamp(&signature)
        .expect("timestamp verifies")
        .expect("timestamp present");
    assert_eq!(counter.kind(), TimestampKind::Rfc3161);
    assert_eq!(counter.hash(), HashAlgorithm::Sha256);
    assert_eq!(counter.signing_time(), gen_time);
    assert_eq!(
        counter.signature().certificate(),
        tsa.chain().leaf(),
        "token signer resolved from the token's certificates"
    );
}

#[test]
fn token_with_fractional_gen_time_is_accepted() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let signed_at = now();
    let gen_time = signed_at + Duration::from_millis(123);
    let token = mint_token(&tsa, &encrypted_digest(&blob), HashAlgorithm::Sha256, gen_time);

    let parsed = TimestampToken::from_der(&token).expect("fractional genTime parses");
    assert_eq!(parsed.gen_time(), gen_time);

    for flavor in [TimestampFlavor::Rfc3161, TimestampFlavor::Authenticode] {
        let stamped = applier(flavor).attach_token(&blob, &token).expect("attach");
        let counter = verify_timestamp(&verify_blob(&stamped).expect("verify"))
            .expect("timestamp verifies")
            .expect("timestamp present");
        // signingTime is encoded in whole seconds.
        assert_eq!(counter.signing_time(), signed_at);
    }
}

#[test]
fn imprint_algorithm_is_reported_not_parent_algorithm() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let token = mint_token(&tsa, &encrypted_digest(&blob), HashAlgorithm::Sha512, now());
    let stamped = applier(TimestampFlavor::Authenticode)
        .attach_token(&blob, &token)
        .expect("attach");

    let counter = verify_timestamp(&verify_blob(&stamped).expect("verify"))
        .expect("timestamp verifies")
        .expect("timestamp present");
    assert_eq!(counter.kind(), TimestampKind::Authenticode);
    assert_eq!(counter.hash(), HashAlgorithm::Sha512);
}

#[test]
fn standard_attribute_wins_over_authenticode() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let digest = encrypted_digest(&blob);

    let good = mint_token(&tsa, &digest, HashAlgorithm::Sha256, now());
    let wrong_imprint = mint_token(&tsa, b"something else", HashAlgorithm::Sha256, now());

    let both = add_raw(&blob, TimestampKind::Rfc3161, &good);
    let both = add_raw(&both, TimestampKind::Authenticode, &wrong_imprint);
    let counter = verify_timestamp(&verify_blob(&both).expect("verify"))
        .expect("standard token is used")
        .expect("present");
    assert_eq!(counter.kind(), TimestampKind::Rfc3161);

    // First match wins even when it fails; there is no fallback.
    let reversed = add_raw(&blob, TimestampKind::Rfc3161, &wrong_imprint);
    let reversed = add_raw(&reversed, TimestampKind::Authenticode, &good);
    let err = verify_timestamp(&verify_blob(&reversed).expect("verify")).unwrap_err();
    assert!(matches!(err, SigningError::TimestampIntegrityError(_)), "{err}");
}

#[test]
fn token_with_two_signer_infos_is_malformed() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let tst = tst_info(&encrypted_digest(&blob), HashAlgorithm::Sha256, now());
    let token = token_from_parts(
        &tsa,
        &tst,
        vec![
            tsa_signer_info(&tsa, &tst, Some(now())),
            tsa_signer_info(&tsa, &tst, None),
        ],
    );
    let stamped = add_raw(&blob, TimestampKind::Rfc3161, &token);

    let err = verify_timestamp(&verify_blob(&stamped).expect("verify")).unwrap_err();
    match err {
        SigningError::MalformedTimestampError(message) => {
            assert!(message.contains("exactly one SignerInfo"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn token_without_signing_time_is_rejected() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let tst = tst_info(&encrypted_digest(&blob), HashAlgorithm::Sha256, now());
    let token = token_from_parts(&tsa, &tst, vec![tsa_signer_info(&tsa, &tst, None)]);
    let stamped = applier(TimestampFlavor::Rfc3161)
        .attach_token(&blob, &token)
        .expect("imprint matches");

    let err = verify_timestamp(&verify_blob(&stamped).expect("verify")).unwrap_err();
    assert!(matches!(err, SigningError::MissingSigningTimeError(_)), "{err}");
}

#[test]
fn token_signed_over_other_content_fails_integrity() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let digest = encrypted_digest(&blob);
    let tst = tst_info(&digest, HashAlgorithm::Sha256, now());
    // Signer record made for a different TSTInfo.
    let other = tst_info(&digest, HashAlgorithm::Sha256, common::ago(3600));
    let token = token_from_parts(&tsa, &tst, vec![tsa_signer_info(&tsa, &other, Some(now()))]);
    let stamped = add_raw(&blob, TimestampKind::Authenticode, &token);

    let err = verify_timestamp(&verify_blob(&stamped).expect("verify")).unwrap_err();
    assert!(matches!(err, SigningError::TimestampIntegrityError(_)), "{err}");
}

#[test]
fn legacy_counter_signature_uses_parent_digest_algorithm() {
    let pki = Pki::new();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha384);
    let signing_time = common::ago(120);
    let stamped = TimestampApplier::default()
        .attach_counter_signature(&blob, &pki.tsa_signer(), signing_time)
        .expect("counter-sign");

    let counter = verify_timestamp(&verify_blob(&stamped).expect("verify"))
        .expect("counter-signature verifies")
        .expect("present");
    assert_eq!(counter.kind(), TimestampKind::CounterSignature);
    assert_eq!(counter.hash(), HashAlgorithm::Sha384);
    assert_eq!(counter.signing_time(), signing_time);
}

#[test]
fn counter_signature_over_other_bytes_fails_integrity() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let counter = SignerInfoBuilder::new(&tsa, HashAlgorithm::Sha256)
        .signing_time(now())
        .build(b"not the parent signature")
        .expect("counter signer info");
    let certs: Vec<_> = tsa.chain().iter().cloned().collect();
    let stamped = TimestampApplier::default()
        .attach_counter_signer_info(&blob, &counter, &certs)
        .expect("attach");

    let err = verify_timestamp(&verify_blob(&stamped).expect("verify")).unwrap_err();
    assert!(matches!(err, SigningError::TimestampIntegrityError(_)), "{err}");
}

#[test]
fn counter_signature_without_signing_time_is_rejected() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let counter = SignerInfoBuilder::new(&tsa, HashAlgorithm::Sha256)
        .build(&encrypted_digest(&blob))
        .expect("counter signer info");
    let certs: Vec<_> = tsa.chain().iter().cloned().collect();
    let stamped = TimestampApplier::default()
        .attach_counter_signer_info(&blob, &counter, &certs)
        .expect("attach");

    let err = verify_timestamp(&verify_blob(&stamped).expect("verify")).unwrap_err();
    assert!(matches!(err, SigningError::MissingSigningTimeError(_)), "{err}");
}

#[test]
fn flipped_encrypted_digest_fails_on_every_path() {
    let pki = Pki::new();
    let tsa = pki.tsa_signer();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let token = mint_token(&tsa, &encrypted_digest(&blob), HashAlgorithm::Sha256, now());

    let stamped = [
        applier(TimestampFlavor::Rfc3161)
            .attach_token(&blob, &token)
            .expect("rfc3161"),
        applier(TimestampFlavor::Authenticode)
            .attach_token(&blob, &token)
            .expect("authenticode"),
        TimestampApplier::default()
            .attach_counter_signature(&blob, &tsa, now())
            .expect("counter-signature"),
    ];
    for blob in stamped {
        let tampered = update_signer_info(&blob, |_, si| {
            let mut bytes = si.signature.as_bytes().to_vec();
            let last = bytes.len() - 1;
            bytes[last] ^= 0x01;
            si.signature = der::asn1::OctetString::new(bytes)?;
            Ok(())
        })
        .expect("re-encode");
        let err = verify_blob(&tampered).unwrap_err();
        assert!(matches!(err, SigningError::VerificationError(_)), "{err}");
    }
}

#[test]
fn malformed_token_bytes_are_rejected_on_attach() {
    let pki = Pki::new();
    let blob = signed_blob(&pki.signer(), HashAlgorithm::Sha256);
    let err = applier(TimestampFlavor::Rfc3161)
        .attach_token(&blob, &[0x30, 0x03, 0x02, 0x01, 0x01])
        .unwrap_err();
    assert!(matches!(err, SigningError::MalformedTimestampError(_)), "{err}");
}
