//! PKCS#7 builder service.
//! Wraps a canonical digest into an Authenticode `SignedData` envelope.

use cms::cert::CertificateChoices;
use cms::content_info::CmsVersion;
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerInfo, SignerInfos,
};
use der::asn1::{Any, SetOfVec};
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::adapters::key_provider::KeySigner;
use crate::domain::constants::{SPC_INDIRECT_DATA_OID, SPC_SP_OPUS_INFO_OID, SPC_STATEMENT_TYPE_OID};
use crate::domain::crypto::DigestBytes;
use crate::domain::pkcs7::Pkcs7SignedData;
use crate::domain::spc::{
    digest_algorithm_identifier, individual_statement_type, SpcIndirectDataContent, SpcSpOpusInfo,
};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::signer_info_builder::SignerInfoBuilder;

/// Certificate set from `certs`, dropping duplicates.
pub fn certificate_set<'a, I>(certs: I) -> SigningResult<CertificateSet>
where
    I: IntoIterator<Item = &'a Certificate>,
{
    let mut unique: Vec<CertificateChoices> = Vec::new();
    for cert in certs {
        let choice = CertificateChoices::Certificate(cert.clone());
        if !unique.contains(&choice) {
            unique.push(choice);
        }
    }
    Ok(CertificateSet(SetOfVec::try_from(unique)?))
}

/// Run `update` on the only `SignerInfo` of `blob` and re-encode.
pub fn update_signer_info<F>(blob: &Pkcs7SignedData, update: F) -> SigningResult<Pkcs7SignedData>
where
    F: FnOnce(&mut SignedData, &mut SignerInfo) -> SigningResult<()>,
{
    let mut signed_data = blob.signed_data()?;
    let mut infos = signed_data.signer_infos.0.clone().into_vec();
    if infos.len() != 1 {
        return Err(SigningError::Pkcs7Error(format!(
            "expected exactly one SignerInfo, found {}",
            infos.len()
        )));
    }
    let mut signer_info = infos.remove(0);
    update(&mut signed_data, &mut signer_info)?;
    signed_data.signer_infos = SignerInfos(SetOfVec::try_from(vec![signer_info])?);
    Pkcs7SignedData::from_signed_data(&signed_data)
}

pub struct Pkcs7BuilderService {
    additional_certs: Vec<Certificate>,
}

impl Default for Pkcs7BuilderService {
    fn default() -> Self {
        Self::new()
    }
}

impl Pkcs7BuilderService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            additional_certs: Vec::new(),
        }
    }

    /// Extra certificates to embed next to the signer's own chain.
    #[must_use]
    pub fn with_additional_certs(mut self, certs: Vec<Certificate>) -> Self {
        self.additional_certs = certs;
        self
    }

    /// Sign `imprint` with `signer`, using the imprint's hash algorithm throughout.
    pub fn sign(&self, imprint: &DigestBytes, signer: &dyn KeySigner) -> SigningResult<Pkcs7SignedData> {
        let hash = imprint.algorithm();
        let content = SpcIndirectDataContent::for_powershell(imprint)?;
        let econtent = Any::from_der(&content.to_der()?)?;

        // Authenticode hashes the content octets without the outer SEQUENCE header
        let signer_info = SignerInfoBuilder::new(signer, hash)
            .content_type(SPC_INDIRECT_DATA_OID)
            .attribute(SPC_SP_OPUS_INFO_OID, &SpcSpOpusInfo::default())?
            .attribute(SPC_STATEMENT_TYPE_OID, &individual_statement_type())?
            .build(econtent.value())?;

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![digest_algorithm_identifier(hash)])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: SPC_INDIRECT_DATA_OID,
                econtent: Some(econtent),
            },
            certificates: Some(certificate_set(
                signer.chain().iter().chain(self.additional_certs.iter()),
            )?),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        let blob = Pkcs7SignedData::from_signed_data(&signed_data)?;
        log::info!("Built Authenticode SignedData ({} bytes, {hash})", blob.len());
        Ok(blob)
    }
}
