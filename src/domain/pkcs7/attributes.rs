//! OID-keyed attribute sets on a `SignerInfo`.
//!
//! Lookup returns a dedicated [`AttributeError::NotFound`] so callers can fall
//! back to the next candidate OID without string matching on errors.

use der::asn1::{Any, ObjectIdentifier, SetOfVec};
use der::{Decode, DecodeOwned, Encode};
use x509_cert::attr::Attribute;

use crate::infra::error::SigningError;

/// Authenticated or unauthenticated attribute set.
pub type Attributes = SetOfVec<Attribute>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute {0} not found")]
    NotFound(ObjectIdentifier),

    #[error("attribute {oid} has {count} values, expected exactly one")]
    ValueCount { oid: ObjectIdentifier, count: usize },

    #[error("attribute {oid} could not be decoded: {message}")]
    Decode {
        oid: ObjectIdentifier,
        message: String,
    },

    #[error("attribute {oid} could not be encoded: {message}")]
    Encode {
        oid: ObjectIdentifier,
        message: String,
    },
}

impl AttributeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AttributeError::NotFound(_))
    }
}

impl From<AttributeError> for SigningError {
    fn from(error: AttributeError) -> Self {
        SigningError::Pkcs7Error(error.to_string())
    }
}

/// The single value of attribute `oid`.
pub fn get_one_any(attrs: Option<&Attributes>, oid: ObjectIdentifier) -> Result<&Any, AttributeError> {
    let attr = attrs
        .and_then(|set| set.iter().find(|a| a.oid == oid))
        .ok_or(AttributeError::NotFound(oid))?;
    let mut values = attr.values.iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(AttributeError::ValueCount {
            oid,
            count: attr.values.len(),
        }),
    }
}

/// Decode the single value of attribute `oid` as `T`.
pub fn get_one<T: DecodeOwned>(
    attrs: Option<&Attributes>,
    oid: ObjectIdentifier,
) -> Result<T, AttributeError> {
    let value = get_one_any(attrs, oid)?;
    let decode_err = |e: der::Error| AttributeError::Decode {
        oid,
        message: e.to_string(),
    };
    T::from_der(&value.to_der().map_err(decode_err)?).map_err(decode_err)
}

/// Append `value` under `oid`, merging into an existing attribute of the same type.
pub fn add<T: Encode>(
    attrs: &mut Option<Attributes>,
    oid: ObjectIdentifier,
    value: &T,
) -> Result<(), AttributeError> {
    let encode_err = |e: der::Error| AttributeError::Encode {
        oid,
        message: e.to_string(),
    };
    let value = Any::from_der(&value.to_der().map_err(encode_err)?).map_err(encode_err)?;

    let mut list: Vec<Attribute> = attrs.take().map(SetOfVec::into_vec).unwrap_or_default();
    match list.iter_mut().find(|a| a.oid == oid) {
        Some(existing) => {
            let mut values = existing.values.clone().into_vec();
            values.push(value);
            existing.values = SetOfVec::try_from(values).map_err(encode_err)?;
        }
        None => list.push(Attribute {
            oid,
            values: SetOfVec::try_from(vec![value]).map_err(encode_err)?,
        }),
    }
    *attrs = Some(SetOfVec::try_from(list).map_err(encode_err)?);
    Ok(())
}

/// Whether any attribute of type `oid` is present.
pub fn contains(attrs: Option<&Attributes>, oid: ObjectIdentifier) -> bool {
    attrs.is_some_and(|set| set.iter().any(|a| a.oid == oid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{PKCS9_CONTENT_TYPE_OID, PKCS9_MESSAGE_DIGEST_OID, PKCS7_DATA_OID};
    use der::asn1::OctetString;

    #[test]
    fn not_found_on_empty_set() {
        let err = get_one::<ObjectIdentifier>(None, PKCS9_CONTENT_TYPE_OID).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn add_then_get() {
        let mut attrs = None;
        add(&mut attrs, PKCS9_CONTENT_TYPE_OID, &PKCS7_DATA_OID).unwrap();
        add(
            &mut attrs,
            PKCS9_MESSAGE_DIGEST_OID,
            &OctetString::new(vec![1, 2, 3]).unwrap(),
        )
        .unwrap();

        let ct: ObjectIdentifier = get_one(attrs.as_ref(), PKCS9_CONTENT_TYPE_OID).unwrap();
        assert_eq!(ct, PKCS7_DATA_OID);
        let md: OctetString = get_one(attrs.as_ref(), PKCS9_MESSAGE_DIGEST_OID).unwrap();
        assert_eq!(md.as_bytes(), &[1, 2, 3]);
        assert!(contains(attrs.as_ref(), PKCS9_MESSAGE_DIGEST_OID));
    }

    #[test]
    fn second_value_is_merged_and_rejected_by_get_one() {
        let mut attrs = None;
        add(&mut attrs, PKCS9_MESSAGE_DIGEST_OID, &OctetString::new(vec![1]).unwrap()).unwrap();
        add(&mut attrs, PKCS9_MESSAGE_DIGEST_OID, &OctetString::new(vec![2]).unwrap()).unwrap();

        assert_eq!(attrs.as_ref().unwrap().len(), 1);
        let err = get_one::<OctetString>(attrs.as_ref(), PKCS9_MESSAGE_DIGEST_OID).unwrap_err();
        assert_eq!(
            err,
            AttributeError::ValueCount {
                oid: PKCS9_MESSAGE_DIGEST_OID,
                count: 2
            }
        );
    }

    #[test]
    fn decode_error_names_oid() {
        let mut attrs = None;
        add(&mut attrs, PKCS9_CONTENT_TYPE_OID, &PKCS7_DATA_OID).unwrap();
        let err = get_one::<OctetString>(attrs.as_ref(), PKCS9_CONTENT_TYPE_OID).unwrap_err();
        assert!(matches!(err, AttributeError::Decode { oid, .. } if oid == PKCS9_CONTENT_TYPE_OID));
    }
}
