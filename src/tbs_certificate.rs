use der::Encode;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::attributes::CertificateAttributes;
use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{SignatureAlgorithm, time_from_x509};
use crate::error::{PkiError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial number bytes.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer, kept as
///   encoded so that it matches the issuer certificate's subject byte for byte.
/// * `not_before` - The start of the certificate's validity period.
/// * `not_after` - The end of the certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
#[derive(Debug, Clone)]
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub subject: CertificateAttributes,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

/// Longest serial number encoding accepted by RFC 5280 4.1.2.2.
pub const MAX_SERIAL_LEN: usize = 20;

/// Decodes a hex serial number into the bytes of a positive DER integer.
///
/// Odd-length input gets a leading zero nibble, redundant leading zero
/// bytes are dropped and a zero byte is prepended when the high bit is set.
/// The result, sign byte included, must fit in [`MAX_SERIAL_LEN`] octets.
pub fn serial_from_hex(serial: &str) -> Result<Vec<u8>> {
    let padded = if serial.len() % 2 == 1 {
        format!("0{serial}")
    } else {
        serial.to_string()
    };
    let bytes =
        hex::decode(&padded).map_err(|_| PkiError::NonHexSerialNumber(serial.to_string()))?;

    let first_significant = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let mut minimal = bytes[first_significant..].to_vec();
    if minimal.first().is_none_or(|b| b & 0x80 != 0) {
        minimal.insert(0, 0);
    }
    if minimal.len() > MAX_SERIAL_LEN {
        return Err(PkiError::SerialNumberTooLong(serial.to_string()));
    }
    Ok(minimal)
}

/// UTCTime through 2049, GeneralizedTime afterwards (RFC 5280 4.1.2.5).
fn to_x509_time(instant: OffsetDateTime) -> Result<Time> {
    let instant = instant
        .replace_nanosecond(0)
        .map_err(|e| PkiError::InvalidValidity(e.to_string()))?;
    if instant.year() < 2050 {
        Ok(Time::UtcTime(der::asn1::UtcTime::from_system_time(
            instant.into(),
        )?))
    } else {
        Ok(Time::GeneralTime(
            der::asn1::GeneralizedTime::from_system_time(instant.into())?,
        ))
    }
}

impl TbsCertificate {
    pub fn new(
        serial_number: Vec<u8>,
        issuer: Name,
        subject: CertificateAttributes,
        subject_public_key: PublicKey,
        signature_algorithm: SignatureAlgorithm,
        validity: Validity,
        extensions: Vec<ExtensionParam>,
    ) -> Self {
        Self {
            serial_number,
            signature_algorithm,
            issuer,
            not_before: validity.not_before,
            not_after: validity.not_after,
            subject,
            subject_public_key,
            extensions,
        }
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(self.serial_number.as_slice())?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.to_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        Ok(Self {
            serial_number: inner.serial_number.as_bytes().to_vec(),
            signature_algorithm: SignatureAlgorithm::try_from(&inner.signature)?,
            issuer: inner.issuer.clone(),
            not_before: time_from_x509(&inner.validity.not_before),
            not_after: time_from_x509(&inner.validity.not_after),
            subject: CertificateAttributes::from_x509_name(&inner.subject)?,
            subject_public_key: PublicKey::from_x509spki(&inner.subject_public_key_info)?,
            extensions: inner
                .extensions
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(ExtensionParam::from_x509)
                .collect(),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;
    use rstest::rstest;
    use time::macros::datetime;

    #[rstest]
    #[case("01", vec![0x01])]
    #[case("1", vec![0x01])]
    #[case("0001", vec![0x01])]
    #[case("00", vec![0x00])]
    #[case("ff", vec![0x00, 0xff])]
    #[case("7fABCD", vec![0x7f, 0xab, 0xcd])]
    fn serial_numbers_encode_as_positive_integers(#[case] hex: &str, #[case] expected: Vec<u8>) {
        assert_eq!(serial_from_hex(hex).unwrap(), expected);
    }

    #[rstest]
    #[case::twenty_octets("7f".repeat(20), true)]
    #[case::leading_zeros_do_not_count(format!("0000{}", "01".repeat(20)), true)]
    #[case::twenty_one_octets("01".repeat(21), false)]
    #[case::twenty_octets_high_bit("80".repeat(20), false)]
    fn serial_numbers_fit_in_twenty_octets(#[case] hex: String, #[case] accepted: bool) {
        match serial_from_hex(&hex) {
            Ok(bytes) => {
                assert!(accepted);
                assert!(bytes.len() <= MAX_SERIAL_LEN);
                assert!(SerialNumber::<x509_cert::certificate::Rfc5280>::new(&bytes).is_ok());
            }
            Err(err) => {
                assert!(!accepted);
                assert!(matches!(err, PkiError::SerialNumberTooLong(_)));
                assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
            }
        }
    }

    #[test]
    fn non_hex_serial_is_rejected() {
        assert!(matches!(
            serial_from_hex("0g"),
            Err(PkiError::NonHexSerialNumber(_))
        ));
    }

    #[test]
    fn late_dates_use_generalized_time() {
        assert!(matches!(
            to_x509_time(datetime!(2049-12-31 23:59:59 UTC)).unwrap(),
            Time::UtcTime(_)
        ));
        assert!(matches!(
            to_x509_time(datetime!(2050-01-01 0:00 UTC)).unwrap(),
            Time::GeneralTime(_)
        ));
    }

    #[test]
    fn inner_round_trip_keeps_names_and_key() {
        let key = KeyPair::generate_ecdsa_p256();
        let subject: CertificateAttributes = "/CN=leaf/O=MyNET".parse().unwrap();
        let issuer: CertificateAttributes = "/CN=Root CA".parse().unwrap();
        let tbs = TbsCertificate::new(
            vec![0x2a],
            issuer.to_x509_name().unwrap(),
            subject.clone(),
            key.public_key(),
            key.signature_algorithm(),
            Validity {
                not_before: datetime!(2024-01-01 0:00 UTC),
                not_after: datetime!(2025-01-01 0:00 UTC),
            },
            vec![],
        );

        let inner = tbs.to_tbs_certificate_inner().unwrap();
        assert!(inner.extensions.is_none());

        let decoded = TbsCertificate::from_tbs_certificate_inner(&inner).unwrap();
        assert_eq!(decoded.subject, subject);
        assert_eq!(
            CertificateAttributes::from_x509_name(&decoded.issuer).unwrap(),
            issuer
        );
        assert_eq!(decoded.subject_public_key, key.public_key());
        assert_eq!(decoded.not_after, datetime!(2025-01-01 0:00 UTC));
        assert_eq!(decoded.serial_number, vec![0x2a]);
    }
}
