pub mod extensions;
pub mod params;

use core::fmt;

use der::{Decode, Encode, EncodePem};
use extensions::{ExtensionDescriptor, ToAndFromX509Extension};
use params::{ExtensionParam, Validity};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::attributes::CertificateAttributes;
use crate::error::{PkiError, Result};
use crate::key::{KeyIdentifier, PublicKey};
use crate::pem_utils::{self, PemLabel};

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-256 with ECDSA (P-256).
    Sha256WithECDSA,
    /// SHA-384 with ECDSA (P-384).
    Sha384WithECDSA,
    /// Pure Ed25519.
    Ed25519,
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA carries explicit NULL parameters, the others carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::asn1::Any::null()),
            },
            SignatureAlgorithm::Sha256WithECDSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
            SignatureAlgorithm::Sha384WithECDSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
                parameters: None,
            },
            SignatureAlgorithm::Ed25519 => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc8410::ID_ED_25519,
                parameters: None,
            },
        }
    }
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = PkiError;

    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self> {
        match value.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRSA)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::Sha256WithECDSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::Sha384WithECDSA),
            const_oid::db::rfc8410::ID_ED_25519 => Ok(SignatureAlgorithm::Ed25519),
            oid => Err(PkiError::DecodingError(format!(
                "Unsupported signature algorithm {oid}"
            ))),
        }
    }
}

pub(crate) fn time_from_x509(time: &x509_cert::time::Time) -> OffsetDateTime {
    OffsetDateTime::from(time.to_system_time())
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Parses a single `CERTIFICATE` PEM block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        match pem_utils::parse_labeled(pem)? {
            (PemLabel::Certificate, der) => Self::from_der(&der),
            (label, _) => Err(PkiError::DecodingError(format!(
                "expected a certificate, found PEM label {}",
                label.as_str()
            ))),
        }
    }

    pub fn tbs(&self) -> &TbsCertificateInner {
        &self.inner.tbs_certificate
    }

    pub fn subject_attributes(&self) -> Result<CertificateAttributes> {
        CertificateAttributes::from_x509_name(&self.tbs().subject)
    }

    pub fn issuer_attributes(&self) -> Result<CertificateAttributes> {
        CertificateAttributes::from_x509_name(&self.tbs().issuer)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.tbs().subject_public_key_info)
    }

    /// Identifier of the certified key, computed the same way issuance
    /// computes subject key identifiers.
    pub fn key_identifier(&self) -> Result<KeyIdentifier> {
        Ok(KeyIdentifier::from_spki_der(
            &self.tbs().subject_public_key_info.to_der()?,
        ))
    }

    /// Serial number as lowercase hex.
    pub fn serial_number_hex(&self) -> String {
        hex::encode(self.tbs().serial_number.as_bytes())
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.tbs().validity;
        Validity {
            not_before: time_from_x509(&validity.not_before),
            not_after: time_from_x509(&validity.not_after),
        }
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.tbs()
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509)
            .collect()
    }

    /// Finds and decodes one extension.
    pub fn find_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>())
            .transpose()
    }

    /// The extensions that have a descriptor form, in certificate order.
    pub fn extension_descriptors(&self) -> Result<Vec<ExtensionDescriptor>> {
        let mut descriptors = Vec::new();
        for ext in self.extensions() {
            if let Some(descriptor) = ExtensionDescriptor::from_extension_param(&ext)? {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<bool> {
        let message = self.tbs().to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::SignatureError("signature has unused bits".to_string())
        })?;
        Ok(issuer_key.verify(&self.signature_algorithm()?, &message, signature))
    }
}

/// Output of an issuance call, tagged with its encoding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum IssuedArtifact {
    /// PEM text.
    Pem(String),
    /// DER-encoded PKCS#12 archive.
    Pkcs12(Vec<u8>),
}

impl IssuedArtifact {
    /// `"pem"` or `"pkcs12"`.
    pub fn artifact_type(&self) -> &'static str {
        match self {
            IssuedArtifact::Pem(_) => "pem",
            IssuedArtifact::Pkcs12(_) => "pkcs12",
        }
    }

    pub fn as_pem(&self) -> Option<&str> {
        match self {
            IssuedArtifact::Pem(pem) => Some(pem),
            IssuedArtifact::Pkcs12(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IssuedArtifact::Pem(pem) => pem.as_bytes(),
            IssuedArtifact::Pkcs12(der) => der,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            IssuedArtifact::Pem(pem) => pem.into_bytes(),
            IssuedArtifact::Pkcs12(der) => der,
        }
    }
}

impl fmt::Debug for IssuedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuedArtifact::Pem(pem) => f.debug_tuple("Pem").field(pem).finish(),
            IssuedArtifact::Pkcs12(der) => write!(f, "Pkcs12({} bytes)", der.len()),
        }
    }
}
