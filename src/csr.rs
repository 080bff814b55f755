//! PKCS#10 certification requests.

use der::asn1::BitString;
use der::{Decode, Encode};
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::attributes::{CertificateAttributes, CsrAttributes};
use crate::cert::SignatureAlgorithm;
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils::{self, PemLabel};

/// A signed certification request.
///
/// Requests attest the subject and the public key only; no extensions are
/// requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    pub inner: CertReq,
}

impl CertificateSigningRequest {
    /// Builds the request and signs it with `key`.
    pub fn build(
        subject: &CertificateAttributes,
        attributes: &CsrAttributes,
        key: &KeyPair,
    ) -> Result<Self> {
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.to_x509_name()?,
            public_key: key.as_spki()?,
            attributes: attributes.to_x509_attributes()?,
        };
        let algorithm = key.signature_algorithm();
        let signature = key.sign_data(&info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    /// Parses a `CERTIFICATE REQUEST` PEM block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        match pem_utils::parse_labeled(pem)? {
            (PemLabel::CertificateRequest, der) => Self::from_der(&der),
            (label, _) => Err(PkiError::DecodingError(format!(
                "expected a certificate request, found PEM label {}",
                label.as_str()
            ))),
        }
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_der()?,
            PemLabel::CertificateRequest,
        ))
    }

    pub fn subject_attributes(&self) -> Result<CertificateAttributes> {
        CertificateAttributes::from_x509_name(&self.inner.info.subject)
    }

    pub fn attributes(&self) -> Result<CsrAttributes> {
        CsrAttributes::from_x509_attributes(&self.inner.info.attributes)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// Checks the request's self-signature against its embedded key.
    ///
    /// Fails with [`PkiError::CsrSignatureNotVerified`] when the signature
    /// does not match or uses an algorithm the key cannot produce.
    pub fn verify(&self) -> Result<()> {
        let public_key = self.public_key()?;
        let algorithm = SignatureAlgorithm::try_from(&self.inner.algorithm)
            .map_err(|_| PkiError::CsrSignatureNotVerified)?;
        let message = self.inner.info.to_der()?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or(PkiError::CsrSignatureNotVerified)?;

        if public_key.verify(&algorithm, &message, signature) {
            Ok(())
        } else {
            Err(PkiError::CsrSignatureNotVerified)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyAlgorithm;
    use rstest::rstest;

    fn subject() -> CertificateAttributes {
        "/CN=server.mynet.it/C=IT/O=MyNET".parse().unwrap()
    }

    #[rstest]
    #[case(KeyAlgorithm::EcdsaP256)]
    #[case(KeyAlgorithm::EcdsaP384)]
    #[case(KeyAlgorithm::Ed25519)]
    fn generated_requests_verify(#[case] algorithm: KeyAlgorithm) {
        let key = KeyPair::generate(algorithm).unwrap();
        let csr = CertificateSigningRequest::build(&subject(), &CsrAttributes::new(), &key).unwrap();

        let pem = csr.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));

        let parsed = CertificateSigningRequest::from_pem(&pem).unwrap();
        parsed.verify().unwrap();
        assert_eq!(parsed.subject_attributes().unwrap(), subject());
        assert_eq!(parsed.public_key().unwrap(), key.public_key());
    }

    #[test]
    fn request_attributes_survive_encoding() {
        let key = KeyPair::generate_ed25519();
        let attributes = CsrAttributes::builder()
            .challenge_password("12345")
            .unstructured_name("Muzio Scevola")
            .build();
        let csr = CertificateSigningRequest::build(&subject(), &attributes, &key).unwrap();
        let parsed = CertificateSigningRequest::from_der(&csr.to_der().unwrap()).unwrap();
        assert_eq!(parsed.attributes().unwrap(), attributes);
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let key = KeyPair::generate_ed25519();
        let mut csr =
            CertificateSigningRequest::build(&subject(), &CsrAttributes::new(), &key).unwrap();
        let mut signature = csr.inner.signature.raw_bytes().to_vec();
        signature[0] ^= 0xff;
        csr.inner.signature = BitString::from_bytes(&signature).unwrap();

        assert!(matches!(csr.verify(), Err(PkiError::CsrSignatureNotVerified)));
    }

    #[test]
    fn tampered_subject_is_rejected() {
        let key = KeyPair::generate_ecdsa_p256();
        let mut csr =
            CertificateSigningRequest::build(&subject(), &CsrAttributes::new(), &key).unwrap();
        csr.inner.info.subject = "/CN=evil.example".parse::<CertificateAttributes>()
            .unwrap()
            .to_x509_name()
            .unwrap();

        assert!(matches!(csr.verify(), Err(PkiError::CsrSignatureNotVerified)));
    }
}
