use der::Encode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::attributes::CertificateAttributes;
use crate::cert::Certificate;
use crate::cert::extensions::{ExtensionDescriptor, KeyIdentifiers, assemble_extensions};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::error::Result;
use crate::key::{KeyIdentifier, KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Identifier of the issuer's key, referenced by the authority key
    /// identifier of every certificate it issues.
    fn key_identifier(&self) -> Result<KeyIdentifier>;

    /// Encodes `descriptors` into the final extension list for a certificate
    /// certifying `subject_key`.
    ///
    /// The subject key identifier is always added. The authority key
    /// identifier is added when the issuer holds a different key.
    fn extensions_for(
        &self,
        subject_key: &PublicKey,
        descriptors: &[ExtensionDescriptor],
    ) -> Result<AssembledExtensions> {
        let subject_id = KeyIdentifier::from_public_key(subject_key)?;
        let issuer_id = self.key_identifier()?;
        let self_issued = subject_id == issuer_id;
        let ids = KeyIdentifiers {
            subject: Some(subject_id),
            authority: (!self_issued).then_some(issuer_id),
        };
        Ok(AssembledExtensions {
            extensions: assemble_extensions(descriptors, &ids)?,
            ids,
        })
    }

    /// Issues a certificate based on the provided certification request information.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        serial_number: Vec<u8>,
        validity: Validity,
    ) -> Result<Certificate> {
        let signature_algo = self.signing_key().signature_algorithm();

        let tbs_cert = TbsCertificate::new(
            serial_number,
            self.issuer_name()?,
            cert_request.subject.clone(),
            cert_request.subject_public_key.clone(),
            signature_algo,
            validity,
            cert_request.extensions.clone(),
        );

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// Extensions assembled by [`Issuer::extensions_for`], with the identifiers
/// that went into them.
#[derive(Debug, Clone)]
pub struct AssembledExtensions {
    pub extensions: Vec<ExtensionParam>,
    pub ids: KeyIdentifiers,
}

/// Issuer of self-signed certificates: the subject is its own issuer.
pub struct SelfIssuer<'a> {
    pub name: CertificateAttributes,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        self.name.to_x509_name()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> Result<KeyIdentifier> {
        KeyIdentifier::from_public_key(&self.key.public_key())
    }
}

/// A CA certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<Name> {
        // The name of the issuer is the subject of the certificate, as encoded
        Ok(self.cert.tbs().subject.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn key_identifier(&self) -> Result<KeyIdentifier> {
        self.cert.key_identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier};

    fn root() -> CertificateWithPrivateKey {
        let key = KeyPair::generate_ecdsa_p256();
        let name: CertificateAttributes = "/CN=Root CA/O=MyNET".parse().unwrap();
        let issuer = SelfIssuer {
            name: name.clone(),
            key: &key,
        };
        let extensions = issuer
            .extensions_for(&key.public_key(), &[ExtensionDescriptor::ca()])
            .unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(name)
            .subject_public_key(key.public_key())
            .extensions(extensions.extensions)
            .build();
        let cert = issuer.issue(&info, vec![1], Validity::for_days(30)).unwrap();
        CertificateWithPrivateKey { cert, key }
    }

    #[test]
    fn self_signed_certificate_verifies_with_its_own_key() {
        let root = root();
        assert!(root.cert.verify_signature(&root.key.public_key()).unwrap());
        assert_eq!(
            root.cert.issuer_attributes().unwrap(),
            root.cert.subject_attributes().unwrap()
        );

        let ski: SubjectKeyIdentifier = root.cert.find_extension().unwrap().unwrap();
        assert_eq!(ski.0, root.cert.key_identifier().unwrap());
        assert!(
            root.cert
                .find_extension::<AuthorityKeyIdentifier>()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn issued_certificate_references_the_issuer_key() {
        let root = root();
        let leaf_key = KeyPair::generate_ed25519();
        let extensions = root
            .extensions_for(
                &leaf_key.public_key(),
                &[ExtensionDescriptor::basic_constraints(false)],
            )
            .unwrap();
        let info = CertificationRequestInfo::builder()
            .subject("/CN=leaf".parse().unwrap())
            .subject_public_key(leaf_key.public_key())
            .extensions(extensions.extensions)
            .build();
        let leaf = root.issue(&info, vec![2], Validity::for_days(30)).unwrap();

        assert!(leaf.verify_signature(&root.key.public_key()).unwrap());
        assert!(!leaf.verify_signature(&leaf_key.public_key()).unwrap());
        assert_eq!(
            leaf.issuer_attributes().unwrap(),
            root.cert.subject_attributes().unwrap()
        );

        let aki: AuthorityKeyIdentifier = leaf.find_extension().unwrap().unwrap();
        assert_eq!(aki.key_identifier, root.cert.key_identifier().unwrap());
    }
}
