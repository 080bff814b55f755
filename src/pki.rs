//! Certificate issuance.
//!
//! Every entry point validates its input before generating keys or signing
//! anything. Provider failures propagate unchanged.

use core::fmt;
use core::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::attributes::{CertificateAttributes, CsrAttributes};
use crate::cert::extensions::{ExtensionDescriptor, KeyUsageFlags};
use crate::cert::params::CertificationRequestInfo;
use crate::cert::{Certificate, IssuedArtifact};
use crate::csr::CertificateSigningRequest;
use crate::error::{PkiError, Result};
use crate::issuer::{CertificateWithPrivateKey, Issuer, SelfIssuer};
use crate::key::{KeyAlgorithm, KeyIdentifier, KeyPair, PemKeyPair, PublicKey};
use crate::keystore;
use crate::request::{CertificateInput, CertificateRequest, RequestSource, ValidityDelta, normalize};
use crate::store::{Artifacts, ResourceKind};
use crate::tbs_certificate::serial_from_hex;

fn secret(value: impl Into<String>) -> Zeroizing<String> {
    Zeroizing::new(value.into())
}

fn require_subject(subject: &CertificateAttributes) -> Result<()> {
    if subject.is_empty() {
        return Err(PkiError::MissingField("subject"));
    }
    Ok(())
}

/// Extensions of leaves issued by [`issue_pki_certificate`] when the caller
/// supplies none.
pub fn default_leaf_extensions() -> Vec<ExtensionDescriptor> {
    vec![
        ExtensionDescriptor::basic_constraints(false),
        ExtensionDescriptor::key_usage(KeyUsageFlags {
            key_cert_sign: true,
            digital_signature: true,
            non_repudiation: true,
            key_encipherment: true,
            data_encipherment: true,
            ..KeyUsageFlags::default()
        }),
    ]
}

/// Input of [`issue_root`].
///
/// ```rust,no_run
/// use minipki::key::KeyAlgorithm;
/// use minipki::pki::{RootRequest, issue_root};
///
/// let request = RootRequest::builder()
///     .subject("/CN=Root CA/O=MyNET".parse()?)
///     .serial_number("01")
///     .key_algorithm(KeyAlgorithm::EcdsaP256)
///     .build();
/// let root = issue_root(&request)?;
/// println!("{}", root.certificate_pem());
/// # Ok::<(), minipki::error::PkiError>(())
/// ```
#[derive(Clone, Builder)]
pub struct RootRequest {
    /// Subject and issuer of the certificate.
    pub subject: CertificateAttributes,
    #[builder(into)]
    pub serial_number: String,
    /// Algorithm of the generated key. Ignored when `keys` is set.
    #[builder(default)]
    pub key_algorithm: KeyAlgorithm,
    /// Existing key pair to certify instead of generating one.
    pub keys: Option<PemKeyPair>,
    /// Decrypts `keys`, or encrypts the generated private key.
    #[builder(with = |password: impl Into<String>| secret(password))]
    pub private_key_password: Option<Zeroizing<String>>,
    /// Start of validity, now when unset.
    pub not_before: Option<OffsetDateTime>,
    #[builder(default = ValidityDelta::years(1))]
    pub validity: ValidityDelta,
    #[builder(default = vec![ExtensionDescriptor::ca()])]
    pub extensions: Vec<ExtensionDescriptor>,
}

/// A self-signed root certificate and its keys.
#[derive(Debug, Clone)]
pub struct RootCertificate {
    pub keys: PemKeyPair,
    pub certificate: IssuedArtifact,
    /// Subject key identifier of the root, referenced by every leaf it signs.
    pub key_identifier: KeyIdentifier,
}

impl RootCertificate {
    pub fn certificate_pem(&self) -> &str {
        self.certificate.as_pem().unwrap_or_default()
    }
}

impl Artifacts for RootCertificate {
    fn resources(&self) -> Vec<(ResourceKind, Vec<u8>)> {
        vec![
            (ResourceKind::PublicKey, self.keys.public_key.as_bytes().to_vec()),
            (ResourceKind::PrivateKey, self.keys.private_key.as_bytes().to_vec()),
            (ResourceKind::Certificate, self.certificate.as_bytes().to_vec()),
        ]
    }
}

/// Issues a self-signed root certificate.
///
/// The request is normalized before any key is generated. The subject key
/// identifier is computed from the certified key first; the final extension
/// list is the requested one with that identifier appended.
pub fn issue_root(request: &RootRequest) -> Result<RootCertificate> {
    let mut canonical = normalize(
        &CertificateInput::builder()
            .subject(request.subject.clone())
            .serial_number(request.serial_number.clone())
            .extensions(request.extensions.clone())
            .maybe_not_before(request.not_before)
            .validity_delta(request.validity)
            .build(),
    )?;
    let subject = canonical.require_subject()?.clone();

    let password = request.private_key_password.as_deref().map(String::as_str);
    let (key, keys) = match &request.keys {
        Some(keys) => (keys.key_pair(password)?, keys.clone()),
        None => {
            let key = KeyPair::generate(request.key_algorithm)?;
            let keys = key.to_pem_pair(password)?;
            (key, keys)
        }
    };
    debug!(
        serial = %canonical.serial_number,
        algorithm = %key.algorithm(),
        "root key ready"
    );

    canonical.public_key = Some(key.public_key().to_pem()?);
    let issuer = SelfIssuer {
        name: subject.clone(),
        key: &key,
    };
    let cert = sign_request(&canonical, &issuer)?;
    let key_identifier = cert.key_identifier()?;
    info!(
        serial = %canonical.serial_number,
        subject = %subject,
        key_id = %key_identifier,
        "issued root certificate"
    );

    Ok(RootCertificate {
        keys,
        certificate: IssuedArtifact::Pem(cert.to_pem()?),
        key_identifier,
    })
}

/// Input of [`generate_csr`].
#[derive(Clone, Builder)]
pub struct CsrRequest {
    pub subject: CertificateAttributes,
    #[builder(default)]
    pub attributes: CsrAttributes,
    pub keys: PemKeyPair,
    #[builder(with = |password: impl Into<String>| secret(password))]
    pub private_key_password: Option<Zeroizing<String>>,
}

/// Builds and signs a certification request, returned as PEM.
pub fn generate_csr(request: &CsrRequest) -> Result<String> {
    require_subject(&request.subject)?;
    let password = request.private_key_password.as_deref().map(String::as_str);
    let key = request.keys.key_pair(password)?;

    let csr = CertificateSigningRequest::build(&request.subject, &request.attributes, &key)?;
    debug!(
        subject = %request.subject,
        algorithm = %key.algorithm(),
        "signed certification request"
    );
    csr.to_pem()
}

/// Input of [`issue_from_csr`].
#[derive(Clone, Builder)]
pub struct LeafRequest {
    #[builder(into)]
    pub csr_pem: String,
    pub validity_years: u32,
    #[builder(into)]
    pub serial_number: String,
    #[builder(default)]
    pub extensions: Vec<ExtensionDescriptor>,
    #[builder(into)]
    pub ca_certificate_pem: String,
    #[builder(with = |pem: impl Into<String>| secret(pem))]
    pub ca_private_key_pem: Zeroizing<String>,
    #[builder(with = |password: impl Into<String>| secret(password))]
    pub ca_private_key_password: Option<Zeroizing<String>>,
}

/// Issues a leaf certificate for a certification request, signed by a CA.
///
/// The CSR subject and key, the CA subject and the CA key are gathered into
/// a [`CertificateInput`] and normalized like any other request. The CSR
/// signature is then checked before anything is signed. The issuer name is
/// copied from the CA certificate and the authority key identifier is the
/// identifier of the CA certificate's key.
pub fn issue_from_csr(request: &LeafRequest) -> Result<String> {
    let csr = CertificateSigningRequest::from_pem(&request.csr_pem)?;
    let ca_cert = Certificate::from_pem(&request.ca_certificate_pem)?;

    let canonical = normalize(
        &CertificateInput::builder()
            .subject(csr.subject_attributes()?)
            .issuer(ca_cert.subject_attributes()?)
            .extensions(request.extensions.clone())
            .validity_years(request.validity_years)
            .serial_number(request.serial_number.clone())
            .public_key(csr.public_key()?.to_pem()?)
            .private_key(request.ca_private_key_pem.as_str())
            .maybe_private_key_password(
                request.ca_private_key_password.as_deref().map(String::as_str),
            )
            .build(),
    )?;
    let subject = canonical.require_subject()?;

    csr.verify()?;

    let ca_key = KeyPair::from_pem(
        canonical.require_private_key()?,
        canonical.private_key_password(),
    )?;
    if ca_key.public_key() != ca_cert.public_key()? {
        return Err(PkiError::InvalidInput(
            "CA private key does not match the CA certificate".to_string(),
        ));
    }
    let ca = CertificateWithPrivateKey {
        cert: ca_cert,
        key: ca_key,
    };
    let cert = sign_request(&canonical, &ca)?;

    info!(
        serial = %canonical.serial_number,
        subject = %subject,
        issuer = %ca.issuer_name()?,
        "issued certificate from csr"
    );
    cert.to_pem()
}

/// Signs a normalized request on behalf of `issuer`.
///
/// The subject key comes from the request's public key; the subject key
/// identifier and, for a foreign issuer, the authority key identifier are
/// appended to the requested extensions.
fn sign_request<I: Issuer>(request: &CertificateRequest, issuer: &I) -> Result<Certificate> {
    let subject = request.require_subject()?;
    let serial = serial_from_hex(&request.serial_number)?;
    let validity = request.validity.resolve(OffsetDateTime::now_utc())?;
    let subject_key = PublicKey::from_pem(request.require_public_key()?)?;

    let assembled = issuer.extensions_for(&subject_key, &request.extensions)?;
    let info = CertificationRequestInfo::builder()
        .subject(subject.clone())
        .subject_public_key(subject_key)
        .extensions(assembled.extensions)
        .build();
    issuer.issue(&info, serial, validity)
}

/// Signs an already normalized request.
///
/// The issuer defaults to the subject, which makes the certificate
/// self-issued. The certificate is signed with the request's private key.
pub fn generate_certificate(request: &CertificateRequest) -> Result<String> {
    let subject = request.require_subject()?;
    request.require_public_key()?;
    let signing_key = KeyPair::from_pem(
        request.require_private_key()?,
        request.private_key_password(),
    )?;

    let issuer = SelfIssuer {
        name: request.issuer.clone().unwrap_or_else(|| subject.clone()),
        key: &signing_key,
    };
    let cert = sign_request(request, &issuer)?;

    info!(
        serial = %request.serial_number,
        subject = %subject,
        issuer = %issuer.name,
        "issued certificate"
    );
    cert.to_pem()
}

/// Normalizes any request shape, then signs it with [`generate_certificate`].
pub fn generate_certificate_from<S: RequestSource + ?Sized>(source: &S) -> Result<String> {
    generate_certificate(&normalize(source)?)
}

/// Encoding of the certificate returned by [`issue_pki_certificate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pem,
    /// PKCS#12 archive holding the key, the leaf and the CA certificate.
    #[serde(alias = "pfx")]
    Pkcs12,
}

impl FromStr for OutputFormat {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pem" => Ok(OutputFormat::Pem),
            "pfx" | "pkcs12" => Ok(OutputFormat::Pkcs12),
            other => Err(PkiError::UnsupportedOutput(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pem => f.write_str("pem"),
            OutputFormat::Pkcs12 => f.write_str("pkcs12"),
        }
    }
}

/// Options of [`issue_pki_certificate`].
#[derive(Clone, Builder)]
pub struct PkiCertificateOptions {
    #[builder(default)]
    pub output: OutputFormat,
    /// Archive password; required for [`OutputFormat::Pkcs12`].
    #[builder(with = |password: impl Into<String>| secret(password))]
    pub password: Option<Zeroizing<String>>,
    #[builder(default)]
    pub key_algorithm: KeyAlgorithm,
    #[builder(default = 1)]
    pub validity_years: u32,
    #[builder(with = |password: impl Into<String>| secret(password))]
    pub ca_key_password: Option<Zeroizing<String>>,
    /// Leaf extensions, [`default_leaf_extensions`] when unset.
    pub extensions: Option<Vec<ExtensionDescriptor>>,
}

impl Default for PkiCertificateOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PkiCertificateOptions {
    /// Returns the archive password when the output format needs one.
    fn checked_password(&self) -> Result<Option<&str>> {
        match self.output {
            OutputFormat::Pem => Ok(None),
            OutputFormat::Pkcs12 => self
                .password
                .as_deref()
                .map(String::as_str)
                .filter(|password| !password.is_empty())
                .map(Some)
                .ok_or(PkiError::MissingOutputPassword),
        }
    }
}

/// Everything produced by [`issue_pki_certificate`].
#[derive(Debug, Clone)]
pub struct PkiCertificate {
    pub keys: PemKeyPair,
    pub csr: String,
    pub certificate: IssuedArtifact,
}

impl Artifacts for PkiCertificate {
    fn resources(&self) -> Vec<(ResourceKind, Vec<u8>)> {
        let certificate_kind = match self.certificate {
            IssuedArtifact::Pem(_) => ResourceKind::Certificate,
            IssuedArtifact::Pkcs12(_) => ResourceKind::Keystore,
        };
        vec![
            (ResourceKind::PublicKey, self.keys.public_key.as_bytes().to_vec()),
            (ResourceKind::PrivateKey, self.keys.private_key.as_bytes().to_vec()),
            (ResourceKind::Csr, self.csr.as_bytes().to_vec()),
            (certificate_kind, self.certificate.as_bytes().to_vec()),
        ]
    }
}

/// Generates a key pair and a CSR for `subject`, then has the CA sign it.
///
/// The output configuration is checked first. With
/// [`OutputFormat::Pkcs12`] the certificate is a password protected archive
/// of the new private key, the leaf and the CA certificate.
pub fn issue_pki_certificate(
    subject: &CertificateAttributes,
    serial_number: &str,
    ca_certificate_pem: &str,
    ca_private_key_pem: &str,
    options: &PkiCertificateOptions,
) -> Result<PkiCertificate> {
    let archive_password = options.checked_password()?;
    let canonical = normalize(
        &CertificateInput::builder()
            .subject(subject.clone())
            .serial_number(serial_number)
            .validity_years(options.validity_years)
            .extensions(
                options
                    .extensions
                    .clone()
                    .unwrap_or_else(default_leaf_extensions),
            )
            .build(),
    )?;

    let keys = PemKeyPair::generate(options.key_algorithm, None)?;
    let csr = generate_csr(
        &CsrRequest::builder()
            .subject(canonical.require_subject()?.clone())
            .keys(keys.clone())
            .build(),
    )?;

    let leaf = issue_from_csr(&LeafRequest {
        csr_pem: csr.clone(),
        validity_years: options.validity_years,
        serial_number: canonical.serial_number.clone(),
        extensions: canonical.extensions.clone(),
        ca_certificate_pem: ca_certificate_pem.to_string(),
        ca_private_key_pem: secret(ca_private_key_pem),
        ca_private_key_password: options.ca_key_password.clone(),
    })?;

    let certificate = match archive_password {
        None => IssuedArtifact::Pem(leaf),
        Some(password) => {
            let chain = format!("{leaf}{ca_certificate_pem}");
            IssuedArtifact::Pkcs12(keystore::export_pkcs12(
                &keys.private_key,
                None,
                &chain,
                password,
            )?)
        }
    };
    info!(
        serial = serial_number,
        subject = %subject,
        output = %options.output,
        "issued pki certificate"
    );

    Ok(PkiCertificate {
        keys,
        csr,
        certificate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier};
    use crate::error::ErrorKind;
    use rstest::rstest;

    fn root_subject() -> CertificateAttributes {
        "/CN=Root CA/C=IT/ST=Italy/L=Bergamo/O=MyNET/OU=MyNET Root CA server/E=ca-root@mynet.it"
            .parse()
            .unwrap()
    }

    fn root() -> RootCertificate {
        issue_root(
            &RootRequest::builder()
                .subject(root_subject())
                .serial_number("01")
                .key_algorithm(KeyAlgorithm::EcdsaP256)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn root_is_self_signed_ca_with_subject_key_identifier() {
        let root = root();
        let cert = Certificate::from_pem(root.certificate_pem()).unwrap();

        assert_eq!(cert.subject_attributes().unwrap(), root_subject());
        assert_eq!(cert.issuer_attributes().unwrap(), root_subject());
        assert!(cert.verify_signature(&cert.public_key().unwrap()).unwrap());

        let constraints: BasicConstraints = cert.find_extension().unwrap().unwrap();
        assert!(constraints.is_ca);
        let ski: SubjectKeyIdentifier = cert.find_extension().unwrap().unwrap();
        assert_eq!(ski.0, root.key_identifier);
        assert!(
            cert.find_extension::<AuthorityKeyIdentifier>()
                .unwrap()
                .is_none()
        );

        let validity = cert.validity();
        assert!(validity.not_after > validity.not_before);
        assert!(validity.contains(OffsetDateTime::now_utc()));
        assert!(!validity.contains(validity.not_after + time::Duration::seconds(1)));
    }

    #[test]
    fn root_reuses_supplied_encrypted_keys() {
        let keys = PemKeyPair::generate(KeyAlgorithm::Ed25519, Some("secret")).unwrap();
        let root = issue_root(
            &RootRequest::builder()
                .subject(root_subject())
                .serial_number("0a")
                .keys(keys.clone())
                .private_key_password("secret")
                .build(),
        )
        .unwrap();

        assert_eq!(root.keys.public_key, keys.public_key);
        let cert = Certificate::from_pem(root.certificate_pem()).unwrap();
        assert_eq!(
            cert.public_key().unwrap(),
            PublicKey::from_pem(&keys.public_key).unwrap()
        );
    }

    #[rstest]
    #[case("", ErrorKind::Validation)]
    #[case("xyz", ErrorKind::Validation)]
    fn root_rejects_bad_serials(#[case] serial: &str, #[case] kind: ErrorKind) {
        let err = issue_root(
            &RootRequest::builder()
                .subject(root_subject())
                .serial_number(serial)
                .key_algorithm(KeyAlgorithm::Ed25519)
                .build(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn leaf_from_csr_keeps_subject_and_references_root() {
        let root = root();
        let leaf_keys = PemKeyPair::generate(KeyAlgorithm::EcdsaP256, None).unwrap();
        let subject: CertificateAttributes = "/CN=server.mynet.it/O=MyNET".parse().unwrap();
        let csr = generate_csr(
            &CsrRequest::builder()
                .subject(subject.clone())
                .keys(leaf_keys)
                .build(),
        )
        .unwrap();

        let leaf = issue_from_csr(
            &LeafRequest::builder()
                .csr_pem(csr)
                .validity_years(2)
                .serial_number("02")
                .ca_certificate_pem(root.certificate_pem())
                .ca_private_key_pem(root.keys.private_key.as_str())
                .build(),
        )
        .unwrap();
        let leaf = Certificate::from_pem(&leaf).unwrap();

        assert_eq!(leaf.subject_attributes().unwrap(), subject);
        assert_eq!(leaf.issuer_attributes().unwrap(), root_subject());
        let aki: AuthorityKeyIdentifier = leaf.find_extension().unwrap().unwrap();
        assert_eq!(aki.key_identifier, root.key_identifier);
        let ca_key = PublicKey::from_pem(&root.keys.public_key).unwrap();
        assert!(leaf.verify_signature(&ca_key).unwrap());
    }

    #[test]
    fn tampered_csr_is_rejected_before_signing() {
        let root = root();
        let keys = PemKeyPair::generate(KeyAlgorithm::Ed25519, None).unwrap();
        let subject: CertificateAttributes = "/CN=device".parse().unwrap();
        let key = keys.key_pair(None).unwrap();
        let mut csr =
            CertificateSigningRequest::build(&subject, &CsrAttributes::new(), &key).unwrap();
        csr.inner.info.subject = "/CN=intruder"
            .parse::<CertificateAttributes>()
            .unwrap()
            .to_x509_name()
            .unwrap();

        let err = issue_from_csr(
            &LeafRequest::builder()
                .csr_pem(csr.to_pem().unwrap())
                .validity_years(1)
                .serial_number("03")
                .ca_certificate_pem(root.certificate_pem())
                .ca_private_key_pem(root.keys.private_key.as_str())
                .build(),
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::CsrSignatureNotVerified));
    }

    #[test]
    fn mismatched_ca_key_is_rejected() {
        let root = root();
        let other = PemKeyPair::generate(KeyAlgorithm::EcdsaP256, None).unwrap();
        let keys = PemKeyPair::generate(KeyAlgorithm::EcdsaP256, None).unwrap();
        let csr = generate_csr(
            &CsrRequest::builder()
                .subject("/CN=leaf".parse().unwrap())
                .keys(keys)
                .build(),
        )
        .unwrap();

        let err = issue_from_csr(
            &LeafRequest::builder()
                .csr_pem(csr)
                .validity_years(1)
                .serial_number("04")
                .ca_certificate_pem(root.certificate_pem())
                .ca_private_key_pem(other.private_key.as_str())
                .build(),
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::InvalidInput(_)));
    }

    fn leaf_request_for(root: &RootCertificate, serial: &str, validity_years: u32) -> LeafRequest {
        let keys = PemKeyPair::generate(KeyAlgorithm::Ed25519, None).unwrap();
        let csr = generate_csr(
            &CsrRequest::builder()
                .subject("/CN=leaf.mynet.it".parse().unwrap())
                .keys(keys)
                .build(),
        )
        .unwrap();
        LeafRequest::builder()
            .csr_pem(csr)
            .validity_years(validity_years)
            .serial_number(serial)
            .ca_certificate_pem(root.certificate_pem())
            .ca_private_key_pem(root.keys.private_key.as_str())
            .build()
    }

    #[rstest]
    #[case::missing_serial("", 1, "serialNumber must be a non empty string")]
    #[case::zero_validity("07", 0, "must have a valid validityYears number")]
    #[case::non_hex_serial("zz", 1, "serialNumber must be hexadecimal: zz")]
    fn leaf_request_fails_normalization(
        #[case] serial: &str,
        #[case] validity_years: u32,
        #[case] message: &str,
    ) {
        let root = root();
        let err = issue_from_csr(&leaf_request_for(&root, serial, validity_years)).unwrap_err();
        assert_eq!(err.to_string(), message);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn normalization_errors_come_before_csr_verification() {
        let root = root();
        let mut request = leaf_request_for(&root, "", 1);
        let mut csr = CertificateSigningRequest::from_pem(&request.csr_pem).unwrap();
        csr.inner.info.subject = "/CN=intruder"
            .parse::<CertificateAttributes>()
            .unwrap()
            .to_x509_name()
            .unwrap();
        request.csr_pem = csr.to_pem().unwrap();

        let err = issue_from_csr(&request).unwrap_err();
        assert!(matches!(err, PkiError::InvalidSerialNumber));
    }

    #[test]
    fn over_long_serial_is_a_validation_error_for_every_entry_point() {
        let root = root();
        let serial = "01".repeat(21);

        let err = issue_root(
            &RootRequest::builder()
                .subject(root_subject())
                .serial_number(serial.as_str())
                .key_algorithm(KeyAlgorithm::Ed25519)
                .build(),
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::SerialNumberTooLong(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = issue_from_csr(&leaf_request_for(&root, &serial, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = issue_pki_certificate(
            &"/CN=client".parse().unwrap(),
            &serial,
            root.certificate_pem(),
            &root.keys.private_key,
            &PkiCertificateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::SerialNumberTooLong(_)));
    }

    #[test]
    fn leaf_issuer_is_copied_verbatim_from_the_ca_subject() {
        use der::asn1::{Any, BitString, BmpString, Ia5StringRef, SetOfVec};
        use der::Encode;
        use x509_cert::attr::AttributeTypeAndValue;
        use x509_cert::name::RelativeDistinguishedName;

        let root = root();
        let ca_key = root.keys.key_pair(None).unwrap();
        let mut ca = Certificate::from_pem(root.certificate_pem()).unwrap();

        let rdn = |oid, value| {
            RelativeDistinguishedName(
                SetOfVec::try_from(vec![AttributeTypeAndValue { oid, value }]).unwrap(),
            )
        };
        let mut name = ca.tbs().subject.clone();
        name.0.push(rdn(
            const_oid::db::rfc4519::DOMAIN_COMPONENT,
            Any::encode_from(&Ia5StringRef::new("mynet").unwrap()).unwrap(),
        ));
        name.0.push(rdn(
            const_oid::db::rfc4519::OU,
            Any::encode_from(&BmpString::from_utf8("Sviluppo").unwrap()).unwrap(),
        ));
        ca.inner.tbs_certificate.subject = name.clone();
        ca.inner.tbs_certificate.issuer = name.clone();
        let tbs = ca.inner.tbs_certificate.to_der().unwrap();
        ca.inner.signature = BitString::from_bytes(&ca_key.sign_data(&tbs).unwrap()).unwrap();

        let mut request = leaf_request_for(&root, "08", 1);
        request.ca_certificate_pem = ca.to_pem().unwrap();
        let leaf = Certificate::from_pem(&issue_from_csr(&request).unwrap()).unwrap();

        assert_eq!(leaf.tbs().issuer, name);
        assert_eq!(leaf.tbs().issuer.to_der().unwrap(), name.to_der().unwrap());
        assert!(leaf.verify_signature(&ca_key.public_key()).unwrap());
    }

    #[rstest]
    #[case("pem", OutputFormat::Pem)]
    #[case("pfx", OutputFormat::Pkcs12)]
    #[case("pkcs12", OutputFormat::Pkcs12)]
    fn output_formats_parse(#[case] input: &str, #[case] expected: OutputFormat) {
        assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        let err = "der".parse::<OutputFormat>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputConfig);
    }

    #[test]
    fn archive_output_needs_a_password() {
        let root = root();
        let options = PkiCertificateOptions::builder()
            .output(OutputFormat::Pkcs12)
            .build();
        let err = issue_pki_certificate(
            &"/CN=client".parse().unwrap(),
            "05",
            root.certificate_pem(),
            &root.keys.private_key,
            &options,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "certificate output [pfx|pkcs12] need a password");
    }

    #[test]
    fn pem_chain_uses_default_leaf_extensions() {
        let root = root();
        let options = PkiCertificateOptions::builder()
            .key_algorithm(KeyAlgorithm::EcdsaP256)
            .build();
        let issued = issue_pki_certificate(
            &"/CN=client.mynet.it".parse().unwrap(),
            "06",
            root.certificate_pem(),
            &root.keys.private_key,
            &options,
        )
        .unwrap();

        assert_eq!(issued.certificate.artifact_type(), "pem");
        assert!(issued.csr.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        let leaf = Certificate::from_pem(issued.certificate.as_pem().unwrap()).unwrap();
        let descriptors = leaf.extension_descriptors().unwrap();
        assert_eq!(&descriptors[..2], default_leaf_extensions().as_slice());
    }

    #[test]
    fn normalized_request_is_signed_with_its_own_key() {
        let keys = PemKeyPair::generate(KeyAlgorithm::EcdsaP256, None).unwrap();
        let mut record = serde_json::Map::new();
        record.insert("subject".into(), "/CN=self.mynet.it".into());
        record.insert("serialNumber".into(), "1f".into());
        record.insert("validityYears".into(), 1.into());
        record.insert("privateKey".into(), keys.private_key.as_str().into());
        record.insert("publicKey".into(), keys.public_key.clone().into());

        let pem = generate_certificate_from(&record).unwrap();
        let cert = Certificate::from_pem(&pem).unwrap();
        assert_eq!(cert.serial_number_hex(), "1f");
        assert_eq!(cert.issuer_attributes().unwrap(), cert.subject_attributes().unwrap());
        assert!(cert.verify_signature(&cert.public_key().unwrap()).unwrap());
    }
}
