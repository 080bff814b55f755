use std::net::IpAddr;

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use serde::{Deserialize, Serialize};
use x509_cert::ext::pkix::name::GeneralName;

use super::params::ExtensionParam;
use crate::error::PkiError;
use crate::key::KeyIdentifier;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use minipki::cert::extensions::{AltName, SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec![AltName::Dns("example.com".to_string())] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError>
    where
        Self: Sized;
}

/// One subject alternative name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AltName {
    Dns(String),
    Email(String),
    Uri(String),
    Ip(IpAddr),
}

impl AltName {
    fn to_general_name(&self) -> Result<GeneralName, PkiError> {
        let ia5 = |value: &String| {
            Ia5String::try_from(value.clone()).map_err(|e| PkiError::InvalidInput(e.to_string()))
        };
        Ok(match self {
            AltName::Dns(name) => GeneralName::DnsName(ia5(name)?),
            AltName::Email(address) => GeneralName::Rfc822Name(ia5(address)?),
            AltName::Uri(uri) => GeneralName::UniformResourceIdentifier(ia5(uri)?),
            AltName::Ip(IpAddr::V4(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets())?),
            AltName::Ip(IpAddr::V6(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets())?),
        })
    }

    fn from_general_name(name: &GeneralName) -> Result<Self, PkiError> {
        match name {
            GeneralName::DnsName(dns) => Ok(AltName::Dns(dns.to_string())),
            GeneralName::Rfc822Name(email) => Ok(AltName::Email(email.to_string())),
            GeneralName::UniformResourceIdentifier(uri) => Ok(AltName::Uri(uri.to_string())),
            GeneralName::IpAddress(octets) => match octets.as_bytes().len() {
                4 => {
                    let mut ip = [0u8; 4];
                    ip.copy_from_slice(octets.as_bytes());
                    Ok(AltName::Ip(IpAddr::from(ip)))
                }
                16 => {
                    let mut ip = [0u8; 16];
                    ip.copy_from_slice(octets.as_bytes());
                    Ok(AltName::Ip(IpAddr::from(ip)))
                }
                len => Err(PkiError::DecodingError(format!(
                    "IP address of {len} bytes"
                ))),
            },
            _ => Err(PkiError::InvalidInput(
                "Unsupported general name type".to_string(),
            )),
        }
    }
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// This extension specifies additional identities for the subject of the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<AltName>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(AltName::to_general_name)
                .collect::<Result<Vec<_>, _>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(AltName::from_general_name)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, PkiError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// This extension indicates purposes for which the public key may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_OCSP_SIGNING => {
                    Ok(ExtendedKeyUsageOption::OcspSigning)
                }
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                const_oid::db::rfc5912::ID_KP_CODE_SIGNING => {
                    Ok(ExtendedKeyUsageOption::CodeSigning)
                }
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                    Ok(ExtendedKeyUsageOption::EmailProtection)
                }
                const_oid::db::rfc5912::ID_KP_TIME_STAMPING => {
                    Ok(ExtendedKeyUsageOption::TimeStamping)
                }
                _ => Err(PkiError::InvalidInput(
                    "Unsupported extended key usage option".to_string(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::OcspSigning => const_oid::db::rfc5912::ID_KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => const_oid::db::rfc5912::ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
            ExtendedKeyUsageOption::TimeStamping => const_oid::db::rfc5912::ID_KP_TIME_STAMPING,
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub KeyIdentifier);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let ski =
            x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_bytes())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(KeyIdentifier::new(ski.0.as_bytes())))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the key identifier form is produced; the issuer name and serial
/// alternatives are ignored when decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: KeyIdentifier,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_bytes())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        let key_identifier = aki.key_identifier.ok_or_else(|| {
            PkiError::DecodingError("authority key identifier without keyIdentifier".to_string())
        })?;
        Ok(Self {
            key_identifier: KeyIdentifier::new(key_identifier.as_bytes()),
        })
    }
}

/// Key usage flags as they appear in a `keyUsage` descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyUsageFlags {
    pub digital_signature: bool,
    pub non_repudiation: bool,
    pub key_encipherment: bool,
    pub data_encipherment: bool,
    pub key_agreement: bool,
    pub key_cert_sign: bool,
    #[serde(rename = "cRLSign")]
    pub crl_sign: bool,
    pub critical: bool,
}

impl KeyUsageFlags {
    pub fn to_flag_set(&self) -> FlagSet<KeyUsages> {
        let mut flags = FlagSet::<KeyUsages>::default();
        for (set, usage) in [
            (self.digital_signature, KeyUsages::DigitalSignature),
            (self.non_repudiation, KeyUsages::NonRepudiation),
            (self.key_encipherment, KeyUsages::KeyEncipherment),
            (self.data_encipherment, KeyUsages::DataEncipherment),
            (self.key_agreement, KeyUsages::KeyAgreement),
            (self.key_cert_sign, KeyUsages::KeyCertSign),
            (self.crl_sign, KeyUsages::CRLSign),
        ] {
            if set {
                flags |= usage;
            }
        }
        flags
    }

    pub fn from_flag_set(flags: FlagSet<KeyUsages>, critical: bool) -> Self {
        Self {
            digital_signature: flags.contains(KeyUsages::DigitalSignature),
            non_repudiation: flags.contains(KeyUsages::NonRepudiation),
            key_encipherment: flags.contains(KeyUsages::KeyEncipherment),
            data_encipherment: flags.contains(KeyUsages::DataEncipherment),
            key_agreement: flags.contains(KeyUsages::KeyAgreement),
            key_cert_sign: flags.contains(KeyUsages::KeyCertSign),
            crl_sign: flags.contains(KeyUsages::CRLSign),
            critical,
        }
    }
}

/// Extended key usage flags as they appear in an `extKeyUsage` descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtKeyUsageFlags {
    pub server_auth: bool,
    pub client_auth: bool,
    pub code_signing: bool,
    pub email_protection: bool,
    pub time_stamping: bool,
    pub ocsp_signing: bool,
    pub critical: bool,
}

impl ExtKeyUsageFlags {
    pub fn options(&self) -> Vec<ExtendedKeyUsageOption> {
        [
            (self.server_auth, ExtendedKeyUsageOption::ServerAuth),
            (self.client_auth, ExtendedKeyUsageOption::ClientAuth),
            (self.code_signing, ExtendedKeyUsageOption::CodeSigning),
            (self.email_protection, ExtendedKeyUsageOption::EmailProtection),
            (self.time_stamping, ExtendedKeyUsageOption::TimeStamping),
            (self.ocsp_signing, ExtendedKeyUsageOption::OcspSigning),
        ]
        .into_iter()
        .filter_map(|(set, option)| set.then_some(option))
        .collect()
    }

    pub fn from_options(options: &[ExtendedKeyUsageOption], critical: bool) -> Self {
        let has = |option| options.contains(&option);
        Self {
            server_auth: has(ExtendedKeyUsageOption::ServerAuth),
            client_auth: has(ExtendedKeyUsageOption::ClientAuth),
            code_signing: has(ExtendedKeyUsageOption::CodeSigning),
            email_protection: has(ExtendedKeyUsageOption::EmailProtection),
            time_stamping: has(ExtendedKeyUsageOption::TimeStamping),
            ocsp_signing: has(ExtendedKeyUsageOption::OcspSigning),
            critical,
        }
    }
}

/// Caller-facing description of one extension, `{name, ...fields}`.
///
/// ```rust
/// use minipki::cert::extensions::ExtensionDescriptor;
///
/// let ext: ExtensionDescriptor =
///     serde_json::from_str(r#"{"name": "basicConstraints", "cA": true, "critical": true}"#).unwrap();
/// assert_eq!(ext, ExtensionDescriptor::ca());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum ExtensionDescriptor {
    BasicConstraints {
        #[serde(rename = "cA", default)]
        ca: bool,
        #[serde(default)]
        critical: bool,
        #[serde(
            rename = "pathLenConstraint",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        path_len_constraint: Option<u8>,
    },
    KeyUsage(KeyUsageFlags),
    ExtKeyUsage(ExtKeyUsageFlags),
    /// Without a value the identifier computed from the subject key is used.
    SubjectKeyIdentifier {
        #[serde(
            rename = "subjectKeyIdentifier",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        subject_key_identifier: Option<KeyIdentifier>,
    },
    /// Without a value the issuer's subject key identifier is used.
    AuthorityKeyIdentifier {
        #[serde(
            rename = "keyIdentifier",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        key_identifier: Option<KeyIdentifier>,
    },
    SubjectAltName {
        #[serde(rename = "altNames", default)]
        alt_names: Vec<AltName>,
    },
}

impl ExtensionDescriptor {
    /// Non-critical `basicConstraints`.
    pub fn basic_constraints(ca: bool) -> Self {
        ExtensionDescriptor::BasicConstraints {
            ca,
            critical: false,
            path_len_constraint: None,
        }
    }

    /// `basicConstraints{cA: true, critical: true}`.
    pub fn ca() -> Self {
        ExtensionDescriptor::BasicConstraints {
            ca: true,
            critical: true,
            path_len_constraint: None,
        }
    }

    pub fn key_usage(flags: KeyUsageFlags) -> Self {
        ExtensionDescriptor::KeyUsage(flags)
    }

    pub fn subject_key_identifier(value: Option<KeyIdentifier>) -> Self {
        ExtensionDescriptor::SubjectKeyIdentifier {
            subject_key_identifier: value,
        }
    }

    pub fn authority_key_identifier(value: Option<KeyIdentifier>) -> Self {
        ExtensionDescriptor::AuthorityKeyIdentifier {
            key_identifier: value,
        }
    }

    pub fn subject_alt_name(alt_names: Vec<AltName>) -> Self {
        ExtensionDescriptor::SubjectAltName { alt_names }
    }

    /// The descriptor `name`.
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionDescriptor::BasicConstraints { .. } => "basicConstraints",
            ExtensionDescriptor::KeyUsage(_) => "keyUsage",
            ExtensionDescriptor::ExtKeyUsage(_) => "extKeyUsage",
            ExtensionDescriptor::SubjectKeyIdentifier { .. } => "subjectKeyIdentifier",
            ExtensionDescriptor::AuthorityKeyIdentifier { .. } => "authorityKeyIdentifier",
            ExtensionDescriptor::SubjectAltName { .. } => "subjectAltName",
        }
    }

    /// Encodes the descriptor, filling identifier extensions from `ids` when
    /// they carry no value of their own.
    pub fn to_extension_param(&self, ids: &KeyIdentifiers) -> Result<ExtensionParam, PkiError> {
        match self {
            ExtensionDescriptor::BasicConstraints {
                ca,
                critical,
                path_len_constraint,
            } => ExtensionParam::from_extension(
                BasicConstraints {
                    is_ca: *ca,
                    max_path_length: *path_len_constraint,
                },
                *critical,
            ),
            ExtensionDescriptor::KeyUsage(flags) => {
                ExtensionParam::from_extension(KeyUsage(flags.to_flag_set()), flags.critical)
            }
            ExtensionDescriptor::ExtKeyUsage(flags) => ExtensionParam::from_extension(
                ExtendedKeyUsage {
                    usage: flags.options(),
                },
                flags.critical,
            ),
            ExtensionDescriptor::SubjectKeyIdentifier {
                subject_key_identifier,
            } => {
                let id = subject_key_identifier
                    .clone()
                    .or_else(|| ids.subject.clone())
                    .ok_or(PkiError::MissingField("subjectKeyIdentifier"))?;
                ExtensionParam::from_extension(SubjectKeyIdentifier(id), false)
            }
            ExtensionDescriptor::AuthorityKeyIdentifier { key_identifier } => {
                let id = key_identifier
                    .clone()
                    .or_else(|| ids.authority.clone())
                    .ok_or(PkiError::MissingField("authorityKeyIdentifier"))?;
                ExtensionParam::from_extension(AuthorityKeyIdentifier { key_identifier: id }, false)
            }
            ExtensionDescriptor::SubjectAltName { alt_names } => ExtensionParam::from_extension(
                SubjectAltName {
                    names: alt_names.clone(),
                },
                false,
            ),
        }
    }

    /// Decodes an encoded extension back into a descriptor. Extensions that
    /// have no descriptor form yield `None`.
    pub fn from_extension_param(param: &ExtensionParam) -> Result<Option<Self>, PkiError> {
        let descriptor = match param.oid {
            BasicConstraints::OID => {
                let bc: BasicConstraints = param.to_extension()?;
                ExtensionDescriptor::BasicConstraints {
                    ca: bc.is_ca,
                    critical: param.critical,
                    path_len_constraint: bc.max_path_length,
                }
            }
            KeyUsage::OID => {
                let ku: KeyUsage = param.to_extension()?;
                ExtensionDescriptor::KeyUsage(KeyUsageFlags::from_flag_set(ku.0, param.critical))
            }
            ExtendedKeyUsage::OID => {
                let eku: ExtendedKeyUsage = param.to_extension()?;
                ExtensionDescriptor::ExtKeyUsage(ExtKeyUsageFlags::from_options(
                    &eku.usage,
                    param.critical,
                ))
            }
            SubjectKeyIdentifier::OID => {
                let ski: SubjectKeyIdentifier = param.to_extension()?;
                ExtensionDescriptor::subject_key_identifier(Some(ski.0))
            }
            AuthorityKeyIdentifier::OID => {
                let aki: AuthorityKeyIdentifier = param.to_extension()?;
                ExtensionDescriptor::authority_key_identifier(Some(aki.key_identifier))
            }
            SubjectAltName::OID => {
                let san: SubjectAltName = param.to_extension()?;
                ExtensionDescriptor::subject_alt_name(san.names)
            }
            _ => return Ok(None),
        };
        Ok(Some(descriptor))
    }
}

/// Identifiers computed before the extension list is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIdentifiers {
    /// Identifier of the certificate's own key.
    pub subject: Option<KeyIdentifier>,
    /// Identifier of the issuing CA's key.
    pub authority: Option<KeyIdentifier>,
}

/// Builds the final extension list.
///
/// Descriptors are encoded in order. A computed identifier that no
/// descriptor asked for is appended afterwards, subject first.
pub fn assemble_extensions(
    descriptors: &[ExtensionDescriptor],
    ids: &KeyIdentifiers,
) -> Result<Vec<ExtensionParam>, PkiError> {
    let mut extensions = descriptors
        .iter()
        .map(|descriptor| descriptor.to_extension_param(ids))
        .collect::<Result<Vec<_>, _>>()?;

    let has = |oid: ObjectIdentifier, extensions: &[ExtensionParam]| {
        extensions.iter().any(|ext| ext.oid == oid)
    };
    if let Some(id) = &ids.subject {
        if !has(SubjectKeyIdentifier::OID, &extensions) {
            extensions.push(ExtensionParam::from_extension(
                SubjectKeyIdentifier(id.clone()),
                false,
            )?);
        }
    }
    if let Some(id) = &ids.authority {
        if !has(AuthorityKeyIdentifier::OID, &extensions) {
            extensions.push(ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: id.clone(),
                },
                false,
            )?);
        }
    }
    Ok(extensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_id(byte: u8) -> KeyIdentifier {
        KeyIdentifier::new(vec![byte; 32])
    }

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints {
            is_ca: true,
            max_path_length: Some(3),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_key_identifier_encoding_decoding() {
        let original = AuthorityKeyIdentifier {
            key_identifier: key_id(7),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_key_usage_encoding_decoding() {
        let original = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn subject_alt_name_covers_every_name_type() {
        let original = SubjectAltName {
            names: vec![
                AltName::Dns("server.mynet.it".to_string()),
                AltName::Email("admin@mynet.it".to_string()),
                AltName::Uri("https://mynet.it/".to_string()),
                AltName::Ip("192.168.1.10".parse().unwrap()),
                AltName::Ip("::1".parse().unwrap()),
            ],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        assert_eq!(
            SubjectAltName::from_x509_extension_value(&encoded).unwrap(),
            original
        );
    }

    #[test]
    fn descriptors_deserialize_from_records() {
        let descriptors: Vec<ExtensionDescriptor> = serde_json::from_str(
            r#"[
                {"name": "basicConstraints", "cA": false},
                {"name": "keyUsage", "keyCertSign": true, "digitalSignature": true, "cRLSign": true},
                {"name": "extKeyUsage", "serverAuth": true},
                {"name": "subjectKeyIdentifier"},
                {"name": "authorityKeyIdentifier", "keyIdentifier": "0a:0b"},
                {"name": "subjectAltName", "altNames": [{"type": "dns", "value": "mynet.it"}, {"type": "ip", "value": "10.0.0.1"}]}
            ]"#,
        )
        .unwrap();

        assert_eq!(descriptors[0], ExtensionDescriptor::basic_constraints(false));
        match &descriptors[1] {
            ExtensionDescriptor::KeyUsage(flags) => {
                assert!(flags.key_cert_sign && flags.digital_signature && flags.crl_sign);
                assert!(!flags.critical);
            }
            other => panic!("unexpected descriptor {other:?}"),
        }
        assert_eq!(
            descriptors[4],
            ExtensionDescriptor::authority_key_identifier(Some(KeyIdentifier::new(vec![10, 11])))
        );
        assert_eq!(descriptors[5].name(), "subjectAltName");
    }

    #[test]
    fn identifiers_are_appended_after_descriptors() {
        let ids = KeyIdentifiers {
            subject: Some(key_id(1)),
            authority: Some(key_id(2)),
        };
        let extensions = assemble_extensions(&[ExtensionDescriptor::ca()], &ids).unwrap();
        let oids: Vec<_> = extensions.iter().map(|ext| ext.oid).collect();
        assert_eq!(
            oids,
            vec![
                BasicConstraints::OID,
                SubjectKeyIdentifier::OID,
                AuthorityKeyIdentifier::OID
            ]
        );
        assert!(extensions[0].critical);

        let aki: AuthorityKeyIdentifier = extensions[2].to_extension().unwrap();
        assert_eq!(aki.key_identifier, key_id(2));
    }

    #[test]
    fn explicit_identifier_descriptors_are_not_duplicated() {
        let ids = KeyIdentifiers {
            subject: Some(key_id(1)),
            authority: None,
        };
        let extensions = assemble_extensions(
            &[ExtensionDescriptor::subject_key_identifier(Some(key_id(9)))],
            &ids,
        )
        .unwrap();
        assert_eq!(extensions.len(), 1);
        let ski: SubjectKeyIdentifier = extensions[0].to_extension().unwrap();
        assert_eq!(ski.0, key_id(9));
    }

    #[test]
    fn identifier_descriptor_without_any_value_fails() {
        let err = assemble_extensions(
            &[ExtensionDescriptor::authority_key_identifier(None)],
            &KeyIdentifiers::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::MissingField("authorityKeyIdentifier")));
    }

    #[test]
    fn encoded_extensions_decode_into_descriptors() {
        let flags = KeyUsageFlags {
            key_cert_sign: true,
            digital_signature: true,
            critical: true,
            ..KeyUsageFlags::default()
        };
        let eku = ExtKeyUsageFlags {
            client_auth: true,
            ..ExtKeyUsageFlags::default()
        };
        for descriptor in [
            ExtensionDescriptor::ca(),
            ExtensionDescriptor::key_usage(flags),
            ExtensionDescriptor::ExtKeyUsage(eku),
        ] {
            let param = descriptor
                .to_extension_param(&KeyIdentifiers::default())
                .unwrap();
            assert_eq!(
                ExtensionDescriptor::from_extension_param(&param).unwrap(),
                Some(descriptor)
            );
        }
    }
}
