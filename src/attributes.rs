//! Distinguished-name and PKCS#10 request attributes.
//!
//! [`CertificateAttributes`] is the canonical subject/issuer representation.
//! It can be built from nothing, from any [`AttributeSource`] (hash maps,
//! JSON objects, pair slices), from a serde record, with the bon builder, or
//! from an openssl-style descriptor string:
//!
//! ```rust
//! use minipki::attributes::CertificateAttributes;
//!
//! let subject: CertificateAttributes = "/CN=Root CA/C=IT/E=ca-root@mynet.it".parse().unwrap();
//! assert_eq!(subject.cn(), Some("Root CA"));
//! assert_eq!(subject.as_sign_input().len(), 3);
//! ```

use core::fmt;
use core::str::FromStr;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{
    Any, BmpString, Ia5StringRef, PrintableStringRef, SetOfVec, TeletexStringRef, Utf8StringRef,
};
use der::{Tag, Tagged};
use serde::{Deserialize, Serialize};
use x509_cert::attr::{Attribute, AttributeTypeAndValue, Attributes};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::error::{PkiError, Result};

/// A DN attribute supported by [`CertificateAttributes`], in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeName {
    CommonName,
    CountryName,
    StateOrProvinceName,
    LocalityName,
    OrganizationName,
    OrganizationalUnitName,
    EmailAddress,
}

/// (attribute, long name, alias, OID)
const ATTRIBUTE_TABLE: [(AttributeName, &str, &str, ObjectIdentifier); 7] = [
    (
        AttributeName::CommonName,
        "commonName",
        "CN",
        ObjectIdentifier::new_unwrap("2.5.4.3"),
    ),
    (
        AttributeName::CountryName,
        "countryName",
        "C",
        ObjectIdentifier::new_unwrap("2.5.4.6"),
    ),
    (
        AttributeName::StateOrProvinceName,
        "stateOrProvinceName",
        "ST",
        ObjectIdentifier::new_unwrap("2.5.4.8"),
    ),
    (
        AttributeName::LocalityName,
        "localityName",
        "L",
        ObjectIdentifier::new_unwrap("2.5.4.7"),
    ),
    (
        AttributeName::OrganizationName,
        "organizationName",
        "O",
        ObjectIdentifier::new_unwrap("2.5.4.10"),
    ),
    (
        AttributeName::OrganizationalUnitName,
        "organizationalUnitName",
        "OU",
        ObjectIdentifier::new_unwrap("2.5.4.11"),
    ),
    (
        AttributeName::EmailAddress,
        "emailAddress",
        "E",
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1"),
    ),
];

impl AttributeName {
    pub const ALL: [AttributeName; 7] = [
        AttributeName::CommonName,
        AttributeName::CountryName,
        AttributeName::StateOrProvinceName,
        AttributeName::LocalityName,
        AttributeName::OrganizationName,
        AttributeName::OrganizationalUnitName,
        AttributeName::EmailAddress,
    ];

    fn entry(self) -> &'static (AttributeName, &'static str, &'static str, ObjectIdentifier) {
        &ATTRIBUTE_TABLE[self as usize]
    }

    pub fn long_name(self) -> &'static str {
        self.entry().1
    }

    pub fn alias(self) -> &'static str {
        self.entry().2
    }

    pub fn oid(self) -> ObjectIdentifier {
        self.entry().3
    }

    pub fn from_long_name(name: &str) -> Option<Self> {
        ATTRIBUTE_TABLE
            .iter()
            .find(|(_, long, _, _)| *long == name)
            .map(|(attr, ..)| *attr)
    }

    pub fn from_alias(alias: &str) -> Option<Self> {
        ATTRIBUTE_TABLE
            .iter()
            .find(|(_, _, short, _)| *short == alias)
            .map(|(attr, ..)| *attr)
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        ATTRIBUTE_TABLE
            .iter()
            .find(|(.., attr_oid)| attr_oid == oid)
            .map(|(attr, ..)| *attr)
    }

    /// Resolves a descriptor-string key: one or two characters are an alias,
    /// anything longer is a long name.
    pub fn resolve(key: &str) -> Result<Self> {
        let resolved = if (1..=2).contains(&key.len()) {
            Self::from_alias(key)
        } else {
            Self::from_long_name(key)
        };
        resolved.ok_or_else(|| PkiError::UnsupportedAttribute(key.to_string()))
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

/// One `{name, value}` pair handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignInput<'a> {
    pub name: &'static str,
    pub value: &'a str,
}

/// Lookup-capable mapping that attribute sets can be built from.
///
/// Both long names and aliases are looked up; when both are present the
/// alias wins.
pub trait AttributeSource {
    fn get_attribute(&self, key: &str) -> Option<&str>;
}

impl<K, V, S> AttributeSource for HashMap<K, V, S>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    S: BuildHasher,
{
    fn get_attribute(&self, key: &str) -> Option<&str> {
        self.get(key).map(AsRef::as_ref)
    }
}

impl<K, V> AttributeSource for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    fn get_attribute(&self, key: &str) -> Option<&str> {
        self.get(key).map(AsRef::as_ref)
    }
}

impl AttributeSource for serde_json::Map<String, serde_json::Value> {
    fn get_attribute(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }
}

impl<K: AsRef<str>, V: AsRef<str>> AttributeSource for [(K, V)] {
    fn get_attribute(&self, key: &str) -> Option<&str> {
        self.iter()
            .rev()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_ref())
    }
}

/// Subject or issuer attributes of a certificate.
///
/// Every attribute occurs at most once. Empty values count as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAttributes {
    #[builder(into)]
    #[serde(default, alias = "CN", skip_serializing_if = "Option::is_none")]
    common_name: Option<String>,
    #[builder(into)]
    #[serde(default, alias = "C", skip_serializing_if = "Option::is_none")]
    country_name: Option<String>,
    #[builder(into)]
    #[serde(default, alias = "ST", skip_serializing_if = "Option::is_none")]
    state_or_province_name: Option<String>,
    #[builder(into)]
    #[serde(default, alias = "L", skip_serializing_if = "Option::is_none")]
    locality_name: Option<String>,
    #[builder(into)]
    #[serde(default, alias = "O", skip_serializing_if = "Option::is_none")]
    organization_name: Option<String>,
    #[builder(into)]
    #[serde(default, alias = "OU", skip_serializing_if = "Option::is_none")]
    organizational_unit_name: Option<String>,
    #[builder(into)]
    #[serde(default, alias = "E", skip_serializing_if = "Option::is_none")]
    email_address: Option<String>,
}

macro_rules! attribute_accessors {
    ($($name:ident: $long:ident / $short:ident, $set_long:ident / $set_short:ident;)*) => {
        impl CertificateAttributes {
            $(
                pub fn $long(&self) -> Option<&str> {
                    self.get(AttributeName::$name)
                }

                pub fn $short(&self) -> Option<&str> {
                    self.get(AttributeName::$name)
                }

                pub fn $set_long(&mut self, value: impl Into<String>) -> &mut Self {
                    self.set(AttributeName::$name, value)
                }

                pub fn $set_short(&mut self, value: impl Into<String>) -> &mut Self {
                    self.set(AttributeName::$name, value)
                }
            )*
        }
    };
}

attribute_accessors! {
    CommonName: common_name / cn, set_common_name / set_cn;
    CountryName: country_name / c, set_country_name / set_c;
    StateOrProvinceName: state_or_province_name / st, set_state_or_province_name / set_st;
    LocalityName: locality_name / l, set_locality_name / set_l;
    OrganizationName: organization_name / o, set_organization_name / set_o;
    OrganizationalUnitName: organizational_unit_name / ou, set_organizational_unit_name / set_ou;
    EmailAddress: email_address / e, set_email_address / set_e;
}

impl CertificateAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an attribute set from a lookup-capable mapping.
    pub fn from_source<S: AttributeSource + ?Sized>(source: &S) -> Self {
        let mut attributes = Self::default();
        for name in AttributeName::ALL {
            for key in [name.long_name(), name.alias()] {
                if let Some(value) = source.get_attribute(key) {
                    attributes.set(name, value);
                }
            }
        }
        attributes
    }

    fn slot(&self, name: AttributeName) -> &Option<String> {
        match name {
            AttributeName::CommonName => &self.common_name,
            AttributeName::CountryName => &self.country_name,
            AttributeName::StateOrProvinceName => &self.state_or_province_name,
            AttributeName::LocalityName => &self.locality_name,
            AttributeName::OrganizationName => &self.organization_name,
            AttributeName::OrganizationalUnitName => &self.organizational_unit_name,
            AttributeName::EmailAddress => &self.email_address,
        }
    }

    fn slot_mut(&mut self, name: AttributeName) -> &mut Option<String> {
        match name {
            AttributeName::CommonName => &mut self.common_name,
            AttributeName::CountryName => &mut self.country_name,
            AttributeName::StateOrProvinceName => &mut self.state_or_province_name,
            AttributeName::LocalityName => &mut self.locality_name,
            AttributeName::OrganizationName => &mut self.organization_name,
            AttributeName::OrganizationalUnitName => &mut self.organizational_unit_name,
            AttributeName::EmailAddress => &mut self.email_address,
        }
    }

    pub fn get(&self, name: AttributeName) -> Option<&str> {
        self.slot(name).as_deref().filter(|value| !value.is_empty())
    }

    /// Sets an attribute. Empty values leave the current value untouched.
    pub fn set(&mut self, name: AttributeName, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            *self.slot_mut(name) = Some(value);
        }
        self
    }

    /// Looks an attribute up by long name or alias.
    pub fn get_by_key(&self, key: &str) -> Option<&str> {
        AttributeName::from_long_name(key)
            .or_else(|| AttributeName::from_alias(key))
            .and_then(|name| self.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Set attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeName, &str)> {
        AttributeName::ALL
            .into_iter()
            .filter_map(|name| self.get(name).map(|value| (name, value)))
    }

    /// The `{name, value}` list the signer consumes; unset attributes are
    /// omitted.
    pub fn as_sign_input(&self) -> Vec<SignInput<'_>> {
        self.iter()
            .map(|(name, value)| SignInput {
                name: name.long_name(),
                value,
            })
            .collect()
    }

    /// Converts the attributes to an X.509 name, one RDN per attribute.
    ///
    /// Country is encoded as PrintableString, email as IA5String and
    /// everything else as UTF8String.
    pub fn to_x509_name(&self) -> Result<Name> {
        let rdns = self
            .iter()
            .map(|(name, value)| {
                let value = match name {
                    AttributeName::CountryName => {
                        Any::encode_from(&PrintableStringRef::new(value)?)?
                    }
                    AttributeName::EmailAddress => Any::encode_from(&Ia5StringRef::new(value)?)?,
                    _ => Any::encode_from(&Utf8StringRef::new(value)?)?,
                };
                let atv = AttributeTypeAndValue {
                    oid: name.oid(),
                    value,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Reads the supported attributes out of an X.509 name, skipping the
    /// ones this type does not model.
    pub fn from_x509_name(name: &Name) -> Result<Self> {
        let mut attributes = Self::default();
        for rdn in name.0.iter() {
            for atv in rdn.0.iter() {
                if let Some(attr) = AttributeName::from_oid(&atv.oid) {
                    attributes.set(attr, directory_string(&atv.value)?);
                }
            }
        }
        Ok(attributes)
    }
}

pub(crate) fn directory_string(value: &Any) -> Result<String> {
    let text = match value.tag() {
        Tag::Utf8String => value.decode_as::<Utf8StringRef<'_>>()?.as_str().to_owned(),
        Tag::PrintableString => value
            .decode_as::<PrintableStringRef<'_>>()?
            .as_str()
            .to_owned(),
        Tag::Ia5String => value.decode_as::<Ia5StringRef<'_>>()?.as_str().to_owned(),
        Tag::BmpString => value.decode_as::<BmpString>()?.to_string(),
        Tag::TeletexString => value
            .decode_as::<TeletexStringRef<'_>>()?
            .as_str()
            .to_owned(),
        tag => {
            return Err(PkiError::DecodingError(format!(
                "unsupported directory string {tag}"
            )));
        }
    };
    Ok(text)
}

impl FromStr for CertificateAttributes {
    type Err = PkiError;

    /// Parses `/ATTR=VALUE/ATTR=VALUE/...` descriptors.
    fn from_str(descriptor: &str) -> Result<Self> {
        let mut attributes = Self::default();
        for token in descriptor.split('/').filter(|token| !token.is_empty()) {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| PkiError::MalformedAttribute(token.to_string()))?;
            attributes.set(AttributeName::resolve(key)?, value);
        }
        Ok(attributes)
    }
}

impl fmt::Display for CertificateAttributes {
    /// Renders the descriptor-string form using aliases.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "/{}={}", name.alias(), value)?;
        }
        Ok(())
    }
}

/// PKCS#9 attributes carried inside a certification request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrAttributes {
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    challenge_password: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unstructured_name: Option<String>,
}

const CHALLENGE_PASSWORD: (&str, ObjectIdentifier) = (
    "challengePassword",
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.7"),
);
const UNSTRUCTURED_NAME: (&str, ObjectIdentifier) = (
    "unstructuredName",
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.2"),
);

impl CsrAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source<S: AttributeSource + ?Sized>(source: &S) -> Self {
        let mut attributes = Self::default();
        if let Some(value) = source.get_attribute(CHALLENGE_PASSWORD.0) {
            attributes.set_challenge_password(value);
        }
        if let Some(value) = source.get_attribute(UNSTRUCTURED_NAME.0) {
            attributes.set_unstructured_name(value);
        }
        attributes
    }

    pub fn challenge_password(&self) -> Option<&str> {
        self.challenge_password.as_deref().filter(|v| !v.is_empty())
    }

    pub fn set_challenge_password(&mut self, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            self.challenge_password = Some(value);
        }
        self
    }

    pub fn unstructured_name(&self) -> Option<&str> {
        self.unstructured_name.as_deref().filter(|v| !v.is_empty())
    }

    pub fn set_unstructured_name(&mut self, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            self.unstructured_name = Some(value);
        }
        self
    }

    fn entries(&self) -> impl Iterator<Item = ((&'static str, ObjectIdentifier), &str)> {
        [
            (CHALLENGE_PASSWORD, self.challenge_password()),
            (UNSTRUCTURED_NAME, self.unstructured_name()),
        ]
        .into_iter()
        .filter_map(|(entry, value)| value.map(|value| (entry, value)))
    }

    pub fn as_sign_input(&self) -> Vec<SignInput<'_>> {
        self.entries()
            .map(|((name, _), value)| SignInput { name, value })
            .collect()
    }

    /// Reads the supported attributes out of a PKCS#10 attribute set.
    pub fn from_x509_attributes(attributes: &Attributes) -> Result<Self> {
        let mut decoded = Self::default();
        for attribute in attributes.iter() {
            let Some(value) = attribute.values.iter().next() else {
                continue;
            };
            if attribute.oid == CHALLENGE_PASSWORD.1 {
                decoded.set_challenge_password(directory_string(value)?);
            } else if attribute.oid == UNSTRUCTURED_NAME.1 {
                decoded.set_unstructured_name(directory_string(value)?);
            }
        }
        Ok(decoded)
    }

    /// Encodes the attributes for a PKCS#10 `CertificationRequestInfo`.
    pub fn to_x509_attributes(&self) -> Result<Attributes> {
        let mut attributes = Attributes::new();
        for ((_, oid), value) in self.entries() {
            let values = SetOfVec::try_from(vec![Any::encode_from(&Utf8StringRef::new(value)?)?])?;
            attributes.insert(Attribute { oid, values })?;
        }
        Ok(attributes)
    }
}
