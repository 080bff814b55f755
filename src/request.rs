//! Normalization of caller-supplied certificate requests.
//!
//! Requests arrive as builder objects ([`CertificateInput`]), loose
//! key/value mappings (anything implementing [`RequestSource`]), serde
//! records ([`RawRequest`]) or a fixed positional list
//! ([`CertificateRequest::from_positional`]). All of them end up in
//! [`CertificateRequest`], which is validated before it is returned: no
//! cryptographic work ever sees an unvalidated request.

use core::fmt;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, Duration, Month, OffsetDateTime};
use zeroize::Zeroizing;

use crate::attributes::CertificateAttributes;
use crate::cert::extensions::ExtensionDescriptor;
use crate::cert::params::Validity;
use crate::error::{PkiError, Result};
use crate::tbs_certificate::serial_from_hex;

/// Canonical field names, in the order they are looked up.
pub const FIELD_NAMES: [&str; 11] = [
    "subject",
    "issuer",
    "extensions",
    "validityYears",
    "serialNumber",
    "privateKey",
    "publicKey",
    "privateKeyPassword",
    "notBefore",
    "notAfter",
    "validityDelta",
];

/// Subject or issuer as supplied by the caller: a descriptor string or an
/// attribute record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributesInput {
    Descriptor(String),
    Attributes(CertificateAttributes),
}

impl AttributesInput {
    fn is_empty(&self) -> bool {
        match self {
            AttributesInput::Descriptor(descriptor) => descriptor.is_empty(),
            AttributesInput::Attributes(attributes) => attributes.is_empty(),
        }
    }

    pub fn into_attributes(self) -> Result<CertificateAttributes> {
        match self {
            AttributesInput::Descriptor(descriptor) => descriptor.parse(),
            AttributesInput::Attributes(attributes) => Ok(attributes),
        }
    }
}

impl From<CertificateAttributes> for AttributesInput {
    fn from(attributes: CertificateAttributes) -> Self {
        AttributesInput::Attributes(attributes)
    }
}

impl From<&str> for AttributesInput {
    fn from(descriptor: &str) -> Self {
        AttributesInput::Descriptor(descriptor.to_string())
    }
}

impl From<String> for AttributesInput {
    fn from(descriptor: String) -> Self {
        AttributesInput::Descriptor(descriptor)
    }
}

/// Calendar offset added to a start instant.
///
/// Years and months move the calendar date (the day is clamped to the
/// length of the target month); the remaining units are added as a plain
/// duration afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityDelta {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl ValidityDelta {
    pub fn years(years: u32) -> Self {
        Self {
            years,
            ..Self::default()
        }
    }

    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn apply(&self, start: OffsetDateTime) -> Result<OffsetDateTime> {
        let months = i64::from(start.month() as u8 - 1)
            + i64::from(self.years) * 12
            + i64::from(self.months);
        let year = i32::try_from(i64::from(start.year()) + months.div_euclid(12))
            .map_err(|e| PkiError::InvalidValidity(e.to_string()))?;
        let month = Month::try_from((months.rem_euclid(12) + 1) as u8)
            .map_err(|e| PkiError::InvalidValidity(e.to_string()))?;
        let day = start.day().min(time::util::days_in_year_month(year, month));
        let date = Date::from_calendar_date(year, month, day)
            .map_err(|e| PkiError::InvalidValidity(e.to_string()))?;

        let clock = Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds));
        start
            .replace_date(date)
            .checked_add(clock)
            .ok_or_else(|| PkiError::InvalidValidity("validity end out of range".to_string()))
    }
}

/// How long an issued certificate is valid. Exactly one form is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValiditySpec {
    /// Starting at issuance time, for a number of calendar years.
    Years(u32),
    /// Explicit bounds.
    Window {
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    },
    /// A start instant plus a calendar offset.
    Delta {
        not_before: OffsetDateTime,
        delta: ValidityDelta,
    },
}

impl ValiditySpec {
    /// Resolves the concrete validity window. `now` is used as the start of
    /// [`ValiditySpec::Years`].
    pub fn resolve(&self, now: OffsetDateTime) -> Result<Validity> {
        let (not_before, not_after) = match *self {
            ValiditySpec::Years(years) => (now, ValidityDelta::years(years).apply(now)?),
            ValiditySpec::Window {
                not_before,
                not_after,
            } => (not_before, not_after),
            ValiditySpec::Delta { not_before, delta } => (not_before, delta.apply(not_before)?),
        };
        if not_after <= not_before {
            return Err(PkiError::InvalidValidity(format!(
                "notAfter {not_after} is not after notBefore {not_before}"
            )));
        }
        Ok(Validity {
            not_before,
            not_after,
        })
    }
}

/// Request fields as supplied, before validation.
///
/// `validityYears` and `serialNumber` stay loosely typed so that a wrongly
/// typed value is reported by validation rather than by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<AttributesInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<AttributesInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ExtensionDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_years: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_password: Option<String>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_after: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_delta: Option<ValidityDelta>,
}

/// Falsy values are treated as if the field had not been supplied.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

impl RawRequest {
    /// Collects the canonical fields through a key-by-key lookup.
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<Value>,
    {
        let fields: serde_json::Map<String, Value> = FIELD_NAMES
            .iter()
            .filter_map(|name| {
                lookup(name)
                    .filter(|value| !is_falsy(value))
                    .map(|value| (name.to_string(), value))
            })
            .collect();
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// An object a [`CertificateRequest`] can be normalized from.
///
/// The normalizer prefers [`RequestSource::export_fields`]; when that yields
/// nothing it falls back to one [`RequestSource::get_field`] call per
/// canonical field name.
pub trait RequestSource {
    fn export_fields(&self) -> Option<RawRequest> {
        None
    }

    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl<S: BuildHasher> RequestSource for HashMap<String, Value, S> {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl RequestSource for BTreeMap<String, Value> {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl RequestSource for serde_json::Map<String, Value> {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl RequestSource for Value {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl RequestSource for RawRequest {
    fn export_fields(&self) -> Option<RawRequest> {
        Some(self.clone())
    }
}

/// Builder-style request input.
///
/// ```rust
/// use minipki::request::{CertificateInput, normalize};
///
/// let input = CertificateInput::builder()
///     .subject("/CN=server.mynet.it")
///     .serial_number("0a")
///     .validity_years(2)
///     .build();
/// let request = normalize(&input).unwrap();
/// assert_eq!(request.serial_number, "0a");
/// ```
#[derive(Clone, Default, Builder)]
pub struct CertificateInput {
    #[builder(into)]
    pub subject: Option<AttributesInput>,
    #[builder(into)]
    pub issuer: Option<AttributesInput>,
    #[builder(default)]
    pub extensions: Vec<ExtensionDescriptor>,
    pub validity_years: Option<u32>,
    #[builder(into)]
    pub serial_number: Option<String>,
    #[builder(into)]
    pub private_key: Option<String>,
    #[builder(into)]
    pub public_key: Option<String>,
    #[builder(into)]
    pub private_key_password: Option<String>,
    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    pub validity_delta: Option<ValidityDelta>,
}

impl CertificateInput {
    /// Exports every field as a raw record.
    pub fn options(&self) -> RawRequest {
        RawRequest {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            extensions: self.extensions.clone(),
            validity_years: self.validity_years.map(Value::from),
            serial_number: self.serial_number.clone().map(Value::from),
            private_key: self.private_key.clone(),
            public_key: self.public_key.clone(),
            private_key_password: self.private_key_password.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
            validity_delta: self.validity_delta,
        }
    }
}

impl RequestSource for CertificateInput {
    fn export_fields(&self) -> Option<RawRequest> {
        Some(self.options())
    }
}

impl fmt::Debug for CertificateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateInput")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial_number", &self.serial_number)
            .field("validity_years", &self.validity_years)
            .finish_non_exhaustive()
    }
}

/// A validated request, ready to be signed.
///
/// Only supplied fields are present. The serial number is a non-empty hex
/// string and exactly one validity form is set.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub subject: Option<CertificateAttributes>,
    pub issuer: Option<CertificateAttributes>,
    pub extensions: Vec<ExtensionDescriptor>,
    pub validity: ValiditySpec,
    pub serial_number: String,
    pub private_key: Option<Zeroizing<String>>,
    pub public_key: Option<String>,
    pub private_key_password: Option<Zeroizing<String>>,
}

/// Normalizes any supported request shape.
pub fn normalize<S: RequestSource + ?Sized>(source: &S) -> Result<CertificateRequest> {
    let raw = match source.export_fields() {
        Some(raw) => raw,
        None => RawRequest::from_lookup(|name| source.get_field(name))?,
    };
    CertificateRequest::from_record(raw)
}

/// Whole numbers only; `2.0` is accepted, `1.5` and negatives are not.
fn validity_years(value: &Value) -> Result<u32> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|years| years.fract() == 0.0 && *years >= 0.0)
                .filter(|years| *years <= f64::from(u32::MAX))
                .map(|years| years as u64)
        })
        .and_then(|years| u32::try_from(years).ok())
        .ok_or(PkiError::InvalidValidityYears)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

fn attributes(input: Option<AttributesInput>) -> Result<Option<CertificateAttributes>> {
    Ok(input
        .filter(|input| !input.is_empty())
        .map(AttributesInput::into_attributes)
        .transpose()?
        .filter(|attributes| !attributes.is_empty()))
}

impl CertificateRequest {
    /// Validates a raw record.
    pub fn from_record(raw: RawRequest) -> Result<Self> {
        Self::from_record_at(raw, OffsetDateTime::now_utc())
    }

    fn from_record_at(raw: RawRequest, now: OffsetDateTime) -> Result<Self> {
        let validity_years = raw
            .validity_years
            .filter(|value| !is_falsy(value))
            .map(|value| validity_years(&value))
            .transpose()?;

        let validity = match (raw.not_before, raw.not_after, raw.validity_delta) {
            (Some(not_before), Some(not_after), _) => ValiditySpec::Window {
                not_before,
                not_after,
            },
            (not_before, _, Some(delta)) => ValiditySpec::Delta {
                not_before: not_before.unwrap_or(now),
                delta,
            },
            (None, Some(_), None) => {
                return Err(PkiError::InvalidValidity(
                    "notAfter requires notBefore".to_string(),
                ));
            }
            (Some(not_before), None, None) => ValiditySpec::Delta {
                not_before,
                delta: ValidityDelta::years(validity_years.ok_or(PkiError::MissingValidity)?),
            },
            (None, None, None) => {
                ValiditySpec::Years(validity_years.ok_or(PkiError::MissingValidity)?)
            }
        };

        validity.resolve(now)?;

        let serial_number = match raw.serial_number {
            Some(Value::String(serial)) if !serial.is_empty() => serial,
            _ => return Err(PkiError::InvalidSerialNumber),
        };
        serial_from_hex(&serial_number)?;

        Ok(Self {
            subject: attributes(raw.subject)?,
            issuer: attributes(raw.issuer)?,
            extensions: raw.extensions,
            validity,
            serial_number,
            private_key: non_empty(raw.private_key).map(Zeroizing::new),
            public_key: non_empty(raw.public_key),
            private_key_password: non_empty(raw.private_key_password).map(Zeroizing::new),
        })
    }

    /// Positional form: `(subject, issuer, extensions, validity_years,
    /// serial_number, private_key, public_key, private_key_password)`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_positional(
        subject: Option<AttributesInput>,
        issuer: Option<AttributesInput>,
        extensions: Vec<ExtensionDescriptor>,
        validity_years: Option<u32>,
        serial_number: Option<&str>,
        private_key: Option<&str>,
        public_key: Option<&str>,
        private_key_password: Option<&str>,
    ) -> Result<Self> {
        Self::from_record(RawRequest {
            subject,
            issuer,
            extensions,
            validity_years: validity_years.map(Value::from),
            serial_number: serial_number.map(Value::from),
            private_key: private_key.map(str::to_string),
            public_key: public_key.map(str::to_string),
            private_key_password: private_key_password.map(str::to_string),
            ..RawRequest::default()
        })
    }

    /// Exports the request back into raw form.
    pub fn to_raw(&self) -> RawRequest {
        let mut raw = RawRequest {
            subject: self.subject.clone().map(AttributesInput::from),
            issuer: self.issuer.clone().map(AttributesInput::from),
            extensions: self.extensions.clone(),
            serial_number: Some(Value::from(self.serial_number.clone())),
            private_key: self.private_key.as_ref().map(|key| key.as_str().to_string()),
            public_key: self.public_key.clone(),
            private_key_password: self
                .private_key_password
                .as_ref()
                .map(|password| password.as_str().to_string()),
            ..RawRequest::default()
        };
        match self.validity {
            ValiditySpec::Years(years) => raw.validity_years = Some(Value::from(years)),
            ValiditySpec::Window {
                not_before,
                not_after,
            } => {
                raw.not_before = Some(not_before);
                raw.not_after = Some(not_after);
            }
            ValiditySpec::Delta { not_before, delta } => {
                raw.not_before = Some(not_before);
                raw.validity_delta = Some(delta);
            }
        }
        raw
    }

    pub fn require_subject(&self) -> Result<&CertificateAttributes> {
        self.subject.as_ref().ok_or(PkiError::MissingField("subject"))
    }

    pub fn require_public_key(&self) -> Result<&str> {
        self.public_key
            .as_deref()
            .ok_or(PkiError::MissingField("publicKey"))
    }

    pub fn require_private_key(&self) -> Result<&str> {
        self.private_key
            .as_deref()
            .map(String::as_str)
            .ok_or(PkiError::MissingField("privateKey"))
    }

    pub fn private_key_password(&self) -> Option<&str> {
        self.private_key_password.as_deref().map(String::as_str)
    }
}

impl RequestSource for CertificateRequest {
    fn export_fields(&self) -> Option<RawRequest> {
        Some(self.to_raw())
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("extensions", &self.extensions)
            .field("validity", &self.validity)
            .field("serial_number", &self.serial_number)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}
