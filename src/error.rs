//! use minipki::error::PkiError;

use thiserror::Error;

/// Coarse classification of a [`PkiError`].
///
/// Callers that only need to know *where* a request went wrong (bad input
/// shape, failed validation, a provider failure, ...) can match on this
/// instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller handed over data in a shape that cannot be interpreted.
    InputShape,
    /// A required field is missing or has an invalid value.
    Validation,
    /// A signature embedded in an input did not verify.
    Verification,
    /// The requested output encoding is misconfigured.
    OutputConfig,
    /// The cryptographic provider failed (encoding, keys, signing).
    Provider,
    /// The resource store failed.
    Storage,
    /// Configuration could not be loaded.
    Config,
}

/// Represents errors that can occur in the minipki library.
///
/// Issuance is never retried internally: every error reaches the immediate
/// caller unchanged.
#[derive(Debug, Error, Clone)]
pub enum PkiError {
    /// A descriptor string names an attribute that has no long name or alias.
    #[error("unsupported attribute/alias [{0}]")]
    UnsupportedAttribute(String),

    /// A descriptor string token is not of the form `ATTR=VALUE`.
    #[error("malformed attribute token [{0}]")]
    MalformedAttribute(String),

    /// A request record could not be interpreted field by field.
    #[error("malformed certificate request: {0}")]
    MalformedRequest(String),

    /// No validity information at all was supplied.
    #[error("must have a valid validityYears number")]
    MissingValidity,

    /// `validityYears` was supplied but is not a non-negative integer.
    #[error("validityYears must be a number")]
    InvalidValidityYears,

    /// `serialNumber` is missing, empty or not a string.
    #[error("serialNumber must be a non empty string")]
    InvalidSerialNumber,

    /// `serialNumber` is a string but not hexadecimal.
    #[error("serialNumber must be hexadecimal: {0}")]
    NonHexSerialNumber(String),

    /// `serialNumber` encodes to more than the 20 octets RFC 5280 allows.
    #[error("serialNumber [{0}] exceeds 20 octets")]
    SerialNumberTooLong(String),

    /// A field required by the operation is absent from the request.
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// The validity window is empty or reversed.
    #[error("invalid validity window: {0}")]
    InvalidValidity(String),

    /// The CSR signature does not match its embedded public key.
    #[error("csr signature not verified")]
    CsrSignatureNotVerified,

    /// Archive output was requested without a password.
    #[error("certificate output [pfx|pkcs12] need a password")]
    MissingOutputPassword,

    /// The requested output type is not one of pem, pfx or pkcs12.
    #[error("unsupported certificate output type [{0}]")]
    UnsupportedOutput(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input handed to the provider.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// A private key could not be decrypted or decoded.
    #[error("Private key error: {0}")]
    PrivateKeyError(String),

    /// Error during signing or signature decoding.
    #[error("Signature error: {0}")]
    SignatureError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error from PKCS#12 archive construction.
    #[error("PKCS12 error: {0}")]
    Pkcs12Error(String),

    /// The storage location was never registered.
    #[error("Location not registered [{0}]")]
    LocationNotRegistered(String),

    /// The resource does not exist in a registered location.
    #[error("Resource [{resource}] not found in location [{location}]")]
    ResourceNotFound { location: String, resource: String },

    /// Filesystem failure inside a storage backend.
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PkiError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PkiError::UnsupportedAttribute(_)
            | PkiError::MalformedAttribute(_)
            | PkiError::MalformedRequest(_) => ErrorKind::InputShape,
            PkiError::MissingValidity
            | PkiError::InvalidValidityYears
            | PkiError::InvalidSerialNumber
            | PkiError::NonHexSerialNumber(_)
            | PkiError::SerialNumberTooLong(_)
            | PkiError::MissingField(_)
            | PkiError::InvalidValidity(_) => ErrorKind::Validation,
            PkiError::CsrSignatureNotVerified => ErrorKind::Verification,
            PkiError::MissingOutputPassword | PkiError::UnsupportedOutput(_) => {
                ErrorKind::OutputConfig
            }
            PkiError::EncodingError(_)
            | PkiError::DecodingError(_)
            | PkiError::InvalidInput(_)
            | PkiError::KeyGenerationError(_)
            | PkiError::PrivateKeyError(_)
            | PkiError::SignatureError(_)
            | PkiError::RsaError(_)
            | PkiError::Pkcs12Error(_) => ErrorKind::Provider,
            PkiError::LocationNotRegistered(_)
            | PkiError::ResourceNotFound { .. }
            | PkiError::StorageIo(_) => ErrorKind::Storage,
            PkiError::ConfigError(_) => ErrorKind::Config,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PkiError>;

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    fn from(err: der::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::RsaError(err.to_string())
    }
}

impl From<pkcs8::Error> for PkiError {
    fn from(err: pkcs8::Error) -> Self {
        PkiError::PrivateKeyError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for PkiError {
    fn from(err: pkcs8::spki::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<ecdsa::signature::Error> for PkiError {
    fn from(err: ecdsa::signature::Error) -> Self {
        PkiError::SignatureError(err.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(err: pem::PemError) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<picky::pkcs12::Pkcs12Error> for PkiError {
    fn from(err: picky::pkcs12::Pkcs12Error) -> Self {
        PkiError::Pkcs12Error(err.to_string())
    }
}

impl From<std::io::Error> for PkiError {
    fn from(err: std::io::Error) -> Self {
        PkiError::StorageIo(err.to_string())
    }
}

impl From<serde_json::Error> for PkiError {
    fn from(err: serde_json::Error) -> Self {
        PkiError::MalformedRequest(err.to_string())
    }
}

impl From<toml::de::Error> for PkiError {
    fn from(err: toml::de::Error) -> Self {
        PkiError::ConfigError(err.to_string())
    }
}
