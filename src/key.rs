use core::fmt;
use core::str::FromStr;

use const_oid::db::{rfc5912, rfc8410};
use der::{Decode, Encode};
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::spki::{SubjectPublicKeyInfoOwned, SubjectPublicKeyInfoRef};
use pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, SecretDocument,
};
use rand_core::{OsRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::signature::{Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::cert::SignatureAlgorithm;
use crate::error::{PkiError, Result};
use crate::pem_utils::{self, PemLabel};

/// PBKDF2 rounds used when a private key PEM is protected by a passphrase.
const PBKDF2_ITERATIONS: u32 = 2048;

/// Key algorithms the provider can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KeyAlgorithm {
    /// RSA with the given modulus size in bits.
    Rsa { bits: usize },
    /// ECDSA over NIST P-256.
    EcdsaP256,
    /// ECDSA over NIST P-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        KeyAlgorithm::Rsa { bits: 2048 }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa { bits } => write!(f, "rsa-{bits}"),
            KeyAlgorithm::EcdsaP256 => f.write_str("ecdsa-p256"),
            KeyAlgorithm::EcdsaP384 => f.write_str("ecdsa-p384"),
            KeyAlgorithm::Ed25519 => f.write_str("ed25519"),
        }
    }
}

/// Supported key types for certificate operations.
#[derive(Debug, Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl KeyPair {
    /// Generates a fresh key pair of the requested algorithm.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Rsa { bits } => Self::generate_rsa(bits),
            KeyAlgorithm::EcdsaP256 => Ok(Self::generate_ecdsa_p256()),
            KeyAlgorithm::EcdsaP384 => Ok(Self::generate_ecdsa_p384()),
            KeyAlgorithm::Ed25519 => Ok(Self::generate_ed25519()),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| PkiError::KeyGenerationError(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let signing_key = P256SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let signing_key = P384SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut OsRng);
        KeyPair::Ed25519 { signing_key }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa { public, .. } => KeyAlgorithm::Rsa {
                bits: rsa::traits::PublicKeyParts::size(public) * 8,
            },
            KeyPair::EcdsaP256 { .. } => KeyAlgorithm::EcdsaP256,
            KeyPair::EcdsaP384 { .. } => KeyAlgorithm::EcdsaP384,
            KeyPair::Ed25519 { .. } => KeyAlgorithm::Ed25519,
        }
    }

    /// The signature algorithm this key signs with.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Returns the SubjectPublicKeyInfo of the public half.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signs `data` and returns the signature in the encoding X.509 expects
    /// (PKCS#1 v1.5 for RSA, DER `Ecdsa-Sig-Value` for ECDSA, raw for Ed25519).
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
                let signature: rsa::pkcs1v15::Signature = signing_key.try_sign(data)?;
                Ok(rsa::signature::SignatureEncoding::to_vec(&signature))
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::DerSignature = signing_key.try_sign(data)?;
                Ok(signature.as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: p384::ecdsa::DerSignature = signing_key.try_sign(data)?;
                Ok(signature.as_bytes().to_vec())
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature = signing_key.try_sign(data)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// Encodes the private key as an unencrypted PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der()?,
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::EcdsaP384 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der()?,
        };
        Ok(document)
    }

    /// Encodes the private key as PKCS#8 PEM, encrypted with PBES2 when a
    /// password is given.
    pub fn to_pkcs8_pem(&self, password: Option<&str>) -> Result<Zeroizing<String>> {
        let document = self.to_pkcs8_der()?;
        match password.filter(|p| !p.is_empty()) {
            Some(password) => {
                let encrypted = encrypt_pkcs8(&document, password)?;
                Ok(pem_utils::secret_to_pem(
                    encrypted.as_bytes(),
                    PemLabel::EncryptedPrivateKey,
                ))
            }
            None => Ok(pem_utils::secret_to_pem(
                document.as_bytes(),
                PemLabel::PrivateKey,
            )),
        }
    }

    /// Exports both halves as PEM text.
    pub fn to_pem_pair(&self, password: Option<&str>) -> Result<PemKeyPair> {
        Ok(PemKeyPair {
            private_key: self.to_pkcs8_pem(password)?,
            public_key: self.public_key().to_pem()?,
        })
    }

    /// Imports a private key from an unencrypted PKCS#8 DER document.
    pub fn import_from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)?;
        match info.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => Self::from_rsa_private(RsaPrivateKey::from_pkcs8_der(der)?),
            rfc5912::ID_EC_PUBLIC_KEY => match P256SigningKey::from_pkcs8_der(der) {
                Ok(signing_key) => Ok(KeyPair::EcdsaP256 {
                    verifying_key: *signing_key.verifying_key(),
                    signing_key,
                }),
                Err(_) => {
                    let signing_key = P384SigningKey::from_pkcs8_der(der)?;
                    Ok(KeyPair::EcdsaP384 {
                        verifying_key: *signing_key.verifying_key(),
                        signing_key,
                    })
                }
            },
            rfc8410::ID_ED_25519 => Ok(KeyPair::Ed25519 {
                signing_key: Ed25519SigningKey::from_pkcs8_der(der)?,
            }),
            oid => Err(PkiError::InvalidInput(format!(
                "unsupported private key algorithm {oid}"
            ))),
        }
    }

    /// Imports a private key from PEM text.
    ///
    /// Accepts `PRIVATE KEY` (PKCS#8), `ENCRYPTED PRIVATE KEY` (PKCS#8 with
    /// PBES2, requires `password`) and `RSA PRIVATE KEY` (PKCS#1). A password
    /// supplied for an unencrypted key is ignored.
    pub fn from_pem(pem: &str, password: Option<&str>) -> Result<Self> {
        let (label, der) = pem_utils::parse_labeled(pem)?;
        let der = Zeroizing::new(der);
        match label {
            PemLabel::PrivateKey => Self::import_from_pkcs8_der(&der),
            PemLabel::EncryptedPrivateKey => {
                let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
                    PkiError::PrivateKeyError("encrypted private key needs a password".into())
                })?;
                let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(der.as_slice())?;
                let decrypted = encrypted.decrypt(password)?;
                Self::import_from_pkcs8_der(decrypted.as_bytes())
            }
            PemLabel::RsaPrivateKey => Self::from_rsa_private(RsaPrivateKey::from_pkcs1_der(&der)?),
            other => Err(PkiError::DecodingError(format!(
                "expected a private key, found PEM label {}",
                other.as_str()
            ))),
        }
    }

    fn from_rsa_private(private: RsaPrivateKey) -> Result<Self> {
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }
}

fn encrypt_pkcs8(document: &SecretDocument, password: &str) -> Result<SecretDocument> {
    let mut salt = [0u8; 16];
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let params =
        pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(PBKDF2_ITERATIONS, &salt, &iv)
            .map_err(|e| PkiError::PrivateKeyError(e.to_string()))?;
    let info = pkcs8::PrivateKeyInfo::try_from(document.as_bytes())?;
    Ok(info.encrypt_with_params(params, password.as_bytes())?)
}

/// The public half of a [`KeyPair`], or a key read from a certificate or CSR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(key) => key.to_public_key_der()?,
            PublicKey::EcdsaP256(key) => key.to_public_key_der()?,
            PublicKey::EcdsaP384(key) => key.to_public_key_der()?,
            PublicKey::Ed25519(key) => key.to_public_key_der()?,
        };
        Ok(document.as_bytes().to_vec())
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned::from_der(&self.to_spki_der()?)?)
    }

    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        Self::from_spki_der(&spki.to_der()?)
    }

    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(der)?;
        match spki.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(der)?)),
            rfc5912::ID_EC_PUBLIC_KEY => P256VerifyingKey::from_public_key_der(der)
                .map(PublicKey::EcdsaP256)
                .or_else(|_| P384VerifyingKey::from_public_key_der(der).map(PublicKey::EcdsaP384))
                .map_err(PkiError::from),
            rfc8410::ID_ED_25519 => Ok(PublicKey::Ed25519(
                Ed25519VerifyingKey::from_public_key_der(der)?,
            )),
            oid => Err(PkiError::InvalidInput(format!(
                "unsupported public key algorithm {oid}"
            ))),
        }
    }

    /// Reads a `PUBLIC KEY` (SPKI) or `RSA PUBLIC KEY` (PKCS#1) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let (label, der) = pem_utils::parse_labeled(pem)?;
        match label {
            PemLabel::PublicKey => Self::from_spki_der(&der),
            PemLabel::RsaPublicKey => Ok(PublicKey::Rsa(RsaPublicKey::from_pkcs1_der(&der)?)),
            other => Err(PkiError::DecodingError(format!(
                "expected a public key, found PEM label {}",
                other.as_str()
            ))),
        }
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_spki_der()?,
            PemLabel::PublicKey,
        ))
    }

    /// Checks `signature` over `message`.
    ///
    /// Returns `false` when the signature does not decode, does not match, or
    /// was produced with an algorithm this key cannot verify.
    pub fn verify(&self, algorithm: &SignatureAlgorithm, message: &[u8], signature: &[u8]) -> bool {
        match (self, algorithm) {
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha256WithRSA) => {
                let verifying_key = RsaVerifyingKey::<Sha256>::new(public.clone());
                rsa::pkcs1v15::Signature::try_from(signature)
                    .is_ok_and(|sig| verifying_key.verify(message, &sig).is_ok())
            }
            (PublicKey::EcdsaP256(verifying_key), SignatureAlgorithm::Sha256WithECDSA) => {
                p256::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| verifying_key.verify(message, &sig).is_ok())
            }
            (PublicKey::EcdsaP384(verifying_key), SignatureAlgorithm::Sha384WithECDSA) => {
                p384::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| verifying_key.verify(message, &sig).is_ok())
            }
            (PublicKey::Ed25519(verifying_key), SignatureAlgorithm::Ed25519) => {
                ed25519_dalek::Signature::from_slice(signature)
                    .is_ok_and(|sig| verifying_key.verify(message, &sig).is_ok())
            }
            _ => false,
        }
    }
}

/// A key pair as PEM text: PKCS#8 private key (encrypted when a passphrase
/// was used) and SPKI public key.
#[derive(Clone)]
pub struct PemKeyPair {
    pub private_key: Zeroizing<String>,
    pub public_key: String,
}

impl PemKeyPair {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: Zeroizing::new(private_key.into()),
            public_key: public_key.into(),
        }
    }

    /// Generates a key pair and exports it, encrypting the private key when
    /// `password` is set.
    pub fn generate(algorithm: KeyAlgorithm, password: Option<&str>) -> Result<Self> {
        KeyPair::generate(algorithm)?.to_pem_pair(password)
    }

    pub fn key_pair(&self, password: Option<&str>) -> Result<KeyPair> {
        KeyPair::from_pem(&self.private_key, password)
    }
}

impl fmt::Debug for PemKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemKeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// SHA-256 digest of a DER SubjectPublicKeyInfo, used for the subject and
/// authority key identifier extensions.
///
/// Displays as lowercase colon-delimited hex (`ab:cd:...`).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyIdentifier(Vec<u8>);

impl KeyIdentifier {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_public_key(key: &PublicKey) -> Result<Self> {
        Ok(Self::from_spki_der(&key.to_spki_der()?))
    }

    pub fn from_spki_der(der: &[u8]) -> Self {
        Self(Sha256::digest(der).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyIdentifier({self})")
    }
}

impl FromStr for KeyIdentifier {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        let compact: String = s.chars().filter(|c| *c != ':').collect();
        hex::decode(&compact)
            .map(Self)
            .map_err(|e| PkiError::InvalidInput(format!("key identifier [{s}]: {e}")))
    }
}

impl Serialize for KeyIdentifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyIdentifier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
