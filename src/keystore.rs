//! PKCS#12 export of a private key together with its certificate chain.

use picky::key::PrivateKey;
use picky::pkcs12::{
    Pbes2Cipher, Pbes2Encryption, Pfx, Pkcs12Attribute, Pkcs12AttributeKind,
    Pkcs12CryptoContext, Pkcs12Encryption, Pkcs12HashAlgorithm, Pkcs12MacAlgorithmHmac,
    Pkcs12ParsingParams, SafeBag, SafeBagKind, SafeContents, SafeContentsKind,
};
use picky::x509::Cert;
use tracing::debug;
use zeroize::Zeroizing;

use crate::cert::Certificate;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::pem_utils;

fn pbes2() -> Pbes2Encryption {
    Pbes2Encryption::new(Pbes2Cipher::Aes256Cbc, Pkcs12HashAlgorithm::Sha256)
}

fn provider_error(err: impl ToString) -> PkiError {
    PkiError::Pkcs12Error(err.to_string())
}

/// Packs `private_key_pem` and the certificates of `chain_pem` into a
/// PKCS#12 archive protected by `password`.
///
/// `chain_pem` holds one or more concatenated `CERTIFICATE` blocks, leaf
/// first. The key bag and the leaf certificate bag share a local key id
/// derived from the leaf's public key. `password` is used as given; checking
/// that it is present is the caller's job.
pub fn export_pkcs12(
    private_key_pem: &str,
    private_key_password: Option<&str>,
    chain_pem: &str,
    password: &str,
) -> Result<Vec<u8>> {
    let key = KeyPair::from_pem(private_key_pem, private_key_password)?;
    let pkcs8 = key.to_pkcs8_der()?;
    let private_key = PrivateKey::from_pkcs8(pkcs8.as_bytes()).map_err(provider_error)?;

    let chain = pem_utils::parse_certificate_chain(chain_pem)?;
    let leaf = chain.first().ok_or(PkiError::MissingField("certificate"))?;
    let local_key_id = Certificate::from_der(leaf)?.key_identifier()?;

    let mut crypto_context = Pkcs12CryptoContext::new_with_password(password);

    let key_encryption = Pkcs12Encryption::new_pbes2(pbes2(), &mut crypto_context);
    let key_bag = SafeBag::new_encrypted_key(
        private_key,
        vec![Pkcs12Attribute::new_local_key_id(local_key_id.as_bytes())],
        key_encryption,
        &crypto_context,
    )?;

    let mut cert_bags = Vec::with_capacity(chain.len());
    for (index, der) in chain.iter().enumerate() {
        let cert = Cert::from_der(der).map_err(provider_error)?;
        let attributes = if index == 0 {
            vec![Pkcs12Attribute::new_local_key_id(local_key_id.as_bytes())]
        } else {
            Vec::new()
        };
        cert_bags.push(SafeBag::new_certificate(cert, attributes)?);
    }

    let cert_encryption = Pkcs12Encryption::new_pbes2(pbes2(), &mut crypto_context);
    let safe_contents = vec![
        SafeContents::new_encrypted(cert_bags, cert_encryption, &crypto_context)?,
        SafeContents::new(vec![key_bag]),
    ];

    let pfx = Pfx::new_with_hmac(
        safe_contents,
        Pkcs12MacAlgorithmHmac::new(Pkcs12HashAlgorithm::Sha256),
        &mut crypto_context,
    )?;

    debug!(
        certificates = chain.len(),
        local_key_id = %local_key_id,
        "packed pkcs12 archive"
    );
    pfx.to_der().map_err(provider_error)
}

/// Contents of a PKCS#12 archive, as read back by [`read_pkcs12`].
pub struct Pkcs12Contents {
    /// Unencrypted PKCS#8 DER of every key bag.
    pub private_keys: Vec<Zeroizing<Vec<u8>>>,
    /// DER of every certificate bag, in archive order.
    pub certificates: Vec<Vec<u8>>,
    /// Local key ids found on any bag.
    pub local_key_ids: Vec<Vec<u8>>,
}

impl Pkcs12Contents {
    /// Decodes the first private key in the archive.
    pub fn key_pair(&self) -> Result<KeyPair> {
        let der = self
            .private_keys
            .first()
            .ok_or(PkiError::MissingField("privateKey"))?;
        KeyPair::import_from_pkcs8_der(der)
    }
}

/// Opens a PKCS#12 archive, checking its MAC with `password`.
pub fn read_pkcs12(der: &[u8], password: &str) -> Result<Pkcs12Contents> {
    let crypto_context = Pkcs12CryptoContext::new_with_password(password);
    let pfx = Pfx::from_der(der, &crypto_context, &Pkcs12ParsingParams::default())?;

    let mut contents = Pkcs12Contents {
        private_keys: Vec::new(),
        certificates: Vec::new(),
        local_key_ids: Vec::new(),
    };

    for safe_contents in pfx.safe_contents() {
        let bags = match safe_contents.kind() {
            SafeContentsKind::SafeBags(bags) => bags,
            SafeContentsKind::EncryptedSafeBags { safe_bags, .. } => safe_bags,
            SafeContentsKind::Unknown => continue,
        };
        for bag in bags {
            collect_bag(bag, &mut contents)?;
        }
    }

    Ok(contents)
}

fn collect_bag(bag: &SafeBag, contents: &mut Pkcs12Contents) -> Result<()> {
    for attribute in bag.attributes() {
        if let Pkcs12AttributeKind::LocalKeyId(id) = attribute.kind() {
            if !contents.local_key_ids.contains(id) {
                contents.local_key_ids.push(id.clone());
            }
        }
    }

    match bag.kind() {
        SafeBagKind::PrivateKey(key) | SafeBagKind::EncryptedPrivateKey { key, .. } => {
            let der = key.to_pkcs8().map_err(provider_error)?;
            contents.private_keys.push(Zeroizing::new(der));
        }
        SafeBagKind::Certificate(cert) => {
            contents
                .certificates
                .push(cert.to_der().map_err(provider_error)?);
        }
        SafeBagKind::Nested(nested) => {
            for bag in nested {
                collect_bag(bag, contents)?;
            }
        }
        SafeBagKind::Secret(_) | SafeBagKind::Unknown => {}
    }
    Ok(())
}
