use zeroize::Zeroizing;

use crate::error::{PkiError, Result};

/// PEM labels produced or consumed by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemLabel {
    Certificate,
    CertificateRequest,
    PrivateKey,
    EncryptedPrivateKey,
    RsaPrivateKey,
    PublicKey,
    RsaPublicKey,
}

impl PemLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PemLabel::Certificate => "CERTIFICATE",
            PemLabel::CertificateRequest => "CERTIFICATE REQUEST",
            PemLabel::PrivateKey => "PRIVATE KEY",
            PemLabel::EncryptedPrivateKey => "ENCRYPTED PRIVATE KEY",
            PemLabel::RsaPrivateKey => "RSA PRIVATE KEY",
            PemLabel::PublicKey => "PUBLIC KEY",
            PemLabel::RsaPublicKey => "RSA PUBLIC KEY",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CERTIFICATE" => Some(PemLabel::Certificate),
            // Older tools still emit the pre-RFC 7468 label.
            "CERTIFICATE REQUEST" | "NEW CERTIFICATE REQUEST" => {
                Some(PemLabel::CertificateRequest)
            }
            "PRIVATE KEY" => Some(PemLabel::PrivateKey),
            "ENCRYPTED PRIVATE KEY" => Some(PemLabel::EncryptedPrivateKey),
            "RSA PRIVATE KEY" => Some(PemLabel::RsaPrivateKey),
            "PUBLIC KEY" => Some(PemLabel::PublicKey),
            "RSA PUBLIC KEY" => Some(PemLabel::RsaPublicKey),
            _ => None,
        }
    }
}

fn encode_config() -> pem::EncodeConfig {
    pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF)
}

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: PemLabel) -> String {
    let pem = pem::Pem::new(label.as_str(), der);
    pem::encode_config(&pem, encode_config())
}

/// Same as [`der_to_pem`], for secret material.
pub fn secret_to_pem(der: &[u8], label: PemLabel) -> Zeroizing<String> {
    Zeroizing::new(der_to_pem(der, label))
}

/// Convert a PEM‑encoded string to DER‑encoded bytes.
pub fn pem_to_der(pem_str: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)?;
    Ok(pem.contents().to_vec())
}

/// Parses one PEM block and returns its label with the DER contents.
pub fn parse_labeled(pem_str: &str) -> Result<(PemLabel, Vec<u8>)> {
    let pem = pem::parse(pem_str)?;
    let label = PemLabel::from_tag(pem.tag()).ok_or_else(|| {
        PkiError::DecodingError(format!("unsupported PEM label {}", pem.tag()))
    })?;
    Ok((label, pem.contents().to_vec()))
}

/// Splits a bundle of concatenated certificates into DER blobs, in order.
pub fn parse_certificate_chain(pem_str: &str) -> Result<Vec<Vec<u8>>> {
    let blocks = pem::parse_many(pem_str)?;
    let chain: Vec<Vec<u8>> = blocks
        .iter()
        .filter(|block| block.tag() == PemLabel::Certificate.as_str())
        .map(|block| block.contents().to_vec())
        .collect();
    if chain.is_empty() {
        return Err(PkiError::DecodingError(
            "no CERTIFICATE block found".to_string(),
        ));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_round_trips_through_pem() {
        let pem = der_to_pem(&[1, 2, 3], PemLabel::Certificate);
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(!pem.contains('\r'));
        assert_eq!(pem_to_der(&pem).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            parse_labeled(&pem).unwrap(),
            (PemLabel::Certificate, vec![1, 2, 3])
        );
    }

    #[test]
    fn chains_keep_their_order() {
        let bundle = format!(
            "{}{}",
            der_to_pem(&[1], PemLabel::Certificate),
            der_to_pem(&[2], PemLabel::Certificate)
        );
        assert_eq!(parse_certificate_chain(&bundle).unwrap(), vec![vec![1], vec![2]]);
        assert!(parse_certificate_chain(&der_to_pem(&[3], PemLabel::PublicKey)).is_err());
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let pem = pem::encode(&pem::Pem::new("OPENSSH PRIVATE KEY", vec![0u8]));
        assert!(parse_labeled(&pem).is_err());
    }
}
