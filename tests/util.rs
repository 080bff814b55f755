#![allow(dead_code)]

use minipki::attributes::CertificateAttributes;
use minipki::key::{KeyAlgorithm, PemKeyPair};
use minipki::pki::{CsrRequest, LeafRequest, RootCertificate, RootRequest, generate_csr, issue_root};
use minipki::request::ValidityDelta;

pub const ROOT_SUBJECT: &str =
    "/CN=Root CA/C=IT/ST=Italy/L=Bergamo/O=MyNET/OU=MyNET Root CA server/E=ca-root@mynet.it";

pub fn root_subject() -> CertificateAttributes {
    ROOT_SUBJECT.parse().unwrap()
}

pub fn generate_root(algorithm: KeyAlgorithm) -> RootCertificate {
    issue_root(
        &RootRequest::builder()
            .subject(root_subject())
            .serial_number("01")
            .key_algorithm(algorithm)
            .validity(ValidityDelta::years(1))
            .build(),
    )
    .unwrap()
}

pub fn generate_ca_cert() -> RootCertificate {
    generate_root(KeyAlgorithm::EcdsaP256)
}

/// A fresh key pair and a signed CSR for `subject`.
pub fn generate_csr_for(subject: &str, algorithm: KeyAlgorithm) -> (PemKeyPair, String) {
    let keys = PemKeyPair::generate(algorithm, None).unwrap();
    let csr = generate_csr(
        &CsrRequest::builder()
            .subject(subject.parse().unwrap())
            .keys(keys.clone())
            .build(),
    )
    .unwrap();
    (keys, csr)
}

pub fn leaf_request(root: &RootCertificate, csr_pem: &str, serial: &str) -> LeafRequest {
    LeafRequest::builder()
        .csr_pem(csr_pem)
        .validity_years(1)
        .serial_number(serial)
        .ca_certificate_pem(root.certificate_pem())
        .ca_private_key_pem(root.keys.private_key.as_str())
        .build()
}
