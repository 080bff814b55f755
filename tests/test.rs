mod util;

use std::collections::HashMap;

use minipki::attributes::CertificateAttributes;
use minipki::cert::Certificate;
use minipki::cert::extensions::{AuthorityKeyIdentifier, ExtensionDescriptor, SubjectKeyIdentifier};
use minipki::config::PkiConfig;
use minipki::csr::CertificateSigningRequest;
use minipki::error::{ErrorKind, PkiError};
use minipki::key::KeyAlgorithm;
use minipki::keystore::read_pkcs12;
use minipki::pki::{
    OutputFormat, PkiCertificateOptions, RootRequest, issue_from_csr, issue_pki_certificate,
    issue_root,
};
use minipki::request::{CertificateInput, ValidityDelta, normalize};
use minipki::store::{FsStore, MemoryStore, ResourceKind, ResourceStore, store_artifacts};
use serde_json::{Value, json};

pub type Result<T> = std::result::Result<T, PkiError>;

#[test]
fn scenario_a_descriptor_string_subject() -> Result<()> {
    let subject: CertificateAttributes = "/CN=Root CA/C=IT/E=ca-root@mynet.it".parse()?;
    assert_eq!(subject.cn(), Some("Root CA"));
    assert_eq!(subject.as_sign_input().len(), 3);
    Ok(())
}

#[test]
fn scenario_b_rsa_root_carries_subject_key_identifier() -> Result<()> {
    let root = issue_root(
        &RootRequest::builder()
            .subject(util::root_subject())
            .serial_number("01")
            .key_algorithm(KeyAlgorithm::Rsa { bits: 2048 })
            .validity(ValidityDelta::years(1))
            .build(),
    )?;

    assert!(root.certificate_pem().starts_with("-----BEGIN CERTIFICATE-----"));
    let cert = Certificate::from_pem(root.certificate_pem())?;
    let ski: Option<SubjectKeyIdentifier> = cert.find_extension()?;
    assert_eq!(ski.map(|ski| ski.0), Some(root.key_identifier.clone()));
    assert!(
        cert.extension_descriptors()?
            .iter()
            .any(|descriptor| descriptor.name() == "subjectKeyIdentifier")
    );
    Ok(())
}

#[test]
fn scenario_c_archive_output_needs_password() -> Result<()> {
    let root = util::generate_ca_cert();
    let subject: CertificateAttributes = "/CN=client.mynet.it/O=MyNET".parse()?;
    let issue = |options: &PkiCertificateOptions| {
        issue_pki_certificate(
            &subject,
            "02",
            root.certificate_pem(),
            &root.keys.private_key,
            options,
        )
    };

    let err = issue(
        &PkiCertificateOptions::builder()
            .output("pfx".parse()?)
            .build(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "certificate output [pfx|pkcs12] need a password");
    assert_eq!(err.kind(), ErrorKind::OutputConfig);

    let issued = issue(
        &PkiCertificateOptions::builder()
            .output(OutputFormat::Pkcs12)
            .password("test")
            .key_algorithm(KeyAlgorithm::EcdsaP256)
            .build(),
    )?;
    assert_eq!(issued.certificate.artifact_type(), "pkcs12");

    let contents = read_pkcs12(issued.certificate.as_bytes(), "test")?;
    assert_eq!(contents.certificates.len(), 2);
    let leaf = Certificate::from_der(&contents.certificates[0])?;
    assert_eq!(leaf.subject_attributes()?, subject);
    assert_eq!(
        contents.key_pair()?.public_key(),
        leaf.public_key()?
    );
    Ok(())
}

#[test]
fn scenario_d_tampered_csr_signature_is_rejected() -> Result<()> {
    let root = util::generate_ca_cert();
    let (_, csr_pem) = util::generate_csr_for("/CN=device.mynet.it", KeyAlgorithm::EcdsaP256);

    let mut csr = CertificateSigningRequest::from_pem(&csr_pem)?;
    let mut signature = csr.inner.signature.raw_bytes().to_vec();
    let last = signature.len() - 1;
    signature[last] ^= 0x01;
    csr.inner.signature = der::asn1::BitString::from_bytes(&signature)?;

    let err = issue_from_csr(&util::leaf_request(&root, &csr.to_pem()?, "03")).unwrap_err();
    assert!(matches!(err, PkiError::CsrSignatureNotVerified));
    assert_eq!(err.kind(), ErrorKind::Verification);
    Ok(())
}

#[test]
fn csr_subject_survives_leaf_issuance() -> Result<()> {
    let root = util::generate_ca_cert();
    for algorithm in [KeyAlgorithm::EcdsaP384, KeyAlgorithm::Ed25519] {
        let subject = "/CN=server.mynet.it/C=IT/ST=Italy/L=Bergamo/O=MyNET/OU=servers";
        let (_, csr_pem) = util::generate_csr_for(subject, algorithm);
        let csr = CertificateSigningRequest::from_pem(&csr_pem)?;

        let leaf = Certificate::from_pem(&issue_from_csr(&util::leaf_request(&root, &csr_pem, "04"))?)?;
        assert_eq!(leaf.subject_attributes()?, csr.subject_attributes()?);
        assert_eq!(leaf.public_key()?, csr.public_key()?);
    }
    Ok(())
}

#[test]
fn leaf_authority_key_identifier_is_root_subject_key_identifier() -> Result<()> {
    let root = util::generate_root(KeyAlgorithm::EcdsaP384);
    let root_cert = Certificate::from_pem(root.certificate_pem())?;
    let root_ski: Option<SubjectKeyIdentifier> = root_cert.find_extension()?;

    let (_, csr_pem) = util::generate_csr_for("/CN=leaf.mynet.it", KeyAlgorithm::EcdsaP256);
    let mut request = util::leaf_request(&root, &csr_pem, "05");
    request.extensions = vec![
        ExtensionDescriptor::basic_constraints(false),
        ExtensionDescriptor::authority_key_identifier(None),
    ];
    let leaf = Certificate::from_pem(&issue_from_csr(&request)?)?;

    let aki: Option<AuthorityKeyIdentifier> = leaf.find_extension()?;
    assert_eq!(
        aki.map(|aki| aki.key_identifier),
        root_ski.map(|ski| ski.0)
    );
    Ok(())
}

#[test]
fn missing_validity_fails_for_every_shape() {
    let input = CertificateInput::builder()
        .subject("/CN=x")
        .serial_number("01")
        .build();
    let mut map: HashMap<String, Value> = HashMap::new();
    map.insert("subject".into(), json!("/CN=x"));
    map.insert("serialNumber".into(), json!("01"));
    let value = json!({"subject": "/CN=x", "serialNumber": "01", "validityYears": 0});

    for result in [normalize(&input), normalize(&map), normalize(&value)] {
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "must have a valid validityYears number");
    }
}

#[test]
fn non_string_serial_fails_for_every_shape() {
    let mut map: HashMap<String, Value> = HashMap::new();
    map.insert("validityYears".into(), json!(1));
    map.insert("serialNumber".into(), json!(42));
    let value = json!({"validityYears": 1, "serialNumber": ["01"]});
    let input = CertificateInput::builder().validity_years(1).build();

    for result in [normalize(&map), normalize(&value), normalize(&input)] {
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "serialNumber must be a non empty string");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[test]
fn config_templates_drive_issuance_into_stores() -> Result<()> {
    let config = PkiConfig::from_toml_str(
        r#"
        [ca]
        CN = "Root CA"
        O = "MyNET"

        [server]
        commonName = "server.mynet.it"
        O = "MyNET"

        [defaults]
        key_algorithm = { type = "ecdsa-p256" }
        validity_years = 2
        root_validity = { years = 5 }
        "#,
    )?;

    let root = issue_root(
        &RootRequest::builder()
            .subject(config.ca.clone())
            .serial_number("01")
            .key_algorithm(config.defaults.key_algorithm)
            .validity(config.defaults.root_validity)
            .build(),
    )?;
    let server = issue_pki_certificate(
        &config.server,
        "10",
        root.certificate_pem(),
        &root.keys.private_key,
        &PkiCertificateOptions::builder()
            .key_algorithm(config.defaults.key_algorithm)
            .validity_years(config.defaults.validity_years)
            .build(),
    )?;

    let memory = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    let fs = FsStore::new(dir.path());
    let stores: [&dyn ResourceStore; 2] = [&memory, &fs];
    for store in stores {
        store.register_location("ca")?;
        store.register_location("servers")?;
        store_artifacts(store, "ca", "root", &root)?;
        store_artifacts(store, "servers", "server", &server)?;

        let cert = store.fetch_pki_resource("servers", "server", ResourceKind::Certificate)?;
        assert_eq!(cert, server.certificate.as_bytes());
        let csr = store.fetch_resource("servers", "server.csr.pem")?;
        assert_eq!(csr, server.csr.as_bytes());
        let root_key = store.fetch_resource("ca", "root.private.key.pem")?;
        assert_eq!(root_key, root.keys.private_key.as_bytes());

        assert!(matches!(
            store.fetch_resource("clients", "client.cert.pem"),
            Err(PkiError::LocationNotRegistered(_))
        ));
    }
    assert!(dir.path().join("servers").join("server.public.key.pem").is_file());
    Ok(())
}
