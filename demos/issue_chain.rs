//! Issues a root CA, a server certificate archive and a client certificate,
//! then writes everything below the directory given as first argument.
//!
//! ```sh
//! RUST_LOG=minipki=debug cargo run --example issue_chain -- ./pki
//! ```

use minipki::config::PkiConfig;
use minipki::pki::{OutputFormat, PkiCertificateOptions, RootRequest, issue_pki_certificate, issue_root};
use minipki::store::{FsStore, ResourceStore, store_artifacts};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
[ca]
CN = "Root CA"
C = "IT"
ST = "Italy"
L = "Bergamo"
O = "MyNET"
OU = "MyNET Root CA server"
E = "ca-root@mynet.it"

[server]
CN = "server.mynet.it"
O = "MyNET"

[client]
CN = "client.mynet.it"
O = "MyNET"

[defaults]
key_algorithm = { type = "ecdsa-p256" }
validity_years = 2
root_validity = { years = 10 }
"#;

fn main() -> Result<(), minipki::PkiError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let base_dir = std::env::args().nth(1).unwrap_or_else(|| "pki".to_string());
    let config = PkiConfig::from_toml_str(CONFIG)?;

    let store = FsStore::new(&base_dir);
    for location in ["ca", "servers", "clients"] {
        store.register_location(location)?;
    }

    let root = issue_root(
        &RootRequest::builder()
            .subject(config.ca.clone())
            .serial_number("01")
            .key_algorithm(config.defaults.key_algorithm)
            .validity(config.defaults.root_validity)
            .private_key_password("cannonau")
            .build(),
    )?;
    store_artifacts(&store, "ca", "root", &root)?;

    let server = issue_pki_certificate(
        &config.server,
        "02",
        root.certificate_pem(),
        &root.keys.private_key,
        &PkiCertificateOptions::builder()
            .output(OutputFormat::Pkcs12)
            .password("changeit")
            .key_algorithm(config.defaults.key_algorithm)
            .validity_years(config.defaults.validity_years)
            .ca_key_password("cannonau")
            .build(),
    )?;
    store_artifacts(&store, "servers", "server", &server)?;

    let client = issue_pki_certificate(
        &config.client,
        "03",
        root.certificate_pem(),
        &root.keys.private_key,
        &PkiCertificateOptions::builder()
            .key_algorithm(config.defaults.key_algorithm)
            .validity_years(config.defaults.validity_years)
            .ca_key_password("cannonau")
            .build(),
    )?;
    store_artifacts(&store, "clients", "client", &client)?;

    println!("root key id: {}", root.key_identifier);
    println!("artifacts written to {}", store.base_dir().display());
    Ok(())
}
