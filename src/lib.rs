//! # minipki - A Small Private PKI in Pure Rust
//!
//! minipki issues X.509 certificates for a small private certificate
//! authority. It builds self-signed root certificates, generates PKCS#10
//! certification requests, issues leaf certificates from those requests and
//! exports key material as PEM or as a password protected PKCS#12 archive.
//! Everything is built on the RustCrypto crates.
//!
//! ## Supported Key Types
//!
//! - **RSA**: any modulus size, signed with SHA-256 (PKCS#1 v1.5)
//! - **ECDSA**: P-256 and P-384 curves
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Request Shapes
//!
//! Subjects can be written as openssl style descriptor strings
//! (`"/CN=server/O=MyNET"`), built with a builder, read from any key/value
//! mapping or deserialized from records using long attribute names or their
//! aliases. Certificate requests go through [`request::normalize`], which
//! accepts builder objects, loose mappings, serde records and a positional
//! form, and validates them before any key is touched.
//!
//! ## Quick Start
//!
//! ### Root CA and Leaf Certificate
//!
//! ```rust,no_run
//! use minipki::key::KeyAlgorithm;
//! use minipki::pki::{
//!     OutputFormat, PkiCertificateOptions, RootRequest, issue_pki_certificate, issue_root,
//! };
//!
//! # fn main() -> Result<(), minipki::error::PkiError> {
//! let root = issue_root(
//!     &RootRequest::builder()
//!         .subject("/CN=Root CA/C=IT/O=MyNET".parse()?)
//!         .serial_number("01")
//!         .key_algorithm(KeyAlgorithm::Rsa { bits: 2048 })
//!         .build(),
//! )?;
//!
//! let options = PkiCertificateOptions::builder()
//!     .output(OutputFormat::Pkcs12)
//!     .password("changeit")
//!     .build();
//! let server = issue_pki_certificate(
//!     &"/CN=server.mynet.it/O=MyNET".parse()?,
//!     "02",
//!     root.certificate_pem(),
//!     &root.keys.private_key,
//!     &options,
//! )?;
//! std::fs::write("server.pfx", server.certificate.as_bytes())?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Persisting Artifacts
//!
//! ```rust,no_run
//! use minipki::pki::{RootRequest, issue_root};
//! use minipki::store::{FsStore, ResourceStore, store_artifacts};
//!
//! # fn main() -> Result<(), minipki::error::PkiError> {
//! let root = issue_root(
//!     &RootRequest::builder()
//!         .subject("/CN=Root CA".parse()?)
//!         .serial_number("01")
//!         .build(),
//! )?;
//!
//! let store = FsStore::new("pki");
//! store.register_location("ca")?;
//! store_artifacts(&store, "ca", "root", &root)?;
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod cert;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod keystore;
pub mod pem_utils;
pub mod pki;
pub mod request;
pub mod store;
pub mod tbs_certificate;

pub use error::{PkiError, Result};
