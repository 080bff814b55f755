//! Persistence of issued artifacts.
//!
//! A store holds named resources inside registered locations. Writing to or
//! reading from a location that was never registered fails with
//! [`PkiError::LocationNotRegistered`].

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{PkiError, Result};

/// Kind of artifact a resource holds. Determines its resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    PublicKey,
    PrivateKey,
    Certificate,
    Csr,
    Keystore,
}

impl ResourceKind {
    /// `{name}.public.key.pem`, `{name}.private.key.pem`, `{name}.cert.pem`,
    /// `{name}.csr.pem` or `{name}.keystore.pfx`.
    pub fn resource_name(self, name: &str) -> String {
        match self {
            ResourceKind::PublicKey => format!("{name}.public.key.pem"),
            ResourceKind::PrivateKey => format!("{name}.private.key.pem"),
            ResourceKind::Certificate => format!("{name}.cert.pem"),
            ResourceKind::Csr => format!("{name}.csr.pem"),
            ResourceKind::Keystore => format!("{name}.keystore.pfx"),
        }
    }
}

/// A set of resources produced by one issuance call.
pub trait Artifacts {
    /// Every resource of the bundle with its kind and bytes.
    fn resources(&self) -> Vec<(ResourceKind, Vec<u8>)>;
}

/// Backend that stores raw resources by location and resource name.
pub trait ResourceStore {
    fn register_location(&self, location: &str) -> Result<()>;

    fn store_resource(&self, location: &str, resource_name: &str, data: &[u8]) -> Result<()>;

    fn fetch_resource(&self, location: &str, resource_name: &str) -> Result<Vec<u8>>;

    /// Stores `data` under the resource name `kind` gives to `name`.
    fn store_pki_resource(
        &self,
        location: &str,
        name: &str,
        kind: ResourceKind,
        data: &[u8],
    ) -> Result<()> {
        self.store_resource(location, &kind.resource_name(name), data)
    }

    fn fetch_pki_resource(&self, location: &str, name: &str, kind: ResourceKind) -> Result<Vec<u8>> {
        self.fetch_resource(location, &kind.resource_name(name))
    }
}

/// Persists every resource of `artifacts` under `name` in `location`.
pub fn store_artifacts<S, A>(store: &S, location: &str, name: &str, artifacts: &A) -> Result<()>
where
    S: ResourceStore + ?Sized,
    A: Artifacts + ?Sized,
{
    for (kind, data) in artifacts.resources() {
        store.store_pki_resource(location, name, kind, &data)?;
    }
    Ok(())
}

fn not_found(location: &str, resource_name: &str) -> PkiError {
    PkiError::ResourceNotFound {
        location: location.to_string(),
        resource: resource_name.to_string(),
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    locations: DashMap<String, HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceStore for MemoryStore {
    fn register_location(&self, location: &str) -> Result<()> {
        self.locations.entry(location.to_string()).or_default();
        Ok(())
    }

    fn store_resource(&self, location: &str, resource_name: &str, data: &[u8]) -> Result<()> {
        let mut resources = self
            .locations
            .get_mut(location)
            .ok_or_else(|| PkiError::LocationNotRegistered(location.to_string()))?;
        debug!(location, resource = resource_name, bytes = data.len(), "store resource");
        resources.insert(resource_name.to_string(), data.to_vec());
        Ok(())
    }

    fn fetch_resource(&self, location: &str, resource_name: &str) -> Result<Vec<u8>> {
        let resources = self
            .locations
            .get(location)
            .ok_or_else(|| PkiError::LocationNotRegistered(location.to_string()))?;
        resources
            .get(resource_name)
            .cloned()
            .ok_or_else(|| not_found(location, resource_name))
    }
}

/// Filesystem store: every location is a subdirectory of `base_dir`.
#[derive(Debug)]
pub struct FsStore {
    base_dir: PathBuf,
    locations: DashMap<String, PathBuf>,
}

impl FsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locations: DashMap::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resource_path(&self, location: &str, resource_name: &str) -> Result<PathBuf> {
        check_component(resource_name)?;
        let dir = self
            .locations
            .get(location)
            .ok_or_else(|| PkiError::LocationNotRegistered(location.to_string()))?;
        Ok(dir.join(resource_name))
    }
}

/// Names become single path components.
fn check_component(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(PkiError::InvalidInput(format!(
            "[{name}] is not a valid storage name"
        )));
    }
    Ok(())
}

impl ResourceStore for FsStore {
    fn register_location(&self, location: &str) -> Result<()> {
        check_component(location)?;
        let dir = self.base_dir.join(location);
        std::fs::create_dir_all(&dir)?;
        debug!(location, path = %dir.display(), "registered storage location");
        self.locations.insert(location.to_string(), dir);
        Ok(())
    }

    fn store_resource(&self, location: &str, resource_name: &str, data: &[u8]) -> Result<()> {
        let path = self.resource_path(location, resource_name)?;
        debug!(location, resource = resource_name, bytes = data.len(), "store resource");
        std::fs::write(path, data)?;
        Ok(())
    }

    fn fetch_resource(&self, location: &str, resource_name: &str) -> Result<Vec<u8>> {
        let path = self.resource_path(location, resource_name)?;
        std::fs::read(path).map_err(|err| match err.kind() {
            IoErrorKind::NotFound => not_found(location, resource_name),
            _ => PkiError::from(err),
        })
    }
}
