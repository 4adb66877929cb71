//! Content-derived dependency identity
//!
//! Key format:
//! `<package_id>::<dependent_version_id>::<type>::<justification>::<origin>::<collector>:<document_ref>?`
//!
//! The key is hashed into a name-based (version 5) UUID with SHA-256 over the
//! DNS namespace. The separators and the closing `?` must stay byte-for-byte
//! identical to what the application writes for new rows, or migrated rows and
//! freshly ingested rows will stop deduplicating against each other.

use crate::storage::DependencyRow;
use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Namespace every dependency identifier is derived under
pub const NAMESPACE: Uuid = Uuid::NAMESPACE_DNS;

/// The semantic fields of a dependency record that determine its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyContent<'a> {
    pub package_id: Uuid,
    /// Nil for rows whose version never resolved
    pub dependent_package_version_id: Uuid,
    pub dependency_type: &'a str,
    pub justification: &'a str,
    pub origin: &'a str,
    pub collector: &'a str,
    pub document_ref: &'a str,
}

impl<'a> DependencyContent<'a> {
    /// Delimited key the identifier is hashed from
    pub fn key(&self) -> String {
        format!(
            "{}::{}::{}::{}::{}::{}:{}?",
            self.package_id,
            self.dependent_package_version_id,
            self.dependency_type,
            self.justification,
            self.origin,
            self.collector,
            self.document_ref
        )
    }

    pub fn derive_id(&self) -> Uuid {
        hash_uuid(NAMESPACE, self.key().as_bytes())
    }
}

impl<'a> From<&'a DependencyRow> for DependencyContent<'a> {
    fn from(row: &'a DependencyRow) -> Self {
        Self {
            package_id: row.package_id,
            dependent_package_version_id: row.dependent_package_version_id,
            dependency_type: &row.dependency_type,
            justification: &row.justification,
            origin: &row.origin,
            collector: &row.collector,
            document_ref: &row.document_ref,
        }
    }
}

/// Version 5 layout over a SHA-256 digest: first 16 bytes, version and variant bits overwritten.
pub fn hash_uuid(namespace: Uuid, name: &[u8]) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(name);
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_sha1_bytes(bytes).into_uuid()
}
