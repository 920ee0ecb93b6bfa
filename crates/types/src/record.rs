//! File record data model: identifiers, locators and permission descriptors.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum size of a stored locator in bytes.
pub const MAX_LOCATOR_BYTES: usize = 256;
/// Maximum size of a stored permission descriptor in bytes.
pub const MAX_PERMISSIONS_BYTES: usize = 128;
/// Literal token that grants public access.
pub const PUBLIC_TOKEN: &str = "public";
/// Separator between allow-list entries.
pub const PERMISSION_SEPARATOR: u8 = b',';
/// Separator used by the legacy concatenated `locator|permissions` form.
pub const LEGACY_SEPARATOR: u8 = b'|';

/// Reasons a record or identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file id must not be empty")]
    EmptyFileId,
    #[error("locator must not be empty")]
    EmptyLocator,
    #[error("locator too long: {actual} bytes (max 256)")]
    LocatorTooLong { actual: usize },
    #[error("permission descriptor must not be empty")]
    EmptyPermissions,
    #[error("permission descriptor too long: {actual} bytes (max 128)")]
    PermissionsTooLong { actual: usize },
    #[error("caller identity must not be the zero identity")]
    ZeroCaller,
}

/// Caller-chosen identifier for one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub Vec<u8>);

impl FileId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::EmptyFileId);
        }
        Ok(())
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => f.write_str(text),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

/// Opaque reference to file content. Never dereferenced by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator(pub Vec<u8>);

impl Locator {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Content-addressed locator: `blake3:` followed by the hex digest.
    pub fn from_content(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        Self(format!("blake3:{}", digest.to_hex()).into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::EmptyLocator);
        }
        if self.0.len() > MAX_LOCATOR_BYTES {
            return Err(ValidationError::LocatorTooLong {
                actual: self.0.len(),
            });
        }
        Ok(())
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// Access descriptor: either the `public` token or a comma-separated list of
/// encoded identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionDescriptor(pub Vec<u8>);

impl PermissionDescriptor {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn public() -> Self {
        Self(PUBLIC_TOKEN.as_bytes().to_vec())
    }

    /// Build an allow-list from identities, joined by `,`.
    pub fn allow_list(identities: &[Identity]) -> Self {
        let joined = identities
            .iter()
            .map(Identity::encode)
            .collect::<Vec<_>>()
            .join(",");
        Self(joined.into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Elements of the descriptor when split on `,`.
    pub fn entries(&self) -> impl Iterator<Item = &[u8]> {
        self.0.split(|b| *b == PERMISSION_SEPARATOR)
    }

    /// True if `public` occurs anywhere in the descriptor.
    pub fn contains_public_substring(&self) -> bool {
        self.0
            .windows(PUBLIC_TOKEN.len())
            .any(|window| window == PUBLIC_TOKEN.as_bytes())
    }

    /// True if one element of the descriptor is exactly `public`.
    pub fn has_public_token(&self) -> bool {
        self.entries().any(|entry| entry == PUBLIC_TOKEN.as_bytes())
    }

    /// True if the encoded form of `identity` is one of the elements.
    pub fn lists(&self, identity: &Identity) -> bool {
        let encoded = identity.encode();
        self.entries().any(|entry| entry == encoded.as_bytes())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::EmptyPermissions);
        }
        if self.0.len() > MAX_PERMISSIONS_BYTES {
            return Err(ValidationError::PermissionsTooLong {
                actual: self.0.len(),
            });
        }
        Ok(())
    }
}

impl From<&str> for PermissionDescriptor {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// Stored value for one file identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub locator: Locator,
    pub permissions: PermissionDescriptor,
}

impl FileRecord {
    pub fn new(locator: Locator, permissions: PermissionDescriptor) -> Self {
        Self {
            locator,
            permissions,
        }
    }

    /// Validate both fields independently against their caps.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.locator.validate()?;
        self.permissions.validate()?;
        Ok(())
    }

    /// Legacy `locator|permissions` projection.
    pub fn to_legacy_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.locator.0.len() + 1 + self.permissions.0.len());
        out.extend_from_slice(&self.locator.0);
        out.push(LEGACY_SEPARATOR);
        out.extend_from_slice(&self.permissions.0);
        out
    }
}

/// Record plus the identity that created it; the unit the stores hold together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub record: FileRecord,
    pub owner: Identity,
}
