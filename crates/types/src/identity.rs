//! Actor identities as resolved by the host.
//!
//! The text form is `i` followed by the base58 encoding of the 32 raw
//! bytes, at most 45 characters, so two identities fit in one permission
//! descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw identity width in bytes.
pub const IDENTITY_BYTES: usize = 32;
/// Marker character that starts every encoded identity.
pub const IDENTITY_PREFIX: char = 'i';
/// Longest possible encoded identity (prefix plus 44 base58 digits).
pub const MAX_ENCODED_IDENTITY_LEN: usize = 45;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("encoded identity is missing the 'i' prefix")]
    MissingPrefix,
    #[error("encoded identity is not base58: {0}")]
    Base58(#[from] bs58::decode::Error),
    #[error("encoded identity decodes to {actual} bytes, expected 32")]
    WrongWidth { actual: usize },
}

/// Authenticated actor performing an operation.
///
/// Serialised as its encoded string so stored owner entries stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(pub [u8; IDENTITY_BYTES]);

impl Identity {
    /// Sentinel returned for owners of absent records.
    pub const ZERO: Identity = Identity([0u8; IDENTITY_BYTES]);

    pub fn from_bytes(bytes: [u8; IDENTITY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_BYTES] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Deterministic identity from an arbitrary seed (BLAKE3).
    pub fn derive(seed: &[u8]) -> Self {
        Self(*blake3::hash(seed).as_bytes())
    }

    /// The textual form compared against permission descriptor entries.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(MAX_ENCODED_IDENTITY_LEN);
        out.push(IDENTITY_PREFIX);
        out.push_str(&bs58::encode(self.0).into_string());
        out
    }

    pub fn decode(encoded: &str) -> Result<Self, IdentityError> {
        let digits = encoded
            .strip_prefix(IDENTITY_PREFIX)
            .ok_or(IdentityError::MissingPrefix)?;
        let raw = bs58::decode(digits).into_vec()?;
        let actual = raw.len();
        let bytes: [u8; IDENTITY_BYTES] = raw
            .try_into()
            .map_err(|_| IdentityError::WrongWidth { actual })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl From<[u8; IDENTITY_BYTES]> for Identity {
    fn from(value: [u8; IDENTITY_BYTES]) -> Self {
        Identity(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.encode()
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}
