//! Read-access evaluation for stored records.
//!
//! Evaluation is pure: it looks at a loaded entry and a requester and never
//! touches storage.

use filereg_types::{Identity, StoredEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the `public` token is recognised in a permission descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicMatch {
    /// `public` anywhere in the descriptor, e.g. `notpublicly,alice` matches.
    #[default]
    Substring,
    /// Only an element exactly equal to `public` matches.
    ExactToken,
}

impl FromStr for PublicMatch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "substring" => Ok(PublicMatch::Substring),
            "exact_token" | "exact-token" | "exact" => Ok(PublicMatch::ExactToken),
            other => Err(format!("unknown public match mode: {other}")),
        }
    }
}

impl fmt::Display for PublicMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            PublicMatch::Substring => "substring",
            PublicMatch::ExactToken => "exact_token",
        };
        f.write_str(value)
    }
}

/// Reason access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    Owner,
    Public,
    Listed,
}

/// Decide whether `requester` may read `entry`.
///
/// Checked in order: ownership, the public token, then allow-list membership
/// of the requester's encoded identity.
pub fn evaluate(
    entry: &StoredEntry,
    requester: &Identity,
    mode: PublicMatch,
) -> Option<AccessGrant> {
    if entry.owner == *requester {
        return Some(AccessGrant::Owner);
    }

    let permissions = &entry.record.permissions;
    let public = match mode {
        PublicMatch::Substring => permissions.contains_public_substring(),
        PublicMatch::ExactToken => permissions.has_public_token(),
    };
    if public {
        return Some(AccessGrant::Public);
    }

    if permissions.lists(requester) {
        return Some(AccessGrant::Listed);
    }

    None
}
