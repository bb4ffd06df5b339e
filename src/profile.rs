//! Connection profiles: the per-user descriptors of a remote game server.
//!
//! A [ConnectionProfile] is immutable once stored. Editing is modelled as
//! delete-and-recreate through the add-server wizard.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::logutil::redact;

/// Chat platform user identifier (Telegram user ids are signed 64-bit).
pub type UserId = i64;

/// Per-user profile identifier. Unique only within one user's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(ProfileId)
    }
}

/// Remote server connection descriptor.
///
/// The credential is stored under the `password` key so data files written
/// by earlier releases keep loading.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "password")]
    pub credential: String,
}

impl ConnectionProfile {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            credential: credential.into(),
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &redact(&self.credential))
            .finish()
    }
}
