//! Endpoint definitions
//!
//! A single backend shard and the textual form used to register one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlatError, Result};

/// Name of the group used when none is given
pub const DEFAULT_GROUP: &str = "*";

/// One backend store instance with its routing weight
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Routing weight, never below 1
    pub weight: u32,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, weight: u32) -> Self {
        Self {
            host: host.into(),
            port,
            weight: weight.max(1),
        }
    }

    /// Identity used for connection reuse
    pub fn id(&self) -> EndpointId {
        EndpointId {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Connection identity of an endpoint: weight does not matter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Textual server registration: `host:port[:weight[:group]]`
///
/// IPv6 hosts are written in brackets, e.g. `[::1]:11211:2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub group: Option<String>,
}

impl FromStr for ServerSpec {
    type Err = FlatError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, rest) = if let Some(stripped) = s.strip_prefix('[') {
            let end = stripped
                .find(']')
                .ok_or_else(|| FlatError::Config(format!("unterminated IPv6 host in {:?}", s)))?;
            let rest = &stripped[end + 1..];
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            (&stripped[..end], rest)
        } else {
            match s.split_once(':') {
                Some((host, rest)) => (host, rest),
                None => (s, ""),
            }
        };

        if host.is_empty() {
            return Err(FlatError::Config(format!("missing host in {:?}", s)));
        }

        let mut parts = rest.splitn(3, ':');
        let port = match parts.next() {
            Some(p) if !p.is_empty() => p
                .parse::<u16>()
                .map_err(|e| FlatError::Config(format!("bad port in {:?}: {}", s, e)))?,
            _ => return Err(FlatError::Config(format!("missing port in {:?}", s))),
        };
        let weight = match parts.next() {
            Some(w) if !w.is_empty() => w
                .parse::<u32>()
                .map_err(|e| FlatError::Config(format!("bad weight in {:?}: {}", s, e)))?,
            _ => 1,
        };
        let group = parts.next().filter(|g| !g.is_empty()).map(str::to_string);

        Ok(Self {
            host: host.to_string(),
            port,
            weight,
            group,
        })
    }
}
