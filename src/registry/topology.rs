//! Server registry implementation
//!
//! Group map guarded by a single RwLock; the frozen flag lives under the
//! same lock so registration and binding never interleave.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Endpoint, ServerSpec, DEFAULT_GROUP};
use crate::error::{FlatError, Result};

/// Endpoints registered for one group, in registration order
#[derive(Debug, Clone)]
pub struct ServerGroup {
    name: Option<String>,
    endpoints: Arc<[Endpoint]>,
    total_weight: u64,
}

impl ServerGroup {
    pub fn new(name: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        let total_weight = endpoints.iter().map(|e| u64::from(e.weight.max(1))).sum();
        Self {
            name: Some(name.into()),
            endpoints: endpoints.into(),
            total_weight,
        }
    }

    /// Binding used when no group is configured at all; routing on it fails
    pub fn empty() -> Self {
        Self {
            name: None,
            endpoints: Arc::from(Vec::new()),
            total_weight: 0,
        }
    }

    /// Group name, `None` for the empty binding
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    groups: BTreeMap<String, Vec<Endpoint>>,
    frozen: bool,
}

/// Shard topology shared by every client built from it
///
/// Constructed explicitly and handed to clients behind an `Arc`.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    inner: RwLock<Inner>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an endpoint to `group` (default `"*"`)
    ///
    /// Fails once any client has been bound to this registry; the frozen
    /// topology is left untouched.
    pub fn add_server(
        &self,
        host: impl Into<String>,
        port: u16,
        weight: u32,
        group: Option<&str>,
    ) -> Result<()> {
        let host = host.into();
        let group = group.unwrap_or(DEFAULT_GROUP);

        let mut inner = self.inner.write();
        if inner.frozen {
            tracing::error!(
                "Rejected {}:{} for group {:?}: registry is frozen",
                host,
                port,
                group
            );
            return Err(FlatError::Config(format!(
                "cannot add {}:{} to group {:?} after a client was created; register all servers first",
                host, port, group
            )));
        }

        let endpoint = Endpoint::new(host, port, weight);
        tracing::debug!(
            "Registered {} (weight {}) in group {:?}",
            endpoint,
            endpoint.weight,
            group
        );
        inner
            .groups
            .entry(group.to_string())
            .or_default()
            .push(endpoint);
        Ok(())
    }

    /// Register a parsed spec
    pub fn add_spec(&self, spec: &ServerSpec) -> Result<()> {
        self.add_server(spec.host.clone(), spec.port, spec.weight, spec.group.as_deref())
    }

    /// Register every well-formed `host:port[:weight[:group]]` entry
    ///
    /// Malformed entries are logged and skipped. Returns how many endpoints
    /// were added.
    pub fn add_servers<I, S>(&self, specs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for raw in specs {
            let raw = raw.as_ref();
            let spec = match raw.parse::<ServerSpec>() {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(
                        "Skipping server entry {:?}, expected host:port[:weight[:group]]: {}",
                        raw,
                        e
                    );
                    continue;
                }
            };
            match self.add_spec(&spec) {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!("Skipping server entry {:?}: {}", raw, e),
            }
        }
        added
    }

    /// Resolve the group a client should bind to and freeze the registry
    ///
    /// Falls back to the default group when `group` is absent, and to an
    /// empty binding when neither exists.
    pub fn bind(&self, group: Option<&str>) -> ServerGroup {
        let mut inner = self.inner.write();
        inner.frozen = true;

        let requested = group.unwrap_or(DEFAULT_GROUP);
        let resolved = if inner.groups.contains_key(requested) {
            Some(requested)
        } else if inner.groups.contains_key(DEFAULT_GROUP) {
            Some(DEFAULT_GROUP)
        } else {
            None
        };

        match resolved {
            Some(name) => {
                if name != requested {
                    tracing::debug!(
                        "Group {:?} not registered, falling back to {:?}",
                        requested,
                        DEFAULT_GROUP
                    );
                }
                ServerGroup::new(name, inner.groups[name].clone())
            }
            None => {
                tracing::error!("No servers configured, register endpoints before creating clients");
                ServerGroup::empty()
            }
        }
    }

    /// Whether a client has already been bound
    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    pub fn group_names(&self) -> Vec<String> {
        self.inner.read().groups.keys().cloned().collect()
    }

    /// Snapshot of a group's endpoints without freezing
    pub fn endpoints(&self, group: &str) -> Vec<Endpoint> {
        self.inner
            .read()
            .groups
            .get(group)
            .cloned()
            .unwrap_or_default()
    }
}
