//! Per-host client cache
//!
//! A changelog touches every instance URL named by two manifests; the pool
//! builds one client per host, lazily, during request setup. After setup
//! the pool is only read, so the fan-out tasks can share it freely.

use crate::gitiles::{GitClient, GitilesClient};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

type ClientFactory = Box<dyn Fn(&str) -> Result<Arc<dyn GitClient>> + Send + Sync>;

/// Host URL -> client cache, request-scoped
pub struct ClientPool {
    clients: HashMap<String, Arc<dyn GitClient>>,
    factory: ClientFactory,
}

impl ClientPool {
    /// Pool that builds Gitiles REST clients
    pub fn gitiles() -> Self {
        Self::with_factory(Box::new(|host| {
            Ok(Arc::new(GitilesClient::new(host)?) as Arc<dyn GitClient>)
        }))
    }

    /// Pool with a caller-supplied factory; tests inject in-memory hosts
    pub fn with_factory(factory: ClientFactory) -> Self {
        Self {
            clients: HashMap::new(),
            factory,
        }
    }

    /// Client for `host`, constructing it on first use
    pub fn ensure(&mut self, host: &str) -> Result<Arc<dyn GitClient>> {
        if let Some(client) = self.clients.get(host) {
            return Ok(Arc::clone(client));
        }
        let client = (self.factory)(host)?;
        self.clients.insert(host.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Client for `host` if one was built during setup
    pub fn get(&self, host: &str) -> Option<Arc<dyn GitClient>> {
        self.clients.get(host).map(Arc::clone)
    }
}
