//! In-memory cluster for driving the scan in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::gvr::Gvr;
use crate::error::{ListError, ScanError};
use crate::kubernetes::{
    Instance, ResourceDiscovery, ResourceGroup, ResourceLister, ResourceTypeDescriptor,
};

pub fn descriptor(group: &str, name: &str, namespaced: bool) -> ResourceTypeDescriptor {
    ResourceTypeDescriptor {
        group: group.to_string(),
        version: String::new(),
        name: name.to_string(),
        kind: String::new(),
        namespaced,
    }
}

#[derive(Clone, Default)]
pub struct FakeCluster {
    groups: Vec<ResourceGroup>,
    instances: HashMap<String, Vec<Instance>>,
    failures: HashMap<String, String>,
    discovery_failure: Option<String>,
    cancel_on_list: Option<CancellationToken>,
    listed: Arc<Mutex<Vec<Gvr>>>,
}

impl FakeCluster {
    pub fn with_group(mut self, group_version: &str, resources: Vec<ResourceTypeDescriptor>) -> Self {
        self.groups.push(ResourceGroup {
            group_version: group_version.to_string(),
            resources,
        });
        self
    }

    pub fn with_instances(mut self, resource: &str, instances: Vec<Instance>) -> Self {
        self.instances.insert(resource.to_string(), instances);
        self
    }

    pub fn with_failure(mut self, resource: &str, cause: &str) -> Self {
        self.failures.insert(resource.to_string(), cause.to_string());
        self
    }

    pub fn with_discovery_failure(mut self, cause: &str) -> Self {
        self.discovery_failure = Some(cause.to_string());
        self
    }

    /// Trigger `token` as soon as the first listing starts
    pub fn cancel_on_first_list(mut self, token: CancellationToken) -> Self {
        self.cancel_on_list = Some(token);
        self
    }

    pub fn listed(&self) -> Vec<Gvr> {
        self.listed.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.listed.lock().unwrap().len()
    }
}

#[async_trait]
impl ResourceDiscovery for FakeCluster {
    async fn preferred_resources(&self) -> Result<Vec<ResourceGroup>, ScanError> {
        match &self.discovery_failure {
            Some(cause) => Err(ScanError::discovery(cause.clone())),
            None => Ok(self.groups.clone()),
        }
    }
}

#[async_trait]
impl ResourceLister for FakeCluster {
    async fn list(
        &self,
        gvr: &Gvr,
        _kind: &str,
        _namespaced: bool,
    ) -> Result<Vec<Instance>, ListError> {
        self.listed.lock().unwrap().push(gvr.clone());
        if let Some(token) = &self.cancel_on_list {
            token.cancel();
        }
        if let Some(cause) = self.failures.get(&gvr.resource) {
            return Err(ListError::new(gvr.clone(), cause.clone()));
        }
        Ok(self.instances.get(&gvr.resource).cloned().unwrap_or_default())
    }
}
