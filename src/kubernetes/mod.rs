mod client;
pub mod discovery;

pub use client::K8sClient;

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::Value;

use crate::error::{ListError, ScanError};
use crate::scan::gvr::Gvr;

/// A resource type as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeDescriptor {
    /// groupVersion as reported by discovery (`v1` for the core group)
    pub group: String,
    /// Version reported on the resource itself, often empty
    pub version: String,
    /// Plural resource name (e.g., "pods", "pods/status")
    pub name: String,
    pub kind: String,
    pub namespaced: bool,
}

/// The resources discovery returned for one groupVersion
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub group_version: String,
    pub resources: Vec<ResourceTypeDescriptor>,
}

/// Minimal view of a live object: where it lives and its raw conditions
#[derive(Debug, Clone, Default)]
pub struct Instance {
    /// Empty for cluster-scoped objects
    pub namespace: String,
    pub name: String,
    /// Raw `status.conditions` entries in server order
    pub conditions: Vec<Value>,
}

impl Instance {
    /// Extract the condition list from an object's status.
    /// A missing or non-array `status.conditions` means no conditions.
    pub fn from_value(namespace: Option<String>, name: Option<String>, data: &Value) -> Self {
        let conditions = data
            .pointer("/status/conditions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Self {
            namespace: namespace.unwrap_or_default(),
            name: name.unwrap_or_default(),
            conditions,
        }
    }
}

impl From<DynamicObject> for Instance {
    fn from(obj: DynamicObject) -> Self {
        Self::from_value(obj.metadata.namespace, obj.metadata.name, &obj.data)
    }
}

/// Enumerates the preferred version of every served resource type
#[async_trait]
pub trait ResourceDiscovery: Send + Sync {
    async fn preferred_resources(&self) -> Result<Vec<ResourceGroup>, ScanError>;
}

/// Lists all live instances of one resource type
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list(
        &self,
        gvr: &Gvr,
        kind: &str,
        namespaced: bool,
    ) -> Result<Vec<Instance>, ListError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_conditions() {
        let data = json!({
            "status": {
                "conditions": [
                    {"type": "Ready", "status": "True"},
                    {"type": "PodScheduled", "status": "True"}
                ]
            }
        });
        let instance = Instance::from_value(Some("default".into()), Some("web-0".into()), &data);
        assert_eq!(instance.namespace, "default");
        assert_eq!(instance.name, "web-0");
        assert_eq!(instance.conditions.len(), 2);
        assert_eq!(instance.conditions[1]["type"], "PodScheduled");
    }

    #[test]
    fn test_instance_without_conditions() {
        let instance = Instance::from_value(None, Some("node-1".into()), &json!({"spec": {}}));
        assert_eq!(instance.namespace, "");
        assert!(instance.conditions.is_empty());

        let instance = Instance::from_value(None, None, &json!({"status": {"conditions": "bogus"}}));
        assert!(instance.conditions.is_empty());

        let instance = Instance::from_value(None, None, &json!({"status": "Running"}));
        assert!(instance.conditions.is_empty());
    }

    #[test]
    fn test_instance_from_dynamic_object() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": "node-1"},
            "status": {"conditions": [{"type": "MemoryPressure", "status": "False"}]}
        }))
        .unwrap();
        let instance = Instance::from(obj);
        assert_eq!(instance.name, "node-1");
        assert_eq!(instance.namespace, "");
        assert_eq!(instance.conditions.len(), 1);
    }
}
