// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource discovery for Kubernetes clusters.
//!
//! Walks the legacy core API and every version of every named API group.
//! Each (group, resource) pair is reported once: from the group's preferred
//! version when that version serves it, otherwise from the first version
//! that does. Resources are kept exactly as the server lists them
//! (subresources included; filtering happens in the scan).

use std::collections::HashMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, APIResource, APIResourceList};
use kube::Client;
use tracing::{debug, warn};

use super::{ResourceGroup, ResourceTypeDescriptor};
use crate::error::ScanError;

/// Discover the preferred resources of every API group on the cluster
pub async fn discover_preferred_resources(client: &Client) -> Result<Vec<ResourceGroup>, ScanError> {
    let mut groups = Vec::new();

    let core = client
        .list_core_api_versions()
        .await
        .map_err(ScanError::discovery)?;
    let mut core_lists = Vec::new();
    for version in &core.versions {
        let list = client
            .list_core_api_resources(version)
            .await
            .map_err(ScanError::discovery)?;
        core_lists.push(list);
    }
    // The legacy API has no preferred version; the first one listed wins
    let core_preferred = core.versions.first().cloned();
    groups.extend(merge_versions(core_preferred.as_deref(), core_lists));

    let api_groups = client.list_api_groups().await.map_err(ScanError::discovery)?;
    for group in &api_groups.groups {
        if group.versions.is_empty() {
            warn!(group = %group.name, "API group reports no versions, skipping");
            continue;
        }

        let mut lists = Vec::with_capacity(group.versions.len());
        for version in &group.versions {
            // A single broken aggregated API must not hide the rest of the catalog
            match client.list_api_group_resources(&version.group_version).await {
                Ok(list) => lists.push(list),
                Err(e) => {
                    warn!(
                        group_version = %version.group_version,
                        error = %e,
                        "Failed to discover API group resources, skipping"
                    );
                }
            }
        }
        groups.extend(merge_versions(preferred_group_version(group), lists));
    }

    debug!(
        groups = groups.len(),
        resources = groups.iter().map(|g| g.resources.len()).sum::<usize>(),
        "Discovery complete"
    );

    Ok(groups)
}

/// The group's preferred groupVersion, falling back to the first listed one
fn preferred_group_version(group: &APIGroup) -> Option<&str> {
    group
        .preferred_version
        .as_ref()
        .or_else(|| group.versions.first())
        .map(|v| v.group_version.as_str())
}

/// Collapse the versions of one group to a single entry per resource.
///
/// `lists` are in server order. A resource seen in several versions is taken
/// from `preferred` if that version serves it, otherwise from the first
/// version listing it. Group versions left without resources are dropped.
fn merge_versions(preferred: Option<&str>, lists: Vec<APIResourceList>) -> Vec<ResourceGroup> {
    let mut selected: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(usize, APIResource)> = Vec::new();

    for (list_index, list) in lists.iter().enumerate() {
        let is_preferred = preferred == Some(list.group_version.as_str());
        for resource in &list.resources {
            match selected.get(&resource.name) {
                Some(&entry) if is_preferred => {
                    entries[entry] = (list_index, resource.clone());
                }
                Some(_) => {}
                None => {
                    selected.insert(resource.name.clone(), entries.len());
                    entries.push((list_index, resource.clone()));
                }
            }
        }
    }

    let mut per_version: Vec<Vec<APIResource>> = vec![Vec::new(); lists.len()];
    for (list_index, resource) in entries {
        per_version[list_index].push(resource);
    }

    lists
        .into_iter()
        .zip(per_version)
        .filter(|(_, resources)| !resources.is_empty())
        .map(|(list, resources)| {
            to_resource_group(APIResourceList {
                group_version: list.group_version,
                resources,
            })
        })
        .collect()
}

fn to_resource_group(list: APIResourceList) -> ResourceGroup {
    let resources = list
        .resources
        .into_iter()
        .map(|r| ResourceTypeDescriptor {
            group: list.group_version.clone(),
            version: r.version.unwrap_or_default(),
            name: r.name,
            kind: r.kind,
            namespaced: r.namespaced,
        })
        .collect();
    ResourceGroup {
        group_version: list.group_version,
        resources,
    }
}
