// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Group/version/resource resolution for discovered resource types.

use std::fmt;

use crate::kubernetes::ResourceTypeDescriptor;

/// Group reported by discovery for the legacy core API
const CORE_GROUP_MARKER: &str = "v1";

/// Identifier used to list instances of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// The `apiVersion` path segment used when building request URLs.
    ///
    /// Discovery reports the whole groupVersion (e.g. `apps/v1`) in the group
    /// field and frequently leaves the per-resource version empty, so an
    /// empty version yields the group alone.
    pub fn api_version(&self) -> String {
        match (self.group.is_empty(), self.version.is_empty()) {
            (true, _) => self.version.clone(),
            (false, true) => self.group.clone(),
            (false, false) => format!("{}/{}", self.group, self.version),
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group {:?} version {:?} resource {:?}",
            self.group, self.version, self.resource
        )
    }
}

/// Resolve a discovered descriptor into a listable identifier.
///
/// The core group is the only special case: discovery reports it with the
/// group set to `v1`, while listing needs an empty group and version `v1`.
// TODO: confirm against the discovery contract whether any groupVersion other
// than the literal "v1" can denote the core group.
pub fn resolve(descriptor: &ResourceTypeDescriptor) -> Gvr {
    if descriptor.group == CORE_GROUP_MARKER {
        Gvr::new("", CORE_GROUP_MARKER, descriptor.name.as_str())
    } else {
        Gvr::new(
            descriptor.group.as_str(),
            descriptor.version.as_str(),
            descriptor.name.as_str(),
        )
    }
}
