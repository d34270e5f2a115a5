// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Heuristics deciding which condition states are healthy.
//!
//! Conditions differ between resource kinds, so instead of per-kind schemas
//! the decision is driven by lookup tables: labels whose value never matters,
//! per-resource overrides, and suffixes that tell whether `True` or `False`
//! is the expected state. The tables are plain data so they can be extended
//! from the config file without touching the scan.

use std::collections::{HashMap, HashSet};

use crate::config::Config;

/// Meta-resources that can be created but never listed
pub const SKIPPED_RESOURCES: &[&str] = &[
    "bindings",
    "tokenreviews",
    "selfsubjectaccessreviews",
    "selfsubjectrulesreviews",
    "localsubjectaccessreviews",
    "subjectaccessreviews",
    "componentstatuses",
];

/// Conditions where both `True` and `False` are fine
pub const STATUS_AGNOSTIC_CONDITIONS: &[&str] = &[
    "DisruptionAllowed",
    "LoadBalancerAttachedToNetwork",
    "NetworkAttached",
];

/// Condition type suffixes where `True` is the healthy state
pub const POSITIVE_SUFFIXES: &[&str] = &[
    "Ready",
    "Succeeded",
    "Healthy",
    "Available",
    "Approved",
    "Initialized",
    "PodScheduled",
    "Complete",
    "Established",
    "NamesAccepted",
    "Synced",
    "Created",
    "Resized",
    "Progressing",
    "RemediationAllowed",
    "LoadBalancerAttached",
];

/// Condition type suffixes where `False` is the healthy state
pub const NEGATIVE_SUFFIXES: &[&str] = &["Unavailable", "Pressure", "Dangling"];

/// Per-resource condition types with positive meaning that match no suffix
pub const POSITIVE_CONDITIONS: &[(&str, &[&str])] =
    &[("hetznerbaremetalmachines", &["AssociateBMHCondition"])];

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";

fn owned<C: FromIterator<String>>(items: &[&str]) -> C {
    items.iter().map(|s| s.to_string()).collect()
}

/// Immutable lookup tables shared by all workers
#[derive(Debug, Clone)]
pub struct Rules {
    skipped_resources: HashSet<String>,
    status_agnostic: HashSet<String>,
    positive_conditions: HashMap<String, HashSet<String>>,
    positive_suffixes: Vec<String>,
    negative_suffixes: Vec<String>,
}

impl Default for Rules {
    fn default() -> Self {
        let positive_conditions = POSITIVE_CONDITIONS
            .iter()
            .map(|(resource, types)| (resource.to_string(), owned(types)))
            .collect();

        Self {
            skipped_resources: owned(SKIPPED_RESOURCES),
            status_agnostic: owned(STATUS_AGNOSTIC_CONDITIONS),
            positive_conditions,
            positive_suffixes: owned(POSITIVE_SUFFIXES),
            negative_suffixes: owned(NEGATIVE_SUFFIXES),
        }
    }
}

impl Rules {
    /// Built-in tables extended with the entries from the config file
    pub fn from_config(config: &Config) -> Self {
        let mut rules = Self::default();
        rules
            .skipped_resources
            .extend(config.skip_resources.iter().cloned());
        rules
            .status_agnostic
            .extend(config.status_agnostic_conditions.iter().cloned());
        for (resource, types) in &config.positive_conditions {
            rules
                .positive_conditions
                .entry(resource.clone())
                .or_default()
                .extend(types.iter().cloned());
        }
        for suffix in &config.positive_suffixes {
            if !rules.positive_suffixes.contains(suffix) {
                rules.positive_suffixes.push(suffix.clone());
            }
        }
        for suffix in &config.negative_suffixes {
            if !rules.negative_suffixes.contains(suffix) {
                rules.negative_suffixes.push(suffix.clone());
            }
        }
        rules
    }

    /// Subresources (`pods/status`) and meta-resources are not collections
    pub fn is_skipped_resource(&self, name: &str) -> bool {
        name.contains('/') || self.skipped_resources.contains(name)
    }

    /// Decide whether a condition state is expected and should not be reported.
    ///
    /// First match wins: status-agnostic labels, then positive meaning with
    /// `True`, then negative meaning with `False`.
    pub fn should_suppress(&self, resource: &str, condition_type: &str, status: &str) -> bool {
        if self.status_agnostic.contains(condition_type) {
            return true;
        }
        if status == STATUS_TRUE && self.has_positive_meaning(resource, condition_type) {
            return true;
        }
        status == STATUS_FALSE && self.has_negative_meaning(condition_type)
    }

    fn has_positive_meaning(&self, resource: &str, condition_type: &str) -> bool {
        if self
            .positive_conditions
            .get(resource)
            .is_some_and(|types| types.contains(condition_type))
        {
            return true;
        }
        self.positive_suffixes
            .iter()
            .any(|suffix| condition_type.ends_with(suffix.as_str()))
    }

    fn has_negative_meaning(&self, condition_type: &str) -> bool {
        self.negative_suffixes
            .iter()
            .any(|suffix| condition_type.ends_with(suffix.as_str()))
    }
}
