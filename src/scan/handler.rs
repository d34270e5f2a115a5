// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per resource type: list instances, walk their conditions, report anomalies.

use serde_json::Value;
use tracing::{debug, warn};

use super::counter::ResultCounters;
use super::gvr::{self, Gvr};
use super::{Job, ScanContext};
use crate::error::ScanError;
use crate::kubernetes::{Instance, ResourceLister};
use crate::output::{self, Anomaly};

/// One entry of `status.conditions`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    pub condition_type: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

impl Condition {
    /// Read a condition record; missing or non-string fields read as empty
    pub fn parse(value: &Value) -> Result<Self, ScanError> {
        let map = value.as_object().ok_or_else(|| ScanError::MalformedCondition {
            found: value.to_string(),
        })?;
        let field = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(Self {
            condition_type: field("type"),
            status: field("status"),
            reason: field("reason"),
            message: field("message"),
        })
    }
}

/// Check every instance of the job's resource type.
///
/// Listing failures are reported and contained here; the job then counts
/// as one checked type with nothing else checked.
pub async fn handle_resource_type<L: ResourceLister + ?Sized>(
    ctx: &ScanContext<L>,
    job: &Job,
    worker_id: usize,
) -> ResultCounters {
    let mut output = ResultCounters::default();
    let resource = &job.resource;

    if ctx.rules.is_skipped_resource(&resource.name) {
        debug!(resource = %resource.name, "Skipping resource type");
        return output;
    }

    let gvr = gvr::resolve(resource);
    output.checked_resource_types += 1;

    let instances = match ctx.lister.list(&gvr, &resource.kind, resource.namespaced).await {
        Ok(instances) => instances,
        Err(e) => {
            warn!(
                resource = %resource.name,
                group = %e.gvr.group,
                version = %e.gvr.version,
                error = %e,
                "Error listing resource type"
            );
            ctx.sink
                .line(&output::list_error_line(&resource.name, &e.gvr, &e));
            return output;
        }
    };

    check_instances(ctx, &gvr, &instances, &mut output);

    if ctx.verbose {
        ctx.sink.line(&output::checked_line(&gvr, worker_id));
    }
    output
}

fn check_instances<L: ?Sized>(
    ctx: &ScanContext<L>,
    gvr: &Gvr,
    instances: &[Instance],
    output: &mut ResultCounters,
) {
    for instance in instances {
        output.checked_resources += 1;
        for value in &instance.conditions {
            let condition = match Condition::parse(value) {
                Ok(c) => c,
                Err(e) => {
                    warn!(
                        resource = %gvr.resource,
                        namespace = %instance.namespace,
                        name = %instance.name,
                        error = %e,
                        "Skipping condition"
                    );
                    continue;
                }
            };
            output.checked_conditions += 1;

            if ctx
                .rules
                .should_suppress(&gvr.resource, &condition.condition_type, &condition.status)
            {
                continue;
            }
            ctx.sink.line(&output::anomaly_line(&Anomaly {
                namespace: &instance.namespace,
                resource: &gvr.resource,
                name: &instance.name,
                condition_type: &condition.condition_type,
                status: &condition.status,
                reason: &condition.reason,
                message: &condition.message,
            }));
        }
    }
}
