// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Concurrent scan over every discovered resource type.
//!
//! The orchestrator discovers the catalog once and feeds one job per
//! resource type into an unbuffered queue. A fixed pool of workers handles
//! the jobs and sends per-type counters to a single aggregator task, which
//! is the only owner of the totals. The results channel closes once every
//! worker has exited, which lets the aggregator finish.

pub mod classify;
pub mod counter;
pub mod gvr;
pub mod handler;
pub mod pool;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ScanError;
use crate::kubernetes::{ResourceDiscovery, ResourceLister, ResourceTypeDescriptor};
use crate::output::{self, OutputSink};
use classify::Rules;
use counter::{Counter, spawn_aggregator};

/// Work item: one discovered resource type
#[derive(Debug, Clone)]
pub struct Job {
    pub resource: Arc<ResourceTypeDescriptor>,
}

/// Read-only state shared by every worker
pub struct ScanContext<L: ?Sized> {
    pub lister: Arc<L>,
    pub rules: Arc<Rules>,
    pub sink: Arc<OutputSink>,
    /// Print a trace line after each listed resource type
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub workers: usize,
    pub verbose: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: crate::config::DEFAULT_WORKERS,
            verbose: false,
        }
    }
}

/// Resource types found by discovery
#[derive(Debug, Clone)]
pub struct Catalog {
    pub resources: Vec<Arc<ResourceTypeDescriptor>>,
    /// The reported scan duration is measured from here
    pub started_at: Instant,
}

/// Outcome of a finished (or interrupted) scan
#[derive(Debug, Clone, Copy)]
pub struct ScanReport {
    pub counter: Counter,
    pub elapsed: Duration,
    /// Discovered resource types
    pub discovered: usize,
    /// Types that were never enqueued because the scan was cancelled
    pub not_enqueued: usize,
}

impl ScanReport {
    pub fn interrupted(&self) -> bool {
        self.not_enqueued > 0
    }
}

/// Fetch the resource-type catalog. Failure here is fatal for the scan.
pub async fn discover<D>(cluster: &D) -> Result<Catalog, ScanError>
where
    D: ResourceDiscovery + ?Sized,
{
    let started_at = Instant::now();
    let groups = cluster.preferred_resources().await?;
    let mut resources: Vec<Arc<ResourceTypeDescriptor>> = Vec::new();
    for group in groups {
        debug!(group_version = %group.group_version, resources = group.resources.len(), "Discovered group");
        resources.extend(group.resources.into_iter().map(Arc::new));
    }
    Ok(Catalog {
        resources,
        started_at,
    })
}

/// Check every catalog entry concurrently and print the summary.
///
/// Everything that goes wrong for a single resource type is reported on the
/// sink and reflected in the counters. Cancelling `cancel` stops enqueuing;
/// jobs already queued still run.
pub async fn run_scan<L>(
    lister: Arc<L>,
    catalog: Catalog,
    rules: Arc<Rules>,
    sink: Arc<OutputSink>,
    options: ScanOptions,
    cancel: CancellationToken,
) -> ScanReport
where
    L: ResourceLister + 'static,
{
    let counter = Counter::started_at(catalog.started_at);
    let discovered = catalog.resources.len();
    let workers = options.workers.max(1);

    info!(resource_types = discovered, workers, "Starting scan");

    let (job_tx, job_rx) = mpsc::channel::<Job>(1);
    let (result_tx, result_rx) = mpsc::channel(1);

    let ctx = Arc::new(ScanContext {
        lister,
        rules,
        sink: Arc::clone(&sink),
        verbose: options.verbose,
    });
    let handles = pool::spawn_workers(
        workers,
        ctx,
        Arc::new(Mutex::new(job_rx)),
        result_tx.clone(),
    );
    let aggregator = spawn_aggregator(counter, result_rx);

    let mut enqueued = 0usize;
    for resource in catalog.resources {
        let job = Job { resource };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(enqueued, remaining = discovered - enqueued, "Scan cancelled, not enqueuing further jobs");
                break;
            }
            sent = job_tx.send(job) => {
                if sent.is_err() {
                    break;
                }
                enqueued += 1;
            }
        }
    }
    // Closing the queue lets idle workers exit
    drop(job_tx);

    for joined in futures::future::join_all(handles).await {
        if let Err(e) = joined {
            error!(error = %e, "Worker task failed");
        }
    }
    drop(result_tx);

    let counter = match aggregator.await {
        Ok(counter) => counter,
        Err(e) => {
            error!(error = %e, "Aggregator task failed");
            counter
        }
    };

    let elapsed = counter.elapsed();
    sink.line(&output::summary_line(&counter, elapsed));

    let report = ScanReport {
        counter,
        elapsed,
        discovered,
        not_enqueued: discovered - enqueued,
    };
    if report.interrupted() {
        sink.line(&format!(
            "Scan interrupted: {} resource types not checked",
            report.not_enqueued
        ));
    }

    let totals = counter.totals();
    info!(
        conditions = totals.checked_conditions,
        resources = totals.checked_resources,
        resource_types = totals.checked_resource_types,
        elapsed_ms = elapsed.as_millis() as u64,
        "Scan finished"
    );

    report
}

/// Escalate interrupts: the first cancels `cancel`, the second returns `true`.
///
/// `interrupt` resolves to `false` when no further interrupt can arrive, in
/// which case this returns `false` without forcing anything.
pub async fn handle_interrupts<F, Fut>(cancel: CancellationToken, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupt().await {
        return false;
    }
    warn!("Interrupted, finishing resource types already in progress (interrupt again to exit now)");
    cancel.cancel();

    if !interrupt().await {
        return false;
    }
    warn!("Interrupted again, exiting");
    true
}

#[cfg(test)]
mod tests {
    use super::counter::ResultCounters;
    use super::testing::{FakeCluster, descriptor};
    use super::*;
    use crate::kubernetes::Instance;
    use crate::output::testing::Captured;
    use serde_json::json;

    async fn scan(
        cluster: FakeCluster,
        workers: usize,
        cancel: CancellationToken,
    ) -> (Result<ScanReport, ScanError>, Captured) {
        let captured = Captured::default();
        let catalog = match discover(&cluster).await {
            Ok(catalog) => catalog,
            Err(e) => return (Err(e), captured),
        };
        let report = run_scan(
            Arc::new(cluster),
            catalog,
            Arc::new(Rules::default()),
            Arc::new(OutputSink::new(captured.clone())),
            ScanOptions {
                workers,
                verbose: false,
            },
            cancel,
        )
        .await;
        (Ok(report), captured)
    }

    fn pod(name: &str, conditions: serde_json::Value) -> Instance {
        Instance::from_value(
            Some("default".to_string()),
            Some(name.to_string()),
            &json!({"status": {"conditions": conditions}}),
        )
    }

    #[tokio::test]
    async fn test_single_pod_type_end_to_end() {
        let cluster = FakeCluster::default()
            .with_group("v1", vec![descriptor("v1", "pods", true)])
            .with_instances(
                "pods",
                vec![
                    pod("web-0", json!([{"type": "Ready", "status": "True"}])),
                    pod(
                        "web-1",
                        json!([{"type": "Ready", "status": "False", "reason": "Unschedulable", "message": "no nodes"}]),
                    ),
                ],
            );

        let (report, captured) = scan(cluster, 50, CancellationToken::new()).await;
        let report = report.unwrap();

        assert_eq!(
            report.counter.totals(),
            ResultCounters {
                checked_resource_types: 1,
                checked_resources: 2,
                checked_conditions: 2,
            }
        );
        assert!(!report.interrupted());

        let lines = captured.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"  default pods web-1 Condition Ready=False Unschedulable "no nodes""#
        );
        assert!(lines[1].starts_with("Checked 2 conditions of 2 resources of 1 types. Duration: "));
    }

    #[tokio::test]
    async fn test_list_failure_does_not_stop_scan() {
        let cluster = FakeCluster::default()
            .with_group(
                "v1",
                vec![descriptor("v1", "pods", true), descriptor("v1", "secrets", true)],
            )
            .with_instances("pods", vec![pod("web-0", json!([{"type": "Ready", "status": "True"}]))])
            .with_failure("secrets", "forbidden");

        let (report, captured) = scan(cluster, 2, CancellationToken::new()).await;
        let report = report.unwrap();

        assert_eq!(report.counter.checked_resource_types, 2);
        assert_eq!(report.counter.checked_resources, 1);
        assert_eq!(report.counter.checked_conditions, 1);

        let output = captured.contents();
        assert!(output.contains("..Error listing secrets: forbidden."));
        assert!(output.contains("Checked 1 conditions of 1 resources of 2 types."));
    }

    #[tokio::test]
    async fn test_subresources_and_meta_resources_are_not_listed() {
        let cluster = FakeCluster::default()
            .with_group(
                "v1",
                vec![
                    descriptor("v1", "pods", true),
                    descriptor("v1", "pods/status", true),
                    descriptor("v1", "bindings", true),
                    descriptor("v1", "componentstatuses", false),
                ],
            )
            .with_group(
                "authentication.k8s.io/v1",
                vec![descriptor("authentication.k8s.io/v1", "tokenreviews", false)],
            )
            .with_instances("pods", vec![]);
        let cluster = Arc::new(cluster);
        let catalog = discover(&*cluster).await.unwrap();

        let report = run_scan(
            Arc::clone(&cluster),
            catalog,
            Arc::new(Rules::default()),
            Arc::new(OutputSink::new(Captured::default())),
            ScanOptions::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(report.discovered, 5);
        assert_eq!(report.counter.checked_resource_types, 1);
        assert_eq!(cluster.listed(), vec![gvr::Gvr::new("", "v1", "pods")]);
    }

    #[tokio::test]
    async fn test_totals_are_sum_of_jobs() {
        let mut cluster = FakeCluster::default();
        let mut descriptors = Vec::new();
        let mut expected = ResultCounters::default();
        for i in 0..20 {
            let name = format!("widgets{}", i);
            descriptors.push(descriptor("example.com/v1", &name, true));
            let instances: Vec<_> = (0..i % 4)
                .map(|n| {
                    pod(
                        &format!("w-{}", n),
                        json!([{"type": "Ready", "status": "True"}, {"type": "Synced", "status": "True"}]),
                    )
                })
                .collect();
            expected += ResultCounters {
                checked_resource_types: 1,
                checked_resources: instances.len() as u64,
                checked_conditions: 2 * instances.len() as u64,
            };
            cluster = cluster.with_instances(&name, instances);
        }
        let cluster = cluster.with_group("example.com/v1", descriptors);

        for workers in [1, 3, 50] {
            let (report, captured) = scan(cluster.clone(), workers, CancellationToken::new()).await;
            assert_eq!(report.unwrap().counter.totals(), expected);
            // Only the summary line: everything was healthy
            assert_eq!(captured.lines().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_discovery_failure_is_fatal() {
        let cluster = FakeCluster::default().with_discovery_failure("connection refused");
        let (report, captured) = scan(cluster, 4, CancellationToken::new()).await;

        let err = report.unwrap_err();
        assert!(matches!(err, ScanError::Discovery { .. }));
        assert!(captured.contents().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cluster = FakeCluster::default().with_group(
            "v1",
            vec![descriptor("v1", "pods", true), descriptor("v1", "nodes", false)],
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (report, captured) = scan(cluster, 4, cancel).await;
        let report = report.unwrap();

        assert!(report.interrupted());
        assert_eq!(report.not_enqueued, 2);
        assert_eq!(report.counter.totals(), ResultCounters::default());
        let lines = captured.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Checked 0 conditions of 0 resources of 0 types."));
        assert_eq!(lines[1], "Scan interrupted: 2 resource types not checked");
    }

    #[tokio::test]
    async fn test_cancel_mid_scan_finishes_queued_jobs() {
        let cancel = CancellationToken::new();
        let descriptors: Vec<_> = (0..10)
            .map(|i| descriptor("example.com/v1", &format!("widgets{}", i), true))
            .collect();
        let cluster = FakeCluster::default()
            .with_group("example.com/v1", descriptors)
            .cancel_on_first_list(cancel.clone());

        let (report, _) = scan(cluster, 1, cancel).await;
        let report = report.unwrap();

        assert!(report.interrupted());
        assert_eq!(report.discovered, 10);
        // Every enqueued job ran to completion
        assert_eq!(
            report.counter.checked_resource_types as usize + report.not_enqueued,
            report.discovered
        );
    }

    #[tokio::test]
    async fn test_discovery_is_separate_from_scan() {
        let cluster = FakeCluster::default()
            .with_group("v1", vec![descriptor("v1", "pods", true)])
            .with_group(
                "apps/v1",
                vec![descriptor("apps/v1", "deployments", true)],
            );

        let catalog = discover(&cluster).await.unwrap();
        let names: Vec<_> = catalog.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pods", "deployments"]);
        // Nothing is listed until the scan runs
        assert_eq!(cluster.list_calls(), 0);
    }

    fn interrupt_source() -> (
        mpsc::UnboundedSender<()>,
        impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = bool> + Send>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let rx = Arc::new(Mutex::new(rx));
        let interrupt = move || {
            let rx = Arc::clone(&rx);
            Box::pin(async move { rx.lock().await.recv().await.is_some() })
                as std::pin::Pin<Box<dyn Future<Output = bool> + Send>>
        };
        (tx, interrupt)
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let cancel = CancellationToken::new();
        let (tx, interrupt) = interrupt_source();
        let handle = tokio::spawn(handle_interrupts(cancel.clone(), interrupt));

        tx.send(()).unwrap();
        cancel.cancelled().await;
        assert!(!handle.is_finished());

        tx.send(()).unwrap();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_interrupt_source_does_not_cancel() {
        let cancel = CancellationToken::new();
        let (tx, interrupt) = interrupt_source();
        drop(tx);

        assert!(!handle_interrupts(cancel.clone(), interrupt).await);
        assert!(!cancel.is_cancelled());
    }
}
