// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Fixed-size pool of workers draining the job queue.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::counter::ResultCounters;
use super::handler::handle_resource_type;
use super::{Job, ScanContext};
use crate::kubernetes::ResourceLister;

/// Receiving end of the job queue, shared by all workers
pub type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Start `count` workers.
///
/// Each worker takes one job at a time until the queue is closed and
/// drained, and sends one result per job. Workers exit early if the results
/// channel is gone.
pub fn spawn_workers<L>(
    count: usize,
    ctx: Arc<ScanContext<L>>,
    jobs: JobQueue,
    results: mpsc::Sender<ResultCounters>,
) -> Vec<JoinHandle<()>>
where
    L: ResourceLister + ?Sized + 'static,
{
    (0..count)
        .map(|worker_id| {
            let ctx = Arc::clone(&ctx);
            let jobs = Arc::clone(&jobs);
            let results = results.clone();
            tokio::spawn(async move {
                let mut handled = 0usize;
                loop {
                    // Lock only while waiting for the next job
                    let job = jobs.lock().await.recv().await;
                    let Some(job) = job else { break };

                    trace!(worker_id, resource = %job.resource.name, "Handling resource type");
                    let result = handle_resource_type(&*ctx, &job, worker_id).await;
                    handled += 1;
                    if results.send(result).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, handled, "Worker finished");
            })
        })
        .collect()
}
