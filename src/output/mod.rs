//! Report output: anomaly lines, listing errors, trace lines and the summary.

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use tracing::warn;

use crate::scan::counter::Counter;
use crate::scan::gvr::Gvr;

/// Line-atomic writer shared by all workers.
///
/// Each line is written and flushed while holding the lock, so output from
/// concurrent workers never interleaves mid-line.
pub struct OutputSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl OutputSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one line; failures are logged, never propagated into the scan
    pub fn line(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(error = %e, "Failed to write report line");
        }
    }
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

/// One reported condition of one instance
#[derive(Debug, Clone, Copy)]
pub struct Anomaly<'a> {
    pub namespace: &'a str,
    pub resource: &'a str,
    pub name: &'a str,
    pub condition_type: &'a str,
    pub status: &'a str,
    pub reason: &'a str,
    pub message: &'a str,
}

/// `  <namespace> <resource> <name> Condition <type>=<status> <reason> "<message>"`
pub fn anomaly_line(a: &Anomaly<'_>) -> String {
    format!(
        "  {} {} {} Condition {}={} {} {:?}",
        a.namespace, a.resource, a.name, a.condition_type, a.status, a.reason, a.message
    )
}

pub fn list_error_line(resource: &str, gvr: &Gvr, cause: &dyn std::fmt::Display) -> String {
    format!("..Error listing {}: {}. {}", resource, cause, gvr)
}

pub fn checked_line(gvr: &Gvr, worker_id: usize) -> String {
    format!(
        "    checked {} {} {} workerID={}",
        gvr.resource, gvr.group, gvr.version, worker_id
    )
}

pub fn summary_line(counter: &Counter, elapsed: Duration) -> String {
    format!(
        "Checked {} conditions of {} resources of {} types. Duration: {:?}",
        counter.checked_conditions, counter.checked_resources, counter.checked_resource_types, elapsed
    )
}
