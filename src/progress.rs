// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for the connect and discovery phases
//!
//! The cluster client reports what it is doing; `main` renders the updates
//! on a stderr spinner until the scan starts writing report lines.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    /// Connecting to a cluster
    Connecting { cluster: String },
    /// Connected to a cluster
    Connected { cluster: String, elapsed_ms: u64 },
    /// Discovering resource types
    Discovering { cluster: String },
    /// Discovery complete
    DiscoveryComplete {
        cluster: String,
        type_count: usize,
        elapsed_ms: u64,
    },
}

impl ProgressUpdate {
    /// Spinner text for this update
    pub fn message(&self) -> String {
        match self {
            Self::Connecting { cluster } => format!("Connecting to {}...", cluster),
            Self::Connected { cluster, elapsed_ms } => {
                format!("Connected to {} ({} ms)", cluster, elapsed_ms)
            }
            Self::Discovering { cluster } => {
                format!("Discovering resource types on {}...", cluster)
            }
            Self::DiscoveryComplete {
                cluster,
                type_count,
                ..
            } => format!("{}: {} resource types found", cluster, type_count),
        }
    }
}

/// Broadcasts progress to any number of subscribers
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Report connecting to a cluster
    pub fn connecting(&self, cluster: &str) {
        let _ = self.sender.send(ProgressUpdate::Connecting {
            cluster: cluster.to_string(),
        });
    }

    /// Report connected to a cluster
    pub fn connected(&self, cluster: &str, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::Connected {
            cluster: cluster.to_string(),
            elapsed_ms,
        });
    }

    /// Report discovering resources on a cluster
    pub fn discovering(&self, cluster: &str) {
        let _ = self.sender.send(ProgressUpdate::Discovering {
            cluster: cluster.to_string(),
        });
    }

    /// Report discovery complete for a cluster
    pub fn discovery_complete(&self, cluster: &str, type_count: usize, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::DiscoveryComplete {
            cluster: cluster.to_string(),
            type_count,
            elapsed_ms,
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

/// Create a new progress reporter handle
pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}

/// Await `work` while the spinner follows progress updates.
///
/// Returns `None` as soon as `cancel` fires, dropping `work`.
pub async fn track<F: Future>(
    work: F,
    spinner: &ProgressBar,
    updates: &mut broadcast::Receiver<ProgressUpdate>,
    cancel: &CancellationToken,
) -> Option<F::Output> {
    tokio::pin!(work);
    let mut open = true;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            update = updates.recv(), if open => {
                match update {
                    Ok(update) => {
                        debug!(status = %update.message(), "Progress");
                        spinner.set_message(update.message());
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => open = false,
                }
            }
            result = &mut work => return Some(result),
        }
    }
}
