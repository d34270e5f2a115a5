// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-job counters and the single-owner aggregate.

use std::ops::AddAssign;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// What one resource-type job checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounters {
    pub checked_resource_types: u64,
    pub checked_resources: u64,
    pub checked_conditions: u64,
}

impl AddAssign for ResultCounters {
    fn add_assign(&mut self, other: Self) {
        self.checked_resource_types += other.checked_resource_types;
        self.checked_resources += other.checked_resources;
        self.checked_conditions += other.checked_conditions;
    }
}

/// Totals for a whole scan
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    pub checked_resource_types: u64,
    pub checked_resources: u64,
    pub checked_conditions: u64,
    pub start_time: Instant,
}

impl Counter {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start_time: Instant) -> Self {
        Self {
            checked_resource_types: 0,
            checked_resources: 0,
            checked_conditions: 0,
            start_time,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn totals(&self) -> ResultCounters {
        ResultCounters {
            checked_resource_types: self.checked_resource_types,
            checked_resources: self.checked_resources,
            checked_conditions: self.checked_conditions,
        }
    }
}

impl AddAssign<ResultCounters> for Counter {
    fn add_assign(&mut self, result: ResultCounters) {
        self.checked_resource_types += result.checked_resource_types;
        self.checked_resources += result.checked_resources;
        self.checked_conditions += result.checked_conditions;
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold every result into `counter` until all senders are gone.
///
/// The returned task is the only writer of the aggregate; it finishes once
/// the results channel is closed and hands the final counter back.
pub fn spawn_aggregator(
    mut counter: Counter,
    mut results: mpsc::Receiver<ResultCounters>,
) -> JoinHandle<Counter> {
    tokio::spawn(async move {
        while let Some(result) = results.recv().await {
            trace!(?result, "Aggregating job result");
            counter += result;
        }
        counter
    })
}
