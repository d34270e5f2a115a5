// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the condition scanner.
//!
//! Only `Connection` and `Discovery` are fatal. Listing failures and
//! malformed condition entries are contained at job (or condition)
//! granularity and never stop the worker pool.

use thiserror::Error;

use crate::scan::gvr::Gvr;

/// Boxed cause carried by collaborator errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// No usable kubeconfig, unknown context or client construction failure
    #[error("failed to connect to cluster '{context}': {source}")]
    Connection {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The resource-type catalog could not be fetched
    #[error("failed to discover resource types: {source}")]
    Discovery {
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    List(#[from] ListError),

    /// A `status.conditions` entry that is not a structured record
    #[error("invalid condition format: {found}")]
    MalformedCondition { found: String },
}

impl ScanError {
    pub fn connection(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn discovery(source: impl Into<BoxError>) -> Self {
        Self::Discovery {
            source: source.into(),
        }
    }
}

/// Listing one resource type failed
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ListError {
    pub gvr: Gvr,
    #[source]
    pub source: BoxError,
}

impl ListError {
    pub fn new(gvr: Gvr, source: impl Into<BoxError>) -> Self {
        Self {
            gvr,
            source: source.into(),
        }
    }
}
