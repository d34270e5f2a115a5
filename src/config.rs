// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for check-conditions
//!
//! All check-conditions data is stored under ~/.check-conditions/:
//! - ~/.check-conditions/config.json - optional extensions of the heuristic tables
//! - ~/.check-conditions/log/ - rotated log files
//!
//! Every field is optional; entries are added to the built-in tables, never
//! replace them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Worker pool size when neither the CLI nor the config file sets one
pub const DEFAULT_WORKERS: usize = 50;

/// Get the base directory (~/.check-conditions/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".check-conditions"))
        .context("Could not determine home directory")
}

/// check-conditions configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool size
    #[serde(default)]
    pub workers: Option<usize>,

    /// Additional resource names that are never listed
    #[serde(default)]
    pub skip_resources: Vec<String>,

    /// Additional condition types where any status is fine
    #[serde(default)]
    pub status_agnostic_conditions: Vec<String>,

    /// Additional suffixes where `True` is the healthy state
    #[serde(default)]
    pub positive_suffixes: Vec<String>,

    /// Additional suffixes where `False` is the healthy state
    #[serde(default)]
    pub negative_suffixes: Vec<String>,

    /// Resource name -> condition types with positive meaning
    #[serde(default)]
    pub positive_conditions: HashMap<String, Vec<String>>,
}

impl Config {
    /// Load config from the default location, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from an explicit path, or return default if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path (~/.check-conditions/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Pool size, preferring an explicit CLI value over the file
    pub fn worker_count(&self, cli: Option<usize>) -> usize {
        cli.or(self.workers)
            .unwrap_or(DEFAULT_WORKERS)
            .max(1)
    }
}
