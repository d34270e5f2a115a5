// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "check-conditions")]
#[command(author, version, about = "Check the status conditions of Kubernetes resources")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Kubernetes context to use (defaults to the kubeconfig's current context)
    #[arg(short, long, global = true, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Number of resource types checked in parallel [default: 50]
    #[arg(short, long, global = true, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// Config file (defaults to ~/.check-conditions/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print a line for every checked resource type and log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Check all conditions of all api-resources
    #[default]
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["check-conditions"]).unwrap();
        assert!(args.command.is_none());
        assert!(!args.verbose);
        assert!(args.workers.is_none());
        assert!(args.context.is_none());
    }

    #[test]
    fn test_all_with_flags() {
        let args =
            Args::try_parse_from(["check-conditions", "all", "-v", "-w", "8", "-c", "kind-dev"])
                .unwrap();
        assert_eq!(args.command, Some(Command::All));
        assert!(args.verbose);
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.context.as_deref(), Some("kind-dev"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Args::try_parse_from(["check-conditions", "--workers", "0"]).is_err());
    }
}
