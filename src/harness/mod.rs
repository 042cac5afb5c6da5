//! Diagnostics that drive the dispatcher outside normal assistant use
//!
//! Health checks, the quick check, the endpoint tester and the benchmark runner
//! all report through the same exit-code contract.

pub mod benchmark;
pub mod endpoint;
pub mod grade;
pub mod health;

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;

use crate::errors::InvocationError;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_CRITICAL: i32 = 2;
pub const EXIT_HARNESS_ERROR: i32 = 3;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid harness transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("unknown health category '{0}'")]
    UnknownCategory(String),
    #[error("concurrency must be between 1 and {max}, got {got}")]
    InvalidConcurrency { got: usize, max: usize },
    #[error("benchmark produced no results")]
    NoResults,
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
    #[error("tool {0} changes remote state; pass --allow-mutating to run it")]
    MutatingRefused(String),
    #[error(transparent)]
    Tool(#[from] InvocationError),
    #[error("{0}")]
    Startup(String),
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("console i/o failed: {0}")]
    Console(#[from] std::io::Error),
}

impl HarnessError {
    pub fn exit_code(&self) -> i32 {
        EXIT_HARNESS_ERROR
    }
}

/// Writes a report as pretty JSON.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<(), HarnessError> {
    let mut encoded = serde_json::to_string_pretty(report)?;
    encoded.push('\n');
    fs::write(path, encoded).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })
}
