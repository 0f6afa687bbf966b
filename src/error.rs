//! Error types for tree-crawler
//!
//! This module defines the error hierarchy for:
//! - Starting a crawl (configuration and thread setup)
//! - Worker thread failures observed by the coordinator
//! - The local filesystem enumerator shipped with the crate
//!
//! Errors produced by a caller's enumeration function are not part of this
//! hierarchy: they travel through the result stream as the caller's own type.
//! Broken coordination invariants are not errors either; they abort.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tree-crawler
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid pending queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Invalid result channel capacity
    #[error("Invalid output capacity {size}: must be at least {min}")]
    InvalidOutputCapacity { size: usize, min: usize },

    /// Heartbeat interval of zero would spin
    #[error("Invalid heartbeat interval: must be greater than zero")]
    InvalidHeartbeat,

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Crawl root is unusable
    #[error("Invalid root '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// OS refused to start a worker thread
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },

    /// Worker panicked (the caller's enumeration function unwound)
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Heartbeat or coordinator thread could not be started
    #[error("Failed to start {role} thread: {reason}")]
    SupportThreadFailed { role: &'static str, reason: String },
}

/// Errors reported by [`crate::fs::LocalLister`] for one directory
#[derive(Error, Debug)]
pub enum ListError {
    /// Directory could not be opened or read
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A child of the directory could not be inspected
    #[error("Failed to stat '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ListError {
    /// Path the failure refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            ListError::ReadDir { path, .. } => path,
            ListError::Metadata { path, .. } => path,
        }
    }

    /// Check if this error is expected on a live tree (skip and move on)
    pub fn is_recoverable(&self) -> bool {
        let source = match self {
            ListError::ReadDir { source, .. } => source,
            ListError::Metadata { source, .. } => source,
        };
        matches!(
            source.kind(),
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound
        )
    }
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_list_error_recoverable() {
        let denied = ListError::ReadDir {
            path: "/secret".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(denied.is_recoverable());
        assert_eq!(denied.path(), std::path::Path::new("/secret"));

        let broken = ListError::Metadata {
            path: "/data/file".into(),
            source: io::Error::other("device error"),
        };
        assert!(!broken.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::InvalidWorkerCount { count: 0, max: 512 };
        let walker_err: WalkerError = config_err.into();
        assert!(matches!(walker_err, WalkerError::Config(_)));
        assert!(walker_err.to_string().contains("between 1 and 512"));
    }
}
