//! Error types for Scopeflow.
//!
//! None of these are fatal: each one leaves the in-memory tree either
//! unchanged or replaced by a degenerate error tree.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::node::NodeId;

/// The parser rejected the source text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SynthesisError {
    pub message: String,
}

impl From<syn::Error> for SynthesisError {
    fn from(err: syn::Error) -> Self {
        SynthesisError {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("target node {0} is not part of the current tree")]
    UnknownTarget(NodeId),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("interchange document not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to access interchange document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed interchange document: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failures of the external text-generation collaborator.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation timed out after {0}s")]
    Timeout(u64),
    #[error("text generation service unavailable: {0}")]
    Unavailable(String),
    #[error("text generation service returned HTTP {0}")]
    Status(u16),
    #[error("malformed text generation response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Document(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors surfaced to the editing surface by a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("graph node {0} is unknown; the graph was rebuilt since it was rendered")]
    StaleGraphId(String),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}
