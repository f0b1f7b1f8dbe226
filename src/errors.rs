//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`StrataError`] covers all failure modes:
//! - Graph-structural errors, rejected synchronously at the mutating call
//!   so the graph is never left inconsistent
//! - Compute-time errors, which propagate to the original caller of
//!   `get_value` and are never cached
//! - Interactive-render errors, recovered locally by the render driver
//!   where possible
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, StrataError>`.

use thiserror::Error;

use crate::graph::value::ValueKind;

/// The main error type for the Strata engine.
#[derive(Error, Debug)]
pub enum StrataError {
    // ========================================================================
    // Graph-structural errors (rejected synchronously)
    // ========================================================================
    /// Two plugs of incompatible type, or a value of the wrong kind.
    #[error("type mismatch at '{context}': expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Plug or parameter being assigned
        context: String,
        /// The kind required by the destination
        expected: ValueKind,
        /// The kind that was supplied
        found: ValueKind,
    },

    /// A connection that would make the dependency graph cyclic.
    #[error("connecting '{upstream}' into '{dest}' would create a cycle")]
    CycleDetected {
        /// The upstream plug of the rejected connection
        upstream: String,
        /// The downstream plug of the rejected connection
        dest: String,
    },

    /// A local value was set on a plug that currently has an input.
    #[error("plug '{0}' is connected; local values are only meaningful on unconnected plugs")]
    PlugIsConnected(String),

    /// A local value was set on a computed output plug.
    #[error("plug '{0}' is a computed output and cannot hold a local value")]
    PlugNotWritable(String),

    /// Plug lookup by name failed.
    #[error("no plug named '{0}'")]
    PlugNotFound(String),

    /// Node lookup by name failed.
    #[error("no node named '{0}'")]
    NodeNotFound(String),

    // ========================================================================
    // Compute-time errors (propagate to the caller, never cached)
    // ========================================================================
    /// A scene location does not exist in the effective hierarchy.
    #[error("scene path not found: '{0}'")]
    PathNotFound(String),

    /// Channel data was requested at an origin that is not tile-aligned.
    #[error("tile origin ({x}, {y}) is not a multiple of the tile size {tile_size}")]
    InvalidTileOrigin {
        /// Requested origin x
        x: i32,
        /// Requested origin y
        y: i32,
        /// The fixed tile size of the image plug
        tile_size: i32,
    },

    /// Codec or backend I/O failure.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The owning query was abandoned while the compute was in flight.
    #[error("computation cancelled")]
    Cancelled,

    // ========================================================================
    // Interactive-render errors
    // ========================================================================
    /// The backend refused a live edit; the driver falls back to a restart.
    #[error("backend rejected edit at '{path}': {reason}")]
    EditRejected {
        /// Scene path the edit was scoped to
        path: String,
        /// Backend-supplied reason
        reason: String,
    },

    /// The fallback restart itself failed. Fatal to that render session.
    #[error("render restart failed: {0}")]
    RestartFailed(String),

    // ========================================================================
    // Persistence errors
    // ========================================================================
    /// Malformed or unreadable graph document.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The document names a node type missing from the registry.
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

/// Alias for `Result<T, StrataError>`.
pub type Result<T> = std::result::Result<T, StrataError>;
