//! tui-wbs - a folder of Markdown files as a work breakdown structure.
//!
//! This library provides the core functionality for the `wbs` tool:
//! parsing `*.wbs.md` files into an immutable node tree, writing edits
//! back with byte-preserving round trips, the undo/redo command log,
//! view projection (table, gantt, kanban), and the advisory file lock
//! used while saving.

pub mod cli;
pub mod commands;
pub mod config;
pub mod export;
pub mod gantt;
pub mod lock;
pub mod models;
pub mod parser;
pub mod theme;
pub mod view;
pub mod writer;

/// Library-level error type for tui-wbs operations.
///
/// Parse problems are never errors; they are collected as
/// [`models::ParseWarning`] values on the document and project.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Project locked by live process {pid}")]
    Locked { pid: u32 },

    #[error("Lock file lost or taken over by another process")]
    LockLost,

    #[error("Heading level must stay within 1-6")]
    InvalidLevel,

    #[error("No preceding sibling to attach to")]
    NoAnchor,

    #[error("Node is already at the edge of its sibling list")]
    OutOfRange,

    #[error("Progress is computed from descendants and cannot be set directly")]
    ComputedField,

    #[error("Value does not match the column type: {0}")]
    FieldTypeMismatch(String),

    #[error("Unknown or non-editable column: {0}")]
    UnknownColumn(String),

    #[error("Node not found")]
    NodeNotFound,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for tui-wbs operations.
pub type Result<T> = std::result::Result<T, Error>;
