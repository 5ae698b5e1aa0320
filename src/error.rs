//! Error handling for the inspector backend
//!
//! This module defines the error taxonomy and a Result alias used
//! throughout the crate. Most of these errors are recoverable: the tracker
//! logs them at the node or task that produced them and keeps going, since
//! the host application must never be taken down by its inspector.

use thiserror::Error;

/// Main error type for inspector operations
#[derive(Error, Debug)]
pub enum InspectorError {
    /// A node or id lookup missed
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The attached host runtime lacks a hook this feature depends on
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A message was sent after the bridge shut down
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// The transport cannot take another batch yet; retry later
    #[error("Transport busy: {0}")]
    Busy(String),

    /// Malformed or version-mismatched wire data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<InspectorError>,
    },
}

impl InspectorError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        InspectorError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers stripped
    pub fn root_cause(&self) -> &InspectorError {
        match self {
            InspectorError::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for lookup misses, which callers usually treat as "ignore"
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), InspectorError::NotFound(_))
    }
}

impl From<serde_json::Error> for InspectorError {
    fn from(err: serde_json::Error) -> Self {
        InspectorError::Serialization(err.to_string())
    }
}

/// Result type alias for inspector operations
pub type Result<T> = std::result::Result<T, InspectorError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| InspectorError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| InspectorError::from(e).with_context(f()))
    }
}
