//! Error types.

use std::time::Duration;

use thiserror::Error;

use crate::graph::NodeId;

/// Misuse of the reactive graph.
///
/// These are programming errors. The panicking accessors (`Signal::set`,
/// `Memo::get`) turn them into panics; the `try_` forms hand them back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("signal {signal} written while memo {memo} was computing")]
    WriteDuringDerivation { signal: NodeId, memo: NodeId },

    #[error("circular dependency: memo {0} read itself while computing")]
    CircularDependency(NodeId),

    #[error("memo {0} has no cached value")]
    NotComputed(NodeId),
}

/// Why a deferred fragment's load ended in the error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("load failed: {0}")]
    Failed(String),

    #[error("load timed out after {0:?}")]
    TimedOut(Duration),

    #[error("loader panicked: {0}")]
    Panicked(String),
}

impl LoadError {
    pub fn failed(reason: impl Into<String>) -> Self {
        LoadError::Failed(reason.into())
    }
}

/// Render a caught panic payload for logs.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Errors from setting up deferred loading.
#[derive(Debug, Error)]
pub enum DeferError {
    #[error("deferred loading requires a tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
