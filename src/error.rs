/// Errors raised by a [`MonitoringBackend`](crate::backend::MonitoringBackend) implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Non-2xx status from the monitoring API.
    #[error("HTTP {status} from {path}: {body}")]
    Http {
        path: String,
        status: u16,
        body: String,
    },

    /// Transport-level failure from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// Client could not be constructed from the supplied settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fixture and test backends use this to simulate an arbitrary upstream failure.
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by tool operations.
///
/// Every variant is converted into a single `Error: ...` text block at the
/// dispatcher boundary, see [`crate::tools::call_tool`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid time expression {0:?}")]
    InvalidTimeExpression(String),

    #[error(transparent)]
    Upstream(#[from] BackendError),

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    /// Prefixes the inner error with the name of the failed operation.
    #[error("Failed to {operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<ToolError>,
    },
}

impl ToolError {
    pub fn during(self, operation: &'static str) -> Self {
        ToolError::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// Innermost error, with every operation prefix peeled off.
    pub fn root(&self) -> &ToolError {
        match self {
            ToolError::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T, E = ToolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_prefix_nests() {
        let err = ToolError::Upstream(BackendError::Other("boom".into()))
            .during("get alert details")
            .during("analyze alert");
        assert_eq!(
            err.to_string(),
            "Failed to analyze alert: Failed to get alert details: boom"
        );
        assert!(matches!(err.root(), ToolError::Upstream(_)));
    }
}
