//! Structured errors for the tiercache server.
//!
//! Storage and network failures arrive as `tiercache_core::Error`, which
//! converts into MCP errors on its own; these cover the tool surface.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Tool arguments that cannot be turned into a request.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("ENCODE_FAILED: {0}")]
    EncodeFailed(String),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let (code, message) = match &err {
            ServerError::InvalidInput(msg) => (-32602, msg.clone()),
            ServerError::EncodeFailed(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err: McpError = ServerError::InvalidInput("urls must not be empty".into()).into();
        assert_eq!(err.code, ErrorCode(-32602));
        assert_eq!(err.message, "urls must not be empty");
    }

    #[test]
    fn test_encode_failed_code() {
        let err: McpError = ServerError::EncodeFailed("bad".into()).into();
        assert_eq!(err.code, ErrorCode(-32603));
    }
}
