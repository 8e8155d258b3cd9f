//! Error types shared by the renderer, the worker transport and the API.
//!
//! Every user-visible failure is emitted once on the `error` event channel;
//! the serializable `ErrorPayload` is the form that crosses the worker
//! boundary so both transports surface the same error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// Unusable configuration (e.g. unknown render engine)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Worker could not be created or the channel broke
    #[error("Transport error: {0}")]
    Transport(String),

    /// Notation text could not be imported
    #[error("Import failed: {0}")]
    Import(String),

    /// Score is inconsistent with its own master bars
    #[error("Invalid score: {0}")]
    Model(String),

    /// Message, score or bounds (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A render result id that no layout registered
    #[error("Unknown render result '{0}'")]
    UnknownResult(String),
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Serialization(e.to_string())
    }
}

/// Transport form of a `RenderError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl From<&RenderError> for ErrorPayload {
    fn from(e: &RenderError) -> Self {
        let (kind, message) = match e {
            RenderError::Configuration(m) => ("configuration", m),
            RenderError::Transport(m) => ("transport", m),
            RenderError::Import(m) => ("import", m),
            RenderError::Model(m) => ("model", m),
            RenderError::Serialization(m) => ("serialization", m),
            RenderError::UnknownResult(m) => ("unknownResult", m),
        };
        Self {
            kind: kind.to_string(),
            message: message.clone(),
        }
    }
}

impl From<ErrorPayload> for RenderError {
    fn from(p: ErrorPayload) -> Self {
        match p.kind.as_str() {
            "configuration" => RenderError::Configuration(p.message),
            "transport" => RenderError::Transport(p.message),
            "import" => RenderError::Import(p.message),
            "model" => RenderError::Model(p.message),
            "unknownResult" => RenderError::UnknownResult(p.message),
            _ => RenderError::Serialization(p.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_keeps_the_error_kind() {
        let err = RenderError::Import("unexpected end of stream".into());
        let back: RenderError = ErrorPayload::from(&err).into();
        assert_eq!(back, err);
        assert_eq!(err.to_string(), "Import failed: unexpected end of stream");
    }
}
