//! Worker transport: the renderer running on a background thread, driven
//! through one-way JSON messages.
//!
//! Commands flow control → worker, results flow worker → control. Both are
//! tagged unions serialized to `{ "cmd": ..., ...payload }` envelopes, so
//! nothing but plain data crosses the thread boundary.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorPayload, RenderError};
use crate::events::RenderEvent;
use crate::font_sizes::FontSizes;
use crate::renderer::RenderFinishedEventArgs;

pub mod host;
pub mod proxy;

pub use proxy::WorkerScoreRenderer;

/// Control → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum WorkerCommand {
    /// Settings without the player section
    Initialize { settings: Value },
    UpdateSettings { settings: Value },
    Render,
    ResizeRender,
    #[serde(rename_all = "camelCase")]
    RenderResult { result_id: String },
    SetWidth { width: f64 },
    /// The score in its plain serialized form
    #[serde(rename_all = "camelCase")]
    RenderScore {
        score: Option<Value>,
        track_indexes: Option<Vec<usize>>,
        font_sizes: FontSizes,
    },
}

/// Worker → control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum WorkerResult {
    PreRender { resize: bool },
    PartialLayoutFinished { result: RenderFinishedEventArgs },
    PartialRenderFinished { result: RenderFinishedEventArgs },
    RenderFinished { result: RenderFinishedEventArgs },
    /// Bounds without their links to the score
    #[serde(rename_all = "camelCase")]
    PostRenderFinished { bounds_lookup: Value },
    Error { error: ErrorPayload },
}

impl WorkerResult {
    /// Transport form of a renderer event.
    pub fn from_event(event: &RenderEvent) -> Result<Self, RenderError> {
        Ok(match event {
            RenderEvent::PreRender(resize) => WorkerResult::PreRender { resize: *resize },
            RenderEvent::PartialLayoutFinished(e) => {
                WorkerResult::PartialLayoutFinished { result: e.clone() }
            }
            RenderEvent::PartialRenderFinished(e) => {
                WorkerResult::PartialRenderFinished { result: e.clone() }
            }
            RenderEvent::RenderFinished(e) => WorkerResult::RenderFinished { result: e.clone() },
            RenderEvent::PostRenderFinished(lookup) => WorkerResult::PostRenderFinished {
                bounds_lookup: lookup.to_json()?,
            },
            RenderEvent::Error(e) => WorkerResult::Error { error: e.into() },
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkerResult::PreRender { .. } => "preRender",
            WorkerResult::PartialLayoutFinished { .. } => "partialLayoutFinished",
            WorkerResult::PartialRenderFinished { .. } => "partialRenderFinished",
            WorkerResult::RenderFinished { .. } => "renderFinished",
            WorkerResult::PostRenderFinished { .. } => "postRenderFinished",
            WorkerResult::Error { .. } => "error",
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<Value, RenderError> {
    Ok(serde_json::to_value(message)?)
}

/// Decode an envelope; an unknown `cmd` is a serialization error.
pub fn decode<T: DeserializeOwned>(envelope: Value) -> Result<T, RenderError> {
    Ok(serde_json::from_value(envelope)?)
}
