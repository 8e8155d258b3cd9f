//! Worker side of the transport: owns a `ScoreRenderer` and answers
//! commands with result envelopes.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use log::{debug, error};
use serde_json::Value;

use super::{decode, encode, WorkerCommand, WorkerResult};
use crate::error::{ErrorPayload, RenderError};
use crate::model::Score;
use crate::renderer::{ScoreRenderer, ScoreRendererApi};
use crate::settings::Settings;

/// Serve commands until the control side drops its sender.
pub fn run(commands: Receiver<Value>, results: Sender<Value>) {
    let mut host = WorkerHost::new(results);
    while let Ok(envelope) = commands.recv() {
        host.handle(envelope);
    }
    debug!("Render worker stopped");
}

pub struct WorkerHost {
    renderer: Option<ScoreRenderer>,
    results: Sender<Value>,
}

impl WorkerHost {
    pub fn new(results: Sender<Value>) -> Self {
        Self {
            renderer: None,
            results,
        }
    }

    pub fn handle(&mut self, envelope: Value) {
        let command = match decode::<WorkerCommand>(envelope) {
            Ok(c) => c,
            Err(e) => {
                error!("Render worker received an unknown command: {e}");
                self.post_error(&e);
                return;
            }
        };

        if let WorkerCommand::Initialize { settings } = command {
            self.initialize(settings);
            return;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            let e = RenderError::Configuration("render worker is not initialized".into());
            error!("{e}");
            self.post_error(&e);
            return;
        };

        match command {
            WorkerCommand::Initialize { .. } => {}
            WorkerCommand::UpdateSettings { settings } => match Settings::from_worker_json(settings) {
                Ok(settings) => {
                    log::set_max_level(settings.core.log_level.to_level_filter());
                    renderer.update_settings(settings);
                }
                Err(e) => {
                    error!("Invalid settings sent to the render worker: {e}");
                    self.post_error(&e);
                }
            },
            WorkerCommand::Render => renderer.render(),
            WorkerCommand::ResizeRender => renderer.resize_render(),
            WorkerCommand::RenderResult { result_id } => renderer.render_result(&result_id),
            WorkerCommand::SetWidth { width } => renderer.set_width(width),
            WorkerCommand::RenderScore {
                score,
                track_indexes,
                font_sizes,
            } => {
                let score = match score.map(serde_json::from_value::<Score>).transpose() {
                    Ok(score) => score.map(Arc::new),
                    Err(e) => {
                        let e = RenderError::from(e);
                        error!("Render worker could not read the score: {e}");
                        self.post_error(&e);
                        return;
                    }
                };
                renderer.set_font_sizes(font_sizes);
                renderer.render_score(score, track_indexes);
            }
        }
    }

    fn initialize(&mut self, settings: Value) {
        let settings = match Settings::from_worker_json(settings) {
            Ok(s) => s,
            Err(e) => {
                error!("Render worker could not be initialized: {e}");
                self.post_error(&e);
                return;
            }
        };
        log::set_max_level(settings.core.log_level.to_level_filter());

        let mut renderer = ScoreRenderer::new(settings);
        let results = self.results.clone();
        renderer.events().subscribe_all(move |event| {
            let envelope = WorkerResult::from_event(&event).and_then(|r| encode(&r));
            match envelope {
                Ok(envelope) => {
                    if results.send(envelope).is_err() {
                        debug!("Render worker result dropped, control side is gone");
                    }
                }
                Err(e) => error!("Render worker could not encode '{}': {e}", event.name()),
            }
        });
        self.renderer = Some(renderer);
        debug!("Render worker initialized");
    }

    fn post_error(&self, e: &RenderError) {
        let result = WorkerResult::Error {
            error: ErrorPayload::from(e),
        };
        if let Ok(envelope) = encode(&result) {
            let _ = self.results.send(envelope);
        }
    }
}
