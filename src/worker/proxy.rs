//! Control side of the transport: a `ScoreRendererApi` that forwards every
//! call to a render worker thread and re-emits its results as events.
//!
//! Results are only delivered when the owner calls [`WorkerScoreRenderer::pump`]
//! (or one of the waiting variants), so events always fire on the control
//! thread, in the order the worker produced them.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use serde_json::Value;

use super::{decode, encode, host, WorkerCommand, WorkerResult};
use crate::error::RenderError;
use crate::events::RendererEvents;
use crate::font_sizes::FontSizes;
use crate::model::Score;
use crate::renderer::bounds::BoundsLookup;
use crate::renderer::canvas::RenderEngine;
use crate::renderer::ScoreRendererApi;
use crate::settings::Settings;

struct WorkerChannels {
    commands: Sender<Value>,
    results: Receiver<Value>,
    handle: JoinHandle<()>,
}

fn spawn_with(builder: Builder) -> io::Result<WorkerChannels> {
    let (command_tx, command_rx) = mpsc::channel();
    let (result_tx, result_rx) = mpsc::channel();
    let handle = builder.spawn(move || host::run(command_rx, result_tx))?;
    Ok(WorkerChannels {
        commands: command_tx,
        results: result_rx,
        handle,
    })
}

/// Start the worker thread, retrying once with platform defaults if the
/// configured thread could not be created.
fn spawn_worker(settings: &Settings) -> io::Result<WorkerChannels> {
    let mut builder = Builder::new().name(settings.core.worker_name.clone());
    if let Some(stack_size) = settings.core.worker_stack_size {
        builder = builder.stack_size(stack_size);
    }
    match spawn_with(builder) {
        Ok(channels) => Ok(channels),
        Err(e) => {
            warn!("Render worker could not be started ({e}), retrying with defaults");
            spawn_with(Builder::new())
        }
    }
}

pub struct WorkerScoreRenderer {
    events: RendererEvents,
    width: f64,
    channels: Option<WorkerChannels>,
    /// Score of the last `render_score`, used to rehydrate bounds
    score: Option<Arc<Score>>,
    /// Sent with every `renderScore` so the worker measures like this side
    font_sizes: FontSizes,
    bounds_lookup: Option<BoundsLookup>,
}

impl WorkerScoreRenderer {
    /// Start a worker for `settings`. If the engine cannot run off the
    /// control thread or the thread cannot be created, the renderer stays
    /// inert: commands are dropped and no events fire.
    pub fn new(settings: &Settings) -> Self {
        let mut renderer = Self {
            events: RendererEvents::new(),
            width: 0.0,
            channels: None,
            score: None,
            font_sizes: FontSizes::default(),
            bounds_lookup: None,
        };

        match RenderEngine::from_name(&settings.core.engine) {
            Ok(engine) if engine.supports_workers() => {}
            Ok(_) => {
                error!(
                    "Render engine '{}' cannot be used in a worker",
                    settings.core.engine
                );
                return renderer;
            }
            Err(e) => {
                error!("Render worker not started: {e}");
                return renderer;
            }
        }

        match spawn_worker(settings) {
            Ok(channels) => renderer.channels = Some(channels),
            Err(e) => {
                error!("Failed to create render worker: {e}");
                return renderer;
            }
        }

        match settings.to_worker_json() {
            Ok(settings) => renderer.post(WorkerCommand::Initialize { settings }),
            Err(e) => error!("Render worker settings could not be serialized: {e}"),
        }
        renderer
    }

    pub fn is_usable(&self) -> bool {
        self.channels.is_some()
    }

    pub fn font_sizes(&self) -> &FontSizes {
        &self.font_sizes
    }

    /// Measurement tables for the next `render_score`.
    pub fn set_font_sizes(&mut self, font_sizes: FontSizes) {
        self.font_sizes = font_sizes;
    }

    /// Deliver every result the worker has produced so far. Returns the
    /// number of results handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let received = match self.channels.as_ref() {
                Some(channels) => channels.results.try_recv(),
                None => return handled,
            };
            match received {
                Ok(envelope) => {
                    self.handle_result(envelope);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => return handled,
                Err(TryRecvError::Disconnected) => {
                    self.worker_lost();
                    return handled;
                }
            }
        }
    }

    /// Deliver results, blocking until one named `event` (e.g.
    /// `"postRenderFinished"`) or an error was handled. Returns false on
    /// timeout.
    pub fn pump_until(&mut self, event: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = match self.channels.as_ref() {
                Some(channels) => channels.results.recv_timeout(remaining),
                None => return false,
            };
            match received {
                Ok(envelope) => {
                    let name = envelope["cmd"].as_str().unwrap_or_default().to_string();
                    self.handle_result(envelope);
                    if name == event || name == "error" {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    self.worker_lost();
                    return false;
                }
            }
        }
    }

    fn handle_result(&mut self, envelope: Value) {
        let result = match decode::<WorkerResult>(envelope) {
            Ok(r) => r,
            Err(e) => {
                self.fail(e);
                return;
            }
        };
        match result {
            WorkerResult::PreRender { resize } => self.events.pre_render.trigger(&resize),
            WorkerResult::PartialLayoutFinished { result } => {
                self.events.partial_layout_finished.trigger(&result)
            }
            WorkerResult::PartialRenderFinished { result } => {
                self.events.partial_render_finished.trigger(&result)
            }
            WorkerResult::RenderFinished { result } => self.events.render_finished.trigger(&result),
            WorkerResult::PostRenderFinished { bounds_lookup } => {
                let lookup = match self.score.as_deref() {
                    Some(score) => BoundsLookup::from_json(bounds_lookup, score),
                    None => Err(RenderError::Serialization(
                        "bounds received without a score".into(),
                    )),
                };
                match lookup {
                    Ok(lookup) => {
                        self.bounds_lookup = Some(lookup.clone());
                        self.events.post_render_finished.trigger(&lookup);
                    }
                    Err(e) => self.fail(e),
                }
            }
            WorkerResult::Error { error } => {
                let e = RenderError::from(error);
                error!("Render worker failed: {e}");
                self.events.error.trigger(&e);
            }
        }
    }

    fn post(&mut self, command: WorkerCommand) {
        let Some(channels) = self.channels.as_ref() else {
            debug!("Render worker unavailable, command dropped");
            return;
        };
        let sent = encode(&command).and_then(|envelope| {
            channels
                .commands
                .send(envelope)
                .map_err(|_| RenderError::Transport("render worker is gone".into()))
        });
        if let Err(e) = sent {
            self.fail(e);
        }
    }

    fn worker_lost(&mut self) {
        self.channels = None;
        self.fail(RenderError::Transport("render worker stopped unexpectedly".into()));
    }

    fn fail(&mut self, e: RenderError) {
        error!("Rendering failed: {e}");
        self.bounds_lookup = None;
        self.events.error.trigger(&e);
    }
}

impl ScoreRendererApi for WorkerScoreRenderer {
    fn render_score(&mut self, score: Option<Arc<Score>>, track_indexes: Option<Vec<usize>>) {
        let value = match score.as_deref().map(serde_json::to_value).transpose() {
            Ok(v) => v,
            Err(e) => {
                self.fail(e.into());
                return;
            }
        };
        self.score = score;
        self.bounds_lookup = None;
        self.post(WorkerCommand::RenderScore {
            score: value,
            track_indexes,
            font_sizes: self.font_sizes.clone(),
        });
    }

    fn render(&mut self) {
        self.post(WorkerCommand::Render);
    }

    fn resize_render(&mut self) {
        self.post(WorkerCommand::ResizeRender);
    }

    fn render_result(&mut self, result_id: &str) {
        self.post(WorkerCommand::RenderResult {
            result_id: result_id.to_string(),
        });
    }

    fn update_settings(&mut self, settings: Settings) {
        match settings.to_worker_json() {
            Ok(settings) => self.post(WorkerCommand::UpdateSettings { settings }),
            Err(e) => self.fail(e),
        }
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn set_width(&mut self, width: f64) {
        self.width = width;
        self.post(WorkerCommand::SetWidth { width });
    }

    fn bounds_lookup(&self) -> Option<&BoundsLookup> {
        self.bounds_lookup.as_ref()
    }

    fn events(&mut self) -> &mut RendererEvents {
        &mut self.events
    }

    /// Stop the worker. Pending results are discarded.
    fn destroy(&mut self) {
        if let Some(channels) = self.channels.take() {
            drop(channels.commands);
            drop(channels.results);
            if channels.handle.join().is_err() {
                error!("Render worker panicked");
            }
        }
        self.score = None;
        self.bounds_lookup = None;
    }
}

impl Drop for WorkerScoreRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RenderEvent;
    use crate::model::{Bar, Beat, MasterBar, Track};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(10);

    fn score(bars: usize) -> Arc<Score> {
        let mut score = Score::new();
        let mut track = Track::new("Oboe", "Ob.");
        for _ in 0..bars {
            score.add_master_bar(MasterBar::new(2, 4));
            track.staves[0]
                .bars
                .push(Bar::new(vec![Beat::note(crate::model::Duration::Half, 4)]));
        }
        score.add_track(track);
        Arc::new(score)
    }

    fn recording(renderer: &mut WorkerScoreRenderer) -> Arc<Mutex<Vec<RenderEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        renderer.events().subscribe_all(move |e| s.lock().unwrap().push(e));
        seen
    }

    #[test]
    fn unknown_engine_leaves_the_proxy_inert() {
        let mut settings = Settings::default();
        settings.core.engine = "gpu".into();
        let mut renderer = WorkerScoreRenderer::new(&settings);
        let seen = recording(&mut renderer);

        assert!(!renderer.is_usable());
        renderer.render_score(Some(score(1)), None);
        assert_eq!(renderer.pump(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn results_are_re_emitted_in_order() {
        let mut renderer = WorkerScoreRenderer::new(&Settings::default());
        let seen = recording(&mut renderer);
        renderer.render_score(Some(score(2)), Some(vec![0]));

        assert!(renderer.pump_until("postRenderFinished", WAIT));
        let names: Vec<&str> = seen.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "preRender",
                "partialLayoutFinished",
                "partialRenderFinished",
                "renderFinished",
                "postRenderFinished",
            ]
        );
        assert_eq!(renderer.bounds_lookup().unwrap().master_bar_count(), 2);
    }

    #[test]
    fn worker_errors_arrive_on_the_error_channel() {
        let mut renderer = WorkerScoreRenderer::new(&Settings::default());
        let seen = recording(&mut renderer);
        renderer.render_score(Some(score(1)), None);
        assert!(renderer.pump_until("postRenderFinished", WAIT));

        renderer.render_result("no-such-partial");
        assert!(renderer.pump_until("error", WAIT));
        let events = seen.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(RenderEvent::Error(RenderError::UnknownResult(id))) if id == "no-such-partial"
        ));
    }

    #[test]
    fn worker_measures_with_the_control_side_tables() {
        let mut wide = FontSizes::default();
        wide.tables = [("Georgia".to_string(), vec![40u8; 96])].into_iter().collect();
        let first_bar_x = |lookup: &BoundsLookup| {
            lookup.find_master_bar_by_index(0).unwrap().real_bounds.x
        };

        let mut local = crate::renderer::ScoreRenderer::new(Settings::default());
        local.set_font_sizes(wide.clone());
        local.render_score(Some(score(1)), None);
        let expected = first_bar_x(local.bounds_lookup().unwrap());

        let mut renderer = WorkerScoreRenderer::new(&Settings::default());
        renderer.render_score(Some(score(1)), None);
        assert!(renderer.pump_until("postRenderFinished", WAIT));
        let default_x = first_bar_x(renderer.bounds_lookup().unwrap());

        renderer.set_font_sizes(wide.clone());
        assert_eq!(renderer.font_sizes(), &wide);
        renderer.render_score(Some(score(1)), None);
        assert!(renderer.pump_until("postRenderFinished", WAIT));
        let worker_x = first_bar_x(renderer.bounds_lookup().unwrap());

        assert_eq!(worker_x, expected);
        assert!(worker_x > default_x);
    }

    #[test]
    fn destroy_stops_the_worker() {
        let mut renderer = WorkerScoreRenderer::new(&Settings::default());
        assert!(renderer.is_usable());
        renderer.destroy();
        assert!(!renderer.is_usable());
        renderer.render();
        assert_eq!(renderer.pump(), 0);
    }
}
