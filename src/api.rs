//! Outer boundary of the crate: picks the local or the worker-backed
//! renderer, resolves track selections and imports notation text.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};

use crate::error::RenderError;
use crate::events::RendererEvents;
use crate::font_sizes::FontSizes;
use crate::importer;
use crate::model::Score;
use crate::renderer::bounds::BoundsLookup;
use crate::renderer::canvas::RenderEngine;
use crate::renderer::{ScoreRenderer, ScoreRendererApi};
use crate::settings::Settings;
use crate::worker::WorkerScoreRenderer;

enum Backend {
    Local(ScoreRenderer),
    Worker(WorkerScoreRenderer),
}

pub struct RenderApi {
    settings: Settings,
    backend: Backend,
    score: Option<Arc<Score>>,
    tracks: Vec<usize>,
}

impl RenderApi {
    pub fn new(settings: Settings) -> Self {
        log::set_max_level(settings.core.log_level.to_level_filter());

        let use_worker = settings.core.use_workers
            && RenderEngine::from_name(&settings.core.engine).is_ok_and(|e| e.supports_workers());
        let backend = if use_worker {
            debug!("Rendering through a worker");
            Backend::Worker(WorkerScoreRenderer::new(&settings))
        } else {
            Backend::Local(ScoreRenderer::new(settings.clone()))
        };

        Self {
            settings,
            backend,
            score: None,
            tracks: Vec::new(),
        }
    }

    fn renderer(&mut self) -> &mut dyn ScoreRendererApi {
        match &mut self.backend {
            Backend::Local(r) => r,
            Backend::Worker(r) => r,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn score(&self) -> Option<&Arc<Score>> {
        self.score.as_ref()
    }

    /// Track indexes of the last selection.
    pub fn tracks(&self) -> &[usize] {
        &self.tracks
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.backend, Backend::Worker(_))
    }

    /// False when a worker was requested but could not be started; every
    /// call is then dropped without events.
    pub fn is_usable(&self) -> bool {
        match &self.backend {
            Backend::Local(_) => true,
            Backend::Worker(w) => w.is_usable(),
        }
    }

    /// Text measurement tables used for layout, on both sides of a worker.
    pub fn set_font_sizes(&mut self, font_sizes: FontSizes) {
        match &mut self.backend {
            Backend::Local(r) => r.set_font_sizes(font_sizes),
            Backend::Worker(w) => w.set_font_sizes(font_sizes),
        }
    }

    pub fn events(&mut self) -> &mut RendererEvents {
        self.renderer().events()
    }

    /// Resolve a track selection: nothing selects the first track, `[-1]`
    /// selects all tracks, anything else keeps the indexes that exist.
    pub fn resolve_tracks(score: &Score, track_indexes: Option<&[i32]>) -> Vec<usize> {
        match track_indexes {
            None | Some([]) => {
                if score.tracks.is_empty() {
                    Vec::new()
                } else {
                    vec![0]
                }
            }
            Some([-1]) => (0..score.tracks.len()).collect(),
            Some(indexes) => indexes
                .iter()
                .filter_map(|&i| usize::try_from(i).ok())
                .filter(|&i| i < score.tracks.len())
                .collect(),
        }
    }

    pub fn render_score(&mut self, score: Arc<Score>, track_indexes: Option<&[i32]>) {
        self.tracks = Self::resolve_tracks(&score, track_indexes);
        self.score = Some(Arc::clone(&score));
        let tracks = self.tracks.clone();
        self.renderer().render_score(Some(score), Some(tracks));
    }

    /// Render other tracks of the current score.
    pub fn render_tracks(&mut self, track_indexes: &[i32]) {
        match self.score.clone() {
            Some(score) => self.render_score(score, Some(track_indexes)),
            None => debug!("No score loaded, track selection ignored"),
        }
    }

    /// Import MusicXML text and render it. Import failures are reported on
    /// the `error` channel.
    pub fn load_musicxml(&mut self, xml: &str, track_indexes: Option<&[i32]>) {
        match importer::parse_musicxml(xml) {
            Ok(score) => self.render_score(Arc::new(score), track_indexes),
            Err(e) => self.on_error(e),
        }
    }

    pub fn render(&mut self) {
        self.renderer().render();
    }

    pub fn resize_render(&mut self) {
        self.renderer().resize_render();
    }

    pub fn render_result(&mut self, result_id: &str) {
        self.renderer().render_result(result_id);
    }

    pub fn update_settings(&mut self, settings: Settings) {
        log::set_max_level(settings.core.log_level.to_level_filter());
        self.settings = settings.clone();
        self.renderer().update_settings(settings);
    }

    pub fn width(&mut self) -> f64 {
        self.renderer().width()
    }

    pub fn set_width(&mut self, width: f64) {
        self.renderer().set_width(width);
    }

    pub fn bounds_lookup(&mut self) -> Option<&BoundsLookup> {
        self.renderer().bounds_lookup()
    }

    /// Deliver pending worker results. The local renderer delivers events
    /// immediately, so this is a no-op for it.
    pub fn pump(&mut self) -> usize {
        match &mut self.backend {
            Backend::Local(_) => 0,
            Backend::Worker(w) => w.pump(),
        }
    }

    /// Block until the current pass finished or failed. Returns false on
    /// timeout.
    pub fn wait_for_render(&mut self, timeout: Duration) -> bool {
        match &mut self.backend {
            Backend::Local(_) => true,
            Backend::Worker(w) => w.pump_until("postRenderFinished", timeout),
        }
    }

    pub fn destroy(&mut self) {
        self.score = None;
        self.tracks.clear();
        self.renderer().destroy();
    }

    fn on_error(&mut self, e: RenderError) {
        error!("An unexpected error occurred: {e}");
        self.events().error.trigger(&e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RenderEvent;
    use crate::model::{Bar, Beat, Duration as NoteDuration, MasterBar, Track};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn score(tracks: usize) -> Arc<Score> {
        let mut score = Score::new();
        score.add_master_bar(MasterBar::new(4, 4));
        for t in 0..tracks {
            let mut track = Track::new(format!("Track {t}"), format!("T{t}"));
            track.staves[0].bars.push(Bar::new(vec![Beat::rest(NoteDuration::Whole)]));
            score.add_track(track);
        }
        Arc::new(score)
    }

    fn recording(api: &mut RenderApi) -> Arc<Mutex<Vec<RenderEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        api.events().subscribe_all(move |e| s.lock().unwrap().push(e));
        seen
    }

    #[test]
    fn track_selection_rules() {
        let score = score(3);
        assert_eq!(RenderApi::resolve_tracks(&score, None), vec![0]);
        assert_eq!(RenderApi::resolve_tracks(&score, Some(&[])), vec![0]);
        assert_eq!(RenderApi::resolve_tracks(&score, Some(&[-1])), vec![0, 1, 2]);
        assert_eq!(RenderApi::resolve_tracks(&score, Some(&[2, 5, -3, 1])), vec![2, 1]);
        assert!(RenderApi::resolve_tracks(&Score::new(), None).is_empty());
    }

    #[test]
    fn local_backend_renders_synchronously() {
        let mut api = RenderApi::new(Settings::default());
        assert!(!api.is_worker());
        let seen = recording(&mut api);

        api.render_score(score(2), Some(&[-1]));
        assert_eq!(api.tracks(), &[0, 1]);
        assert!(api.wait_for_render(Duration::from_millis(1)));
        assert_eq!(seen.lock().unwrap().last().map(|e| e.name()), Some("postRenderFinished"));
        assert!(api.bounds_lookup().is_some());
    }

    #[test]
    fn workers_are_used_when_requested() {
        let mut settings = Settings::default();
        settings.core.use_workers = true;
        let mut api = RenderApi::new(settings);
        assert!(api.is_worker());
        assert!(api.is_usable());

        api.render_score(score(1), None);
        assert!(api.wait_for_render(Duration::from_secs(10)));
        assert_eq!(api.bounds_lookup().map(|b| b.master_bar_count()), Some(1));
    }

    #[test]
    fn destroyed_workers_are_not_usable() {
        let mut settings = Settings::default();
        settings.core.use_workers = true;
        let mut api = RenderApi::new(settings);
        assert!(api.is_usable());

        api.destroy();
        assert!(api.is_worker());
        assert!(!api.is_usable());
        assert!(RenderApi::new(Settings::default()).is_usable());
    }

    #[test]
    fn unknown_engines_stay_local_and_report_on_render() {
        let mut settings = Settings::default();
        settings.core.use_workers = true;
        settings.core.engine = "webgl".into();
        let mut api = RenderApi::new(settings);
        assert!(!api.is_worker());
        let seen = recording(&mut api);

        api.render_score(score(1), None);
        let events = seen.lock().unwrap();
        assert!(matches!(events.as_slice(), [RenderEvent::Error(RenderError::Configuration(_))]));
    }

    #[test]
    fn import_failures_go_to_the_error_channel() {
        let mut api = RenderApi::new(Settings::default());
        let seen = recording(&mut api);

        api.load_musicxml("<score-partwise><part>", None);

        let events = seen.lock().unwrap();
        assert!(matches!(events.as_slice(), [RenderEvent::Error(RenderError::Import(_))]));
        assert!(api.score().is_none());
    }

    #[test]
    fn render_tracks_reuses_the_loaded_score() {
        let mut api = RenderApi::new(Settings::default());
        api.render_score(score(3), None);
        api.render_tracks(&[2]);
        assert_eq!(api.tracks(), &[2]);
    }
}
