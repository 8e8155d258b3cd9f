//! Score renderer. Runs a layout pass over a score and reports every stage
//! through the renderer events.
//!
//! One `render_score` call produces, in order: `pre_render`, then per
//! partial `partial_layout_finished` (and `partial_render_finished` once the
//! partial is painted), then `render_finished` with the total size and
//! finally `post_render_finished` with the bounds lookup of the pass. A
//! failed pass emits one `error` and publishes no bounds.

pub mod bar_helpers;
pub mod bar_renderer;
pub mod bounds;
pub mod canvas;
pub(crate) mod constants;
pub mod layout;
pub mod staff;
pub mod stave_group;
pub mod svg_canvas;

use std::sync::Arc;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::events::RendererEvents;
use crate::font_sizes::FontSizes;
use crate::model::{Score, Track};
use crate::settings::{LayoutMode, Settings};
use bounds::BoundsLookup;
use canvas::{Canvas, RenderEngine};
use layout::{HorizontalScreenLayout, LayoutContext, PageViewLayout, ScoreLayout};

// ═══════════════════════════════════════════════════════════════════════
// Event payload
// ═══════════════════════════════════════════════════════════════════════

/// Output of one rendering stage: a partial or the whole pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFinishedEventArgs {
    /// Key for `render_result`; empty for the whole-pass event
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub total_width: f64,
    pub total_height: f64,
    pub first_master_bar_index: usize,
    pub last_master_bar_index: usize,
    /// Painted content (SVG markup) once the partial is rendered
    pub render_result: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Renderer interface
// ═══════════════════════════════════════════════════════════════════════

/// Operations shared by the local renderer and the worker proxy, so callers
/// cannot tell which one they drive.
pub trait ScoreRendererApi {
    /// Render `score` with the given track indexes (`None` renders all
    /// tracks). A `None` score re-renders nothing and only logs.
    fn render_score(&mut self, score: Option<Arc<Score>>, track_indexes: Option<Vec<usize>>);
    /// Re-render the current score.
    fn render(&mut self);
    /// Re-fit the current layout to a new width.
    fn resize_render(&mut self);
    /// Paint a partial registered for lazy loading.
    fn render_result(&mut self, result_id: &str);
    fn update_settings(&mut self, settings: Settings);
    fn width(&self) -> f64;
    fn set_width(&mut self, width: f64);
    fn bounds_lookup(&self) -> Option<&BoundsLookup>;
    fn events(&mut self) -> &mut RendererEvents;
    fn destroy(&mut self);
}

// ═══════════════════════════════════════════════════════════════════════
// Local renderer
// ═══════════════════════════════════════════════════════════════════════

pub struct ScoreRenderer {
    settings: Settings,
    events: RendererEvents,
    font_sizes: FontSizes,
    width: f64,

    score: Option<Arc<Score>>,
    tracks: Vec<usize>,
    rendered_tracks: Option<Vec<usize>>,

    layout: Option<Box<dyn ScoreLayout>>,
    layout_mode: Option<LayoutMode>,
    canvas: Option<Box<dyn Canvas>>,
    engine: Option<String>,
    bounds_lookup: Option<BoundsLookup>,
}

impl ScoreRenderer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            events: RendererEvents::new(),
            font_sizes: FontSizes::default(),
            width: 0.0,
            score: None,
            tracks: Vec::new(),
            rendered_tracks: None,
            layout: None,
            layout_mode: None,
            canvas: None,
            engine: None,
            bounds_lookup: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn score(&self) -> Option<&Arc<Score>> {
        self.score.as_ref()
    }

    /// Track indexes of the current score that will be rendered.
    pub fn tracks(&self) -> &[usize] {
        &self.tracks
    }

    pub fn layout(&self) -> Option<&dyn ScoreLayout> {
        self.layout.as_deref()
    }

    /// Replace the text measurement tables, e.g. with the ones of the
    /// control side when running in a worker.
    pub fn set_font_sizes(&mut self, font_sizes: FontSizes) {
        self.font_sizes = font_sizes;
        // canvases carry their own copy
        self.canvas = None;
        self.engine = None;
    }

    /// Resolve `track_indexes` against `score`: `None` selects all tracks,
    /// invalid indexes are skipped and an empty selection falls back to the
    /// first track.
    fn select_tracks(score: &Score, track_indexes: Option<Vec<usize>>) -> Vec<usize> {
        let mut tracks: Vec<usize> = match track_indexes {
            None => (0..score.tracks.len()).collect(),
            Some(indexes) => indexes
                .into_iter()
                .filter(|&i| i < score.tracks.len())
                .collect(),
        };
        if tracks.is_empty() && !score.tracks.is_empty() {
            tracks.push(0);
        }
        tracks
    }

    /// Creates the layout for the configured mode. Returns true if a new
    /// layout was created.
    fn recreate_layout(&mut self) -> bool {
        let mode = self.settings.display.layout_mode;
        if self.layout.is_some() && self.layout_mode == Some(mode) {
            return false;
        }
        self.layout = Some(match mode {
            LayoutMode::Horizontal => Box::new(HorizontalScreenLayout::new()),
            LayoutMode::Page => Box::new(PageViewLayout::new()),
        });
        self.layout_mode = Some(mode);
        true
    }

    /// Creates the canvas for the configured engine. Returns true if a new
    /// canvas was created.
    fn recreate_canvas(&mut self) -> Result<bool, RenderError> {
        let name = &self.settings.core.engine;
        if self.canvas.is_some() && self.engine.as_ref() == Some(name) {
            return Ok(false);
        }
        let engine = RenderEngine::from_name(name)?;
        self.canvas = Some(engine.create_canvas(self.font_sizes.clone()));
        self.engine = Some(name.clone());
        Ok(true)
    }

    fn fail(&mut self, e: RenderError) {
        error!("Rendering failed: {e}");
        self.bounds_lookup = None;
        self.events.error.trigger(&e);
    }

    fn try_render(&mut self) -> Result<(), RenderError> {
        let Some(score) = self.score.clone() else {
            warn!("Rendering skipped, no score set");
            return Ok(());
        };
        self.recreate_layout();
        let width_dependent = self.layout.as_ref().is_some_and(|l| l.supports_resize());
        if width_dependent && self.width <= 0.0 {
            warn!("Rendering skipped because of width=0 (element invisible)");
            return Ok(());
        }

        self.bounds_lookup = None;
        self.recreate_canvas()?;
        score.validate()?;

        debug!("Rendering {} tracks", self.tracks.len());
        self.rendered_tracks = Some(self.tracks.clone());
        self.layout_and_render(&score, false)?;
        debug!("Rendering finished");
        Ok(())
    }

    fn layout_and_render(&mut self, score: &Score, resize: bool) -> Result<(), RenderError> {
        self.events.pre_render.trigger(&resize);

        let tracks: Vec<&Track> = self
            .tracks
            .iter()
            .filter_map(|&i| score.tracks.get(i))
            .collect();
        let ctx = LayoutContext {
            score,
            tracks: &tracks,
            settings: &self.settings,
            font_sizes: &self.font_sizes,
            width: self.width,
        };
        let layout = self
            .layout
            .as_mut()
            .ok_or_else(|| RenderError::Configuration("no layout available".into()))?;
        let canvas = self
            .canvas
            .as_mut()
            .ok_or_else(|| RenderError::Configuration("no canvas available".into()))?;

        if resize {
            layout.do_resize(&ctx, canvas.as_mut(), &mut self.events)?;
        } else {
            layout.do_layout_and_render(&ctx, canvas.as_mut(), &mut self.events)?;
        }

        let (first, last) = layout.core().bar_range.unwrap_or((0, 0));
        let finished = RenderFinishedEventArgs {
            x: 0.0,
            y: 0.0,
            width: layout.width(),
            height: layout.height(),
            total_width: layout.width(),
            total_height: layout.height(),
            first_master_bar_index: first,
            last_master_bar_index: last,
            ..Default::default()
        };
        let lookup = layout.build_bounds_lookup();

        self.events.render_finished.trigger(&finished);
        self.bounds_lookup = Some(lookup.clone());
        self.events.post_render_finished.trigger(&lookup);
        Ok(())
    }

    fn try_resize_render(&mut self) -> Result<(), RenderError> {
        let tracks_changed = self.rendered_tracks.as_ref() != Some(&self.tracks);
        let layout_changed = self.recreate_layout();
        let canvas_changed = self.recreate_canvas()?;
        if layout_changed || canvas_changed || tracks_changed {
            self.try_render()?;
            return Ok(());
        }

        let Some(score) = self.score.clone() else {
            return Ok(());
        };
        let supports_resize = self.layout.as_ref().is_some_and(|l| l.supports_resize());
        if !supports_resize {
            debug!("Current layout does not support dynamic resizing, nothing was done");
            return Ok(());
        }
        if self.width <= 0.0 {
            warn!("Resize skipped because of width=0 (element invisible)");
            return Ok(());
        }
        self.bounds_lookup = None;
        self.layout_and_render(&score, true)
    }
}

impl ScoreRendererApi for ScoreRenderer {
    fn render_score(&mut self, score: Option<Arc<Score>>, track_indexes: Option<Vec<usize>>) {
        let Some(score) = score else {
            warn!("Rendering skipped, no score given");
            return;
        };
        self.tracks = Self::select_tracks(&score, track_indexes);
        self.score = Some(score);
        self.render();
    }

    fn render(&mut self) {
        if let Err(e) = self.try_render() {
            self.fail(e);
        }
    }

    fn resize_render(&mut self) {
        if let Err(e) = self.try_resize_render() {
            self.fail(e);
        }
    }

    fn render_result(&mut self, result_id: &str) {
        let result = match (self.layout.as_ref(), self.canvas.as_mut()) {
            (Some(layout), Some(canvas)) => {
                layout.render_lazy_partial(result_id, canvas.as_mut(), &mut self.events)
            }
            _ => Err(RenderError::UnknownResult(result_id.to_string())),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    fn bounds_lookup(&self) -> Option<&BoundsLookup> {
        self.bounds_lookup.as_ref()
    }

    fn events(&mut self) -> &mut RendererEvents {
        &mut self.events
    }

    fn destroy(&mut self) {
        self.score = None;
        self.tracks.clear();
        self.rendered_tracks = None;
        self.layout = None;
        self.layout_mode = None;
        self.canvas = None;
        self.engine = None;
        self.bounds_lookup = None;
    }
}
