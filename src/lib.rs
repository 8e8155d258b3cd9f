//! scoreflow: stave grouping, score layout and incremental rendering for
//! music notation.
//!
//! A [`Score`] is laid out bar by bar into stave groups (systems of staves
//! joined by an accolade). The horizontal layout slices one endless system
//! into partials that are announced and painted one after another, so a
//! viewer can show the first bars before the whole score is finished. The
//! same pipeline runs on a background worker, driven through JSON messages.
//!
//! # Example
//! ```no_run
//! use scoreflow::{parse_musicxml, render_score_to_svg, Settings};
//!
//! let xml = std::fs::read_to_string("path/to/score.musicxml").unwrap();
//! let score = parse_musicxml(&xml).unwrap();
//! let rendered = render_score_to_svg(&score, None, &Settings::default()).unwrap();
//! println!("{} partials, {}x{}", rendered.partials.len(), rendered.width, rendered.height);
//! ```

pub mod api;
pub mod error;
pub mod events;
pub mod font_sizes;
pub mod importer;
pub mod model;
pub mod renderer;
pub mod settings;
pub mod worker;

use std::sync::{Arc, Mutex};

pub use api::RenderApi;
pub use error::{ErrorPayload, RenderError};
pub use events::{EventEmitter, RenderEvent, RendererEvents};
pub use font_sizes::FontSizes;
pub use importer::parse_musicxml;
pub use model::*;
pub use renderer::bounds::BoundsLookup;
pub use renderer::{RenderFinishedEventArgs, ScoreRenderer, ScoreRendererApi};
pub use settings::{LayoutMode, Settings};
pub use worker::WorkerScoreRenderer;

/// Width used by `render_score_to_svg` for width-dependent layouts.
pub const DEFAULT_RENDER_WIDTH: f64 = 820.0;

/// Output of a one-shot render.
#[derive(Debug, Clone)]
pub struct RenderedScore {
    pub width: f64,
    pub height: f64,
    /// Painted partials, in the order they were produced
    pub partials: Vec<RenderFinishedEventArgs>,
    pub bounds_lookup: BoundsLookup,
}

impl RenderedScore {
    /// One SVG document with every partial placed at its position.
    pub fn to_svg(&self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {:.1} {:.1}" width="{:.1}" height="{:.1}">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push('\n');
        for partial in &self.partials {
            let Some(content) = partial.render_result.as_deref() else {
                continue;
            };
            match content.strip_prefix("<svg") {
                Some(rest) => {
                    svg.push_str(&format!(r#"<svg x="{:.1}" y="{:.1}""#, partial.x, partial.y));
                    svg.push_str(rest);
                }
                None => svg.push_str(content),
            }
        }
        svg.push_str("</svg>\n");
        svg
    }
}

/// Lay out and paint `score` on the calling thread.
///
/// Track selection follows [`RenderApi::resolve_tracks`]. Lazy loading is
/// turned off so every partial comes back painted.
pub fn render_score_to_svg(
    score: &Score,
    track_indexes: Option<&[i32]>,
    settings: &Settings,
) -> Result<RenderedScore, RenderError> {
    let mut settings = settings.clone();
    settings.core.enable_lazy_loading = false;

    let mut renderer = ScoreRenderer::new(settings);
    renderer.set_width(DEFAULT_RENDER_WIDTH);

    let partials = Arc::new(Mutex::new(Vec::new()));
    let failure = Arc::new(Mutex::new(None));
    let size = Arc::new(Mutex::new((0.0, 0.0)));

    let events = renderer.events();
    let p = Arc::clone(&partials);
    events.partial_render_finished.on(move |args| {
        if let Ok(mut partials) = p.lock() {
            partials.push(args.clone());
        }
    });
    let f = Arc::clone(&failure);
    events.error.on(move |e| {
        if let Ok(mut failure) = f.lock() {
            failure.get_or_insert_with(|| e.clone());
        }
    });
    let s = Arc::clone(&size);
    events.render_finished.on(move |args| {
        if let Ok(mut size) = s.lock() {
            *size = (args.total_width, args.total_height);
        }
    });

    let tracks = RenderApi::resolve_tracks(score, track_indexes);
    renderer.render_score(Some(Arc::new(score.clone())), Some(tracks));

    if let Some(e) = failure.lock().ok().and_then(|mut f| f.take()) {
        return Err(e);
    }
    let bounds_lookup = renderer
        .bounds_lookup()
        .cloned()
        .ok_or_else(|| RenderError::Configuration("nothing was rendered".into()))?;
    let (width, height) = size.lock().map(|s| *s).unwrap_or((0.0, 0.0));
    let partials = partials
        .lock()
        .map(|mut p| std::mem::take(&mut *p))
        .unwrap_or_default();

    Ok(RenderedScore {
        width,
        height,
        partials,
        bounds_lookup,
    })
}

/// Convert a score to the JSON form used by the worker protocol.
pub fn score_to_json(score: &Score) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(score)?)
}
