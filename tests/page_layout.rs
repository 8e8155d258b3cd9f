//! Page layout through the public renderer: wrapping, resizing and bounds.

mod common;

use std::sync::Arc;

use common::{names, partials_rendered, record, score};
use pretty_assertions::assert_eq;
use scoreflow::{LayoutMode, RenderEvent, ScoreRenderer, ScoreRendererApi, Settings};

fn page_renderer(width: f64) -> ScoreRenderer {
    let mut settings = Settings::default();
    settings.display.layout_mode = LayoutMode::Page;
    let mut renderer = ScoreRenderer::new(settings);
    renderer.set_width(width);
    renderer
}

#[test]
fn one_partial_per_system() {
    let mut renderer = page_renderer(600.0);
    let seen = record(renderer.events());
    renderer.render_score(Some(Arc::new(score(1, 16))), None);

    let partials = partials_rendered(&seen);
    assert!(partials.len() > 1);
    assert_eq!(partials[0].first_master_bar_index, 0);
    assert_eq!(partials.last().unwrap().last_master_bar_index, 15);
    for pair in partials.windows(2) {
        assert_eq!(pair[1].first_master_bar_index, pair[0].last_master_bar_index + 1);
        assert!(pair[1].y > pair[0].y);
    }
    assert!(partials.iter().all(|p| p.width == 600.0));
}

#[test]
fn narrower_width_gives_more_systems() {
    let mut renderer = page_renderer(1600.0);
    let seen = record(renderer.events());
    renderer.render_score(Some(Arc::new(score(2, 16))), None);
    let wide = partials_rendered(&seen).len();

    seen.lock().unwrap().clear();
    renderer.set_width(500.0);
    renderer.resize_render();

    assert_eq!(seen.lock().unwrap().first(), Some(&RenderEvent::PreRender(true)));
    assert_eq!(names(&seen).last(), Some(&"postRenderFinished"));
    let narrow = partials_rendered(&seen).len();
    assert!(narrow > wide, "{narrow} systems at 500px, {wide} at 1600px");
}

#[test]
fn bounds_mark_the_first_bar_of_each_line() {
    let mut settings = Settings::default();
    settings.display.layout_mode = LayoutMode::Page;
    settings.display.bars_per_row = 4;
    let mut renderer = ScoreRenderer::new(settings);
    renderer.set_width(1200.0);
    renderer.render_score(Some(Arc::new(score(1, 10))), None);

    let lookup = renderer.bounds_lookup().unwrap();
    assert_eq!(lookup.stave_groups().len(), 3);
    let first_of_line: Vec<usize> = (0..10)
        .filter(|&i| lookup.find_master_bar_by_index(i).unwrap().is_first_of_line)
        .collect();
    assert_eq!(first_of_line, vec![0, 4, 8]);

    let bar = lookup.find_master_bar_by_index(5).unwrap();
    let (x, y) = (
        bar.visual_bounds.x + bar.visual_bounds.w / 2.0,
        bar.visual_bounds.y + bar.visual_bounds.h / 2.0,
    );
    assert_eq!(lookup.find_master_bar(x, y).map(|m| m.index), Some(5));
}

#[test]
fn bar_range_limits_the_pass() {
    let mut settings = Settings::default();
    settings.display.layout_mode = LayoutMode::Page;
    settings.display.start_bar = 3;
    settings.display.bar_count = 4;
    let mut renderer = ScoreRenderer::new(settings);
    renderer.set_width(2000.0);
    let seen = record(renderer.events());
    renderer.render_score(Some(Arc::new(score(1, 10))), None);

    let partials = partials_rendered(&seen);
    assert_eq!(partials.len(), 1);
    assert_eq!(
        (partials[0].first_master_bar_index, partials[0].last_master_bar_index),
        (2, 5)
    );
}
