//! Score layouts: walk the master bars of a score, feed them into stave
//! groups and slice the result into partials that are painted one by one.

use std::collections::HashMap;

use super::bounds::BoundsLookup;
use super::canvas::Canvas;
use super::constants::DEFAULT_PAGE_PADDING;
use super::staff::Staff;
use super::stave_group::{AccoladeSpacingCache, StaveGroup};
use super::RenderFinishedEventArgs;
use crate::error::RenderError;
use crate::events::RendererEvents;
use crate::font_sizes::FontSizes;
use crate::model::{Score, Track};
use crate::settings::{DisplaySettings, Settings};

pub mod horizontal;
pub mod page;

pub use horizontal::HorizontalScreenLayout;
pub use page::PageViewLayout;

/// Read-only inputs of one layout pass.
pub struct LayoutContext<'a> {
    pub score: &'a Score,
    /// Tracks to render, in display order
    pub tracks: &'a [&'a Track],
    pub settings: &'a Settings,
    pub font_sizes: &'a FontSizes,
    /// Available width, used by width-dependent layouts
    pub width: f64,
}

/// Deferred paint of one partial: which bars of which group, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialPaint {
    pub group_index: usize,
    /// Origin handed to the stave group
    pub x: f64,
    pub y: f64,
    /// First bar renderer within the group
    pub start_index: usize,
    pub count: usize,
    pub first_master_bar_index: usize,
    pub last_master_bar_index: usize,
}

#[derive(Debug, Clone)]
struct LazyPartial {
    args: RenderFinishedEventArgs,
    paint: PartialPaint,
}

/// State every layout shares: sizes of the last pass, normalized padding,
/// the accolade label cache and the partials registered for lazy painting.
#[derive(Debug, Default)]
pub struct LayoutCore {
    pub width: f64,
    pub height: f64,
    /// left, top, right, bottom
    pub padding: [f64; 4],
    pub accolade: AccoladeSpacingCache,
    /// Inclusive range of master bars laid out by the last pass
    pub bar_range: Option<(usize, usize)>,
    lazy_partials: HashMap<String, LazyPartial>,
    pass: u64,
    partial_count: usize,
}

impl LayoutCore {
    pub fn new() -> Self {
        Self {
            padding: DEFAULT_PAGE_PADDING,
            ..Default::default()
        }
    }

    /// Reset per-pass state. Nothing from a previous pass survives.
    pub fn begin_pass(&mut self, display: &DisplaySettings) {
        self.pass += 1;
        self.partial_count = 0;
        self.lazy_partials.clear();
        self.accolade.reset();
        self.padding = Self::normalize_padding(&display.padding);
        self.bar_range = None;
        self.width = 0.0;
        self.height = 0.0;
    }

    /// Expand padding values to left, top, right, bottom. No values means the
    /// default padding, values past the fourth are ignored.
    pub fn normalize_padding(padding: &[f64]) -> [f64; 4] {
        match *padding {
            [] => DEFAULT_PAGE_PADDING,
            [all] => [all, all, all, all],
            [horizontal, vertical] => [horizontal, vertical, horizontal, vertical],
            [left, top, right] => [left, top, right, top],
            [left, top, right, bottom, ..] => [left, top, right, bottom],
        }
    }

    /// Inclusive master bar range selected by the 1-based `start_bar` and
    /// `bar_count` (0 or less means all bars), clamped to the score.
    pub fn resolve_bar_range(display: &DisplaySettings, total_bars: usize) -> Option<(usize, usize)> {
        if total_bars == 0 {
            return None;
        }
        let last = total_bars as i64 - 1;
        let start = (display.start_bar as i64 - 1).clamp(0, last);
        let count = if display.bar_count <= 0 {
            total_bars as i64
        } else {
            display.bar_count as i64
        };
        let end = (start + count - 1).clamp(0, last);
        Some((start as usize, end as usize))
    }

    /// A stave group holding one staff per model staff of every track.
    pub fn create_empty_stave_group(&self, index: usize, ctx: &LayoutContext<'_>) -> StaveGroup {
        let display = &ctx.settings.display;
        let mut group = StaveGroup::new(index, display.scale, display.resources.clone());
        for track in ctx.tracks {
            for staff in &track.staves {
                group.add_stave(
                    track,
                    Staff::new(
                        track.index,
                        staff.index,
                        true,
                        display.staff_padding_top,
                        display.staff_padding_bottom,
                        display.scale,
                    ),
                );
            }
        }
        group
    }

    pub fn next_partial_id(&mut self) -> String {
        let id = format!("{}-{}", self.pass, self.partial_count);
        self.partial_count += 1;
        id
    }

    pub fn lazy_partial_count(&self) -> usize {
        self.lazy_partials.len()
    }

    fn store_lazy_partial(&mut self, args: RenderFinishedEventArgs, paint: PartialPaint) {
        self.lazy_partials
            .insert(args.id.clone(), LazyPartial { args, paint });
    }

    fn lazy_partial(&self, id: &str) -> Option<&LazyPartial> {
        self.lazy_partials.get(id)
    }
}

/// A layout algorithm. Implementations own the stave groups of their last
/// pass, which stay untouched until the next pass so that issued
/// `PartialPaint`s remain valid.
pub trait ScoreLayout: Send {
    fn name(&self) -> &'static str;
    fn supports_resize(&self) -> bool;
    /// X of the first bar, past padding and accolade.
    fn first_bar_x(&self) -> f64;

    fn core(&self) -> &LayoutCore;
    fn core_mut(&mut self) -> &mut LayoutCore;

    fn do_layout_and_render(
        &mut self,
        ctx: &LayoutContext<'_>,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError>;

    fn do_resize(
        &mut self,
        ctx: &LayoutContext<'_>,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError>;

    /// Paint the bars described by `paint` onto `canvas`.
    fn paint_partial(&self, paint: &PartialPaint, canvas: &mut dyn Canvas);

    fn build_bounds_lookup(&self) -> BoundsLookup;

    fn width(&self) -> f64 {
        self.core().width
    }

    fn height(&self) -> f64 {
        self.core().height
    }

    /// Announce a partial. Without lazy loading it is painted right away,
    /// otherwise it waits for `render_lazy_partial`. Empty partials are dropped.
    fn register_partial(
        &mut self,
        args: RenderFinishedEventArgs,
        paint: PartialPaint,
        lazy: bool,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) {
        if args.height == 0.0 {
            return;
        }
        if lazy {
            self.core_mut().store_lazy_partial(args.clone(), paint);
            events.partial_layout_finished.trigger(&args);
        } else {
            events.partial_layout_finished.trigger(&args);
            self.render_partial(args, &paint, canvas, events);
        }
    }

    fn render_partial(
        &self,
        mut args: RenderFinishedEventArgs,
        paint: &PartialPaint,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) {
        canvas.begin_render(args.width, args.height);
        self.paint_partial(paint, canvas);
        args.render_result = Some(canvas.end_render());
        events.partial_render_finished.trigger(&args);
    }

    fn render_lazy_partial(
        &self,
        id: &str,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError> {
        let partial = self
            .core()
            .lazy_partial(id)
            .cloned()
            .ok_or_else(|| RenderError::UnknownResult(id.to_string()))?;
        self.render_partial(partial.args, &partial.paint, canvas, events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn display(start_bar: i32, bar_count: i32) -> DisplaySettings {
        DisplaySettings {
            start_bar,
            bar_count,
            ..Default::default()
        }
    }

    #[test]
    fn padding_expands_to_four_sides() {
        assert_eq!(LayoutCore::normalize_padding(&[5.0]), [5.0; 4]);
        assert_eq!(LayoutCore::normalize_padding(&[5.0, 10.0]), [5.0, 10.0, 5.0, 10.0]);
        assert_eq!(LayoutCore::normalize_padding(&[1.0, 2.0, 3.0, 4.0]), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(LayoutCore::normalize_padding(&[]), DEFAULT_PAGE_PADDING);
    }

    #[test]
    fn bar_range_is_clamped_to_the_score() {
        assert_eq!(LayoutCore::resolve_bar_range(&display(1, 0), 5), Some((0, 4)));
        assert_eq!(LayoutCore::resolve_bar_range(&display(2, 2), 5), Some((1, 2)));
        assert_eq!(LayoutCore::resolve_bar_range(&display(0, -3), 5), Some((0, 4)));
        assert_eq!(LayoutCore::resolve_bar_range(&display(4, 10), 5), Some((3, 4)));
        assert_eq!(LayoutCore::resolve_bar_range(&display(9, 1), 5), Some((4, 4)));
        assert_eq!(LayoutCore::resolve_bar_range(&display(1, 0), 0), None);
    }

    #[test]
    fn partial_ids_are_unique_across_passes() {
        let mut core = LayoutCore::new();
        let settings = DisplaySettings::default();
        core.begin_pass(&settings);
        let a = core.next_partial_id();
        let b = core.next_partial_id();
        core.begin_pass(&settings);
        let c = core.next_partial_id();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
