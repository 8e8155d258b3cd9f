//! Page layout: bars wrap into systems that fill the available width and
//! are stacked top to bottom, one partial per system.

use log::debug;

use super::{LayoutContext, LayoutCore, PartialPaint, ScoreLayout};
use crate::error::RenderError;
use crate::events::RendererEvents;
use crate::renderer::bounds::{BoundsLookup, BoundsLookupBuilder};
use crate::renderer::canvas::{Canvas, TextAlign};
use crate::renderer::constants::GROUP_SPACING;
use crate::renderer::stave_group::StaveGroup;
use crate::renderer::RenderFinishedEventArgs;

#[derive(Debug, Default)]
pub struct PageViewLayout {
    core: LayoutCore,
    groups: Vec<StaveGroup>,
}

impl PageViewLayout {
    pub fn new() -> Self {
        Self {
            core: LayoutCore::new(),
            groups: Vec::new(),
        }
    }

    pub fn stave_groups(&self) -> &[StaveGroup] {
        &self.groups
    }

    /// Width available to the bars of one system.
    fn max_width(&self, ctx: &LayoutContext<'_>) -> f64 {
        ctx.width - self.core.padding[0] - self.core.padding[2]
    }

    /// Fill a new group from `start` until it is full or `end` is reached.
    fn create_stave_group(&mut self, ctx: &LayoutContext<'_>, start: usize, end: usize) -> StaveGroup {
        let mut group = self.core.create_empty_stave_group(self.groups.len(), ctx);
        let bars_per_row = ctx.settings.display.bars_per_row;
        let max_width = self.max_width(ctx);

        for bar_index in start..=end {
            if group
                .add_bars(
                    &ctx.score.master_bars,
                    ctx.tracks,
                    bar_index,
                    &mut self.core.accolade,
                    ctx.font_sizes,
                )
                .is_none()
            {
                break;
            }

            let is_full = if bars_per_row <= 0 {
                group.width > max_width
            } else {
                group.master_bars.len() > bars_per_row as usize
            };
            if is_full {
                // a group that cannot hold even one bar keeps it anyway
                group.revert_last_bar();
                group.is_full = true;
                return group;
            }
        }
        group.is_last = group.last_bar_index() == Some(end);
        group
    }

    /// Stretch full groups, shrink groups that overflow.
    fn fit_group(&self, group: &mut StaveGroup, max_width: f64) {
        if group.is_full || group.width > max_width {
            group.scale_to_width(max_width);
        }
    }

    fn layout_groups(
        &mut self,
        ctx: &LayoutContext<'_>,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError> {
        let display = &ctx.settings.display;
        self.core.begin_pass(display);
        self.groups.clear();
        let pad = self.core.padding;
        let max_width = self.max_width(ctx);
        let group_spacing = GROUP_SPACING * display.scale;

        let mut y = pad[1];
        let range = LayoutCore::resolve_bar_range(display, ctx.score.bar_count());
        self.core.bar_range = range;

        if let Some((start, end)) = range {
            let mut current = start;
            while current <= end {
                let mut group = self.create_stave_group(ctx, current, end);
                let Some(last) = group.last_bar_index() else {
                    break;
                };
                group.x = pad[0];
                group.y = y;
                self.fit_group(&mut group, max_width);
                group.finalize_group();
                debug!(
                    "{}: System {} holds bars {} to {}",
                    self.name(),
                    group.index,
                    current,
                    last
                );
                y += group.height() + group_spacing;
                self.groups.push(group);
                current = last + 1;
            }
        }

        self.core.width = ctx.width;
        self.core.height = (y + pad[3]).floor();

        let mut paints = Vec::with_capacity(self.groups.len());
        for (i, group) in self.groups.iter().enumerate() {
            let first = group.master_bars.first().map_or(0, |mb| mb.index);
            let last = group.last_bar_index().unwrap_or(first);
            let top = if i == 0 { 0.0 } else { group.y };
            let args = RenderFinishedEventArgs {
                id: String::new(),
                x: 0.0,
                y: top,
                width: self.core.width,
                height: group.y + group.height() + group_spacing - top,
                total_width: self.core.width,
                total_height: self.core.height,
                first_master_bar_index: first,
                last_master_bar_index: last,
                render_result: None,
            };
            let paint = PartialPaint {
                group_index: i,
                x: 0.0,
                y: -top,
                start_index: 0,
                count: group.master_bars.len(),
                first_master_bar_index: first,
                last_master_bar_index: last,
            };
            paints.push((args, paint));
        }

        let lazy = ctx.settings.core.enable_lazy_loading;
        for (mut args, paint) in paints {
            args.id = self.core.next_partial_id();
            self.register_partial(args, paint, lazy, canvas, events);
        }
        Ok(())
    }
}

impl ScoreLayout for PageViewLayout {
    fn name(&self) -> &'static str {
        "PageView"
    }

    fn supports_resize(&self) -> bool {
        true
    }

    fn first_bar_x(&self) -> f64 {
        let mut x = self.core.padding[0];
        if let Some(group) = self.groups.first() {
            x += group.accolade_spacing;
        }
        x
    }

    fn core(&self) -> &LayoutCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayoutCore {
        &mut self.core
    }

    fn do_layout_and_render(
        &mut self,
        ctx: &LayoutContext<'_>,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError> {
        self.layout_groups(ctx, canvas, events)
    }

    /// Systems depend on the width, so a resize re-fits every bar.
    fn do_resize(
        &mut self,
        ctx: &LayoutContext<'_>,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError> {
        self.layout_groups(ctx, canvas, events)
    }

    fn paint_partial(&self, paint: &PartialPaint, canvas: &mut dyn Canvas) {
        let Some(group) = self.groups.get(paint.group_index) else {
            return;
        };
        debug!(
            "{}: Rendering partial from bar {} to {}",
            self.name(),
            paint.first_master_bar_index,
            paint.last_master_bar_index
        );
        canvas.set_text_align(TextAlign::Left);
        group.paint(paint.x, paint.y, canvas);
    }

    fn build_bounds_lookup(&self) -> BoundsLookup {
        let mut builder = BoundsLookupBuilder::new();
        for group in &self.groups {
            group.build_bounds_lookup(&mut builder);
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::font_sizes::FontSizes;
    use crate::model::{Bar, Beat, Duration, MasterBar, Score, Track};
    use crate::renderer::svg_canvas::SvgCanvas;
    use crate::settings::{LayoutMode, Settings};
    use pretty_assertions::assert_eq;

    fn score(bars: usize) -> Score {
        let mut score = Score::new();
        let mut track = Track::new("Violin", "Vln.");
        for _ in 0..bars {
            score.add_master_bar(MasterBar::new(4, 4));
            track.staves[0].bars.push(Bar::new(vec![Beat::note(Duration::Quarter, 3); 4]));
        }
        score.add_track(track);
        score
    }

    fn layout(score: &Score, settings: &Settings, width: f64) -> (PageViewLayout, Vec<RenderFinishedEventArgs>) {
        let tracks: Vec<&Track> = score.tracks.iter().collect();
        let fonts = FontSizes::default();
        let ctx = LayoutContext {
            score,
            tracks: &tracks,
            settings,
            font_sizes: &fonts,
            width,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut events = RendererEvents::new();
        let s = Arc::clone(&seen);
        events.partial_render_finished.on(move |e| s.lock().unwrap().push(e.clone()));

        let mut layout = PageViewLayout::new();
        let mut canvas = SvgCanvas::new(FontSizes::default());
        layout.do_layout_and_render(&ctx, &mut canvas, &mut events).unwrap();
        let partials = seen.lock().unwrap().clone();
        (layout, partials)
    }

    fn page_settings() -> Settings {
        let mut settings = Settings::default();
        settings.display.layout_mode = LayoutMode::Page;
        settings
    }

    #[test]
    fn fixed_bars_per_row_wraps_systems() {
        let mut settings = page_settings();
        settings.display.bars_per_row = 3;
        let (layout, partials) = layout(&score(7), &settings, 2000.0);

        let rows: Vec<Vec<usize>> = layout
            .stave_groups()
            .iter()
            .map(|g| g.master_bars.iter().map(|mb| mb.index).collect())
            .collect();
        assert_eq!(rows, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert_eq!(partials.len(), 3);
        assert!(layout.stave_groups()[2].is_last);
        assert!(layout.stave_groups()[0].is_full);
    }

    #[test]
    fn systems_fit_the_available_width() {
        let settings = page_settings();
        let width = 500.0;
        let (layout, _) = layout(&score(12), &settings, width);
        let groups = layout.stave_groups();
        assert!(groups.len() > 1);

        let max_width = width - 40.0;
        for group in &groups[..groups.len() - 1] {
            assert!((group.width - max_width).abs() < 1e-6);
        }
        let bars: usize = groups.iter().map(|g| g.master_bars.len()).sum();
        assert_eq!(bars, 12);
    }

    #[test]
    fn systems_are_stacked_with_spacing() {
        let mut settings = page_settings();
        settings.display.bars_per_row = 2;
        let (layout, partials) = layout(&score(4), &settings, 1000.0);
        let groups = layout.stave_groups();
        assert_eq!(groups[1].y, groups[0].y + groups[0].height() + GROUP_SPACING);
        assert_eq!(partials[1].y, groups[1].y);
        assert_eq!(partials[0].first_master_bar_index, 0);
        assert_eq!(partials[1].last_master_bar_index, 3);
        assert!(layout.height() >= groups[1].y + groups[1].height());
    }

    #[test]
    fn only_the_first_system_measures_labels() {
        let mut settings = page_settings();
        settings.display.bars_per_row = 1;
        let (layout, _) = layout(&score(2), &settings, 1000.0);
        let groups = layout.stave_groups();
        assert!(groups[0].accolade_spacing > 0.0);
        assert_eq!(groups[1].accolade_spacing, 0.0);
        assert_eq!(layout.first_bar_x(), 20.0 + groups[0].accolade_spacing);
    }

    #[test]
    fn bounds_cover_every_system() {
        let mut settings = page_settings();
        settings.display.bars_per_row = 2;
        let (layout, _) = layout(&score(5), &settings, 1000.0);
        let lookup = layout.build_bounds_lookup();
        assert_eq!(lookup.stave_groups().len(), 3);
        assert_eq!(lookup.master_bar_count(), 5);
        let master = lookup.find_master_bar_by_index(2).unwrap();
        assert!(master.is_first_of_line);
    }
}
