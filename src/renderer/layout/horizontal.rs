//! All bars in one continuous system, cut into partials of
//! `bar_count_per_partial` bars for incremental delivery.

use log::debug;

use super::{LayoutContext, LayoutCore, PartialPaint, ScoreLayout};
use crate::error::RenderError;
use crate::events::RendererEvents;
use crate::renderer::bounds::{BoundsLookup, BoundsLookupBuilder};
use crate::renderer::canvas::{Canvas, TextAlign};
use crate::renderer::stave_group::StaveGroup;
use crate::renderer::RenderFinishedEventArgs;

/// One run of master bars painted by a single partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorizontalScreenLayoutPartialInfo {
    pub x: f64,
    pub width: f64,
    pub master_bars: Vec<usize>,
}

impl HorizontalScreenLayoutPartialInfo {
    fn starting_at(x: f64) -> Self {
        Self {
            x,
            ..Default::default()
        }
    }

    fn first_bar(&self) -> usize {
        self.master_bars.first().copied().unwrap_or_default()
    }

    fn last_bar(&self) -> usize {
        self.master_bars.last().copied().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct HorizontalScreenLayout {
    core: LayoutCore,
    group: Option<StaveGroup>,
    partials: Vec<HorizontalScreenLayoutPartialInfo>,
}

impl HorizontalScreenLayout {
    pub fn new() -> Self {
        Self {
            core: LayoutCore::new(),
            group: None,
            partials: Vec::new(),
        }
    }

    pub fn stave_group(&self) -> Option<&StaveGroup> {
        self.group.as_ref()
    }

    /// Partials of the last pass, left to right.
    pub fn partials(&self) -> &[HorizontalScreenLayoutPartialInfo] {
        &self.partials
    }

    fn close_partial(&self, partial: &HorizontalScreenLayoutPartialInfo) {
        debug!(
            "{}: Finished partial from bar {} to {}",
            self.name(),
            partial.first_bar(),
            partial.last_bar()
        );
    }
}

impl ScoreLayout for HorizontalScreenLayout {
    fn name(&self) -> &'static str {
        "HorizontalScreen"
    }

    fn supports_resize(&self) -> bool {
        false
    }

    fn first_bar_x(&self) -> f64 {
        let mut x = self.core.padding[0];
        if let Some(group) = &self.group {
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

    fn do_resize(
        &mut self,
        _ctx: &LayoutContext<'_>,
        _canvas: &mut dyn Canvas,
        _events: &mut RendererEvents,
    ) -> Result<(), RenderError> {
        // not supported
        Ok(())
    }

    fn do_layout_and_render(
        &mut self,
        ctx: &LayoutContext<'_>,
        canvas: &mut dyn Canvas,
        events: &mut RendererEvents,
    ) -> Result<(), RenderError> {
        let display = &ctx.settings.display;
        self.core.begin_pass(display);
        self.group = None;
        self.partials.clear();
        let pad = self.core.padding;

        let mut group = self.core.create_empty_stave_group(0, ctx);
        group.is_last = true;
        group.x = pad[0];
        group.y = pad[1];

        let count_per_partial = display.bar_count_per_partial();
        let max_partial_len = count_per_partial + display.max_linked_bars_per_partial();

        let mut partials: Vec<HorizontalScreenLayoutPartialInfo> = Vec::new();
        let mut current = HorizontalScreenLayoutPartialInfo::default();
        let mut render_x = 0.0;

        let range = LayoutCore::resolve_bar_range(display, ctx.score.bar_count());
        self.core.bar_range = range;
        if let Some((start, end)) = range {
            for bar_index in start..=end {
                let Some(result) = group.add_bars(
                    &ctx.score.master_bars,
                    ctx.tracks,
                    bar_index,
                    &mut self.core.accolade,
                    ctx.font_sizes,
                ) else {
                    continue;
                };

                // a linked bar may not open a partial on its own
                let fold_into_previous = current.master_bars.is_empty()
                    && result.is_linked_to_previous
                    && partials
                        .last()
                        .is_some_and(|p| p.master_bars.len() < max_partial_len);

                if fold_into_previous {
                    if let Some(previous) = partials.last_mut() {
                        previous.master_bars.push(bar_index);
                        previous.width += result.width;
                    }
                    render_x += result.width;
                    current.x = render_x;
                } else {
                    current.master_bars.push(bar_index);
                    current.width += result.width;
                    if current.master_bars.len() >= count_per_partial {
                        if partials.is_empty() {
                            // the first partial also holds the padding and the accolade
                            current.width += group.accolade_spacing + pad[0];
                        }
                        render_x += current.width;
                        self.close_partial(&current);
                        partials.push(std::mem::replace(
                            &mut current,
                            HorizontalScreenLayoutPartialInfo::starting_at(render_x),
                        ));
                    }
                }
            }
        }

        if !current.master_bars.is_empty() {
            if partials.is_empty() {
                current.width += group.accolade_spacing + pad[0];
            }
            self.close_partial(&current);
            partials.push(current);
        }

        group.finalize_group();
        self.core.height = (group.y + group.height()).floor() + pad[3];
        self.core.width = group.x + group.width + pad[2];

        let mut paints = Vec::with_capacity(partials.len());
        let mut bar_offset = 0;
        for (i, partial) in partials.iter().enumerate() {
            let mut render_x = group.get_bar_x(partial.first_bar()) + group.accolade_spacing;
            if i == 0 {
                render_x -= group.x + group.accolade_spacing;
            }
            let args = RenderFinishedEventArgs {
                id: self.core.next_partial_id(),
                x: partial.x,
                y: 0.0,
                width: partial.width,
                height: self.core.height,
                total_width: self.core.width,
                total_height: self.core.height,
                first_master_bar_index: partial.first_bar(),
                last_master_bar_index: partial.last_bar(),
                render_result: None,
            };
            let paint = PartialPaint {
                group_index: 0,
                x: -render_x,
                y: group.y,
                start_index: bar_offset,
                count: partial.master_bars.len(),
                first_master_bar_index: partial.first_bar(),
                last_master_bar_index: partial.last_bar(),
            };
            bar_offset += partial.master_bars.len();
            paints.push((args, paint));
        }

        self.group = Some(group);
        self.partials = partials;

        let lazy = ctx.settings.core.enable_lazy_loading;
        for (args, paint) in paints {
            self.register_partial(args, paint, lazy, canvas, events);
        }
        Ok(())
    }

    fn paint_partial(&self, paint: &PartialPaint, canvas: &mut dyn Canvas) {
        let Some(group) = &self.group else {
            return;
        };
        debug!(
            "{}: Rendering partial from bar {} to {}",
            self.name(),
            paint.first_master_bar_index,
            paint.last_master_bar_index
        );
        canvas.set_text_align(TextAlign::Left);
        group.paint_partial(paint.x, paint.y, canvas, paint.start_index, paint.count);
    }

    fn build_bounds_lookup(&self) -> BoundsLookup {
        let mut builder = BoundsLookupBuilder::new();
        if let Some(group) = &self.group {
            group.build_bounds_lookup(&mut builder);
        }
        builder.finish()
    }
}
