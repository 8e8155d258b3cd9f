//! A staff: one rendered notation line of one track inside a system.

use super::bar_helpers::BarHelpers;
use super::bar_renderer::BarRenderer;
use super::canvas::Canvas;
use super::constants::STAFF_HEIGHT;
use crate::model::{Bar, MasterBar};
use crate::settings::RenderingResources;

#[derive(Debug, Clone)]
pub struct Staff {
    /// Position among all staves of the owning stave group
    pub index: usize,
    pub track_index: usize,
    /// Index into `Track::staves`
    pub model_staff_index: usize,
    /// Whether this staff is grouped by the accolade
    pub is_in_accolade: bool,
    pub is_first_in_accolade: bool,
    pub is_last_in_accolade: bool,

    /// Relative to the stave group
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub top_spacing: f64,
    pub bottom_spacing: f64,
    pub top_overflow: f64,
    pub bottom_overflow: f64,

    pub bar_renderers: Vec<BarRenderer>,
    scale: f64,
}

impl Staff {
    pub fn new(
        track_index: usize,
        model_staff_index: usize,
        is_in_accolade: bool,
        top_spacing: f64,
        bottom_spacing: f64,
        scale: f64,
    ) -> Self {
        Self {
            index: 0,
            track_index,
            model_staff_index,
            is_in_accolade,
            is_first_in_accolade: false,
            is_last_in_accolade: false,
            x: 0.0,
            y: 0.0,
            height: 0.0,
            top_spacing: top_spacing * scale,
            bottom_spacing: bottom_spacing * scale,
            top_overflow: 0.0,
            bottom_overflow: 0.0,
            bar_renderers: Vec::new(),
            scale,
        }
    }

    /// Offset of the top staff line from the staff origin.
    pub fn stave_top(&self) -> f64 {
        self.top_spacing + self.top_overflow
    }

    /// Offset of the bottom staff line from the staff origin.
    pub fn stave_bottom(&self) -> f64 {
        self.stave_top() + STAFF_HEIGHT * self.scale
    }

    pub fn add_bar(
        &mut self,
        bar: &Bar,
        master_bar: &MasterBar,
        previous: Option<&MasterBar>,
        helpers: BarHelpers,
    ) {
        let index = self.bar_renderers.len();
        let mut renderer = BarRenderer::new(bar, master_bar, previous, helpers, index, self.scale);
        renderer.x = self
            .bar_renderers
            .last()
            .map_or(0.0, |last| last.x + last.width);
        self.bar_renderers.push(renderer);
    }

    pub fn last_renderer(&self) -> Option<&BarRenderer> {
        self.bar_renderers.last()
    }

    pub fn last_renderer_mut(&mut self) -> Option<&mut BarRenderer> {
        self.bar_renderers.last_mut()
    }

    pub fn revert_last_bar(&mut self) -> Option<BarRenderer> {
        self.bar_renderers.pop()
    }

    /// Spread the difference between `current_width` and `width` evenly
    /// over all bars.
    pub fn scale_to_width(&mut self, width: f64, current_width: f64) {
        if self.bar_renderers.is_empty() {
            return;
        }
        let space_per_bar = (width - current_width) / self.bar_renderers.len() as f64;
        for renderer in self.bar_renderers.iter_mut() {
            let target = renderer.width + space_per_bar;
            renderer.scale_to_width(target);
        }
        self.update_bar_positions();
    }

    fn update_bar_positions(&mut self) {
        let mut x = 0.0;
        for renderer in self.bar_renderers.iter_mut() {
            renderer.x = x;
            x += renderer.width;
        }
    }

    /// Fix the vertical metrics once all bars are known.
    pub fn finalize_staff(&mut self) {
        self.top_overflow = self
            .bar_renderers
            .iter()
            .map(|r| r.top_overflow)
            .fold(0.0, f64::max);
        self.bottom_overflow = self
            .bar_renderers
            .iter()
            .map(|r| r.bottom_overflow)
            .fold(0.0, f64::max);

        let top = self.stave_top();
        for renderer in self.bar_renderers.iter_mut() {
            renderer.y = top;
        }
        self.update_bar_positions();
        self.height = self.stave_bottom() + self.bottom_overflow + self.bottom_spacing;
    }

    /// Paint `count` bars starting at renderer `start`.
    pub fn paint(
        &self,
        cx: f64,
        cy: f64,
        canvas: &mut dyn Canvas,
        res: &RenderingResources,
        start: usize,
        count: usize,
    ) {
        for renderer in self.bar_renderers.iter().skip(start).take(count) {
            renderer.paint(cx + self.x, cy + self.y, canvas, res);
        }
    }
}
