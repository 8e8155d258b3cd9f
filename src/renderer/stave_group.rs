//! Stave groups (systems): all staves of all rendered tracks for a contiguous
//! run of master bars, joined by an accolade.
//!
//! Every staff renders the same master bars. When a bar is added, each
//! staff appends a renderer for it and all those renderers are widened to
//! the largest one, so the bars of a system stay vertically aligned.

use super::bar_helpers::BarHelpersGroup;
use super::bar_renderer::BarSizeInfo;
use super::bounds::{BarBounds, Bounds, BoundsLookupBuilder, MasterBarBounds};
use super::canvas::{Canvas, TextAlign};
use super::constants::{ACCOLADE_BAR_SIZE, ACCOLADE_LABEL_SPACING, ACCOLADE_OVERHANG};
use super::staff::Staff;
use crate::font_sizes::FontSizes;
use crate::model::{MasterBar, Track};
use crate::settings::RenderingResources;

/// The staves of one track inside a stave group.
#[derive(Debug, Clone)]
pub struct StaveTrackGroup {
    pub track_index: usize,
    /// Label drawn next to the accolade of the first system
    pub short_name: String,
    /// Indexes into the group's staves
    pub staves: Vec<usize>,
    pub first_staff_in_accolade: Option<usize>,
    pub last_staff_in_accolade: Option<usize>,
}

/// Outcome of adding one master bar to a stave group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AddBarsToStaveGroupResult {
    /// Width the bar occupies on every staff
    pub width: f64,
    /// The bar must stay on the same partial as its predecessor
    pub is_linked_to_previous: bool,
}

/// Width reserved for the accolade labels, measured once per layout pass.
#[derive(Debug, Clone, Default)]
pub struct AccoladeSpacingCache {
    spacing: Option<f64>,
}

impl AccoladeSpacingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.spacing = None;
    }

    pub fn get(&self) -> Option<f64> {
        self.spacing
    }

    fn resolve(
        &mut self,
        tracks: &[&Track],
        font_sizes: &FontSizes,
        res: &RenderingResources,
        scale: f64,
    ) -> f64 {
        *self.spacing.get_or_insert_with(|| {
            let widest = tracks
                .iter()
                .map(|t| font_sizes.measure(&t.short_name, &res.effect_font))
                .fold(0.0, f64::max);
            widest + 2.0 * ACCOLADE_LABEL_SPACING * scale
        })
    }
}

#[derive(Debug, Clone)]
pub struct StaveGroup {
    pub x: f64,
    pub y: f64,
    pub index: usize,
    pub is_last: bool,
    /// Full groups get stretched to the available width
    pub is_full: bool,
    pub accolade_spacing: f64,
    /// Width the bars need, including the accolade spacing
    pub width: f64,
    pub master_bars: Vec<MasterBar>,
    pub track_groups: Vec<StaveTrackGroup>,

    staves: Vec<Staff>,
    first_staff_in_accolade: Option<usize>,
    last_staff_in_accolade: Option<usize>,
    accolade_spacing_calculated: bool,
    helpers: BarHelpersGroup,
    resources: RenderingResources,
    scale: f64,
}

impl StaveGroup {
    pub fn new(index: usize, scale: f64, resources: RenderingResources) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            index,
            is_last: false,
            is_full: false,
            accolade_spacing: 0.0,
            width: 0.0,
            master_bars: Vec::new(),
            track_groups: Vec::new(),
            staves: Vec::new(),
            first_staff_in_accolade: None,
            last_staff_in_accolade: None,
            accolade_spacing_calculated: false,
            helpers: BarHelpersGroup::new(),
            resources,
            scale,
        }
    }

    pub fn staves(&self) -> &[Staff] {
        &self.staves
    }

    pub fn first_staff_in_accolade(&self) -> Option<&Staff> {
        self.first_staff_in_accolade.and_then(|i| self.staves.get(i))
    }

    pub fn last_staff_in_accolade(&self) -> Option<&Staff> {
        self.last_staff_in_accolade.and_then(|i| self.staves.get(i))
    }

    /// Index of the last master bar, if any bar was added.
    pub fn last_bar_index(&self) -> Option<usize> {
        self.master_bars.last().map(|mb| mb.index)
    }

    pub fn add_stave(&mut self, track: &Track, mut staff: Staff) {
        let group_index = match self
            .track_groups
            .iter()
            .position(|g| g.track_index == track.index)
        {
            Some(i) => i,
            None => {
                self.track_groups.push(StaveTrackGroup {
                    track_index: track.index,
                    short_name: track.short_name.clone(),
                    staves: Vec::new(),
                    first_staff_in_accolade: None,
                    last_staff_in_accolade: None,
                });
                self.track_groups.len() - 1
            }
        };

        let staff_index = self.staves.len();
        staff.index = staff_index;

        if staff.is_in_accolade {
            if self.first_staff_in_accolade.is_none() {
                self.first_staff_in_accolade = Some(staff_index);
                staff.is_first_in_accolade = true;
            }
            if let Some(previous) = self.last_staff_in_accolade {
                self.staves[previous].is_last_in_accolade = false;
            }
            self.last_staff_in_accolade = Some(staff_index);
            staff.is_last_in_accolade = true;

            let group = &mut self.track_groups[group_index];
            if group.first_staff_in_accolade.is_none() {
                group.first_staff_in_accolade = Some(staff_index);
            }
            group.last_staff_in_accolade = Some(staff_index);
        }

        self.track_groups[group_index].staves.push(staff_index);
        self.staves.push(staff);
    }

    /// Append master bar `bar_index` to every staff. Returns `None` when no
    /// tracks are given or the bar does not exist.
    pub fn add_bars(
        &mut self,
        master_bars: &[MasterBar],
        tracks: &[&Track],
        bar_index: usize,
        accolade: &mut AccoladeSpacingCache,
        font_sizes: &FontSizes,
    ) -> Option<AddBarsToStaveGroupResult> {
        if tracks.is_empty() {
            return None;
        }
        let master_bar = master_bars.get(bar_index)?;
        let previous = bar_index.checked_sub(1).and_then(|i| master_bars.get(i));

        self.master_bars.push(master_bar.clone());
        self.helpers.build_helpers(tracks, master_bar);

        if !self.accolade_spacing_calculated && self.index == 0 {
            self.accolade_spacing_calculated = true;
            self.accolade_spacing = accolade.resolve(tracks, font_sizes, &self.resources, self.scale);
            self.width += self.accolade_spacing;
        }

        let mut result = AddBarsToStaveGroupResult::default();
        let mut max_sizes = BarSizeInfo::default();
        for group in &self.track_groups {
            let Some(track) = tracks.iter().find(|t| t.index == group.track_index) else {
                continue;
            };
            for &s in &group.staves {
                let staff = &mut self.staves[s];
                let bar = track
                    .staves
                    .get(staff.model_staff_index)
                    .and_then(|ms| ms.bars.get(bar_index))
                    .cloned()
                    .unwrap_or_default();
                let helpers = self
                    .helpers
                    .last(staff.track_index, staff.model_staff_index)
                    .cloned()
                    .unwrap_or_default();
                staff.add_bar(&bar, master_bar, previous, helpers);
                if let Some(renderer) = staff.last_renderer() {
                    renderer.register_max_sizes(&mut max_sizes);
                    if renderer.is_linked_to_previous() {
                        result.is_linked_to_previous = true;
                    }
                }
            }
        }

        let mut real_width: f64 = 0.0;
        for staff in self.staves.iter_mut() {
            if let Some(renderer) = staff.last_renderer_mut() {
                renderer.apply_sizes(&max_sizes);
                real_width = real_width.max(renderer.width);
            }
        }

        self.width += real_width;
        result.width = real_width;
        Some(result)
    }

    /// Remove the most recently added bar. A group always keeps at least one bar.
    pub fn revert_last_bar(&mut self) {
        if self.master_bars.len() <= 1 {
            return;
        }
        self.master_bars.pop();
        self.helpers.revert_last_bar();
        let mut w: f64 = 0.0;
        for staff in self.staves.iter_mut() {
            if let Some(renderer) = staff.revert_last_bar() {
                w = w.max(renderer.width);
            }
        }
        self.width -= w;
    }

    pub fn scale_to_width(&mut self, width: f64) {
        let current = self.width;
        for staff in self.staves.iter_mut() {
            staff.scale_to_width(width, current);
        }
        self.width = width;
    }

    /// Stack the staves vertically. Runs once, after all bars are added.
    pub fn finalize_group(&mut self) {
        let mut current_y = 0.0;
        for staff in self.staves.iter_mut() {
            staff.x = self.accolade_spacing;
            staff.y = current_y;
            staff.finalize_staff();
            current_y += staff.height;
        }
    }

    pub fn height(&self) -> f64 {
        self.staves.last().map_or(0.0, |s| s.y + s.height)
    }

    /// X of the bar renderer for master bar `master_bar_index`, relative to
    /// the staves' origin.
    pub fn get_bar_x(&self, master_bar_index: usize) -> f64 {
        self.first_staff_in_accolade()
            .or_else(|| self.staves.first())
            .and_then(|staff| {
                staff
                    .bar_renderers
                    .iter()
                    .find(|r| r.master_bar.index == master_bar_index)
            })
            .map_or(0.0, |r| r.x)
    }

    pub fn paint(&self, cx: f64, cy: f64, canvas: &mut dyn Canvas) {
        self.paint_partial(cx + self.x, cy + self.y, canvas, 0, self.master_bars.len());
    }

    /// Paint `count` bars starting at renderer `start_index`. The accolade is
    /// only drawn with the partial holding the first bar.
    pub fn paint_partial(
        &self,
        cx: f64,
        cy: f64,
        canvas: &mut dyn Canvas,
        start_index: usize,
        count: usize,
    ) {
        let res = &self.resources;
        for staff in &self.staves {
            staff.paint(cx, cy, canvas, res, start_index, count);
        }

        if self.track_groups.is_empty() || start_index != 0 {
            return;
        }

        if let (Some(first), Some(last)) = (self.first_staff_in_accolade(), self.last_staff_in_accolade()) {
            let first_start = cy + first.y + first.stave_top();
            let last_end = cy + last.y + last.stave_bottom();
            let accolade_x = cx + first.x;

            canvas.set_color(&res.bar_separator_color);
            canvas.begin_path();
            canvas.move_to(accolade_x, first_start);
            canvas.line_to(accolade_x, last_end);
            canvas.stroke();
        }

        canvas.set_color(&res.main_glyph_color);
        canvas.set_font(&res.effect_font);
        canvas.set_text_align(TextAlign::Left);
        for group in &self.track_groups {
            let (Some(first), Some(last)) = (
                group.first_staff_in_accolade.and_then(|i| self.staves.get(i)),
                group.last_staff_in_accolade.and_then(|i| self.staves.get(i)),
            ) else {
                continue;
            };

            let first_start = cy + first.y + first.stave_top();
            let last_end = cy + last.y + last.stave_bottom();
            let accolade_x = cx + first.x;

            let bar_size = ACCOLADE_BAR_SIZE * self.scale;
            let bar_offset = bar_size;
            let accolade_start = first_start - bar_size * ACCOLADE_OVERHANG;
            let accolade_end = last_end + bar_size * ACCOLADE_OVERHANG;

            if self.index == 0 {
                canvas.fill_text(&group.short_name, cx + ACCOLADE_LABEL_SPACING * self.scale, first_start);
            }

            canvas.fill_rect(
                accolade_x - bar_offset - bar_size,
                accolade_start,
                bar_size,
                accolade_end - accolade_start,
            );

            let spike_start_x = accolade_x - bar_offset - bar_size;
            let spike_end_x = accolade_x + bar_size * 2.0;

            // top spike
            canvas.begin_path();
            canvas.move_to(spike_start_x, accolade_start);
            canvas.bezier_curve_to(spike_start_x, accolade_start, spike_start_x, accolade_start, spike_end_x, accolade_start - bar_size);
            canvas.bezier_curve_to(accolade_x, accolade_start + bar_size, spike_start_x, accolade_start + bar_size, spike_start_x, accolade_start + bar_size);
            canvas.close_path();
            canvas.fill();

            // bottom spike
            canvas.begin_path();
            canvas.move_to(spike_start_x, accolade_end);
            canvas.bezier_curve_to(spike_start_x, accolade_end, accolade_x, accolade_end, spike_end_x, accolade_end + bar_size);
            canvas.bezier_curve_to(accolade_x, accolade_end - bar_size, spike_start_x, accolade_end - bar_size, spike_start_x, accolade_end - bar_size);
            canvas.close_path();
            canvas.fill();
        }
    }

    /// Add this group, its master bars and every staff bar to `lookup`.
    /// Positions are absolute; call after `finalize_group`.
    pub fn build_bounds_lookup(&self, lookup: &mut BoundsLookupBuilder) {
        let (Some(first), Some(last), Some(top_staff), Some(bottom_staff)) = (
            self.first_staff_in_accolade(),
            self.last_staff_in_accolade(),
            self.staves.first(),
            self.staves.last(),
        ) else {
            return;
        };

        let visual_top = self.y + first.y;
        let visual_bottom = self.y + last.y + last.height;
        let real_top = self.y + top_staff.y;
        let real_bottom = self.y + bottom_staff.y + bottom_staff.height;
        let visual_height = visual_bottom - visual_top;
        let real_height = real_bottom - real_top;

        lookup.add_stave_group(
            Bounds::new(self.x, visual_top, self.width, visual_height),
            Bounds::new(self.x, real_top, self.width, real_height),
        );

        for renderer in &first.bar_renderers {
            let x = self.x + first.x + renderer.x;
            lookup.add_master_bar(MasterBarBounds {
                index: renderer.master_bar.index,
                is_first_of_line: renderer.index == 0,
                visual_bounds: Bounds::new(x, visual_top, renderer.width, visual_height),
                real_bounds: Bounds::new(x, real_top, renderer.width, real_height),
                bars: Vec::new(),
            });
        }

        for staff in &self.staves {
            for renderer in &staff.bar_renderers {
                let x = self.x + staff.x + renderer.x;
                let staff_top = self.y + staff.y;
                lookup.add_bar(
                    renderer.master_bar.index,
                    BarBounds {
                        track_index: staff.track_index,
                        staff_index: staff.model_staff_index,
                        bar_index: renderer.bar.index,
                        visual_bounds: Bounds::new(x, staff_top, renderer.width, staff.height),
                        real_bounds: Bounds::new(
                            x,
                            staff_top + staff.stave_top(),
                            renderer.width,
                            staff.stave_bottom() - staff.stave_top(),
                        ),
                    },
                );
            }
        }
    }
}
