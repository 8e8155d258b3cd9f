//! Renders one bar of one staff and negotiates its width with the other
//! staves of the system.

use super::bar_helpers::BarHelpers;
use super::canvas::{Canvas, TextAlign};
use super::constants::*;
use crate::model::{Bar, Duration, MasterBar, SimileMark};
use crate::settings::RenderingResources;

/// Largest size of each horizontal section of one bar across all staves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarSizeInfo {
    pub pre_beat: f64,
    pub beats: f64,
    pub post_beat: f64,
}

impl BarSizeInfo {
    pub fn full_width(&self) -> f64 {
        self.pre_beat + self.beats + self.post_beat
    }
}

#[derive(Debug, Clone)]
pub struct BarRenderer {
    /// Position of this renderer within its staff
    pub index: usize,
    pub master_bar: MasterBar,
    pub bar: Bar,
    helpers: BarHelpers,
    scale: f64,
    is_first_of_line: bool,
    show_time_signature: bool,

    /// Relative to the staff
    pub x: f64,
    /// Relative to the staff; the top staff line
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub top_overflow: f64,
    pub bottom_overflow: f64,

    pre_beat_width: f64,
    beats_width: f64,
    post_beat_width: f64,
    /// Natural width of each beat, used to distribute stretched space
    beat_widths: Vec<f64>,
}

impl BarRenderer {
    pub fn new(
        bar: &Bar,
        master_bar: &MasterBar,
        previous: Option<&MasterBar>,
        helpers: BarHelpers,
        index: usize,
        scale: f64,
    ) -> Self {
        let is_first_of_line = index == 0;
        let show_time_signature = master_bar.time_signature_changed(previous);

        let mut pre = BAR_PADDING;
        if is_first_of_line {
            pre += CLEF_SPACE;
        }
        if show_time_signature {
            pre += TIME_SIG_SPACE;
        }
        if master_bar.is_repeat_start {
            pre += REPEAT_SPACE;
        }

        let beat_widths: Vec<f64> = match bar.simile_mark {
            SimileMark::Simple | SimileMark::SecondOfDouble => Vec::new(),
            _ => bar
                .beats
                .iter()
                .map(|b| (b.quarters() * PER_QUARTER_WIDTH).max(MIN_BEAT_WIDTH) * scale)
                .collect(),
        };
        let beats = if beat_widths.is_empty() {
            match bar.simile_mark {
                SimileMark::Simple | SimileMark::SecondOfDouble => SIMILE_WIDTH,
                _ => MIN_BAR_WIDTH,
            }
        } else {
            (beat_widths.iter().sum::<f64>() / scale).max(MIN_BAR_WIDTH)
        };

        let post = if master_bar.is_repeat_end() {
            REPEAT_SPACE
        } else {
            BAR_PADDING / 2.0
        };

        let (top, bottom) = bar
            .beats
            .iter()
            .flat_map(|b| b.notes.iter())
            .fold((0.0f64, 0.0f64), |(top, bottom), n| {
                let y = n.line as f64 * STAFF_LINE_SPACING / 2.0;
                if n.line >= 4 {
                    // stem up
                    (top.max(STEM_LENGTH - y), bottom.max(y + NOTEHEAD_RY - STAFF_HEIGHT))
                } else {
                    (top.max(NOTEHEAD_RY - y), bottom.max(y + STEM_LENGTH - STAFF_HEIGHT))
                }
            });

        let mut renderer = Self {
            index,
            master_bar: master_bar.clone(),
            bar: bar.clone(),
            helpers,
            scale,
            is_first_of_line,
            show_time_signature,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: STAFF_HEIGHT * scale,
            top_overflow: top.max(0.0) * scale,
            bottom_overflow: bottom.max(0.0) * scale,
            pre_beat_width: pre * scale,
            beats_width: beats * scale,
            post_beat_width: post * scale,
            beat_widths,
        };
        renderer.update_width();
        renderer
    }

    fn update_width(&mut self) {
        self.width = self.pre_beat_width + self.beats_width + self.post_beat_width;
    }

    pub fn is_linked_to_previous(&self) -> bool {
        self.bar.is_linked_to_previous()
    }

    pub fn register_max_sizes(&self, sizes: &mut BarSizeInfo) {
        sizes.pre_beat = sizes.pre_beat.max(self.pre_beat_width);
        sizes.beats = sizes.beats.max(self.beats_width);
        sizes.post_beat = sizes.post_beat.max(self.post_beat_width);
    }

    pub fn apply_sizes(&mut self, sizes: &BarSizeInfo) {
        self.pre_beat_width = sizes.pre_beat;
        self.beats_width = sizes.beats;
        self.post_beat_width = sizes.post_beat;
        self.update_width();
    }

    /// Stretch the beat area so the bar becomes `width` wide.
    pub fn scale_to_width(&mut self, width: f64) {
        let fixed = self.pre_beat_width + self.post_beat_width;
        self.beats_width = (width - fixed).max(0.0);
        self.update_width();
    }

    fn beat_x(&self, beat_index: usize) -> f64 {
        let natural: f64 = self.beat_widths.iter().sum();
        if natural <= 0.0 {
            return self.pre_beat_width;
        }
        let factor = self.beats_width / natural;
        let before: f64 = self.beat_widths[..beat_index].iter().sum();
        self.pre_beat_width + before * factor + NOTEHEAD_RX * self.scale
    }

    /// Paint this bar; `cx`/`cy` is the origin of the owning staff.
    pub fn paint(&self, cx: f64, cy: f64, canvas: &mut dyn Canvas, res: &RenderingResources) {
        let x = cx + self.x;
        let y = cy + self.y;
        let s = self.scale;

        canvas.set_color(&res.staff_line_color);
        canvas.set_line_width(STAFF_LINE_WIDTH * s);
        for i in 0..STAFF_LINE_COUNT {
            let ly = y + i as f64 * STAFF_LINE_SPACING * s;
            canvas.begin_path();
            canvas.move_to(x, ly);
            canvas.line_to(x + self.width, ly);
            canvas.stroke();
        }

        canvas.set_color(&res.bar_separator_color);
        canvas.set_line_width(BARLINE_WIDTH * s);
        canvas.begin_path();
        canvas.move_to(x + self.width, y);
        canvas.line_to(x + self.width, y + self.height);
        canvas.stroke();

        canvas.set_color(&res.main_glyph_color);
        let mut prefix_x = x + BAR_PADDING * s;
        if self.is_first_of_line {
            prefix_x += CLEF_SPACE * s;
        }
        if self.master_bar.is_repeat_start {
            self.paint_repeat_sign(canvas, x + 2.0 * s, y, true);
            prefix_x += REPEAT_SPACE * s;
        }
        if self.show_time_signature {
            canvas.set_text_align(TextAlign::Center);
            let tx = prefix_x + TIME_SIG_SPACE * s / 2.0;
            canvas.fill_text(&self.master_bar.time_signature_numerator.to_string(), tx, y + 18.0 * s);
            canvas.fill_text(&self.master_bar.time_signature_denominator.to_string(), tx, y + 38.0 * s);
            canvas.set_text_align(TextAlign::Left);
        }
        if self.master_bar.is_repeat_end() {
            self.paint_repeat_sign(canvas, x + self.width - 2.0 * s, y, false);
        }

        match self.bar.simile_mark {
            SimileMark::Simple => self.paint_simile(canvas, x + self.pre_beat_width + self.beats_width / 2.0, y),
            // drawn centered on the barline shared with the previous bar
            SimileMark::SecondOfDouble => self.paint_simile(canvas, x, y),
            _ => self.paint_beats(canvas, x, y, res),
        }
    }

    fn paint_repeat_sign(&self, canvas: &mut dyn Canvas, x: f64, y: f64, open: bool) {
        let s = self.scale;
        let thick = 3.0 * s;
        let bar_x = if open { x } else { x - thick };
        canvas.fill_rect(bar_x, y, thick, self.height);
        let dot_x = if open { x + 9.0 * s } else { x - 9.0 * s };
        canvas.fill_circle(dot_x, y + 15.0 * s, 1.8 * s);
        canvas.fill_circle(dot_x, y + 25.0 * s, 1.8 * s);
    }

    fn paint_simile(&self, canvas: &mut dyn Canvas, cx: f64, y: f64) {
        let s = self.scale;
        let mid = y + self.height / 2.0;
        canvas.begin_path();
        canvas.move_to(cx - 8.0 * s, mid + 8.0 * s);
        canvas.line_to(cx - 4.0 * s, mid + 10.0 * s);
        canvas.line_to(cx + 8.0 * s, mid - 8.0 * s);
        canvas.line_to(cx + 4.0 * s, mid - 10.0 * s);
        canvas.close_path();
        canvas.fill();
        canvas.fill_circle(cx - 7.0 * s, mid - 6.0 * s, 2.0 * s);
        canvas.fill_circle(cx + 7.0 * s, mid + 6.0 * s, 2.0 * s);
    }

    fn paint_beats(&self, canvas: &mut dyn Canvas, x: f64, y: f64, res: &RenderingResources) {
        let s = self.scale;
        let half_space = STAFF_LINE_SPACING * s / 2.0;

        for (i, beat) in self.bar.beats.iter().enumerate() {
            let bx = x + self.beat_x(i);
            if beat.is_rest() {
                canvas.fill_rect(bx - 4.0 * s, y + 16.0 * s, 8.0 * s, 4.0 * s);
                continue;
            }

            for note in &beat.notes {
                let ny = y + note.line as f64 * half_space;
                if note.line < 0 || note.line > 8 {
                    self.paint_ledger_lines(canvas, bx, y, note.line, res);
                    canvas.set_color(&res.main_glyph_color);
                }
                if beat.duration.is_filled() {
                    canvas.fill_ellipse(bx, ny, NOTEHEAD_RX * s, NOTEHEAD_RY * s);
                } else {
                    canvas.set_line_width(2.0 * s);
                    canvas.begin_path();
                    canvas.move_to(bx - NOTEHEAD_RX * s, ny);
                    canvas.bezier_curve_to(bx - NOTEHEAD_RX * s, ny - NOTEHEAD_RY * s * 1.3, bx + NOTEHEAD_RX * s, ny - NOTEHEAD_RY * s * 1.3, bx + NOTEHEAD_RX * s, ny);
                    canvas.bezier_curve_to(bx + NOTEHEAD_RX * s, ny + NOTEHEAD_RY * s * 1.3, bx - NOTEHEAD_RX * s, ny + NOTEHEAD_RY * s * 1.3, bx - NOTEHEAD_RX * s, ny);
                    canvas.stroke();
                }
            }

            if beat.duration == Duration::Whole {
                continue;
            }
            // beamed beats get their stems from the beam group
            if self.helpers.beam_group_of(i).is_some() {
                continue;
            }
            let line = beat.notes[0].line;
            let stem_up = line >= 4;
            let ny = y + line as f64 * half_space;
            let (stem_x, end_y) = if stem_up {
                (bx + NOTEHEAD_RX * s - 1.0, ny - STEM_LENGTH * s)
            } else {
                (bx - NOTEHEAD_RX * s + 1.0, ny + STEM_LENGTH * s)
            };
            canvas.set_line_width(STEM_WIDTH * s);
            canvas.begin_path();
            canvas.move_to(stem_x, ny);
            canvas.line_to(stem_x, end_y);
            canvas.stroke();

            for f in 0..beat.duration.flag_count() {
                let fy = if stem_up { end_y + f as f64 * BEAM_SPACING * s } else { end_y - f as f64 * BEAM_SPACING * s };
                let dir = if stem_up { 1.0 } else { -1.0 };
                canvas.begin_path();
                canvas.move_to(stem_x, fy);
                canvas.bezier_curve_to(stem_x + 2.0 * s, fy + dir * 6.0 * s, stem_x + 8.0 * s, fy + dir * 8.0 * s, stem_x + 6.0 * s, fy + dir * 16.0 * s);
                canvas.stroke();
            }
        }

        for group in &self.helpers.beam_groups {
            self.paint_beam_group(canvas, x, y, group);
        }
    }

    fn paint_ledger_lines(&self, canvas: &mut dyn Canvas, bx: f64, y: f64, line: i32, res: &RenderingResources) {
        let s = self.scale;
        let (from, to) = if line < 0 { (line + line.rem_euclid(2), -2) } else { (10, line - line.rem_euclid(2)) };
        canvas.set_color(&res.staff_line_color);
        canvas.set_line_width(STAFF_LINE_WIDTH * s);
        let mut l = from;
        while l <= to {
            let ly = y + l as f64 * STAFF_LINE_SPACING * s / 2.0;
            canvas.begin_path();
            canvas.move_to(bx - NOTEHEAD_RX * s - LEDGER_LINE_EXTEND * s, ly);
            canvas.line_to(bx + NOTEHEAD_RX * s + LEDGER_LINE_EXTEND * s, ly);
            canvas.stroke();
            l += 2;
        }
    }

    fn paint_beam_group(&self, canvas: &mut dyn Canvas, x: f64, y: f64, group: &[usize]) {
        let s = self.scale;
        let half_space = STAFF_LINE_SPACING * s / 2.0;
        let beats: Vec<(f64, f64, usize)> = group
            .iter()
            .filter_map(|&i| {
                let beat = self.bar.beats.get(i)?;
                let note = beat.notes.first()?;
                Some((x + self.beat_x(i), y + note.line as f64 * half_space, beat.duration.flag_count()))
            })
            .collect();
        if beats.len() < 2 {
            return;
        }

        let avg_y = beats.iter().map(|b| b.1).sum::<f64>() / beats.len() as f64;
        let stem_up = avg_y >= y + 2.0 * STAFF_LINE_SPACING * s;
        let dir = if stem_up { -1.0 } else { 1.0 };
        let beam_y = if stem_up {
            beats.iter().map(|b| b.1).fold(f64::MAX, f64::min) - STEM_LENGTH * s
        } else {
            beats.iter().map(|b| b.1).fold(f64::MIN, f64::max) + STEM_LENGTH * s
        };
        let stem_offset = if stem_up { NOTEHEAD_RX * s - 1.0 } else { -NOTEHEAD_RX * s + 1.0 };

        canvas.set_line_width(STEM_WIDTH * s);
        for &(bx, ny, _) in &beats {
            canvas.begin_path();
            canvas.move_to(bx + stem_offset, ny);
            canvas.line_to(bx + stem_offset, beam_y);
            canvas.stroke();
        }

        let first_x = beats[0].0 + stem_offset;
        let last_x = beats[beats.len() - 1].0 + stem_offset;
        let levels = beats.iter().map(|b| b.2).min().unwrap_or(1);
        for level in 0..levels {
            let ly = beam_y - dir * level as f64 * BEAM_SPACING * s;
            canvas.fill_rect(first_x.min(last_x), ly.min(ly + dir * BEAM_THICKNESS * s), (last_x - first_x).abs(), BEAM_THICKNESS * s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Beat;

    fn renderer(bar: Bar, index: usize) -> BarRenderer {
        let mb = MasterBar::new(4, 4);
        let helpers = BarHelpers::default();
        BarRenderer::new(&bar, &mb, Some(&mb), helpers, index, 1.0)
    }

    #[test]
    fn first_bar_of_line_reserves_clef_space() {
        let bar = Bar::new(vec![Beat::note(Duration::Whole, 4)]);
        let first = renderer(bar.clone(), 0);
        let later = renderer(bar, 1);
        assert!((first.width - later.width - CLEF_SPACE).abs() < 1e-9);
    }

    #[test]
    fn applied_sizes_equalize_widths() {
        let narrow = renderer(Bar::new(vec![Beat::note(Duration::Whole, 4)]), 1);
        let wide = renderer(Bar::new(vec![Beat::note(Duration::Sixteenth, 4); 16]), 1);
        let mut sizes = BarSizeInfo::default();
        narrow.register_max_sizes(&mut sizes);
        wide.register_max_sizes(&mut sizes);

        let mut a = narrow.clone();
        let mut b = wide.clone();
        a.apply_sizes(&sizes);
        b.apply_sizes(&sizes);
        assert_eq!(a.width, b.width);
        assert_eq!(a.width, sizes.full_width());
        assert!(a.width >= wide.width);
    }

    #[test]
    fn scaling_keeps_the_fixed_sections() {
        let mut r = renderer(Bar::new(vec![Beat::note(Duration::Quarter, 4); 4]), 1);
        r.scale_to_width(300.0);
        assert_eq!(r.width, 300.0);
    }
}
