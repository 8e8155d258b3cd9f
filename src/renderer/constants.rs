//! Shared constants for the score renderer (unscaled units; multiply by
//! `DisplaySettings::scale`).

// ── Staff dimensions ────────────────────────────────────────────────
pub(crate) const STAFF_LINE_SPACING: f64 = 10.0; // distance between staff lines
pub(crate) const STAFF_LINE_COUNT: usize = 5;
pub(crate) const STAFF_HEIGHT: f64 = 40.0; // 5 lines, 4 spaces

// ── Accolade ────────────────────────────────────────────────────────
pub(crate) const ACCOLADE_LABEL_SPACING: f64 = 10.0; // gap on each side of the track label
pub(crate) const ACCOLADE_BAR_SIZE: f64 = 3.0; // width of the brace bar
pub(crate) const ACCOLADE_OVERHANG: f64 = 4.0; // brace length past the staves, in bar sizes

// ── Layout ──────────────────────────────────────────────────────────
pub(crate) const DEFAULT_PAGE_PADDING: [f64; 4] = [20.0, 20.0, 20.0, 20.0];
pub(crate) const GROUP_SPACING: f64 = 20.0; // vertical space between systems

// ── Bar packing ─────────────────────────────────────────────────────
pub(crate) const CLEF_SPACE: f64 = 32.0; // horizontal space for clef at staff start
pub(crate) const TIME_SIG_SPACE: f64 = 24.0;
pub(crate) const REPEAT_SPACE: f64 = 14.0; // repeat dots + thick line
pub(crate) const BAR_PADDING: f64 = 8.0; // space before the first beat
pub(crate) const MIN_BEAT_WIDTH: f64 = 18.0;
pub(crate) const PER_QUARTER_WIDTH: f64 = 30.0;
pub(crate) const MIN_BAR_WIDTH: f64 = 38.0;
pub(crate) const SIMILE_WIDTH: f64 = 40.0;

// ── Note dimensions ─────────────────────────────────────────────────
pub(crate) const NOTEHEAD_RX: f64 = 5.5; // notehead ellipse x-radius
pub(crate) const NOTEHEAD_RY: f64 = 4.0; // notehead ellipse y-radius
pub(crate) const STEM_LENGTH: f64 = 30.0;
pub(crate) const STEM_WIDTH: f64 = 1.2;
pub(crate) const BEAM_THICKNESS: f64 = 4.0;
pub(crate) const BEAM_SPACING: f64 = 6.0;
pub(crate) const BARLINE_WIDTH: f64 = 1.0;
pub(crate) const STAFF_LINE_WIDTH: f64 = 0.8;
pub(crate) const LEDGER_LINE_EXTEND: f64 = 5.0;
