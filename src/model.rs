//! Data model for a score as seen by the layout engine.
//!
//! A score is an ordered list of master bars (the measures shared by all
//! tracks) plus one or more tracks. Every track owns one or more staves and
//! every staff owns exactly one bar per master bar.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// A complete musical score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Artist or composer
    pub artist: Option<String>,
    /// Measures shared across all tracks, in layout order
    pub master_bars: Vec<MasterBar>,
    /// Instruments / voices
    pub tracks: Vec<Track>,
}

/// One measure shared across all tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterBar {
    /// Index into `Score::master_bars`
    pub index: usize,
    /// Numerator (e.g., 3 in 3/4)
    pub time_signature_numerator: u8,
    /// Denominator (e.g., 4 in 3/4)
    pub time_signature_denominator: u8,
    /// Opens a repeat section
    pub is_repeat_start: bool,
    /// Number of repeats when this bar closes a repeat section, 0 otherwise
    pub repeat_count: u32,
}

impl Default for MasterBar {
    fn default() -> Self {
        Self {
            index: 0,
            time_signature_numerator: 4,
            time_signature_denominator: 4,
            is_repeat_start: false,
            repeat_count: 0,
        }
    }
}

impl MasterBar {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            time_signature_numerator: numerator,
            time_signature_denominator: denominator,
            ..Default::default()
        }
    }

    pub fn is_repeat_end(&self) -> bool {
        self.repeat_count > 0
    }

    /// Length of the bar in quarter notes.
    pub fn quarters(&self) -> f64 {
        let denominator = self.time_signature_denominator.max(1) as f64;
        self.time_signature_numerator as f64 * 4.0 / denominator
    }

    /// True if the time signature differs from `previous`.
    pub fn time_signature_changed(&self, previous: Option<&MasterBar>) -> bool {
        match previous {
            Some(p) => {
                p.time_signature_numerator != self.time_signature_numerator
                    || p.time_signature_denominator != self.time_signature_denominator
            }
            None => true,
        }
    }
}

/// A single instrument or voice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Index into `Score::tracks`
    pub index: usize,
    /// Display name (e.g., "Acoustic Guitar")
    pub name: String,
    /// Abbreviated name drawn next to the accolade (e.g., "A.Gtr.")
    pub short_name: String,
    /// Notation lines of this track
    pub staves: Vec<ModelStaff>,
}

impl Track {
    pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_name: short_name.into(),
            staves: vec![ModelStaff::default()],
            ..Default::default()
        }
    }
}

/// One notation line of a track, holding one bar per master bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStaff {
    /// Index into `Track::staves`
    pub index: usize,
    pub bars: Vec<Bar>,
}

/// The content of one measure on one staff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Same as the index of the matching master bar
    pub index: usize,
    pub simile_mark: SimileMark,
    pub beats: Vec<Beat>,
}

impl Bar {
    pub fn new(beats: Vec<Beat>) -> Self {
        Self {
            beats,
            ..Default::default()
        }
    }

    /// A bar that repeats the previous two bars is drawn across the barline
    /// separating it from its predecessor, so the two must stay together.
    pub fn is_linked_to_previous(&self) -> bool {
        self.simile_mark == SimileMark::SecondOfDouble
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }
}

/// Simile (repeat-measure) marks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimileMark {
    #[default]
    None,
    /// Repeat the previous bar
    Simple,
    /// First bar of a two-bar repeat
    FirstOfDouble,
    /// Second bar of a two-bar repeat
    SecondOfDouble,
}

/// A point in time within a bar: a chord, a single note or a rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub duration: Duration,
    pub dots: u8,
    /// Empty for rests
    pub notes: Vec<Note>,
}

impl Beat {
    pub fn rest(duration: Duration) -> Self {
        Self {
            duration,
            dots: 0,
            notes: Vec::new(),
        }
    }

    pub fn note(duration: Duration, line: i32) -> Self {
        Self {
            duration,
            dots: 0,
            notes: vec![Note { line }],
        }
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }

    /// Length of the beat in quarter notes, including dots.
    pub fn quarters(&self) -> f64 {
        let base = self.duration.quarters();
        let mut total = base;
        let mut dot = base;
        for _ in 0..self.dots {
            dot /= 2.0;
            total += dot;
        }
        total
    }
}

/// A notehead on a staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Staff position in half line-steps below the top line
    /// (0 = top line, 8 = bottom line, negative = above the staff).
    pub line: i32,
}

/// Written note value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Duration {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl Duration {
    pub fn quarters(self) -> f64 {
        match self {
            Duration::Whole => 4.0,
            Duration::Half => 2.0,
            Duration::Quarter => 1.0,
            Duration::Eighth => 0.5,
            Duration::Sixteenth => 0.25,
            Duration::ThirtySecond => 0.125,
            Duration::SixtyFourth => 0.0625,
        }
    }

    /// Number of flags / beams this value carries.
    pub fn flag_count(self) -> usize {
        match self {
            Duration::Whole | Duration::Half | Duration::Quarter => 0,
            Duration::Eighth => 1,
            Duration::Sixteenth => 2,
            Duration::ThirtySecond => 3,
            Duration::SixtyFourth => 4,
        }
    }

    pub fn is_filled(self) -> bool {
        !matches!(self, Duration::Whole | Duration::Half)
    }

    /// Map a MusicXML `<type>` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "whole" => Some(Duration::Whole),
            "half" => Some(Duration::Half),
            "quarter" => Some(Duration::Quarter),
            "eighth" => Some(Duration::Eighth),
            "16th" => Some(Duration::Sixteenth),
            "32nd" => Some(Duration::ThirtySecond),
            "64th" => Some(Duration::SixtyFourth),
            _ => None,
        }
    }
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a master bar and give it its index.
    pub fn add_master_bar(&mut self, mut master_bar: MasterBar) {
        master_bar.index = self.master_bars.len();
        self.master_bars.push(master_bar);
    }

    /// Append a track and give it (and its staves) their indexes.
    pub fn add_track(&mut self, mut track: Track) {
        track.index = self.tracks.len();
        for (i, staff) in track.staves.iter_mut().enumerate() {
            staff.index = i;
            for (b, bar) in staff.bars.iter_mut().enumerate() {
                bar.index = b;
            }
        }
        self.tracks.push(track);
    }

    pub fn bar_count(&self) -> usize {
        self.master_bars.len()
    }

    /// Check that every staff holds exactly one bar per master bar and that
    /// all indexes match their positions.
    pub fn validate(&self) -> Result<(), RenderError> {
        for (i, mb) in self.master_bars.iter().enumerate() {
            if mb.index != i {
                return Err(RenderError::Model(format!(
                    "master bar at position {i} carries index {}",
                    mb.index
                )));
            }
        }
        for (t, track) in self.tracks.iter().enumerate() {
            if track.index != t {
                return Err(RenderError::Model(format!(
                    "track at position {t} carries index {}",
                    track.index
                )));
            }
            if track.staves.is_empty() {
                return Err(RenderError::Model(format!("track {t} has no staves")));
            }
            for staff in &track.staves {
                if staff.bars.len() != self.master_bars.len() {
                    return Err(RenderError::Model(format!(
                        "track {t} staff {} has {} bars, expected {}",
                        staff.index,
                        staff.bars.len(),
                        self.master_bars.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
