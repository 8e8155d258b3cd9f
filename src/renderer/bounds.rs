//! Spatial index from rendered elements to their rectangles.
//!
//! "Visual" bounds span what a reader sees for a bar (the full accolade
//! height), "real" bounds span the staves that actually hold content. The
//! lookup is filled through a builder during one layout pass and is
//! read-only once finished.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::model::{Bar, MasterBar, Score};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

/// Bounds of one bar of one staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarBounds {
    pub track_index: usize,
    pub staff_index: usize,
    pub bar_index: usize,
    pub visual_bounds: Bounds,
    pub real_bounds: Bounds,
}

impl BarBounds {
    /// Resolve the bar these bounds were computed for.
    pub fn bar<'a>(&self, score: &'a Score) -> Option<&'a Bar> {
        score
            .tracks
            .get(self.track_index)?
            .staves
            .get(self.staff_index)?
            .bars
            .get(self.bar_index)
    }
}

/// Bounds of one master bar across all staves of a system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterBarBounds {
    pub index: usize,
    pub is_first_of_line: bool,
    pub visual_bounds: Bounds,
    pub real_bounds: Bounds,
    pub bars: Vec<BarBounds>,
}

impl MasterBarBounds {
    pub fn master_bar<'a>(&self, score: &'a Score) -> Option<&'a MasterBar> {
        score.master_bars.get(self.index)
    }

    pub fn find_bar(&self, x: f64, y: f64) -> Option<&BarBounds> {
        self.bars.iter().find(|b| b.visual_bounds.contains(x, y))
    }
}

/// Bounds of one system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaveGroupBounds {
    pub index: usize,
    pub visual_bounds: Bounds,
    pub real_bounds: Bounds,
    pub bars: Vec<MasterBarBounds>,
}

/// Append-only builder owned by one layout pass.
#[derive(Debug, Default)]
pub struct BoundsLookupBuilder {
    stave_groups: Vec<StaveGroupBounds>,
}

impl BoundsLookupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stave_group(&mut self, visual_bounds: Bounds, real_bounds: Bounds) {
        let index = self.stave_groups.len();
        self.stave_groups.push(StaveGroupBounds {
            index,
            visual_bounds,
            real_bounds,
            bars: Vec::new(),
        });
    }

    /// Add a master bar to the most recently added system.
    pub fn add_master_bar(&mut self, bounds: MasterBarBounds) {
        if let Some(group) = self.stave_groups.last_mut() {
            group.bars.push(bounds);
        }
    }

    /// Add a staff bar to the master bar `master_bar_index` of the most
    /// recently added system.
    pub fn add_bar(&mut self, master_bar_index: usize, bounds: BarBounds) {
        if let Some(master) = self
            .stave_groups
            .last_mut()
            .and_then(|g| g.bars.iter_mut().find(|m| m.index == master_bar_index))
        {
            master.bars.push(bounds);
        }
    }

    pub fn finish(self) -> BoundsLookup {
        BoundsLookup::from_groups(self.stave_groups)
    }
}

/// Finished, read-only bounds of one layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsLookup {
    stave_groups: Vec<StaveGroupBounds>,
    #[serde(skip)]
    master_bar_lookup: HashMap<usize, (usize, usize)>,
}

impl BoundsLookup {
    fn from_groups(stave_groups: Vec<StaveGroupBounds>) -> Self {
        let mut master_bar_lookup = HashMap::new();
        for (g, group) in stave_groups.iter().enumerate() {
            for (m, master) in group.bars.iter().enumerate() {
                master_bar_lookup.insert(master.index, (g, m));
            }
        }
        Self {
            stave_groups,
            master_bar_lookup,
        }
    }

    pub fn stave_groups(&self) -> &[StaveGroupBounds] {
        &self.stave_groups
    }

    pub fn is_empty(&self) -> bool {
        self.stave_groups.is_empty()
    }

    pub fn master_bar_count(&self) -> usize {
        self.master_bar_lookup.len()
    }

    pub fn find_master_bar_by_index(&self, index: usize) -> Option<&MasterBarBounds> {
        let &(g, m) = self.master_bar_lookup.get(&index)?;
        self.stave_groups.get(g)?.bars.get(m)
    }

    /// Hit test against the visual bounds of each master bar.
    pub fn find_master_bar(&self, x: f64, y: f64) -> Option<&MasterBarBounds> {
        self.stave_groups
            .iter()
            .filter(|g| g.visual_bounds.contains(x, y))
            .flat_map(|g| g.bars.iter())
            .find(|m| m.visual_bounds.contains(x, y))
    }

    pub fn find_bar(&self, x: f64, y: f64) -> Option<&BarBounds> {
        self.find_master_bar(x, y)?.find_bar(x, y)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, RenderError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rehydrate bounds produced on another context and check that every
    /// entry refers to an existing part of `score`.
    pub fn from_json(value: serde_json::Value, score: &Score) -> Result<Self, RenderError> {
        let raw: BoundsLookup = serde_json::from_value(value)?;
        for group in &raw.stave_groups {
            for master in &group.bars {
                if master.master_bar(score).is_none() {
                    return Err(RenderError::Serialization(format!(
                        "bounds reference master bar {} but the score has {}",
                        master.index,
                        score.master_bars.len()
                    )));
                }
                for bar in &master.bars {
                    if bar.bar(score).is_none() {
                        return Err(RenderError::Serialization(format!(
                            "bounds reference bar {} of track {} staff {} which does not exist",
                            bar.bar_index, bar.track_index, bar.staff_index
                        )));
                    }
                }
            }
        }
        Ok(Self::from_groups(raw.stave_groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MasterBar, Track};

    fn lookup() -> BoundsLookup {
        let mut builder = BoundsLookupBuilder::new();
        builder.add_stave_group(Bounds::new(0.0, 0.0, 200.0, 100.0), Bounds::new(0.0, 10.0, 200.0, 80.0));
        for i in 0..2 {
            let x = 100.0 * i as f64;
            builder.add_master_bar(MasterBarBounds {
                index: i,
                is_first_of_line: i == 0,
                visual_bounds: Bounds::new(x, 0.0, 100.0, 100.0),
                real_bounds: Bounds::new(x, 10.0, 100.0, 80.0),
                bars: Vec::new(),
            });
            builder.add_bar(
                i,
                BarBounds {
                    track_index: 0,
                    staff_index: 0,
                    bar_index: i,
                    visual_bounds: Bounds::new(x, 0.0, 100.0, 100.0),
                    real_bounds: Bounds::new(x, 10.0, 100.0, 80.0),
                },
            );
        }
        builder.finish()
    }

    fn score(bars: usize) -> Score {
        let mut score = Score::new();
        let mut track = Track::new("Guitar", "Gtr.");
        for _ in 0..bars {
            score.add_master_bar(MasterBar::new(4, 4));
            track.staves[0].bars.push(Bar::default());
        }
        score.add_track(track);
        score
    }

    #[test]
    fn hit_testing_finds_the_bar_under_the_point() {
        let lookup = lookup();
        assert_eq!(lookup.find_master_bar(150.0, 50.0).map(|m| m.index), Some(1));
        assert_eq!(lookup.find_bar(20.0, 50.0).map(|b| b.bar_index), Some(0));
        assert!(lookup.find_master_bar(250.0, 50.0).is_none());
        assert_eq!(lookup.find_master_bar_by_index(1).map(|m| m.real_bounds.x), Some(100.0));
    }

    #[test]
    fn json_round_trip_reconnects_to_the_score() {
        let lookup = lookup();
        let score = score(2);
        let back = BoundsLookup::from_json(lookup.to_json().unwrap(), &score).unwrap();
        assert_eq!(back, lookup);
        let master = back.find_master_bar_by_index(0).unwrap();
        assert_eq!(master.master_bar(&score).map(|m| m.index), Some(0));
    }

    #[test]
    fn json_referring_to_missing_bars_is_rejected() {
        let lookup = lookup();
        let err = BoundsLookup::from_json(lookup.to_json().unwrap(), &score(1)).unwrap_err();
        assert!(matches!(err, RenderError::Serialization(_)));
    }
}
