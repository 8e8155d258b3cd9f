//! Per-bar aggregates shared by the bar renderers of a system (beaming).

use std::collections::HashMap;

use crate::model::{Bar, MasterBar, Track};

/// Beaming information for one bar of one staff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarHelpers {
    /// Beat indexes joined by a beam, each group at least two beats long
    pub beam_groups: Vec<Vec<usize>>,
}

impl BarHelpers {
    pub fn build(bar: &Bar, master_bar: &MasterBar) -> Self {
        // Compound meters beam per dotted quarter, simple meters per quarter.
        let group_length: f64 = if master_bar.time_signature_denominator == 8
            && master_bar.time_signature_numerator % 3 == 0
        {
            1.5
        } else {
            1.0
        };

        let mut beam_groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_slot = 0usize;
        let mut position: f64 = 0.0;

        for (i, beat) in bar.beats.iter().enumerate() {
            let slot = (position / group_length + 1e-9).floor() as usize;
            let beamable = !beat.is_rest() && beat.duration.flag_count() > 0;

            if !beamable || slot != current_slot {
                if current.len() >= 2 {
                    beam_groups.push(std::mem::take(&mut current));
                }
                current.clear();
            }
            if beamable {
                if current.is_empty() {
                    current_slot = slot;
                }
                current.push(i);
            }
            position += beat.quarters();
        }
        if current.len() >= 2 {
            beam_groups.push(current);
        }

        Self { beam_groups }
    }

    pub fn beam_group_of(&self, beat_index: usize) -> Option<&[usize]> {
        self.beam_groups
            .iter()
            .find(|g| g.contains(&beat_index))
            .map(|g| g.as_slice())
    }
}

/// Helpers of every staff of every track, one entry per added bar.
#[derive(Debug, Clone, Default)]
pub struct BarHelpersGroup {
    helpers: HashMap<(usize, usize), Vec<BarHelpers>>,
}

impl BarHelpersGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_helpers(&mut self, tracks: &[&Track], master_bar: &MasterBar) {
        for track in tracks {
            for staff in &track.staves {
                let helpers = staff
                    .bars
                    .get(master_bar.index)
                    .map(|bar| BarHelpers::build(bar, master_bar))
                    .unwrap_or_default();
                self.helpers
                    .entry((track.index, staff.index))
                    .or_default()
                    .push(helpers);
            }
        }
    }

    /// Drop the helpers of the most recently built bar.
    pub fn revert_last_bar(&mut self) {
        for list in self.helpers.values_mut() {
            list.pop();
        }
    }

    pub fn last(&self, track_index: usize, staff_index: usize) -> Option<&BarHelpers> {
        self.helpers.get(&(track_index, staff_index))?.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Beat, Duration};

    #[test]
    fn eighths_are_beamed_per_quarter() {
        let bar = Bar::new(vec![
            Beat::note(Duration::Eighth, 4),
            Beat::note(Duration::Eighth, 5),
            Beat::note(Duration::Quarter, 4),
            Beat::note(Duration::Eighth, 3),
            Beat::rest(Duration::Eighth),
            Beat::note(Duration::Sixteenth, 2),
            Beat::note(Duration::Sixteenth, 2),
            Beat::note(Duration::Eighth, 2),
        ]);
        let helpers = BarHelpers::build(&bar, &MasterBar::new(4, 4));
        assert_eq!(helpers.beam_groups, vec![vec![0, 1], vec![5, 6, 7]]);
        assert_eq!(helpers.beam_group_of(6), Some(&[5, 6, 7][..]));
        assert!(helpers.beam_group_of(2).is_none());
    }

    #[test]
    fn compound_meter_beams_three_eighths() {
        let bar = Bar::new(vec![Beat::note(Duration::Eighth, 4); 6]);
        let helpers = BarHelpers::build(&bar, &MasterBar::new(6, 8));
        assert_eq!(helpers.beam_groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }
}
