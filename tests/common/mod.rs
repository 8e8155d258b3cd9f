//! Shared builders for the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use scoreflow::{Bar, Beat, Duration, MasterBar, RenderEvent, RendererEvents, Score, SimileMark, Track};

/// `tracks` tracks of `bars` bars in 4/4, four quarters each.
pub fn score(tracks: usize, bars: usize) -> Score {
    let mut score = Score::new();
    for _ in 0..bars {
        score.add_master_bar(MasterBar::new(4, 4));
    }
    for t in 0..tracks {
        let mut track = Track::new(format!("Track {t}"), format!("Tr{t}."));
        for _ in 0..bars {
            track.staves[0]
                .bars
                .push(Bar::new(vec![Beat::note(Duration::Quarter, 4); 4]));
        }
        score.add_track(track);
    }
    score
}

/// Mark bar `index` of every staff as the second bar of a double simile.
pub fn link_to_previous(score: &mut Score, index: usize) {
    for track in &mut score.tracks {
        for staff in &mut track.staves {
            staff.bars[index].simile_mark = SimileMark::SecondOfDouble;
        }
    }
}

pub type Recorded = Arc<Mutex<Vec<RenderEvent>>>;

pub fn record(events: &mut RendererEvents) -> Recorded {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    events.subscribe_all(move |e| s.lock().unwrap().push(e));
    seen
}

pub fn names(seen: &Recorded) -> Vec<&'static str> {
    seen.lock().unwrap().iter().map(|e| e.name()).collect()
}

pub fn partials_rendered(seen: &Recorded) -> Vec<scoreflow::RenderFinishedEventArgs> {
    seen.lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            RenderEvent::PartialRenderFinished(args) => Some(args.clone()),
            _ => None,
        })
        .collect()
}
