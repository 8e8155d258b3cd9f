//! MusicXML import through the API boundary.

mod common;

use common::{names, partials_rendered, record};
use pretty_assertions::assert_eq;
use scoreflow::{parse_musicxml, RenderApi, RenderError, RenderEvent, Settings, SimileMark};

const QUARTET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <work><work-title>Little Quartet</work-title></work>
  <part-list>
    <score-part id="P1"><part-name>Violin I</part-name><part-abbreviation>Vl. I</part-abbreviation></score-part>
    <score-part id="P2"><part-name>Violin II</part-name><part-abbreviation>Vl. II</part-abbreviation></score-part>
    <score-part id="P3"><part-name>Viola</part-name><part-abbreviation>Vla.</part-abbreviation></score-part>
    <score-part id="P4"><part-name>Cello</part-name><part-abbreviation>Vc.</part-abbreviation></score-part>
  </part-list>
  <part id="P1">
    <measure number="1"><attributes><divisions>1</divisions><time><beats>2</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>A</step><octave>4</octave></pitch><duration>2</duration><type>half</type></note></measure>
    <measure number="2"><note><pitch><step>B</step><octave>4</octave></pitch><duration>2</duration><type>half</type></note></measure>
  </part>
  <part id="P2">
    <measure number="1"><note><pitch><step>F</step><octave>4</octave></pitch><duration>2</duration><type>half</type></note></measure>
    <measure number="2"><note><pitch><step>G</step><octave>4</octave></pitch><duration>2</duration><type>half</type></note></measure>
  </part>
  <part id="P3">
    <measure number="1"><attributes><clef><sign>C</sign><line>3</line></clef></attributes>
      <note><rest/><duration>2</duration><type>half</type></note></measure>
    <measure number="2"><note><rest/><duration>2</duration><type>half</type></note></measure>
  </part>
  <part id="P4">
    <measure number="1"><attributes><clef><sign>F</sign><line>4</line></clef></attributes>
      <note><pitch><step>D</step><octave>3</octave></pitch><duration>2</duration><type>half</type></note></measure>
    <measure number="2"><note><pitch><step>G</step><octave>2</octave></pitch><duration>2</duration><type>half</type></note></measure>
  </part>
</score-partwise>"#;

#[test]
fn parts_become_tracks() {
    let score = parse_musicxml(QUARTET).unwrap();
    let names: Vec<&str> = score.tracks.iter().map(|t| t.short_name.as_str()).collect();
    assert_eq!(names, vec!["Vl. I", "Vl. II", "Vla.", "Vc."]);
    assert_eq!(score.bar_count(), 2);
    assert_eq!(score.master_bars[1].time_signature_numerator, 2);
    assert!(score.tracks[2].staves[0].bars[0].beats[0].is_rest());
    assert!(score.tracks.iter().all(|t| t.staves[0].bars[0].simile_mark == SimileMark::None));
}

#[test]
fn loading_renders_the_selected_tracks() {
    let mut api = RenderApi::new(Settings::default());
    let seen = record(api.events());

    api.load_musicxml(QUARTET, Some(&[0, 3]));

    assert_eq!(api.tracks(), &[0, 3]);
    assert_eq!(names(&seen).last(), Some(&"postRenderFinished"));
    let partial = &partials_rendered(&seen)[0];
    let svg = partial.render_result.as_deref().unwrap();
    assert!(svg.contains(">Vl. I</text>"));
    assert!(svg.contains(">Vc.</text>"));
    assert!(!svg.contains(">Vla.</text>"));
}

#[test]
fn loading_with_minus_one_renders_all_tracks() {
    let mut api = RenderApi::new(Settings::default());
    api.load_musicxml(QUARTET, Some(&[-1]));
    assert_eq!(api.tracks(), &[0, 1, 2, 3]);
    let lookup = api.bounds_lookup().unwrap();
    assert_eq!(lookup.find_master_bar_by_index(0).unwrap().bars.len(), 4);
}

#[test]
fn malformed_notation_is_reported_once() {
    let mut api = RenderApi::new(Settings::default());
    let seen = record(api.events());

    api.load_musicxml("<score-partwise><part id='P1'><measure>", None);

    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RenderEvent::Error(RenderError::Import(_))));
    assert!(api.score().is_none());
}
