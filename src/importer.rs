//! MusicXML importer: builds a `Score` from `score-partwise` text.
//!
//! Only what layout needs is read: parts, measures, time signatures,
//! repeat barlines, notes and rests of the first voice per staff, and
//! measure-repeat regions (mapped to simile marks).

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::error::RenderError;
use crate::model::{Bar, Beat, Duration, MasterBar, ModelStaff, Note, Score, SimileMark, Track};

/// Staves a single part may declare.
const MAX_STAVES_PER_PART: usize = 16;

/// Parse MusicXML text into a validated `Score`.
pub fn parse_musicxml(xml: &str) -> Result<Score, RenderError> {
    // MusicXML files carry a DOCTYPE declaration
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| RenderError::Import(format!("XML parse error: {e}")))?;
    let root = doc.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(RenderError::Import(format!(
            "unsupported root element '{}', only 'score-partwise' is supported",
            root.tag_name().name()
        )));
    }

    let mut score = Score::new();
    let mut part_names: HashMap<String, (String, String)> = HashMap::new();
    let mut parts: Vec<ParsedPart> = Vec::new();

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "work" => {
                if let Some(title) = child_text(&child, "work-title") {
                    score.title = Some(title);
                }
            }
            "movement-title" => {
                if score.title.is_none() {
                    score.title = text(&child);
                }
            }
            "identification" => parse_identification(&child, &mut score),
            "part-list" => parse_part_list(&child, &mut part_names),
            "part" => parts.push(parse_part(&child)?),
            _ => {}
        }
    }

    if parts.is_empty() {
        return Err(RenderError::Import("score contains no parts".into()));
    }
    build_score(score, parts, &part_names)
}

// ─── Header ──────────────────────────────────────────────────────────

fn parse_identification(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "creator" && child.attribute("type") == Some("composer") {
            score.artist = text(&child);
        }
    }
}

fn parse_part_list(node: &Node, names: &mut HashMap<String, (String, String)>) {
    for part in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "score-part")
    {
        let id = part.attribute("id").unwrap_or("").to_string();
        let name = child_text(&part, "part-name").unwrap_or_default();
        let short_name = child_text(&part, "part-abbreviation").unwrap_or_else(|| name.clone());
        names.insert(id, (name, short_name));
    }
}

// ─── Parts and measures ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct ParsedMeasure {
    time: Option<(u8, u8)>,
    is_repeat_start: bool,
    repeat_count: u32,
    simile_mark: SimileMark,
    /// Beats per staff, 0-based
    staves: Vec<Vec<Beat>>,
}

#[derive(Debug, Default)]
struct ParsedPart {
    id: String,
    staff_count: usize,
    measures: Vec<ParsedMeasure>,
}

/// Clef and divisions carry over from measure to measure.
#[derive(Debug, Clone)]
struct PartState {
    divisions: f64,
    /// Diatonic step of the top staff line, per staff
    top_line_steps: Vec<i32>,
    /// Length in measures of the measure-repeat region in progress
    measure_repeat: Option<u32>,
    measures_in_repeat: u32,
}

impl Default for PartState {
    fn default() -> Self {
        Self {
            divisions: 1.0,
            top_line_steps: vec![diatonic_step('F', 5)],
            measure_repeat: None,
            measures_in_repeat: 0,
        }
    }
}

fn parse_part(node: &Node) -> Result<ParsedPart, RenderError> {
    let mut part = ParsedPart {
        id: node.attribute("id").unwrap_or("").to_string(),
        staff_count: 1,
        measures: Vec::new(),
    };
    let mut state = PartState::default();

    for measure in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "measure")
    {
        let parsed = parse_measure(&measure, &mut state)?;
        part.staff_count = part.staff_count.max(parsed.staves.len());
        part.measures.push(parsed);
    }
    Ok(part)
}

fn parse_measure(node: &Node, state: &mut PartState) -> Result<ParsedMeasure, RenderError> {
    let mut measure = ParsedMeasure {
        staves: vec![Vec::new(); state.top_line_steps.len()],
        ..Default::default()
    };
    // voice taken per staff in this measure
    let mut voices: Vec<Option<String>> = vec![None; measure.staves.len()];

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "attributes" => {
                parse_attributes(&child, state, &mut measure)?;
                if measure.staves.len() < state.top_line_steps.len() {
                    measure.staves.resize(state.top_line_steps.len(), Vec::new());
                    voices.resize(state.top_line_steps.len(), None);
                }
            }
            "note" => {
                let staff = match child_text(&child, "staff") {
                    Some(text) => staff_number(&text, "<staff>")? - 1,
                    None => 0,
                };
                if staff >= measure.staves.len() {
                    measure.staves.resize(staff + 1, Vec::new());
                    voices.resize(staff + 1, None);
                }
                let voice = child_text(&child, "voice").unwrap_or_else(|| "1".to_string());
                match &voices[staff] {
                    Some(v) if *v != voice => continue,
                    Some(_) => {}
                    None => voices[staff] = Some(voice),
                }
                let top_line = state
                    .top_line_steps
                    .get(staff)
                    .copied()
                    .unwrap_or_else(|| diatonic_step('F', 5));
                parse_note(&child, state.divisions, top_line, &mut measure.staves[staff])?;
            }
            "barline" => {
                if let Some(repeat) = find_child(&child, "repeat") {
                    match repeat.attribute("direction") {
                        Some("forward") => measure.is_repeat_start = true,
                        Some("backward") => {
                            measure.repeat_count = repeat
                                .attribute("times")
                                .and_then(|t| t.parse().ok())
                                .unwrap_or(2);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    measure.simile_mark = match state.measure_repeat {
        Some(2) => {
            let mark = if state.measures_in_repeat % 2 == 0 {
                SimileMark::FirstOfDouble
            } else {
                SimileMark::SecondOfDouble
            };
            state.measures_in_repeat += 1;
            mark
        }
        Some(_) => SimileMark::Simple,
        None => SimileMark::None,
    };
    Ok(measure)
}

/// A measure-repeat `stop` marks the first measure after the region.
fn parse_attributes(
    node: &Node,
    state: &mut PartState,
    measure: &mut ParsedMeasure,
) -> Result<(), RenderError> {
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "divisions" => {
                let divisions = parse_f64(&child)
                    .filter(|d| *d > 0.0)
                    .ok_or_else(|| RenderError::Import("invalid <divisions>".into()))?;
                state.divisions = divisions;
            }
            "time" => {
                let beats = child_text(&child, "beats").and_then(|b| b.parse::<u8>().ok());
                let beat_type = child_text(&child, "beat-type").and_then(|b| b.parse::<u8>().ok());
                match (beats, beat_type) {
                    (Some(b), Some(t)) if b > 0 && t > 0 => measure.time = Some((b, t)),
                    _ => return Err(RenderError::Import("invalid <time> signature".into())),
                }
            }
            "staves" => {
                let text = child.text().unwrap_or_default();
                let count = staff_number(text, "<staves>")?;
                let treble = diatonic_step('F', 5);
                state.top_line_steps.resize(count, treble);
            }
            "clef" => {
                let number = match child.attribute("number") {
                    Some(n) => staff_number(n, "<clef> number")? - 1,
                    None => 0,
                };
                if number >= state.top_line_steps.len() {
                    return Err(RenderError::Import(format!(
                        "<clef> number {} exceeds the {} declared staves",
                        number + 1,
                        state.top_line_steps.len()
                    )));
                }
                state.top_line_steps[number] = match child_text(&child, "sign").as_deref() {
                    Some("F") => diatonic_step('A', 3),
                    Some("C") => diatonic_step('G', 4),
                    _ => diatonic_step('F', 5),
                };
            }
            "measure-style" => {
                if let Some(repeat) = find_child(&child, "measure-repeat") {
                    match repeat.attribute("type") {
                        Some("start") => {
                            let measures = repeat
                                .text()
                                .or_else(|| repeat.attribute("slashes"))
                                .and_then(|s| s.trim().parse().ok())
                                .unwrap_or(1);
                            state.measure_repeat = Some(measures);
                            state.measures_in_repeat = 0;
                        }
                        Some("stop") => state.measure_repeat = None,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_note(node: &Node, divisions: f64, top_line: i32, beats: &mut Vec<Beat>) -> Result<(), RenderError> {
    // grace notes take no time and are not laid out
    if find_child(node, "grace").is_some() {
        return Ok(());
    }
    let is_chord = find_child(node, "chord").is_some();
    let is_rest = find_child(node, "rest").is_some();

    let line = if is_rest {
        None
    } else {
        let pitch = find_child(node, "pitch")
            .ok_or_else(|| RenderError::Import("note without <pitch> or <rest>".into()))?;
        let step = child_text(&pitch, "step")
            .and_then(|s| s.chars().next())
            .ok_or_else(|| RenderError::Import("pitch without <step>".into()))?;
        let octave = child_text(&pitch, "octave")
            .and_then(|o| o.parse::<i32>().ok())
            .ok_or_else(|| RenderError::Import("pitch without <octave>".into()))?;
        Some(top_line - diatonic_step(step, octave))
    };

    if is_chord {
        if let (Some(line), Some(beat)) = (line, beats.last_mut()) {
            beat.notes.push(Note { line });
        }
        return Ok(());
    }

    let duration = match child_text(node, "type") {
        Some(name) => Duration::from_name(&name)
            .ok_or_else(|| RenderError::Import(format!("unknown note type '{name}'")))?,
        None => {
            let ticks = child_text(node, "duration")
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(divisions);
            duration_from_quarters(ticks / divisions)
        }
    };
    let dots = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "dot")
        .count() as u8;

    let mut beat = match line {
        Some(line) => Beat::note(duration, line),
        None => Beat::rest(duration),
    };
    beat.dots = dots;
    beats.push(beat);
    Ok(())
}

// ─── Score assembly ──────────────────────────────────────────────────

fn build_score(
    mut score: Score,
    parts: Vec<ParsedPart>,
    names: &HashMap<String, (String, String)>,
) -> Result<Score, RenderError> {
    let bar_count = parts.iter().map(|p| p.measures.len()).max().unwrap_or(0);

    let mut time = (4, 4);
    for i in 0..bar_count {
        let leading = parts.iter().filter_map(|p| p.measures.get(i));
        let mut master_bar = MasterBar::new(time.0, time.1);
        for measure in leading {
            if let Some(t) = measure.time {
                time = t;
                master_bar.time_signature_numerator = t.0;
                master_bar.time_signature_denominator = t.1;
            }
            master_bar.is_repeat_start |= measure.is_repeat_start;
            master_bar.repeat_count = master_bar.repeat_count.max(measure.repeat_count);
        }
        score.add_master_bar(master_bar);
    }

    for part in parts {
        let (name, short_name) = names
            .get(&part.id)
            .cloned()
            .unwrap_or_else(|| (part.id.clone(), part.id.clone()));
        let mut track = Track::new(name, short_name);
        track.staves = (0..part.staff_count).map(|_| ModelStaff::default()).collect();

        let mut measures = part.measures.into_iter();
        for _ in 0..bar_count {
            let measure = measures.next().unwrap_or_default();
            let mut staves = measure.staves.into_iter();
            for staff in track.staves.iter_mut() {
                let mut bar = Bar::new(staves.next().unwrap_or_default());
                bar.simile_mark = measure.simile_mark;
                staff.bars.push(bar);
            }
        }
        score.add_track(track);
    }

    score.validate()?;
    Ok(score)
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Position of a pitch on the diatonic scale (C0 = 0).
fn diatonic_step(step: char, octave: i32) -> i32 {
    let index = match step.to_ascii_uppercase() {
        'C' => 0,
        'D' => 1,
        'E' => 2,
        'F' => 3,
        'G' => 4,
        'A' => 5,
        _ => 6,
    };
    octave * 7 + index
}

/// Closest undotted note value for a length in quarters.
fn duration_from_quarters(quarters: f64) -> Duration {
    [
        Duration::Whole,
        Duration::Half,
        Duration::Quarter,
        Duration::Eighth,
        Duration::Sixteenth,
        Duration::ThirtySecond,
    ]
    .into_iter()
    .find(|d| quarters >= d.quarters())
    .unwrap_or(Duration::SixtyFourth)
}

fn find_child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn text(node: &Node) -> Option<String> {
    node.text().map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn child_text(node: &Node, name: &str) -> Option<String> {
    find_child(node, name).as_ref().and_then(text)
}

/// 1-based staff number, limited to `MAX_STAVES_PER_PART`.
fn staff_number(text: &str, what: &str) -> Result<usize, RenderError> {
    match text.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_STAVES_PER_PART).contains(&n) => Ok(n),
        _ => Err(RenderError::Import(format!("invalid {what} value '{}'", text.trim()))),
    }
}

fn parse_f64(node: &Node) -> Option<f64> {
    node.text()?.trim().parse().ok()
}
