//! Compute score-time and real-time placement for every note and rest,
//! the time origin of every pass through every measure, and the flat
//! timemap export built from both.
//!
//! Layout hands over a tree without timing; `prepare_timing` fills it in:
//! 1. `calc_onsets` walks each layer and stamps measure-relative timings.
//! 2. `resolve_ties` links tied notes into groups.
//! 3. `assign_measure_offsets` unrolls repeats and records one origin per
//!    pass on each measure.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::model::{Document, Element, ElementKind, MeasureData};
use crate::pitch::{derive_pitch, PitchInput, Tie};
use crate::timing::{resolve, Timing, TIED_SENTINEL};
use crate::unroller::unroll;

/// Default tempo if none is specified in the score.
const DEFAULT_TEMPO: f64 = 120.0;

/// Period of the coarse beat buckets, in milliseconds.
pub const QUANTIZATION_PERIOD_MS: f64 = 62.5;

/// One sounding (or silent) event of the timemap, for one repeat pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimemapEntry {
    pub id: String,
    /// 1-based pass through the enclosing measure
    pub repeat: usize,
    pub qstamp_on: f64,
    pub qstamp_off: f64,
    /// Milliseconds from the start of the piece
    pub time_on: i32,
    pub time_off: i32,
    pub bucket_on: i64,
    pub bucket_off: i64,
    /// MIDI pitch; rests have none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<i32>,
    /// Duration an exporter should emit; none for tied secondaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_duration: Option<f64>,
}

/// Tempo and length of a measure, resolved in score order so that
/// jumps restore the tempo in effect at their destination.
#[derive(Debug, Clone, Copy)]
struct MeasureState {
    tempo: f64,
    quarters: f64,
}

impl MeasureState {
    fn ms_per_quarter(&self) -> f64 {
        60_000.0 / self.tempo
    }

    /// Milliseconds for a score-time span, rounded to the nearest.
    fn to_ms(&self, quarters: f64) -> i32 {
        (quarters * 60_000.0 / self.tempo).round() as i32
    }
}

fn measure_elements(root: &Element) -> Vec<&Element> {
    let mut out = Vec::new();
    collect_measure_elements(root, &mut out);
    out
}

fn collect_measure_elements<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    if matches!(element.kind, ElementKind::Measure(_)) {
        out.push(element);
        return;
    }
    for child in &element.children {
        collect_measure_elements(child, out);
    }
}

fn measure_elements_mut(root: &mut Element) -> Vec<&mut Element> {
    let mut out = Vec::new();
    collect_measure_elements_mut(root, &mut out);
    out
}

fn collect_measure_elements_mut<'a>(element: &'a mut Element, out: &mut Vec<&'a mut Element>) {
    if matches!(element.kind, ElementKind::Measure(_)) {
        out.push(element);
        return;
    }
    for child in &mut element.children {
        collect_measure_elements_mut(child, out);
    }
}

/// Walk measures in score order, carrying tempo and meter forward.
fn precompute_measure_states(measures: &[&Element]) -> Vec<MeasureState> {
    let mut tempo = DEFAULT_TEMPO;
    let mut meter: Option<(i32, i32)> = None;
    let mut states = Vec::with_capacity(measures.len());

    for element in measures {
        let Some(data) = element.as_measure() else {
            continue;
        };
        if let Some(t) = data.tempo.filter(|t| *t > 0.0) {
            tempo = t;
        }
        if data.meter.is_some() {
            meter = data.meter;
        }
        let quarters = match meter {
            Some((count, unit)) if unit > 0 => count as f64 * 4.0 / unit as f64,
            _ => latest_offset(element),
        };
        states.push(MeasureState { tempo, quarters });
    }
    states
}

/// Latest score-time offset of any note or rest below `element`.
fn latest_offset(element: &Element) -> f64 {
    let own = element.timing().map_or(0.0, Timing::score_time_offset);
    element
        .children
        .iter()
        .map(latest_offset)
        .fold(own, f64::max)
}

// ═══════════════════════════════════════════════════════════════════════
// Onsets
// ═══════════════════════════════════════════════════════════════════════

/// Stamp measure-relative timings on every note and rest.
///
/// Each layer is read left to right; chord tones share the chord's onset,
/// beams and other containers are transparent.
pub fn calc_onsets(doc: &mut Document) {
    let states = precompute_measure_states(&measure_elements(&doc.root));
    for (measure, state) in measure_elements_mut(&mut doc.root).into_iter().zip(states) {
        for_each_layer(measure, &mut |layer| {
            let mut cursor = 0.0;
            for child in &mut layer.children {
                stamp_sequence(child, &mut cursor, &state);
            }
        });
    }
}

fn for_each_layer(element: &mut Element, f: &mut dyn FnMut(&mut Element)) {
    if matches!(element.kind, ElementKind::Layer(_)) {
        f(element);
        return;
    }
    for child in &mut element.children {
        for_each_layer(child, f);
    }
}

fn stamp_sequence(element: &mut Element, cursor: &mut f64, state: &MeasureState) {
    match &mut element.kind {
        ElementKind::Note(note) => {
            let q = note.dur.map_or(0.0, |d| d.quarters());
            note.timing = timing_for(*cursor, q, state);
            *cursor += q;
        }
        ElementKind::Rest(rest) => {
            let q = rest.dur.map_or(0.0, |d| d.quarters());
            rest.timing = timing_for(*cursor, q, state);
            *cursor += q;
        }
        ElementKind::Chord(chord) => {
            let q = chord.dur.map_or(0.0, |d| d.quarters());
            stamp_chord_tones(&mut element.children, *cursor, q, state);
            *cursor += q;
        }
        _ => {
            for child in &mut element.children {
                stamp_sequence(child, cursor, state);
            }
        }
    }
}

fn stamp_chord_tones(children: &mut [Element], onset: f64, chord_q: f64, state: &MeasureState) {
    for child in children {
        if let ElementKind::Note(note) = &mut child.kind {
            let q = note.dur.map_or(chord_q, |d| d.quarters());
            note.timing = timing_for(onset, q, state);
        }
        stamp_chord_tones(&mut child.children, onset, chord_q, state);
    }
}

fn timing_for(onset: f64, quarters: f64, state: &MeasureState) -> Timing {
    let offset = onset + quarters;
    Timing::new(onset, offset, state.to_ms(onset), state.to_ms(offset))
}

// ═══════════════════════════════════════════════════════════════════════
// Ties
// ═══════════════════════════════════════════════════════════════════════

/// Tied notes are matched per staff, layer, step and octave. The
/// accidental is left out: a tie continuation does not reprint it.
type TieKey = (i32, i32, &'static str, i32);

struct TiedNote {
    id: String,
    key: TieKey,
    tie: Tie,
    duration: f64,
}

/// Group tied notes: the first note of a group accumulates the duration
/// of the notes that follow it, which are marked with [`TIED_SENTINEL`].
pub fn resolve_ties(doc: &mut Document) {
    let mut tied = Vec::new();
    collect_tied_notes(&doc.root, 0, 0, &mut tied);

    let mut open: HashMap<TieKey, (String, f64)> = HashMap::new();
    let mut values: HashMap<String, f64> = HashMap::new();
    for note in tied {
        match note.tie {
            Tie::I => {
                if let Some((opener, ext)) = open.insert(note.key, (note.id.clone(), 0.0)) {
                    values.insert(opener, ext);
                }
                values.insert(note.id, 0.0);
            }
            Tie::M | Tie::T => {
                let Some((opener, ext)) = open.get_mut(&note.key) else {
                    log::debug!("tie end '{}' has no open tie", note.id);
                    continue;
                };
                *ext += note.duration;
                values.insert(opener.clone(), *ext);
                values.insert(note.id, TIED_SENTINEL);
                if note.tie == Tie::T {
                    open.remove(&note.key);
                }
            }
        }
    }
    for (opener, ext) in open.into_values() {
        values.insert(opener, ext);
    }

    apply_tied_durations(&mut doc.root, &values);
}

fn collect_tied_notes(element: &Element, staff: i32, layer: i32, out: &mut Vec<TiedNote>) {
    let (staff, layer) = match &element.kind {
        ElementKind::Staff(s) => (s.n, layer),
        ElementKind::Layer(l) => (staff, l.n),
        _ => (staff, layer),
    };
    if let (Some(note), Some(input)) = (element.as_note(), element.pitch_input()) {
        if let Some(tie) = note.tie {
            out.push(TiedNote {
                id: element.id.clone(),
                key: tie_key(staff, layer, &input),
                tie,
                duration: note.timing.score_time_duration(),
            });
        }
    }
    for child in &element.children {
        collect_tied_notes(child, staff, layer, out);
    }
}

fn tie_key(staff: i32, layer: i32, input: &PitchInput) -> TieKey {
    let pitch = derive_pitch(input);
    (staff, layer, pitch.step, pitch.octave)
}

fn apply_tied_durations(element: &mut Element, values: &HashMap<String, f64>) {
    if let Some(value) = values.get(&element.id) {
        if let ElementKind::Note(note) = &mut element.kind {
            note.timing.set_score_time_tied_duration(*value);
        }
    }
    for child in &mut element.children {
        apply_tied_durations(child, values);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Measure offsets
// ═══════════════════════════════════════════════════════════════════════

/// Unroll the score and record, on each measure, the origin of every
/// pass through it. Returns the play order (indices of measures in
/// document order).
pub fn assign_measure_offsets(doc: &mut Document) -> Vec<usize> {
    let (states, play_order) = {
        let measures = measure_elements(&doc.root);
        let data: Vec<&MeasureData> = measures.iter().filter_map(|m| m.as_measure()).collect();
        (precompute_measure_states(&measures), unroll(&data))
    };

    let mut measures = measure_elements_mut(&mut doc.root);
    for m in measures.iter_mut() {
        if let ElementKind::Measure(data) = &mut m.kind {
            data.offsets.clear();
        }
    }

    let mut score_time = 0.0;
    let mut real_time_ms: f64 = 0.0;
    for &idx in &play_order {
        let (Some(measure), Some(state)) = (measures.get_mut(idx), states.get(idx)) else {
            continue;
        };
        if let ElementKind::Measure(data) = &mut measure.kind {
            data.offsets.push(score_time, real_time_ms.round() as i32);
        }
        score_time += state.quarters;
        real_time_ms += state.quarters * state.ms_per_quarter();
    }

    log::debug!(
        "{} measures unrolled into {} passes",
        states.len(),
        play_order.len()
    );
    play_order
}

/// Fill in every timing the renderer and the timemap read.
pub fn prepare_timing(doc: &mut Document) -> Vec<usize> {
    calc_onsets(doc);
    resolve_ties(doc);
    assign_measure_offsets(doc)
}

// ═══════════════════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════════════════

/// One entry per note and rest per pass, ordered by real-time onset.
pub fn generate_timemap(doc: &Document) -> Vec<TimemapEntry> {
    let mut entries = Vec::new();
    for measure in measure_elements(&doc.root) {
        let Some(data) = measure.as_measure() else {
            continue;
        };
        if data.offsets.is_empty() {
            log::warn!("measure '{}' has no offsets; run prepare_timing first", measure.id);
            continue;
        }
        collect_entries(measure, data, &mut entries);
    }
    entries.sort_by(|a, b| {
        a.time_on
            .cmp(&b.time_on)
            .then(a.qstamp_on.total_cmp(&b.qstamp_on))
    });
    entries
}

fn collect_entries(element: &Element, measure: &MeasureData, out: &mut Vec<TimemapEntry>) {
    if let Some(timing) = element.timing() {
        let pitch = element.pitch_input().map(|input| derive_pitch(&input).midi);
        for n in 1..=measure.offsets.len() {
            let Some(abs) = resolve(timing, &measure.offsets, n) else {
                continue;
            };
            out.push(TimemapEntry {
                id: element.id.clone(),
                repeat: n,
                qstamp_on: abs.score_time_onset,
                qstamp_off: abs.score_time_offset,
                time_on: abs.real_time_onset_ms,
                time_off: abs.real_time_offset_ms,
                bucket_on: bucket(abs.real_time_onset_ms),
                bucket_off: bucket(abs.real_time_offset_ms),
                pitch,
                export_duration: timing.export_duration(),
            });
        }
    }
    for child in &element.children {
        collect_entries(child, measure, out);
    }
}

fn bucket(ms: i32) -> i64 {
    (ms as f64 / QUANTIZATION_PERIOD_MS).floor() as i64
}

pub fn timemap_to_json(entries: &[TimemapEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// End of the last event, in milliseconds.
pub fn total_duration_ms(entries: &[TimemapEntry]) -> i32 {
    entries.iter().map(|e| e.time_off).max().unwrap_or(0)
}
