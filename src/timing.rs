//! Per-element timing records and per-measure time origins.
//!
//! Every playable element (note, rest) carries a [`Timing`] whose values
//! are relative to the start of the enclosing measure. A measure carries
//! [`MeasureOffsets`]: one `(score time, real time)` origin per pass
//! through the measure, addressed by a 1-based repeat index.

use serde::{Deserialize, Serialize};

/// Value of `score_time_tied_duration` on a secondary note of a tied
/// group: the note must not be exported as a separate sounding event.
pub const TIED_SENTINEL: f64 = -1.0;

/// Score-time and real-time placement of a playable element.
///
/// Score time is in quarter notes, real time in milliseconds, both
/// measured from the start of the enclosing measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub score_time_onset: f64,
    pub score_time_offset: f64,
    /// For the first note of a tied group, the summed score time of the
    /// following tied notes. [`TIED_SENTINEL`] on secondary notes.
    pub score_time_tied_duration: f64,
    pub real_time_onset_ms: i32,
    pub real_time_offset_ms: i32,
}

impl Timing {
    pub fn new(onset: f64, offset: f64, onset_ms: i32, offset_ms: i32) -> Self {
        Self {
            score_time_onset: onset,
            score_time_offset: offset,
            score_time_tied_duration: 0.0,
            real_time_onset_ms: onset_ms,
            real_time_offset_ms: offset_ms,
        }
    }

    pub fn score_time_onset(&self) -> f64 {
        self.score_time_onset
    }

    pub fn score_time_offset(&self) -> f64 {
        self.score_time_offset
    }

    pub fn score_time_tied_duration(&self) -> f64 {
        self.score_time_tied_duration
    }

    pub fn real_time_onset_ms(&self) -> i32 {
        self.real_time_onset_ms
    }

    pub fn real_time_offset_ms(&self) -> i32 {
        self.real_time_offset_ms
    }

    pub fn set_score_time_onset(&mut self, quarters: f64) {
        self.score_time_onset = quarters;
    }

    pub fn set_score_time_offset(&mut self, quarters: f64) {
        self.score_time_offset = quarters;
    }

    pub fn set_score_time_tied_duration(&mut self, quarters: f64) {
        self.score_time_tied_duration = quarters;
    }

    /// Store a real-time onset given in seconds, rounded to milliseconds.
    pub fn set_real_time_onset_seconds(&mut self, seconds: f64) {
        self.real_time_onset_ms = (seconds * 1000.0).round() as i32;
    }

    /// Store a real-time offset given in seconds, rounded to milliseconds.
    pub fn set_real_time_offset_seconds(&mut self, seconds: f64) {
        self.real_time_offset_ms = (seconds * 1000.0).round() as i32;
    }

    /// `offset - onset`, without any tied extension. Callers exporting
    /// durations must check [`Timing::is_tied_secondary`] first.
    pub fn score_time_duration(&self) -> f64 {
        self.score_time_offset - self.score_time_onset
    }

    pub fn real_time_duration_ms(&self) -> i32 {
        self.real_time_offset_ms - self.real_time_onset_ms
    }

    /// True for a non-initial note of a tied group.
    pub fn is_tied_secondary(&self) -> bool {
        self.score_time_tied_duration < 0.0
    }

    /// Duration a MIDI-style exporter should emit for this element.
    ///
    /// `None` for tied secondaries; otherwise the printed duration plus
    /// the tied extension carried by the first note of a group.
    pub fn export_duration(&self) -> Option<f64> {
        if self.is_tied_secondary() {
            return None;
        }
        Some(self.score_time_duration() + self.score_time_tied_duration)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Measure offsets
// ═══════════════════════════════════════════════════════════════════════

/// Time origin of one pass through a measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureOffset {
    /// Quarter notes from the start of the piece
    pub score_time: f64,
    /// Milliseconds from the start of the piece
    pub real_time_ms: i32,
}

/// Origins of every pass through a measure, in play order.
///
/// Entry `k` (0-based) belongs to repeat index `N = k + 1`. There is no
/// implicit "current" pass: every lookup names its repeat index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasureOffsets {
    entries: Vec<MeasureOffset>,
}

impl MeasureOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the origin of the next pass.
    pub fn push(&mut self, score_time: f64, real_time_ms: i32) {
        self.entries.push(MeasureOffset {
            score_time,
            real_time_ms,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of passes recorded (the valid range of N is `1..=len`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Origin for the 1-based repeat index `n`, or `None` when `n` is
    /// outside the recorded passes.
    pub fn get(&self, n: usize) -> Option<MeasureOffset> {
        n.checked_sub(1).and_then(|i| self.entries.get(i)).copied()
    }

    pub fn score_time_offset(&self, n: usize) -> Option<f64> {
        self.get(n).map(|o| o.score_time)
    }

    pub fn real_time_offset_ms(&self, n: usize) -> Option<i32> {
        self.get(n).map(|o| o.real_time_ms)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeasureOffset> {
        self.entries.iter()
    }
}

/// Absolute placement of a timed element for one repeat pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteTiming {
    pub score_time_onset: f64,
    pub score_time_offset: f64,
    pub real_time_onset_ms: i32,
    pub real_time_offset_ms: i32,
}

/// Resolve an element's measure-relative timing against its measure's
/// origin for repeat `n`. `None` when the measure has no such pass, so
/// nothing is ever computed against a missing origin.
pub fn resolve(timing: &Timing, offsets: &MeasureOffsets, n: usize) -> Option<AbsoluteTiming> {
    let origin = offsets.get(n)?;
    Some(AbsoluteTiming {
        score_time_onset: origin.score_time + timing.score_time_onset,
        score_time_offset: origin.score_time + timing.score_time_offset,
        real_time_onset_ms: origin.real_time_ms + timing.real_time_onset_ms,
        real_time_offset_ms: origin.real_time_ms + timing.real_time_offset_ms,
    })
}
