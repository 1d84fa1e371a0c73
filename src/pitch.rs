//! Pitch derivation — step, alteration and MIDI pitch for a note.
//!
//! The sounding pitch name falls back to the written pitch location,
//! the octave prefers the gestural override, then the written octave
//! location, then the plain octave. A gestural accidental alone decides
//! the alteration when present; otherwise the written accidental does.

use serde::{Deserialize, Serialize};

/// Diatonic pitch name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl PitchName {
    /// Semitones above C.
    pub fn semitone(self) -> i32 {
        match self {
            PitchName::C => 0,
            PitchName::D => 2,
            PitchName::E => 4,
            PitchName::F => 5,
            PitchName::G => 7,
            PitchName::A => 9,
            PitchName::B => 11,
        }
    }

    /// Upper-case step letter.
    pub fn step(self) -> &'static str {
        match self {
            PitchName::C => "C",
            PitchName::D => "D",
            PitchName::E => "E",
            PitchName::F => "F",
            PitchName::G => "G",
            PitchName::A => "A",
            PitchName::B => "B",
        }
    }

    /// Lower-case attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            PitchName::C => "c",
            PitchName::D => "d",
            PitchName::E => "e",
            PitchName::F => "f",
            PitchName::G => "g",
            PitchName::A => "a",
            PitchName::B => "b",
        }
    }
}

/// Notated accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrittenAccidental {
    /// sharp
    S,
    /// flat
    F,
    /// double sharp (two sharp signs)
    Ss,
    /// double sharp (x glyph)
    X,
    /// double flat
    Ff,
    /// triple sharp (x + sharp)
    Xs,
    /// triple sharp
    Ts,
    /// triple flat
    Tf,
    /// natural
    N,
    /// natural + flat
    Nf,
    /// natural + sharp
    Ns,
    /// quarter-tone variants
    Su,
    Sd,
    Fu,
    Fd,
    Nu,
    Nd,
}

impl WrittenAccidental {
    pub fn alter(self) -> i32 {
        match self {
            WrittenAccidental::S | WrittenAccidental::Ns => 1,
            WrittenAccidental::F | WrittenAccidental::Nf => -1,
            WrittenAccidental::Ss | WrittenAccidental::X => 2,
            WrittenAccidental::Ff => -2,
            WrittenAccidental::Xs | WrittenAccidental::Ts => 3,
            WrittenAccidental::Tf => -3,
            _ => 0,
        }
    }
}

/// Performed (sounding) accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturalAccidental {
    S,
    F,
    Ss,
    Ff,
    N,
    Su,
    Sd,
    Fu,
    Fd,
}

impl GesturalAccidental {
    pub fn alter(self) -> i32 {
        match self {
            GesturalAccidental::S => 1,
            GesturalAccidental::F => -1,
            GesturalAccidental::Ss => 2,
            GesturalAccidental::Ff => -2,
            _ => 0,
        }
    }
}

/// Tie membership of a note: initial, medial or terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tie {
    I,
    M,
    T,
}

impl Tie {
    pub fn as_str(self) -> &'static str {
        match self {
            Tie::I => "i",
            Tie::M => "m",
            Tie::T => "t",
        }
    }
}

/// Fields of a note that take part in pitch derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchInput {
    pub pname: Option<PitchName>,
    pub oct: i32,
    pub oct_ges: Option<i32>,
    pub ploc: Option<PitchName>,
    pub oloc: Option<i32>,
    pub accid: Option<WrittenAccidental>,
    pub accid_ges: Option<GesturalAccidental>,
}

/// Derived pitch of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchDescriptor {
    /// Upper-case step letter, empty when neither `pname` nor `ploc` is set
    pub step: &'static str,
    pub alter: i32,
    /// Octave actually used for `midi`
    pub octave: i32,
    pub midi: i32,
    /// Both `oloc` and `ploc` are present
    pub unpitched: bool,
}

/// Derive step, alteration and MIDI pitch.
///
/// The `unpitched` flag and the pitch fallback are computed independently:
/// an unpitched note still gets a step and pitch from its `ploc`/`oloc`.
pub fn derive_pitch(input: &PitchInput) -> PitchDescriptor {
    let name = input.pname.or(input.ploc);
    let (step, base) = match name {
        Some(p) => (p.step(), p.semitone()),
        None => ("", 0),
    };

    let alter = match (input.accid_ges, input.accid) {
        (Some(ges), _) => ges.alter(),
        (None, Some(written)) => written.alter(),
        (None, None) => 0,
    };

    let octave = input.oct_ges.or(input.oloc).unwrap_or(input.oct);

    PitchDescriptor {
        step,
        alter,
        octave,
        midi: base + alter + (octave + 1) * 12,
        unpitched: input.oloc.is_some() && input.ploc.is_some(),
    }
}
