//! Data model for a laid-out score.
//!
//! The tree arrives already built and positioned: every element carries
//! its kind-specific data, optional presentation attributes, the geometry
//! computed by layout, and the drawing commands layout chose for it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pitch::{
    derive_pitch, GesturalAccidental, PitchInput, PitchName, Tie, WrittenAccidental,
};
use crate::timing::{MeasureOffsets, Timing};

/// One output document (a page) and the tree it renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Logical page width
    pub width: i32,
    /// Logical page height
    pub height: i32,
    /// Root of the element tree (usually a page)
    pub root: Element,
    /// Placement of floating elements, keyed by element id
    #[serde(default)]
    pub positioners: PositionerRegistry,
}

impl Document {
    pub fn new(width: i32, height: i32, root: Element) -> Self {
        Self {
            width,
            height,
            root,
            positioners: PositionerRegistry::default(),
        }
    }

    /// Load a pre-built tree from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Find an element anywhere in the tree by id.
    pub fn find(&self, id: &str) -> Option<&Element> {
        self.root.find(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Elements
// ═══════════════════════════════════════════════════════════════════════

/// A node of the score tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attributes,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Drawing commands emitted inside this element's group, before children
    #[serde(default)]
    pub drawing: Vec<DrawCommand>,
    #[serde(default)]
    pub children: Vec<Element>,
}

/// Element kinds with their kind-specific data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    Page,
    System,
    Measure(MeasureData),
    Staff(StaffData),
    Layer(LayerData),
    Note(NoteData),
    Rest(RestData),
    Chord(ChordData),
    Beam,
    Accid(AccidData),
    Barline,
    Clef,
    /// Block of text made of `Rend` runs
    Text(TextData),
    /// Run of text inside a `Text`
    Rend(RendData),
    /// Floating directive (placed through a positioner)
    Dir,
    /// Floating dynamic marking
    Dynam,
    /// Floating slur
    Slur,
}

/// Musical attributes of a measure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureData {
    /// Printed measure number
    pub n: Option<i32>,
    /// Time origin of every pass through the measure
    pub offsets: MeasureOffsets,
    /// Meter in force, as (count, unit)
    pub meter: Option<(i32, i32)>,
    /// Tempo change (quarter notes per minute) taking effect here
    pub tempo: Option<f64>,
    /// Forward repeat sign at the start
    pub repeat_start: bool,
    /// Backward repeat sign at the end
    pub repeat_end: bool,
    /// Volta ending number(s), e.g. "1", "1, 2", "1-3"
    pub ending: Option<String>,
    pub segno: bool,
    pub coda: bool,
    pub fine: bool,
    pub to_coda: bool,
    pub jump: Option<Jump>,
}

/// Navigation jump at the end of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Jump {
    DaCapo,
    DalSegno,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffData {
    pub n: i32,
    /// Lyric font settings from the staff definition
    pub lyric_style: Option<LyricStyle>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricStyle {
    pub family: Option<String>,
    pub name: Option<String>,
    pub style: Option<FontStyle>,
    pub weight: Option<FontWeight>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerData {
    pub n: i32,
}

/// Written duration: `dur` is the note value (1 = whole, 4 = quarter, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub dur: i32,
    #[serde(default)]
    pub dots: i32,
}

impl Duration {
    pub fn new(dur: i32, dots: i32) -> Self {
        Self { dur, dots }
    }

    /// Length in quarter notes, dots included.
    pub fn quarters(&self) -> f64 {
        if self.dur <= 0 {
            return 0.0;
        }
        let base = 4.0 / self.dur as f64;
        let mut total = base;
        let mut add = base;
        for _ in 0..self.dots.max(0) {
            add /= 2.0;
            total += add;
        }
        total
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteData {
    pub pname: Option<PitchName>,
    pub oct: i32,
    pub oct_ges: Option<i32>,
    /// Written pitch location (unpitched staves)
    pub ploc: Option<PitchName>,
    /// Written octave location (unpitched staves)
    pub oloc: Option<i32>,
    pub tie: Option<Tie>,
    pub dur: Option<Duration>,
    pub timing: Timing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestData {
    pub dur: Option<Duration>,
    pub timing: Timing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordData {
    pub dur: Option<Duration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccidData {
    pub accid: Option<WrittenAccidental>,
    pub accid_ges: Option<GesturalAccidental>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextData {
    pub x: i32,
    pub y: i32,
    pub alignment: Option<HorizontalAlignment>,
    pub font: Option<FontInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendData {
    pub text: String,
    pub x: Option<i32>,
    pub y: Option<i32>,
    /// Font for this run; inherits the enclosing text font when absent
    pub font: Option<FontInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

// ═══════════════════════════════════════════════════════════════════════
// Presentation attributes
// ═══════════════════════════════════════════════════════════════════════

/// Optional presentation attributes. Absence of any field writes nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub color: Option<String>,
    pub label: Option<String>,
    pub lang: Option<String>,
    pub typography: Option<Typography>,
    pub visible: Option<bool>,
    /// `xml:space` value for text runs
    pub space: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Typography {
    pub fontname: Option<String>,
    pub fontstyle: Option<FontStyle>,
    pub fontweight: Option<FontWeight>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Italic,
    Normal,
    Oblique,
}

impl FontStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            FontStyle::Italic => "italic",
            FontStyle::Normal => "normal",
            FontStyle::Oblique => "oblique",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Bold,
    Normal,
}

impl FontWeight {
    pub fn as_str(self) -> &'static str {
        match self {
            FontWeight::Bold => "bold",
            FontWeight::Normal => "normal",
        }
    }
}

/// A font selection on the drawing font stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontInfo {
    pub face_name: String,
    pub point_size: i32,
    pub style: Option<FontStyle>,
    pub weight: Option<FontWeight>,
}

// ═══════════════════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Extent relative to an element's drawing position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Layout results for an element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub drawing_x: i32,
    pub drawing_y: i32,
    pub self_bb: Option<BoundingBox>,
    pub content_bb: Option<BoundingBox>,
    /// Code point of the symbol that represents the element
    pub bb_glyph: Option<u32>,
    pub bb_glyph_font_size: i32,
}

impl Geometry {
    pub fn self_left(&self) -> Option<i32> {
        self.self_bb.map(|bb| self.drawing_x + bb.x1)
    }

    pub fn self_bottom(&self) -> Option<i32> {
        self.self_bb.map(|bb| self.drawing_y + bb.y1)
    }
}

/// Extents assigned to a floating element by the system it was laid out in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Positioner {
    pub self_bb: Option<BoundingBox>,
    pub content_bb: Option<BoundingBox>,
}

/// Element id → positioner. Elements never drawn have no entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionerRegistry {
    entries: HashMap<String, Positioner>,
}

impl PositionerRegistry {
    pub fn insert(&mut self, element_id: impl Into<String>, positioner: Positioner) {
        self.entries.insert(element_id.into(), positioner);
    }

    pub fn get(&self, element_id: &str) -> Option<&Positioner> {
        self.entries.get(element_id)
    }
}

/// Drawing primitives chosen by layout for an element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum DrawCommand {
    Line { x1: i32, y1: i32, x2: i32, y2: i32 },
    Rect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        #[serde(default)]
        radius: f64,
    },
    Circle { x: i32, y: i32, radius: i32 },
    Ellipse {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Arc {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        start: f64,
        end: f64,
    },
    Polygon {
        points: Vec<Point>,
        #[serde(default)]
        x_offset: i32,
        #[serde(default)]
        y_offset: i32,
    },
    Bezier {
        first: [Point; 4],
        second: [Point; 4],
    },
    /// SMuFL glyphs drawn at `point_size`
    Music {
        text: String,
        x: i32,
        y: i32,
        point_size: i32,
    },
    Rotate { origin: Point, angle: f64 },
    Pen {
        colour: u32,
        width: i32,
        #[serde(default)]
        dash_length: i32,
    },
    ResetPen,
}

// ═══════════════════════════════════════════════════════════════════════
// Element helpers
// ═══════════════════════════════════════════════════════════════════════

impl Element {
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attrs: Attributes::default(),
            geometry: None,
            drawing: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_drawing(mut self, cmd: DrawCommand) -> Self {
        self.drawing.push(cmd);
        self
    }

    /// Class name as used for the `class` attribute (before lower-casing).
    pub fn class_name(&self) -> &'static str {
        match self.kind {
            ElementKind::Page => "Page",
            ElementKind::System => "System",
            ElementKind::Measure(_) => "Measure",
            ElementKind::Staff(_) => "Staff",
            ElementKind::Layer(_) => "Layer",
            ElementKind::Note(_) => "Note",
            ElementKind::Rest(_) => "Rest",
            ElementKind::Chord(_) => "Chord",
            ElementKind::Beam => "Beam",
            ElementKind::Accid(_) => "Accid",
            ElementKind::Barline => "BarLine",
            ElementKind::Clef => "Clef",
            ElementKind::Text(_) => "Text",
            ElementKind::Rend(_) => "Rend",
            ElementKind::Dir => "Dir",
            ElementKind::Dynam => "Dynam",
            ElementKind::Slur => "Slur",
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Dir | ElementKind::Dynam | ElementKind::Slur
        )
    }

    pub fn is_text_element(&self) -> bool {
        matches!(self.kind, ElementKind::Text(_) | ElementKind::Rend(_))
    }

    /// Timing record of a playable element.
    pub fn timing(&self) -> Option<&Timing> {
        match &self.kind {
            ElementKind::Note(n) => Some(&n.timing),
            ElementKind::Rest(r) => Some(&r.timing),
            _ => None,
        }
    }

    pub fn timing_mut(&mut self) -> Option<&mut Timing> {
        match &mut self.kind {
            ElementKind::Note(n) => Some(&mut n.timing),
            ElementKind::Rest(r) => Some(&mut r.timing),
            _ => None,
        }
    }

    pub fn as_measure(&self) -> Option<&MeasureData> {
        match &self.kind {
            ElementKind::Measure(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_note(&self) -> Option<&NoteData> {
        match &self.kind {
            ElementKind::Note(n) => Some(n),
            _ => None,
        }
    }

    /// First accidental child, the one drawn with the note.
    pub fn drawing_accid(&self) -> Option<&AccidData> {
        self.children.iter().find_map(|c| match &c.kind {
            ElementKind::Accid(a) => Some(a),
            _ => None,
        })
    }

    /// Pitch-relevant fields of a note, accidental included.
    pub fn pitch_input(&self) -> Option<PitchInput> {
        let note = self.as_note()?;
        let accid = self.drawing_accid();
        Some(PitchInput {
            pname: note.pname,
            oct: note.oct,
            oct_ges: note.oct_ges,
            ploc: note.ploc,
            oloc: note.oloc,
            accid: accid.and_then(|a| a.accid),
            accid_ges: accid.and_then(|a| a.accid_ges),
        })
    }

    /// Depth-first search by id.
    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Pre-order list of descendant notes (self excluded).
    pub fn descendant_notes(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        for child in &self.children {
            child.collect_notes(&mut out);
        }
        out
    }

    fn collect_notes<'a>(&'a self, out: &mut Vec<&'a Element>) {
        if matches!(self.kind, ElementKind::Note(_)) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_notes(out);
        }
    }

    /// Signed position of `note_id` around the middle of this chord, tones
    /// ordered from lowest to highest pitch: 0 for the middle tone of an
    /// odd chord, negative below, positive above.
    pub fn position_in_chord(&self, note_id: &str) -> Option<i32> {
        let mut notes = self.descendant_notes();
        notes.sort_by_key(|n| n.pitch_input().map(|input| derive_pitch(&input).midi));
        let size = notes.len() as i32;
        let position = notes.iter().position(|n| n.id == note_id)? as i32;
        let half = size / 2;
        if size % 2 == 1 && position == (size - 1) / 2 {
            return Some(0);
        }
        if position < half {
            return Some(position - half);
        }
        if size % 2 == 0 {
            return Some(position - half + 1);
        }
        Some(position - half)
    }
}
