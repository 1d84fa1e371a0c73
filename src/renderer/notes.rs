//! Synchronization attributes of notes and rests.
//!
//! Notes carry their membership flags, their derived pitch and their
//! timing; rests only their timing. Score-time stamps are absolute (the
//! measure's origin for the current repeat added in), real-time values
//! are relative to the measure.

use super::svg_builder::SvgBuilder;
use super::ElementContext;
use crate::model::{Element, ElementKind};
use crate::pitch::derive_pitch;
use crate::timing::{resolve, Timing};

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub(super) fn write_note_attributes(svg: &mut SvgBuilder, element: &Element, ctx: &ElementContext) {
    let ElementKind::Note(note) = &element.kind else {
        return;
    };
    let Some(input) = element.pitch_input() else {
        return;
    };
    let pitch = derive_pitch(&input);

    svg.set_current_attr("in_beam", flag(ctx.in_beam));
    match ctx.chord.and_then(|c| c.position_in_chord(&element.id)) {
        Some(pos) => {
            svg.set_current_attr("in_chord", "1");
            svg.set_current_attr("chord_pos", pos);
        }
        None => svg.set_current_attr("in_chord", "0"),
    }
    svg.set_current_attr("unpitched", flag(pitch.unpitched));
    svg.set_current_attr("in_tie", flag(note.tie.is_some()));

    if let Some(oloc) = note.oloc {
        svg.set_current_attr("oloc", oloc);
    }
    if let Some(ploc) = note.ploc {
        svg.set_current_attr("ploc", ploc.as_str());
    }
    if let Some(tie) = note.tie {
        svg.set_current_attr("tie", tie.as_str());
    }

    svg.set_current_attr("pname", pitch.step);
    svg.set_current_attr("step", pitch.step);
    svg.set_current_attr("alter", pitch.alter);
    svg.set_current_attr("oct", note.oct);
    svg.set_current_attr("pitch", pitch.midi);

    write_timing(svg, &note.timing, ctx);

    if note.timing.is_tied_secondary() {
        svg.set_current_attr("event_on", -1);
        svg.set_current_attr("event_off", -1);
    }
}

pub(super) fn write_rest_attributes(svg: &mut SvgBuilder, element: &Element, ctx: &ElementContext) {
    if let ElementKind::Rest(rest) = &element.kind {
        write_timing(svg, &rest.timing, ctx);
    }
}

/// `qstamp_*` and `time_*`. The absolute score stamps are left out when
/// the measure has no origin for the current repeat.
fn write_timing(svg: &mut SvgBuilder, timing: &Timing, ctx: &ElementContext) {
    let absolute = ctx
        .measure
        .and_then(|m| resolve(timing, &m.offsets, ctx.repeat_index));
    match absolute {
        Some(abs) => {
            svg.set_current_attr("qstamp_on", abs.score_time_onset);
            svg.set_current_attr("qstamp_off", abs.score_time_offset);
        }
        None => log::debug!("no measure offset for repeat {}", ctx.repeat_index),
    }
    svg.set_current_attr("qstamp_dur", timing.score_time_duration());

    svg.set_current_attr("time_on", timing.real_time_onset_ms());
    svg.set_current_attr("time_off", timing.real_time_offset_ms());
    svg.set_current_attr("time_len", timing.real_time_duration_ms());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontResources;
    use crate::model::{AccidData, ChordData, MeasureData, NoteData, RestData};
    use crate::pitch::{GesturalAccidental, PitchName, Tie, WrittenAccidental};
    use crate::timing::{MeasureOffsets, TIED_SENTINEL};

    fn measure_data() -> MeasureData {
        let mut offsets = MeasureOffsets::new();
        offsets.push(4.0, 2000);
        offsets.push(12.0, 6000);
        MeasureData {
            offsets,
            ..Default::default()
        }
    }

    fn attrs_of(element: &Element, ctx: &ElementContext) -> Vec<(String, String)> {
        let fonts = FontResources::new();
        let mut svg = SvgBuilder::new(100, 100, &fonts);
        svg.start_graphic(element, "", &element.id, ctx);
        let node = svg.current_node();
        let attrs = svg.scene().attributes(node).to_vec();
        svg.end_graphic(element, None);
        attrs
    }

    fn get<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    fn note(timing: Timing) -> Element {
        Element::new(
            "n1",
            ElementKind::Note(NoteData {
                pname: Some(PitchName::C),
                oct: 4,
                timing,
                ..Default::default()
            }),
        )
        .with_child(Element::new(
            "a1",
            ElementKind::Accid(AccidData {
                accid: Some(WrittenAccidental::S),
                accid_ges: Some(GesturalAccidental::F),
            }),
        ))
    }

    #[test]
    fn note_pitch_and_timing() {
        let m = measure_data();
        let ctx = ElementContext {
            measure: Some(&m),
            ..Default::default()
        };
        let attrs = attrs_of(&note(Timing::new(1.0, 2.0, 500, 1000)), &ctx);

        let names: Vec<&str> = attrs.iter().map(|(n, _)| n.as_str()).collect();
        pretty_assertions::assert_eq!(
            names,
            vec![
                "class", "id", "in_beam", "in_chord", "unpitched", "in_tie", "pname", "step",
                "alter", "oct", "pitch", "qstamp_on", "qstamp_off", "qstamp_dur", "time_on",
                "time_off", "time_len",
            ]
        );
        assert_eq!(get(&attrs, "step"), Some("C"));
        assert_eq!(get(&attrs, "alter"), Some("-1"));
        assert_eq!(get(&attrs, "pitch"), Some("59"));
        assert_eq!(get(&attrs, "qstamp_on"), Some("5"));
        assert_eq!(get(&attrs, "qstamp_off"), Some("6"));
        assert_eq!(get(&attrs, "qstamp_dur"), Some("1"));
        // real time stays measure-relative
        assert_eq!(get(&attrs, "time_on"), Some("500"));
        assert_eq!(get(&attrs, "time_len"), Some("500"));
    }

    #[test]
    fn second_repeat_uses_second_origin() {
        let m = measure_data();
        let ctx = ElementContext {
            measure: Some(&m),
            repeat_index: 2,
            ..Default::default()
        };
        let attrs = attrs_of(&note(Timing::new(0.5, 1.0, 250, 500)), &ctx);
        assert_eq!(get(&attrs, "qstamp_on"), Some("12.5"));
        assert_eq!(get(&attrs, "qstamp_off"), Some("13"));
    }

    #[test]
    fn missing_origin_omits_absolute_stamps() {
        let m = measure_data();
        let ctx = ElementContext {
            measure: Some(&m),
            repeat_index: 3,
            ..Default::default()
        };
        let attrs = attrs_of(&note(Timing::new(0.0, 1.0, 0, 500)), &ctx);
        assert_eq!(get(&attrs, "qstamp_on"), None);
        assert_eq!(get(&attrs, "qstamp_off"), None);
        assert_eq!(get(&attrs, "qstamp_dur"), Some("1"));
    }

    #[test]
    fn tied_secondary_gets_event_sentinels() {
        let mut timing = Timing::new(0.0, 1.0, 0, 500);
        timing.set_score_time_tied_duration(TIED_SENTINEL);
        let mut el = note(timing);
        if let ElementKind::Note(n) = &mut el.kind {
            n.tie = Some(Tie::T);
        }
        let attrs = attrs_of(&el, &ElementContext::default());
        assert_eq!(get(&attrs, "in_tie"), Some("1"));
        assert_eq!(get(&attrs, "tie"), Some("t"));
        assert_eq!(get(&attrs, "event_on"), Some("-1"));
        assert_eq!(get(&attrs, "event_off"), Some("-1"));
    }

    #[test]
    fn chord_and_beam_membership() {
        let chord = Element::new("c1", ElementKind::Chord(ChordData::default())).with_children(vec![
            note(Timing::default()),
            Element::new(
                "n2",
                ElementKind::Note(NoteData {
                    pname: Some(PitchName::E),
                    oct: 4,
                    ..Default::default()
                }),
            ),
        ]);
        let ctx = ElementContext {
            in_beam: true,
            chord: Some(&chord),
            ..Default::default()
        };
        let attrs = attrs_of(&chord.children[0], &ctx);
        assert_eq!(get(&attrs, "in_beam"), Some("1"));
        assert_eq!(get(&attrs, "in_chord"), Some("1"));
        assert_eq!(get(&attrs, "chord_pos"), Some("-1"));
    }

    #[test]
    fn unpitched_note_keeps_derived_pitch() {
        let el = Element::new(
            "n1",
            ElementKind::Note(NoteData {
                ploc: Some(PitchName::E),
                oloc: Some(4),
                ..Default::default()
            }),
        );
        let attrs = attrs_of(&el, &ElementContext::default());
        assert_eq!(get(&attrs, "unpitched"), Some("1"));
        assert_eq!(get(&attrs, "oloc"), Some("4"));
        assert_eq!(get(&attrs, "ploc"), Some("e"));
        assert_eq!(get(&attrs, "step"), Some("E"));
        assert_eq!(get(&attrs, "pitch"), Some("64"));
    }

    #[test]
    fn rest_timing_only() {
        let m = measure_data();
        let ctx = ElementContext {
            measure: Some(&m),
            ..Default::default()
        };
        let rest = Element::new(
            "r1",
            ElementKind::Rest(RestData {
                dur: None,
                timing: Timing::new(2.0, 4.0, 1000, 2000),
            }),
        );
        let attrs = attrs_of(&rest, &ctx);
        assert_eq!(get(&attrs, "qstamp_on"), Some("6"));
        assert_eq!(get(&attrs, "time_off"), Some("2000"));
        assert_eq!(get(&attrs, "pitch"), None);
    }
}
