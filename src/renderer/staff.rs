//! Measure and staff attributes.

use super::svg_builder::SvgBuilder;
use super::ElementContext;
use crate::model::{Element, StaffData};

/// `measureNr` is the measure's position among its siblings;
/// `qstamp_start` its score-time origin on the first pass.
pub(super) fn write_measure_attributes(
    svg: &mut SvgBuilder,
    element: &Element,
    ctx: &ElementContext,
) {
    let Some(measure) = element.as_measure() else {
        return;
    };
    svg.set_current_attr("measureNr", ctx.measure_index);
    if let Some(start) = measure.offsets.score_time_offset(1) {
        svg.set_current_attr("qstamp_start", start);
    }
}

pub(super) fn write_staff_attributes(svg: &mut SvgBuilder, staff: &StaffData) {
    svg.set_current_attr("staffNr", staff.n);
}

/// Inline CSS for lyrics, from the staff definition's lyric font.
pub(super) fn write_lyric_style(svg: &mut SvgBuilder, staff: &StaffData) {
    let Some(lyric) = &staff.lyric_style else {
        return;
    };
    let mut style = String::new();
    if let Some(family) = lyric.family.as_ref().or(lyric.name.as_ref()) {
        style.push_str(&format!("font-family:{family};"));
    }
    if let Some(s) = lyric.style {
        style.push_str(&format!("font-style:{};", s.as_str()));
    }
    if let Some(w) = lyric.weight {
        style.push_str(&format!("font-weight:{};", w.as_str()));
    }
    if !style.is_empty() {
        svg.set_current_attr("style", style);
    }
}
