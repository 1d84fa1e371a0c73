//! Score renderer — turns a laid-out element tree into an SVG document.
//!
//! A single depth-first traversal opens one group per element, draws the
//! element's own shapes, recurses into its children and closes the group.
//! Measures, staves, notes and rests carry their timemap attributes on
//! the group itself, so the output is both a picture and a sync map.

mod bbox;
mod constants;
mod notes;
mod scene;
mod shapes;
mod staff;
mod svg_builder;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::font::FontResources;
use crate::model::*;

pub use bbox::View;
pub use constants::{BLACK, BLUE, CYAN, GREEN, LIGHT_GREY, RED, WHITE};
pub use scene::{NodeId, Scene};
pub use svg_builder::{colour_hex, Brush, GlyphRegistry, Pen, SvgBuilder};

// ═══════════════════════════════════════════════════════════════════════
// Options
// ═══════════════════════════════════════════════════════════════════════

/// Output settings for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Write width/height in millimetres instead of pixels
    pub mm_output: bool,
    pub user_scale_x: f64,
    pub user_scale_y: f64,
    /// Prepend `<?xml ...?>`
    pub xml_declaration: bool,
    /// Debug overlay of bounding boxes and glyph anchors
    pub draw_bounding_boxes: bool,
    /// Emit a CSS `<style>` block at the start of the page
    pub global_styling: bool,
    /// Pass through repeated measures used for note and rest stamps (1-based)
    pub repeat_index: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            mm_output: false,
            user_scale_x: 1.0,
            user_scale_y: 1.0,
            xml_declaration: false,
            draw_bounding_boxes: false,
            global_styling: false,
            repeat_index: 1,
        }
    }
}

impl RenderOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What the traversal knows about an element's ancestors.
#[derive(Debug, Clone, Copy)]
pub struct ElementContext<'e> {
    /// Enclosing measure
    pub measure: Option<&'e MeasureData>,
    /// Index of the enclosing measure among its siblings
    pub measure_index: usize,
    pub in_beam: bool,
    /// Enclosing chord
    pub chord: Option<&'e Element>,
    pub repeat_index: usize,
}

impl Default for ElementContext<'_> {
    fn default() -> Self {
        Self {
            measure: None,
            measure_index: 0,
            in_beam: false,
            chord: None,
            repeat_index: 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Render a document into a complete SVG string.
pub fn render_document(doc: &Document, fonts: &FontResources, options: &RenderOptions) -> String {
    let mut svg = SvgBuilder::new(doc.width, doc.height, fonts);
    svg.set_mm_output(options.mm_output);
    svg.set_user_scale(options.user_scale_x, options.user_scale_y);
    svg.set_global_styling(options.global_styling);
    svg.set_draw_bounding_boxes(options.draw_bounding_boxes);

    let view = View::new(&doc.positioners);
    let ctx = ElementContext {
        repeat_index: options.repeat_index,
        ..Default::default()
    };

    svg.start_page();
    render_element(&mut svg, &doc.root, 0, ctx, &view);
    svg.end_page();
    debug_assert_eq!(svg.depth(), 1, "traversal left groups open");

    log::debug!(
        "rendered '{}' with {} distinct glyphs",
        doc.root.id,
        svg.glyph_registry().len()
    );
    svg.into_string(options.xml_declaration)
}

// ═══════════════════════════════════════════════════════════════════════
// Traversal
// ═══════════════════════════════════════════════════════════════════════

fn render_element<'e>(
    svg: &mut SvgBuilder,
    element: &'e Element,
    index: usize,
    parent: ElementContext<'e>,
    view: &View,
) {
    let mut ctx = parent;
    match &element.kind {
        ElementKind::Measure(m) => {
            ctx.measure = Some(m);
            ctx.measure_index = index;
        }
        ElementKind::Beam => ctx.in_beam = true,
        ElementKind::Chord(_) => ctx.chord = Some(element),
        ElementKind::Text(data) => {
            render_text(svg, element, data, &ctx, view);
            return;
        }
        _ => {}
    }

    svg.start_graphic(element, "", &element.id, &ctx);
    draw_commands(svg, &element.drawing);
    for (i, child) in element.children.iter().enumerate() {
        render_element(svg, child, i, ctx, view);
    }
    svg.end_graphic(element, Some(view));
}

/// A text block: one `<text>` holding a `<tspan>` per run.
fn render_text(
    svg: &mut SvgBuilder,
    element: &Element,
    data: &TextData,
    ctx: &ElementContext,
    view: &View,
) {
    svg.start_graphic(element, "", &element.id, ctx);
    draw_commands(svg, &element.drawing);

    if let Some(font) = &data.font {
        svg.set_font(font.clone());
    }
    svg.start_text(data.x, data.y, data.alignment);
    for child in &element.children {
        let ElementKind::Rend(rend) = &child.kind else {
            log::debug!("ignoring {} inside text '{}'", child.class_name(), element.id);
            continue;
        };
        if let Some(font) = &rend.font {
            svg.set_font(font.clone());
        }
        svg.start_text_graphic(child, "", &child.id);
        svg.draw_text(&rend.text, rend.x, rend.y);
        svg.end_text_graphic(child, Some(view));
        if rend.font.is_some() {
            svg.reset_font();
        }
    }
    svg.end_text();
    if data.font.is_some() {
        svg.reset_font();
    }

    svg.end_graphic(element, Some(view));
}

/// Replay layout's drawing commands. Pens set here are released before
/// returning.
fn draw_commands(svg: &mut SvgBuilder, commands: &[DrawCommand]) {
    let mut pens = 0;
    for cmd in commands {
        match cmd {
            DrawCommand::Line { x1, y1, x2, y2 } => svg.draw_line(*x1, *y1, *x2, *y2),
            DrawCommand::Rect {
                x,
                y,
                width,
                height,
                radius,
            } => svg.draw_rounded_rectangle(*x, *y, *width, *height, *radius),
            DrawCommand::Circle { x, y, radius } => svg.draw_circle(*x, *y, *radius),
            DrawCommand::Ellipse {
                x,
                y,
                width,
                height,
            } => svg.draw_ellipse(*x, *y, *width, *height),
            DrawCommand::Arc {
                x,
                y,
                width,
                height,
                start,
                end,
            } => svg.draw_elliptic_arc(*x, *y, *width, *height, *start, *end),
            DrawCommand::Polygon {
                points,
                x_offset,
                y_offset,
            } => svg.draw_polygon(points, *x_offset, *y_offset),
            DrawCommand::Bezier { first, second } => svg.draw_complex_bezier_path(first, second),
            DrawCommand::Music {
                text,
                x,
                y,
                point_size,
            } => {
                svg.set_font(FontInfo {
                    point_size: *point_size,
                    ..Default::default()
                });
                svg.draw_music_text(text, *x, *y);
                svg.reset_font();
            }
            DrawCommand::Rotate { origin, angle } => svg.rotate_graphic(*origin, *angle),
            DrawCommand::Pen {
                colour,
                width,
                dash_length,
            } => {
                svg.set_pen(*colour, *width, *dash_length);
                pens += 1;
            }
            DrawCommand::ResetPen => {
                if pens > 0 {
                    svg.reset_pen();
                    pens -= 1;
                }
            }
        }
    }
    for _ in 0..pens {
        svg.reset_pen();
    }
}
