//! Shape and path primitives.
//!
//! Each primitive appends one node to the current group. Shapes are
//! inserted before the group's first nested `<g>`, so an element's own
//! drawing always precedes its children.

use super::constants::*;
use super::scene::NodeId;
use super::svg_builder::{colour_hex, SvgBuilder};
use crate::model::Point;

impl<'f> SvgBuilder<'f> {
    fn append_shape(&mut self, tag: &str) -> NodeId {
        self.scene.insert_before_first_group(self.current, tag)
    }

    // ── Lines and rectangles ────────────────────────────────────────

    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let pen = self.pen();
        let node = self.append_shape("path");
        self.scene.set_attr(node, "d", format!("M{x1} {y1} L{x2} {y2}"));
        self.scene.set_attr(node, "stroke", format!("#{}", colour_hex(pen.colour)));
        if pen.dash_length > 0 {
            self.scene.set_attr(
                node,
                "stroke-dasharray",
                format!("{}, {}", pen.dash_length, pen.dash_length),
            );
        }
        if pen.width > 1 {
            self.scene.set_attr(node, "stroke-width", pen.width);
        }
        if pen.opacity != 1.0 {
            self.scene.set_attr(node, "stroke-opacity", pen.opacity);
        }
    }

    pub fn draw_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.draw_rounded_rectangle(x, y, width, height, 0.0);
    }

    pub fn draw_rounded_rectangle(
        &mut self,
        x: i32,
        mut y: i32,
        mut width: i32,
        mut height: i32,
        radius: f64,
    ) {
        let (pen, brush) = (self.pen(), self.brush());
        let mut x = x;
        if height < 0 {
            height = -height;
            y -= height;
        }
        if width < 0 {
            width = -width;
            x -= width;
        }

        let node = self.append_shape("rect");
        self.scene.set_attr(node, "x", x);
        self.scene.set_attr(node, "y", y);
        self.scene.set_attr(node, "height", height);
        self.scene.set_attr(node, "width", width);
        if radius != 0.0 {
            self.scene.set_attr(node, "rx", radius);
        }
        if brush.colour != BLACK {
            self.scene.set_attr(node, "fill", format!("#{}", colour_hex(brush.colour)));
        }
        if brush.opacity != 1.0 {
            self.scene.set_attr(node, "fill-opacity", brush.opacity);
        }
        if pen.dash_length > 0 {
            self.scene.set_attr(node, "stroke", format!("#{}", colour_hex(pen.colour)));
            self.scene.set_attr(node, "stroke-width", pen.width);
            self.scene.set_attr(
                node,
                "stroke-dasharray",
                format!("{}, {}", pen.dash_length, pen.dash_length),
            );
            self.scene.set_attr(node, "fill", "none");
        }
    }

    // ── Ellipses and arcs ───────────────────────────────────────────

    pub fn draw_circle(&mut self, x: i32, y: i32, radius: i32) {
        self.draw_ellipse(x - radius, y - radius, 2 * radius, 2 * radius);
    }

    pub fn draw_ellipse(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let (pen, brush) = (self.pen(), self.brush());
        let rh = height / 2;
        let rw = width / 2;

        let node = self.append_shape("ellipse");
        self.scene.set_attr(node, "cx", x + rw);
        self.scene.set_attr(node, "cy", y + rh);
        self.scene.set_attr(node, "rx", rw);
        self.scene.set_attr(node, "ry", rh);
        if brush.opacity != 1.0 {
            self.scene.set_attr(node, "fill-opacity", brush.opacity);
        }
        if pen.opacity != 1.0 {
            self.scene.set_attr(node, "stroke-opacity", pen.opacity);
        }
        if pen.width > 0 {
            self.scene.set_attr(node, "stroke-width", pen.width);
            self.scene.set_attr(node, "stroke", format!("#{}", colour_hex(pen.colour)));
        }
    }

    /// Arc of the ellipse inscribed in the box, from `start` to `end`
    /// degrees (counter-clockwise, 0 at three o'clock).
    pub fn draw_elliptic_arc(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        start: f64,
        end: f64,
    ) {
        let (pen, brush) = (self.pen(), self.brush());
        let rx = (width / 2) as f64;
        let ry = (height / 2) as f64;
        let xc = x as f64 + rx;
        let yc = y as f64 + ry;

        let xs = xc + rx * start.to_radians().cos();
        let xe = xc + rx * end.to_radians().cos();
        let ys = yc - ry * start.to_radians().sin();
        let ye = yc - ry * end.to_radians().sin();

        let theta1 = (ys - yc).atan2(xs - xc);
        let theta2 = (ye - yc).atan2(xe - xc);
        let large_arc = i32::from(theta2 - theta1 > 0.0);
        let sweep = i32::from((theta2 - theta1).abs() > std::f64::consts::PI);

        let node = self.append_shape("path");
        self.scene.set_attr(
            node,
            "d",
            format!(
                "M{} {} A{} {} 0.0 {} {} {} {}",
                xs as i32,
                ys as i32,
                (rx as i32).abs(),
                (ry as i32).abs(),
                large_arc,
                sweep,
                xe as i32,
                ye as i32
            ),
        );
        if brush.opacity != 1.0 {
            self.scene.set_attr(node, "fill-opacity", brush.opacity);
        }
        if pen.opacity != 1.0 {
            self.scene.set_attr(node, "stroke-opacity", pen.opacity);
        }
        if pen.width > 0 {
            self.scene.set_attr(node, "stroke-width", pen.width);
            self.scene.set_attr(node, "stroke", format!("#{}", colour_hex(pen.colour)));
        }
    }

    // ── Paths ───────────────────────────────────────────────────────

    pub fn draw_polygon(&mut self, points: &[Point], x_offset: i32, y_offset: i32) {
        let (pen, brush) = (self.pen(), self.brush());
        let node = self.append_shape("polygon");

        if pen.width > 0 {
            self.scene.set_attr(node, "stroke", format!("#{}", colour_hex(pen.colour)));
        }
        if pen.width > 1 {
            self.scene.set_attr(node, "stroke-width", pen.width);
        }
        if pen.opacity != 1.0 {
            self.scene.set_attr(node, "stroke-opacity", pen.opacity);
        }
        if brush.colour != BLACK {
            self.scene.set_attr(node, "fill", format!("#{}", colour_hex(brush.colour)));
        }
        if brush.opacity != 1.0 {
            self.scene.set_attr(node, "fill-opacity", brush.opacity);
        }

        let mut pts = String::new();
        for p in points {
            pts.push_str(&format!("{},{} ", p.x + x_offset, p.y + y_offset));
        }
        self.scene.set_attr(node, "points", pts);
    }

    /// Closed double curve: out along `first`, back along `second`
    /// reversed. Used for slurs and ties.
    pub fn draw_complex_bezier_path(&mut self, first: &[Point; 4], second: &[Point; 4]) {
        let pen = self.pen();
        let node = self.append_shape("path");
        self.scene.set_attr(
            node,
            "d",
            format!(
                "M{},{} C{},{} {},{} {},{} C{},{} {},{} {},{}",
                first[0].x,
                first[0].y,
                first[1].x,
                first[1].y,
                first[2].x,
                first[2].y,
                first[3].x,
                first[3].y,
                second[2].x,
                second[2].y,
                second[1].x,
                second[1].y,
                second[0].x,
                second[0].y
            ),
        );
        self.scene.set_attr(node, "stroke", format!("#{}", colour_hex(pen.colour)));
        self.scene.set_attr(node, "stroke-linecap", "round");
        self.scene.set_attr(node, "stroke-linejoin", "round");
        self.scene.set_attr(node, "stroke-width", pen.width);
    }

    // ── Glyphs and text ─────────────────────────────────────────────

    /// Draw SMuFL glyphs as `<use>` references at the current font size.
    /// Unknown code points are skipped.
    pub fn draw_music_text(&mut self, text: &str, x: i32, y: i32) {
        let point_size = self.font().point_size;
        let fonts = self.fonts;
        let mut x = x;
        for c in text.chars() {
            let Some(glyph) = fonts.glyph(c as u32) else {
                log::debug!("no glyph for code point U+{:04X}", c as u32);
                continue;
            };
            self.glyphs.register(&glyph.path);

            let node = self.append_shape("use");
            self.scene
                .set_attr(node, "xlink:href", format!("#{}", glyph.code_str));
            self.scene.set_attr(node, "x", x);
            self.scene.set_attr(node, "y", y);
            self.scene.set_attr(node, "height", format!("{point_size}px"));
            self.scene.set_attr(node, "width", format!("{point_size}px"));

            x += glyph.advance(point_size);
        }
    }

    /// Append a text run to the open `<text>`. Font attributes come from
    /// the font stack; the family is only written when it differs from
    /// the enclosing node's.
    pub fn draw_text(&mut self, text: &str, x: Option<i32>, y: Option<i32>) {
        let font = self.font();
        let parent_family = self
            .scene
            .attr(self.current, "font-family")
            .unwrap_or_default()
            .to_string();

        let node = self.append_shape("tspan");
        if !font.face_name.is_empty() && font.face_name != parent_family {
            self.scene.set_attr(node, "font-family", &font.face_name);
            if font.face_name == TEXT_FONT_FACE {
                self.text_font_used = true;
            }
        }
        if font.point_size != 0 {
            self.scene
                .set_attr(node, "font-size", format!("{}px", font.point_size));
        }
        if let Some(style) = font.style {
            self.scene.set_attr(node, "font-style", style.as_str());
        }
        if let Some(weight) = font.weight {
            self.scene.set_attr(node, "font-weight", weight.as_str());
        }
        self.scene.set_attr(node, "class", "text");
        self.scene.append_text(node, &preserve_edge_spaces(text));

        if let (Some(x), Some(y)) = (x, y) {
            self.scene.set_attr(node, "x", x);
            self.scene.set_attr(node, "y", y);
        }
    }

    /// Copy parsed markup into the current group, placed at `(x, y)` and
    /// scaled from drawing units. Invalid markup is skipped.
    pub fn draw_svg_shape(&mut self, x: i32, y: i32, markup: &str) {
        let doc = match roxmltree::Document::parse(markup) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("skipping invalid embedded shape: {e}");
                return;
            }
        };
        self.set_current_attr(
            "transform",
            format!("translate({x}, {y}) scale({DEFINITION_FACTOR}, {DEFINITION_FACTOR})"),
        );
        for child in doc.root_element().children() {
            self.scene.append_copy(self.current, child);
        }
    }
}

/// Edge spaces become non-breaking so viewers without `xml:space`
/// support keep them.
fn preserve_edge_spaces(text: &str) -> String {
    let mut out = text.to_string();
    if out.starts_with(' ') {
        out.replace_range(0..1, "\u{00A0}");
    }
    if out.len() > 1 && out.ends_with(' ') {
        let end = out.len();
        out.replace_range(end - 1..end, "\u{00A0}");
    }
    out
}
