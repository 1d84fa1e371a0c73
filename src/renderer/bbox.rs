//! Bounding-box debug overlay.
//!
//! When enabled, every closed element gets a sibling group on the page
//! showing its self box (red, dashed), the SMuFL cut-out anchors of its
//! representative glyph (green dots) and, for text, its content box (blue).

use super::constants::*;
use super::svg_builder::SvgBuilder;
use crate::font::GlyphAnchor;
use crate::model::{BoundingBox, Element, PositionerRegistry};

/// Logical → device coordinate mapping plus the floating-element
/// positioners of the page being drawn.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    /// When set, y is flipped against the page height.
    pub page_height: Option<i32>,
    pub positioners: &'a PositionerRegistry,
}

impl<'a> View<'a> {
    pub fn new(positioners: &'a PositionerRegistry) -> Self {
        Self {
            page_height: None,
            positioners,
        }
    }

    pub fn to_device_x(&self, x: i32) -> i32 {
        x
    }

    pub fn to_device_y(&self, y: i32) -> i32 {
        match self.page_height {
            Some(h) => h - y,
            None => y,
        }
    }
}

impl<'f> SvgBuilder<'f> {
    /// Draw the overlay for a just-closed element. Does nothing unless
    /// the overlay is enabled and a view is given.
    pub(super) fn draw_bounding_box(&mut self, element: &Element, view: Option<&View>) {
        if !self.draw_bounding_boxes() {
            return;
        }
        let Some(view) = view else {
            return;
        };

        let geometry = element.geometry.clone().unwrap_or_default();
        let (self_bb, content_bb) = if element.is_floating() {
            // Floating elements never laid out have no positioner.
            match view.positioners.get(&element.id) {
                Some(p) => (p.self_bb, p.content_bb),
                None => return,
            }
        } else if element.geometry.is_some() {
            (geometry.self_bb, geometry.content_bb)
        } else {
            return;
        };

        let origin = (geometry.drawing_x, geometry.drawing_y);
        let saved = self.swap_current(self.page_node());

        self.open_group(element, "self-bounding-box", &format!("bbox-{}", element.id));
        if let Some(bb) = self_bb {
            self.set_pen(RED, SELF_BOX_PEN_WIDTH, OVERLAY_DASH_LENGTH);
            self.draw_box(view, origin, &bb);
            self.reset_pen();

            let fonts = self.fonts;
            if let Some(glyph) = geometry.bb_glyph.and_then(|code| fonts.glyph(code)) {
                let font_size = geometry.bb_glyph_font_size;
                let upem = glyph.units_per_em.max(1);
                let left = origin.0 + bb.x1;
                let bottom = origin.1 + bb.y1;
                let anchors: Vec<_> = GlyphAnchor::CORNERS
                    .iter()
                    .filter_map(|&a| glyph.anchor(a))
                    .collect();
                let (gx, gy) = (glyph.x, glyph.y);

                self.set_pen(GREEN, ANCHOR_PEN_WIDTH, 0);
                for a in anchors {
                    let px = left - gx * font_size / upem + a.x * font_size / upem;
                    let py = bottom - gy * font_size / upem + a.y * font_size / upem;
                    self.draw_circle(view.to_device_x(px), view.to_device_y(py), ANCHOR_RADIUS);
                }
                self.reset_pen();
            }
        }
        self.end_custom_graphic();

        if element.is_text_element() {
            if let Some(bb) = content_bb {
                self.swap_current(self.page_node());
                self.open_group(element, "content-bounding-box", &format!("cbbox-{}", element.id));
                self.set_pen(BLUE, CONTENT_BOX_PEN_WIDTH, OVERLAY_DASH_LENGTH);
                self.draw_box(view, origin, &bb);
                self.reset_pen();
                self.end_custom_graphic();
            }
        }

        self.swap_current(saved);
    }

    fn draw_box(&mut self, view: &View, origin: (i32, i32), bb: &BoundingBox) {
        let x1 = view.to_device_x(origin.0 + bb.x1);
        let y1 = view.to_device_y(origin.1 + bb.y1);
        let x2 = view.to_device_x(origin.0 + bb.x2);
        let y2 = view.to_device_y(origin.1 + bb.y2);
        self.draw_rectangle(x1, y1, x2 - x1, y2 - y1);
    }
}
