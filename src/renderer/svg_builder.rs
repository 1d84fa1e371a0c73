//! SVG builder — the nested-group state machine behind the renderer.
//!
//! The builder owns a [`Scene`] and a stack of open nodes. Every
//! `start_*` pushes a node and makes it current; every `end_*` pops it.
//! Balancing the calls is the traversal's job: the builder only
//! `debug_assert!`s it. `commit` finalizes the document exactly once.

use super::bbox::View;
use super::constants::*;
use super::scene::{NodeId, Scene};
use super::{notes, staff, ElementContext};
use crate::font::FontResources;
use crate::model::{Element, ElementKind, FontInfo, HorizontalAlignment, Point};

// ═══════════════════════════════════════════════════════════════════════
// Pen, brush, glyph registry
// ═══════════════════════════════════════════════════════════════════════

/// Stroke settings for shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub colour: u32,
    pub width: i32,
    pub dash_length: i32,
    pub opacity: f64,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            colour: BLACK,
            width: 1,
            dash_length: 0,
            opacity: 1.0,
        }
    }
}

/// Fill settings for shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub colour: u32,
    pub opacity: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            colour: BLACK,
            opacity: 1.0,
        }
    }
}

/// `RRGGBB` hex for a packed colour.
pub fn colour_hex(colour: u32) -> String {
    format!("{:06X}", colour & 0xFF_FFFF)
}

/// Distinct glyph resource paths referenced by one document, in first-use order.
#[derive(Debug, Clone, Default)]
pub struct GlyphRegistry {
    paths: Vec<String>,
}

impl GlyphRegistry {
    /// Record a path; returns false if it was already registered.
    pub fn register(&mut self, path: &str) -> bool {
        if self.paths.iter().any(|p| p == path) {
            return false;
        }
        self.paths.push(path.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SvgBuilder
// ═══════════════════════════════════════════════════════════════════════

pub struct SvgBuilder<'f> {
    pub(super) scene: Scene,
    svg_node: NodeId,
    page_node: Option<NodeId>,
    stack: Vec<NodeId>,
    pub(super) current: NodeId,
    pub(super) fonts: &'f FontResources,
    pub(super) glyphs: GlyphRegistry,
    pen_stack: Vec<Pen>,
    brush_stack: Vec<Brush>,
    font_stack: Vec<FontInfo>,
    width: i32,
    height: i32,
    user_scale_x: f64,
    user_scale_y: f64,
    origin_x: i32,
    origin_y: i32,
    mm_output: bool,
    global_styling: bool,
    draw_bounding_boxes: bool,
    pub(super) text_font_used: bool,
    committed: bool,
    output: String,
}

impl<'f> SvgBuilder<'f> {
    /// Create the root `<svg>` node and open it. Width and height are
    /// written at commit, once the user scale is final.
    pub fn new(width: i32, height: i32, fonts: &'f FontResources) -> Self {
        let mut scene = Scene::new();
        let svg = scene.append_child(scene.document(), "svg");
        scene.set_attr(svg, "version", "1.1");
        scene.set_attr(svg, "xmlns", SVG_NS);
        scene.set_attr(svg, "xmlns:xlink", XLINK_NS);
        scene.set_attr(svg, "overflow", "visible");

        Self {
            scene,
            svg_node: svg,
            page_node: None,
            stack: vec![svg],
            current: svg,
            fonts,
            glyphs: GlyphRegistry::default(),
            pen_stack: vec![Pen::default()],
            brush_stack: vec![Brush::default()],
            font_stack: vec![FontInfo::default()],
            width,
            height,
            user_scale_x: 1.0,
            user_scale_y: 1.0,
            origin_x: 0,
            origin_y: 0,
            mm_output: false,
            global_styling: false,
            draw_bounding_boxes: false,
            text_font_used: false,
            committed: false,
            output: String::new(),
        }
    }

    pub fn set_user_scale(&mut self, x: f64, y: f64) {
        self.user_scale_x = x;
        self.user_scale_y = y;
    }

    pub fn set_mm_output(&mut self, mm: bool) {
        self.mm_output = mm;
    }

    pub fn set_global_styling(&mut self, enabled: bool) {
        self.global_styling = enabled;
    }

    pub fn set_draw_bounding_boxes(&mut self, enabled: bool) {
        self.draw_bounding_boxes = enabled;
    }

    pub(super) fn draw_bounding_boxes(&self) -> bool {
        self.draw_bounding_boxes
    }

    pub fn set_logical_origin(&mut self, x: i32, y: i32) {
        self.origin_x = -x;
        self.origin_y = -y;
    }

    pub fn logical_origin(&self) -> Point {
        Point::new(self.origin_x, self.origin_y)
    }

    /// Number of open nodes, the root `<svg>` included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_node(&self) -> NodeId {
        self.current
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn glyph_registry(&self) -> &GlyphRegistry {
        &self.glyphs
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    // ── Pen / brush / font stacks ───────────────────────────────────

    pub fn set_pen(&mut self, colour: u32, width: i32, dash_length: i32) {
        self.pen_stack.push(Pen {
            colour,
            width,
            dash_length,
            opacity: 1.0,
        });
    }

    pub fn reset_pen(&mut self) {
        if self.pen_stack.len() > 1 {
            self.pen_stack.pop();
        }
    }

    pub fn set_brush(&mut self, colour: u32, opacity: f64) {
        self.brush_stack.push(Brush { colour, opacity });
    }

    pub fn reset_brush(&mut self) {
        if self.brush_stack.len() > 1 {
            self.brush_stack.pop();
        }
    }

    pub fn set_font(&mut self, font: FontInfo) {
        self.font_stack.push(font);
    }

    pub fn reset_font(&mut self) {
        if self.font_stack.len() > 1 {
            self.font_stack.pop();
        }
    }

    pub(super) fn pen(&self) -> Pen {
        self.pen_stack.last().copied().unwrap_or_default()
    }

    pub(super) fn brush(&self) -> Brush {
        self.brush_stack.last().copied().unwrap_or_default()
    }

    pub(super) fn font(&self) -> FontInfo {
        self.font_stack.last().cloned().unwrap_or_default()
    }

    // ── Stack plumbing ──────────────────────────────────────────────

    fn push_node(&mut self, node: NodeId) {
        self.stack.push(node);
        self.current = node;
    }

    fn pop_node(&mut self) {
        debug_assert!(self.stack.len() > 1, "unbalanced end: no open group to close");
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        if let Some(&top) = self.stack.last() {
            self.current = top;
        }
    }

    /// Open a group for an element and write its class, id and
    /// presentation attributes, without synchronization data.
    pub(super) fn open_group(&mut self, element: &Element, class: &str, id: &str) {
        let mut base_class = lower_first(element.class_name());
        if !class.is_empty() {
            base_class.push(' ');
            base_class.push_str(class);
        }
        if let Some(t) = &element.attrs.type_ {
            base_class.push(' ');
            base_class.push_str(t);
        }

        let node = self.scene.append_child(self.current, "g");
        self.push_node(node);
        self.scene.set_attr(node, "class", base_class);
        if !id.is_empty() {
            self.scene.set_attr(node, "id", id);
        }

        if let ElementKind::Staff(data) = &element.kind {
            staff::write_lyric_style(self, data);
        }

        let attrs = &element.attrs;
        if let Some(color) = &attrs.color {
            self.scene.set_attr(node, "fill", color);
        }
        if let Some(label) = &attrs.label {
            self.write_label(label);
        }
        if let Some(lang) = &attrs.lang {
            self.scene.set_attr(node, "xml:lang", lang);
        }
        self.write_typography(element);
        if let Some(visible) = attrs.visible {
            let value = if visible { "visible" } else { "hidden" };
            self.scene.set_attr(node, "visibility", value);
        }
    }

    fn write_label(&mut self, label: &str) {
        let title = self.scene.prepend_child(self.current, "title");
        self.scene.set_attr(title, "class", "labelAttr");
        self.scene.append_text(title, label);
    }

    fn write_typography(&mut self, element: &Element) {
        let Some(t) = &element.attrs.typography else {
            return;
        };
        if let Some(name) = &t.fontname {
            self.scene.set_attr(self.current, "font-family", name);
        }
        if let Some(style) = t.fontstyle {
            self.scene.set_attr(self.current, "font-style", style.as_str());
        }
        if let Some(weight) = t.fontweight {
            self.scene.set_attr(self.current, "font-weight", weight.as_str());
        }
    }

    pub(super) fn set_current_attr(&mut self, name: &str, value: impl ToString) {
        self.scene.set_attr(self.current, name, value);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Groups
    // ═══════════════════════════════════════════════════════════════════

    /// Open a `<g>` for a score element. Measures, staves, notes and rests
    /// also receive their synchronization attributes.
    pub fn start_graphic(
        &mut self,
        element: &Element,
        class: &str,
        id: &str,
        ctx: &ElementContext,
    ) {
        self.open_group(element, class, id);
        match &element.kind {
            ElementKind::Measure(_) => staff::write_measure_attributes(self, element, ctx),
            ElementKind::Staff(data) => staff::write_staff_attributes(self, data),
            ElementKind::Note(_) => notes::write_note_attributes(self, element, ctx),
            ElementKind::Rest(_) => notes::write_rest_attributes(self, element, ctx),
            _ => {}
        }
    }

    /// Open a `<g>` not tied to a score element.
    pub fn start_custom_graphic(&mut self, name: &str, class: &str, id: &str) {
        let mut class_attr = name.to_string();
        if !class.is_empty() {
            class_attr.push(' ');
            class_attr.push_str(class);
        }
        let node = self.scene.append_child(self.current, "g");
        self.push_node(node);
        self.scene.set_attr(node, "class", class_attr);
        if !id.is_empty() {
            self.scene.set_attr(node, "id", id);
        }
    }

    /// Open a `<tspan>` run for a text element.
    pub fn start_text_graphic(&mut self, element: &Element, class: &str, id: &str) {
        let mut base_class = lower_first(element.class_name());
        if !class.is_empty() {
            base_class.push(' ');
            base_class.push_str(class);
        }
        let node = self.scene.insert_before_first_group(self.current, "tspan");
        self.push_node(node);
        self.scene.set_attr(node, "class", base_class);
        if !id.is_empty() {
            self.scene.set_attr(node, "id", id);
        }

        let attrs = &element.attrs;
        if let Some(color) = &attrs.color {
            self.scene.set_attr(node, "fill", color);
        }
        if let Some(label) = &attrs.label {
            self.write_label(label);
        }
        if let Some(lang) = &attrs.lang {
            self.scene.set_attr(node, "xml:lang", lang);
        }
        self.write_typography(element);
        if let Some(space) = &attrs.space {
            self.scene.set_attr(node, "xml:space", space);
        }
    }

    /// Reopen a group emitted earlier so more children can be appended.
    /// An unknown id leaves the current node unchanged (it is pushed
    /// again so the matching end stays balanced).
    pub fn resume_graphic(&mut self, _element: &Element, id: &str) {
        match self.scene.find_by_id(id) {
            Some(node) if self.scene.tag(node) == Some("g") => self.current = node,
            _ => log::debug!("resume: no group with id '{id}'"),
        }
        self.stack.push(self.current);
    }

    pub fn end_graphic(&mut self, element: &Element, view: Option<&View>) {
        self.pop_node();
        self.draw_bounding_box(element, view);
    }

    pub fn end_custom_graphic(&mut self) {
        self.pop_node();
    }

    pub fn end_resumed_graphic(&mut self, element: &Element, view: Option<&View>) {
        self.pop_node();
        self.draw_bounding_box(element, view);
    }

    pub fn end_text_graphic(&mut self, element: &Element, view: Option<&View>) {
        self.pop_node();
        self.draw_bounding_box(element, view);
    }

    /// Rotate the current node. The first rotation wins; later calls
    /// on the same node are dropped.
    pub fn rotate_graphic(&mut self, origin: Point, angle: f64) {
        if self.scene.attr(self.current, "transform").is_some() {
            return;
        }
        self.scene.set_attr(
            self.current,
            "transform",
            format!("rotate({:.6} {},{})", angle, origin.x, origin.y),
        );
    }

    // ═══════════════════════════════════════════════════════════════════
    // Pages and text blocks
    // ═══════════════════════════════════════════════════════════════════

    /// Open the definition-scale `<svg>` and the page-margin `<g>`.
    pub fn start_page(&mut self) {
        self.text_font_used = false;

        if self.global_styling {
            let style = self.scene.append_child(self.current, "style");
            self.scene.set_attr(style, "type", "text/css");
            self.scene.append_text(style, GLOBAL_STYLE);
        }

        let scale = self.scene.append_child(self.current, "svg");
        self.push_node(scale);
        self.scene.set_attr(scale, "class", "definition-scale");
        self.scene.set_attr(
            scale,
            "viewBox",
            format!(
                "0 0 {} {}",
                self.width * DEFINITION_FACTOR,
                self.height * DEFINITION_FACTOR
            ),
        );

        let margin = self.scene.append_child(self.current, "g");
        self.push_node(margin);
        self.scene.set_attr(margin, "class", "page-margin");
        self.scene.set_attr(
            margin,
            "transform",
            format!("translate({}, {})", self.origin_x, self.origin_y),
        );
        self.page_node = Some(margin);
    }

    pub fn end_page(&mut self) {
        self.pop_node();
        self.pop_node();
    }

    pub(super) fn page_node(&self) -> NodeId {
        self.page_node.unwrap_or(self.svg_node)
    }

    /// Temporarily retarget writes to `node` without touching the stack.
    pub(super) fn swap_current(&mut self, node: NodeId) -> NodeId {
        std::mem::replace(&mut self.current, node)
    }

    pub fn start_text(&mut self, x: i32, y: i32, alignment: Option<HorizontalAlignment>) {
        let node = self.scene.append_child(self.current, "text");
        self.push_node(node);
        self.scene.set_attr(node, "x", x);
        self.scene.set_attr(node, "y", y);
        match alignment {
            Some(HorizontalAlignment::Right) => self.scene.set_attr(node, "text-anchor", "end"),
            Some(HorizontalAlignment::Center) => self.scene.set_attr(node, "text-anchor", "middle"),
            _ => {}
        }
        // Zero size keeps browsers from adding space between runs.
        self.scene.set_attr(node, "font-size", "0px");

        let font = self.font();
        if !font.face_name.is_empty() {
            self.scene.set_attr(node, "font-family", &font.face_name);
        }
        if let Some(style) = font.style {
            self.scene.set_attr(node, "font-style", style.as_str());
        }
        if font.weight == Some(crate::model::FontWeight::Bold) {
            self.scene.set_attr(node, "font-weight", "bold");
        }
    }

    pub fn move_text_to(&mut self, x: i32, y: i32, alignment: Option<HorizontalAlignment>) {
        self.scene.set_attr(self.current, "x", x);
        self.scene.set_attr(self.current, "y", y);
        if let Some(alignment) = alignment {
            let anchor = match alignment {
                HorizontalAlignment::Left => "start",
                HorizontalAlignment::Center => "middle",
                HorizontalAlignment::Right => "end",
            };
            self.scene.set_attr(self.current, "text-anchor", anchor);
        }
    }

    pub fn end_text(&mut self) {
        self.pop_node();
    }

    pub fn add_description(&mut self, text: &str) {
        let desc = self.scene.append_child(self.current, "desc");
        self.scene.append_text(desc, text);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Commit
    // ═══════════════════════════════════════════════════════════════════

    /// Finalize the document: size, text font, glyph definitions and
    /// description. Calling it again does nothing.
    pub fn commit(&mut self, xml_declaration: bool) {
        if self.committed {
            return;
        }
        let svg = self.svg_node;

        let (w, h) = (
            self.width as f64 * self.user_scale_x,
            self.height as f64 * self.user_scale_y,
        );
        if self.mm_output {
            self.scene.prepend_attr(svg, "height", format!("{:.2}mm", h / 10.0));
            self.scene.prepend_attr(svg, "width", format!("{:.2}mm", w / 10.0));
        } else {
            self.scene.prepend_attr(svg, "height", format!("{:.2}px", h));
            self.scene.prepend_attr(svg, "width", format!("{:.2}px", w));
        }

        if self.text_font_used {
            match self.fonts.text_font_markup() {
                Some(markup) => match roxmltree::Document::parse(markup) {
                    Ok(doc) => self.scene.prepend_copy(svg, doc.root_element()),
                    Err(e) => log::warn!("text font markup is not valid XML: {e}"),
                },
                None => log::debug!("text font requested but not bundled"),
            }
        }

        if !self.glyphs.is_empty() {
            let defs = self.scene.prepend_child(svg, "defs");
            for path in self.glyphs.paths().to_vec() {
                let Some(markup) = self.fonts.glyph_markup(&path) else {
                    log::debug!("no markup for glyph resource '{path}'");
                    continue;
                };
                match roxmltree::Document::parse(markup) {
                    Ok(doc) => {
                        for child in doc.root().children().filter(|n| n.is_element()) {
                            self.scene.append_copy(defs, child);
                        }
                    }
                    Err(e) => log::warn!("glyph resource '{path}' is not valid XML: {e}"),
                }
            }
        }

        if xml_declaration {
            self.scene.prepend_declaration();
        }

        let desc = self.scene.prepend_child(svg, "desc");
        self.scene.append_text(
            desc,
            &format!("Engraved by {PRODUCT_NAME} {PRODUCT_VERSION}"),
        );

        self.output = self.scene.serialize();
        self.committed = true;
    }

    /// Serialized document, committing first if needed.
    pub fn serialized_text(&mut self, xml_declaration: bool) -> &str {
        if !self.committed {
            self.commit(xml_declaration);
        }
        &self.output
    }

    /// Consume the builder and return the serialized document.
    pub fn into_string(mut self, xml_declaration: bool) -> String {
        self.commit(xml_declaration);
        self.output
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
