//! Glyph metrics and glyph markup for the music font.
//!
//! A font is described by a bounding-box file listing every glyph with
//! its metrics and SMuFL anchors, plus one small SVG markup file per
//! glyph. Both can come from loose strings or from a ZIP bundle:
//!   - `<Font>.xml`          — `<bounding-boxes>` metrics
//!   - `<Font>/<CODE>.xml`   — `<symbol id="CODE">` markup per glyph
//!   - `woff.xml` (optional) — embedded text font for text runs

use std::collections::HashMap;
use std::io::{Cursor, Read};

use roxmltree::Document;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::model::Point;

/// Default design grid of SMuFL fonts.
pub const DEFAULT_UNITS_PER_EM: i32 = 1000;

/// SMuFL anchors used by the bounding-box overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphAnchor {
    CutOutNE,
    CutOutNW,
    CutOutSE,
    CutOutSW,
}

impl GlyphAnchor {
    pub const CORNERS: [GlyphAnchor; 4] = [
        GlyphAnchor::CutOutNE,
        GlyphAnchor::CutOutNW,
        GlyphAnchor::CutOutSE,
        GlyphAnchor::CutOutSW,
    ];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "cutOutNE" => Some(GlyphAnchor::CutOutNE),
            "cutOutNW" => Some(GlyphAnchor::CutOutNW),
            "cutOutSE" => Some(GlyphAnchor::CutOutSE),
            "cutOutSW" => Some(GlyphAnchor::CutOutSW),
            _ => None,
        }
    }
}

/// Metrics of one glyph, in font design units.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    /// Hex code as used for the `<symbol id>` (e.g. "E0A4")
    pub code_str: String,
    /// Resource key of the glyph markup
    pub path: String,
    pub horiz_adv_x: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub units_per_em: i32,
    pub anchors: HashMap<GlyphAnchor, Point>,
}

impl Glyph {
    pub fn new(code: u32, path: impl Into<String>) -> Self {
        Self {
            code,
            code_str: format!("{code:04X}"),
            path: path.into(),
            horiz_adv_x: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            units_per_em: DEFAULT_UNITS_PER_EM,
            anchors: HashMap::new(),
        }
    }

    /// Horizontal pen advance at `point_size`: the advance width when the
    /// font defines one, the bounding-box width otherwise.
    pub fn advance(&self, point_size: i32) -> i32 {
        let upem = self.units_per_em.max(1);
        if self.horiz_adv_x > 0 {
            self.horiz_adv_x * point_size / upem
        } else {
            self.width * point_size / upem
        }
    }

    pub fn anchor(&self, anchor: GlyphAnchor) -> Option<Point> {
        self.anchors.get(&anchor).copied()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// FontResources
// ═══════════════════════════════════════════════════════════════════════

/// Glyph lookup keyed by code point, plus the markup each glyph embeds.
#[derive(Debug, Clone, Default)]
pub struct FontResources {
    glyphs: HashMap<u32, Glyph>,
    markup: HashMap<String, String>,
    text_font: Option<String>,
}

impl FontResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_glyph(&mut self, glyph: Glyph) {
        self.glyphs.insert(glyph.code, glyph);
    }

    pub fn insert_markup(&mut self, path: impl Into<String>, markup: impl Into<String>) {
        self.markup.insert(path.into(), markup.into());
    }

    pub fn set_text_font(&mut self, markup: impl Into<String>) {
        self.text_font = Some(markup.into());
    }

    pub fn glyph(&self, code: u32) -> Option<&Glyph> {
        self.glyphs.get(&code)
    }

    pub fn glyph_markup(&self, path: &str) -> Option<&str> {
        self.markup.get(path).map(String::as_str)
    }

    pub fn text_font_markup(&self) -> Option<&str> {
        self.text_font.as_deref()
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Parse a `<bounding-boxes>` metrics file. Glyph markup paths are
    /// `<font_name>/<CODE>.xml`.
    pub fn from_bounding_boxes_xml(font_name: &str, xml: &str) -> Result<Self> {
        let mut fonts = FontResources::new();
        fonts.load_bounding_boxes(font_name, xml)?;
        Ok(fonts)
    }

    fn load_bounding_boxes(&mut self, font_name: &str, xml: &str) -> Result<()> {
        let source_name = format!("{font_name}.xml");
        let doc = Document::parse(xml).map_err(|e| Error::xml(&source_name, e))?;
        let root = doc.root_element();
        if root.tag_name().name() != "bounding-boxes" {
            return Err(Error::InvalidResource {
                name: source_name,
                message: format!("unexpected root element '{}'", root.tag_name().name()),
            });
        }
        let units_per_em = root
            .attribute("units-per-em")
            .and_then(parse_design_units)
            .unwrap_or(DEFAULT_UNITS_PER_EM);

        for g in root.children().filter(|n| n.has_tag_name("g")) {
            let code_str = match g.attribute("c") {
                Some(c) => c,
                None => continue,
            };
            let code = match u32::from_str_radix(code_str, 16) {
                Ok(c) => c,
                Err(_) => {
                    log::debug!("skipping glyph with invalid code '{code_str}'");
                    continue;
                }
            };

            let mut glyph = Glyph::new(code, format!("{font_name}/{code_str}.xml"));
            glyph.code_str = code_str.to_string();
            glyph.units_per_em = units_per_em;
            glyph.x = attr_units(&g, "x");
            glyph.y = attr_units(&g, "y");
            glyph.width = attr_units(&g, "w");
            glyph.height = attr_units(&g, "h");
            glyph.horiz_adv_x = attr_units(&g, "h-a-x");

            for a in g.children().filter(|n| n.has_tag_name("a")) {
                if let Some(anchor) = a.attribute("n").and_then(GlyphAnchor::from_name) {
                    glyph
                        .anchors
                        .insert(anchor, Point::new(attr_units(&a, "x"), attr_units(&a, "y")));
                }
            }
            self.insert_glyph(glyph);
        }
        Ok(())
    }

    /// Load a font bundle from ZIP bytes.
    pub fn from_zip(data: &[u8]) -> Result<Self> {
        let cursor = Cursor::new(data);
        let mut archive = ZipArchive::new(cursor)?;

        let names: Vec<String> = (0..archive.len())
            .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
            .collect();

        // The metrics file is the only top-level .xml besides woff.xml.
        let metrics_name = names
            .iter()
            .find(|n| !n.contains('/') && n.ends_with(".xml") && n.as_str() != "woff.xml")
            .cloned()
            .ok_or_else(|| Error::MissingResource("<font>.xml".to_string()))?;
        let font_name = metrics_name.trim_end_matches(".xml").to_string();

        let mut fonts = FontResources::new();
        let metrics = read_entry(&mut archive, &metrics_name)?;
        fonts.load_bounding_boxes(&font_name, &metrics)?;

        let prefix = format!("{font_name}/");
        for name in &names {
            if name.starts_with(&prefix) && name.ends_with(".xml") {
                let markup = read_entry(&mut archive, name)?;
                fonts.insert_markup(name.clone(), markup);
            }
        }

        if names.iter().any(|n| n == "woff.xml") {
            fonts.set_text_font(read_entry(&mut archive, "woff.xml")?);
        }

        log::debug!(
            "loaded font '{font_name}': {} glyphs, {} markup files",
            fonts.glyphs.len(),
            fonts.markup.len()
        );
        Ok(fonts)
    }
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String> {
    let mut file = archive.by_name(name)?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(text)
}

fn parse_design_units(s: &str) -> Option<i32> {
    s.trim().parse::<f64>().ok().map(|v| v.round() as i32)
}

fn attr_units(node: &roxmltree::Node, name: &str) -> i32 {
    node.attribute(name).and_then(parse_design_units).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const METRICS: &str = r#"<bounding-boxes font-family="Bravura" units-per-em="1000">
  <g c="E0A4" x="0.0" y="-126.0" w="296.0" h="252.0" h-a-x="295" n="noteheadBlack">
    <a n="cutOutNE" x="280.0" y="64.0"/>
    <a n="cutOutSW" x="12.0" y="-60.0"/>
    <a n="stemUpSE" x="295.0" y="42.0"/>
  </g>
  <g c="E4E5" x="0.0" y="-375.0" w="270.0" h="750.0" n="restQuarter"/>
  <g c="ZZZZ" x="0" y="0" w="1" h="1"/>
</bounding-boxes>"#;

    #[test]
    fn parses_metrics_and_anchors() {
        let fonts = FontResources::from_bounding_boxes_xml("Bravura", METRICS).unwrap();
        assert_eq!(fonts.glyph_count(), 2);

        let head = fonts.glyph(0xE0A4).unwrap();
        assert_eq!(head.code_str, "E0A4");
        assert_eq!(head.path, "Bravura/E0A4.xml");
        assert_eq!(head.horiz_adv_x, 295);
        assert_eq!(head.y, -126);
        assert_eq!(head.anchor(GlyphAnchor::CutOutNE), Some(Point::new(280, 64)));
        assert_eq!(head.anchor(GlyphAnchor::CutOutNW), None);
    }

    #[test]
    fn advance_falls_back_to_bbox_width() {
        let fonts = FontResources::from_bounding_boxes_xml("Bravura", METRICS).unwrap();
        assert_eq!(fonts.glyph(0xE0A4).unwrap().advance(100), 29);
        assert_eq!(fonts.glyph(0xE4E5).unwrap().advance(100), 27);
    }

    #[test]
    fn rejects_wrong_root() {
        let err = FontResources::from_bounding_boxes_xml("X", "<svg/>").unwrap_err();
        assert!(matches!(err, Error::InvalidResource { .. }));
    }
}
