//! scoresvg — engrave a laid-out score tree as SVG, with the timemap
//! interleaved as attributes on the measure, staff, note and rest groups.
//!
//! The input tree comes from an upstream layout stage (as JSON or built in
//! code); glyphs come from a SMuFL font bundle.
//!
//! # Example
//! ```no_run
//! use scoresvg::{render_with_timemap, Document, FontResources, RenderOptions};
//!
//! let fonts = FontResources::from_zip(&std::fs::read("Bravura.zip").unwrap()).unwrap();
//! let mut doc = Document::from_json(&std::fs::read_to_string("page1.json").unwrap()).unwrap();
//! let (svg, timemap) = render_with_timemap(&mut doc, &fonts, &RenderOptions::default());
//! println!("{} bytes of SVG, {} timed events", svg.len(), timemap.len());
//! ```

pub mod error;
pub mod font;
pub mod model;
pub mod pitch;
pub mod renderer;
pub mod timemap;
pub mod timing;
pub mod unroller;

pub use error::{Error, Result};
pub use font::{FontResources, Glyph, GlyphAnchor};
pub use model::*;
pub use pitch::{derive_pitch, PitchDescriptor, PitchInput};
pub use renderer::{render_document, RenderOptions, SvgBuilder};
pub use timemap::{generate_timemap, prepare_timing, timemap_to_json, TimemapEntry};
pub use timing::{MeasureOffsets, Timing, TIED_SENTINEL};

/// Load a document from JSON and render it as is.
pub fn render_json_to_svg(
    json: &str,
    fonts: &FontResources,
    options: &RenderOptions,
) -> Result<String> {
    let doc = Document::from_json(json)?;
    Ok(render_document(&doc, fonts, options))
}

/// Compute onsets, ties and measure offsets, then render the document
/// and export its timemap.
pub fn render_with_timemap(
    doc: &mut Document,
    fonts: &FontResources,
    options: &RenderOptions,
) -> (String, Vec<TimemapEntry>) {
    prepare_timing(doc);
    let svg = render_document(doc, fonts, options);
    (svg, generate_timemap(doc))
}
