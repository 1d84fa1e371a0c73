//! Shared constants for the scene builder.

// ── Document ────────────────────────────────────────────────────────
pub(crate) const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub(crate) const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub(crate) const PRODUCT_NAME: &str = "scoresvg";
pub(crate) const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logical units per drawing unit of the definition-scale viewBox.
pub(crate) const DEFINITION_FACTOR: i32 = 10;

/// Face name of the bundled text font; using it embeds the font at commit.
pub(crate) const TEXT_FONT_FACE: &str = "VerovioText";

pub(crate) const GLOBAL_STYLE: &str = "g.page-margin{font-family:Times;} \
    g.tempo{font-weight:bold;} g.dir, g.dynam, \
    g.mNum{font-style:italic;} g.label{font-weight:normal;}";

// ── Colours (packed 0xRRGGBB) ───────────────────────────────────────
pub const BLACK: u32 = 0x000000;
pub const WHITE: u32 = 0xFFFFFF;
pub const RED: u32 = 0xFF0000;
pub const GREEN: u32 = 0x00FF00;
pub const BLUE: u32 = 0x0000FF;
pub const CYAN: u32 = 0x00FFFF;
pub const LIGHT_GREY: u32 = 0x777777;

// ── Bounding-box overlay ────────────────────────────────────────────
pub(crate) const SELF_BOX_PEN_WIDTH: i32 = 10;
pub(crate) const CONTENT_BOX_PEN_WIDTH: i32 = 20;
pub(crate) const ANCHOR_PEN_WIDTH: i32 = 10;
pub(crate) const ANCHOR_RADIUS: i32 = 5;
pub(crate) const OVERLAY_DASH_LENGTH: i32 = 10;
