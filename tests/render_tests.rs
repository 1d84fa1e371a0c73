//! Rendering tests — build small documents in code and check the SVG.

use std::io::{Cursor, Write};

use pretty_assertions::assert_eq;
use scoresvg::renderer::{ElementContext, SvgBuilder};
use scoresvg::*;

const METRICS: &str = r#"<bounding-boxes font-family="Bravura" units-per-em="1000">
  <g c="E0A4" x="0.0" y="-126.0" w="296.0" h="252.0" h-a-x="295"/>
  <g c="E4E5" x="0.0" y="-375.0" w="270.0" h="750.0"/>
</bounding-boxes>"#;

const NOTEHEAD: &str = r#"<symbol xmlns="http://www.w3.org/2000/svg" id="E0A4" viewBox="0 0 1000 1000" overflow="inherit"><path transform="scale(1,-1)" d="M0 -39c0 68 73 172 200 172"/></symbol>"#;
const QUARTER_REST: &str = r#"<symbol xmlns="http://www.w3.org/2000/svg" id="E4E5" viewBox="0 0 1000 1000" overflow="inherit"><path transform="scale(1,-1)" d="M78 -38l-51 -63"/></symbol>"#;

fn fonts() -> FontResources {
    let mut fonts = FontResources::from_bounding_boxes_xml("Bravura", METRICS).unwrap();
    fonts.insert_markup("Bravura/E0A4.xml", NOTEHEAD);
    fonts.insert_markup("Bravura/E4E5.xml", QUARTER_REST);
    fonts
}

fn glyph(code: char, x: i32) -> DrawCommand {
    DrawCommand::Music {
        text: code.to_string(),
        x,
        y: 1000,
        point_size: 180,
    }
}

fn quarter_note(id: &str, pname: pitch::PitchName, x: i32) -> Element {
    Element::new(
        id,
        ElementKind::Note(NoteData {
            pname: Some(pname),
            oct: 4,
            dur: Some(Duration::new(4, 0)),
            ..Default::default()
        }),
    )
    .with_drawing(glyph('\u{E0A4}', x))
}

fn quarter_rest(id: &str, x: i32) -> Element {
    Element::new(
        id,
        ElementKind::Rest(RestData {
            dur: Some(Duration::new(4, 0)),
            ..Default::default()
        }),
    )
    .with_drawing(glyph('\u{E4E5}', x))
}

fn one_measure(layer_content: Vec<Element>) -> Document {
    let layer =
        Element::new("l1", ElementKind::Layer(LayerData { n: 1 })).with_children(layer_content);
    let staff_data = StaffData {
        n: 1,
        ..Default::default()
    };
    let staff_line = DrawCommand::Line {
        x1: 0,
        y1: 1000,
        x2: 2000,
        y2: 1000,
    };
    let staff = Element::new("s1", ElementKind::Staff(staff_data))
        .with_drawing(staff_line)
        .with_child(layer);
    let measure = Element::new(
        "m1",
        ElementKind::Measure(MeasureData {
            n: Some(1),
            meter: Some((2, 4)),
            ..Default::default()
        }),
    )
    .with_child(staff);
    let system = Element::new("sys1", ElementKind::System).with_child(measure);
    Document::new(2100, 2970, Element::new("page1", ElementKind::Page).with_child(system))
}

fn groups_with_class<'a>(
    doc: &'a roxmltree::Document<'a>,
    prefix: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    doc.descendants()
        .filter(|n| n.has_tag_name("g"))
        .filter(|n| n.attribute("class").is_some_and(|c| c.starts_with(prefix)))
        .collect()
}

fn num(node: &roxmltree::Node, name: &str) -> f64 {
    node.attribute(name)
        .unwrap_or_else(|| panic!("missing {name}"))
        .parse()
        .unwrap()
}

#[test]
fn one_note_one_rest_round_trip() {
    let mut doc = one_measure(vec![
        quarter_note("n1", pitch::PitchName::D, 200),
        quarter_rest("r1", 800),
    ]);
    let (svg, timemap) = render_with_timemap(&mut doc, &fonts(), &RenderOptions::default());
    let parsed = roxmltree::Document::parse(&svg).expect("output should be well-formed XML");

    let measures = groups_with_class(&parsed, "measure");
    let notes = groups_with_class(&parsed, "note");
    let rests = groups_with_class(&parsed, "rest");
    assert_eq!(measures.len(), 1);
    assert_eq!(notes.len(), 1);
    assert_eq!(rests.len(), 1);

    assert_eq!(measures[0].attribute("measureNr"), Some("0"));
    assert_eq!(measures[0].attribute("qstamp_start"), Some("0"));

    for g in notes.iter().chain(rests.iter()) {
        assert!(num(g, "qstamp_on") >= 0.0);
        assert!(num(g, "qstamp_on") <= num(g, "qstamp_off"));
        assert!(num(g, "time_on") >= 0.0);
        assert!(num(g, "time_on") <= num(g, "time_off"));
    }
    assert_eq!(notes[0].attribute("pitch"), Some("62"));
    assert_eq!(rests[0].attribute("qstamp_on"), Some("1"));
    assert_eq!(rests[0].attribute("time_on"), Some("500"));

    assert_eq!(timemap.len(), 2);
    println!("✓ one-measure document: {} bytes of SVG", svg.len());
}

#[test]
fn document_structure() {
    let mut doc = one_measure(vec![quarter_note("n1", pitch::PitchName::C, 200)]);
    let (svg, _) = render_with_timemap(&mut doc, &fonts(), &RenderOptions::default());
    let parsed = roxmltree::Document::parse(&svg).unwrap();
    let root = parsed.root_element();

    assert_eq!(root.tag_name().name(), "svg");
    assert_eq!(root.attribute("width"), Some("2100.00px"));
    assert_eq!(root.attribute("height"), Some("2970.00px"));

    let children: Vec<&str> = root
        .children()
        .filter(|n| n.is_element())
        .map(|n| n.tag_name().name())
        .collect();
    assert_eq!(children, vec!["desc", "defs", "svg"]);

    let desc = root.first_element_child().unwrap();
    assert!(desc.text().unwrap().starts_with("Engraved by scoresvg "));

    let page = root.last_element_child().unwrap();
    assert_eq!(page.attribute("class"), Some("definition-scale"));
    assert_eq!(page.attribute("viewBox"), Some("0 0 21000 29700"));

    // staff line before the layer group
    let staff = groups_with_class(&parsed, "staff")[0];
    let first = staff.first_element_child().unwrap();
    assert_eq!(first.tag_name().name(), "path");
    assert_eq!(staff.attribute("staffNr"), Some("1"));
}

#[test]
fn glyph_used_by_many_notes_is_defined_once() {
    let mut doc = one_measure(vec![
        quarter_note("n1", pitch::PitchName::C, 200),
        quarter_note("n2", pitch::PitchName::E, 500),
        quarter_note("n3", pitch::PitchName::G, 800),
        quarter_rest("r1", 1100),
    ]);
    let (svg, _) = render_with_timemap(&mut doc, &fonts(), &RenderOptions::default());

    assert_eq!(svg.matches("<symbol id=\"E0A4\"").count(), 1);
    assert_eq!(svg.matches("<symbol id=\"E4E5\"").count(), 1);
    assert_eq!(svg.matches("xlink:href=\"#E0A4\"").count(), 3);
}

#[test]
fn unknown_repeat_index_omits_absolute_stamps() {
    let mut doc = one_measure(vec![quarter_note("n1", pitch::PitchName::C, 200)]);
    prepare_timing(&mut doc);
    let options = RenderOptions {
        repeat_index: 5,
        ..Default::default()
    };
    let svg = render_document(&doc, &fonts(), &options);
    let parsed = roxmltree::Document::parse(&svg).unwrap();
    let note = groups_with_class(&parsed, "note")[0];
    assert_eq!(note.attribute("qstamp_on"), None);
    assert_eq!(note.attribute("qstamp_dur"), Some("1"));
    assert_eq!(note.attribute("time_len"), Some("500"));
}

#[test]
fn mm_output_and_declaration() {
    let doc = one_measure(Vec::new());
    let options = RenderOptions {
        mm_output: true,
        xml_declaration: true,
        user_scale_x: 2.0,
        user_scale_y: 2.0,
        ..Default::default()
    };
    let svg = render_document(&doc, &FontResources::new(), &options);
    assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>"));
    assert!(svg.contains("<svg width=\"420.00mm\" height=\"594.00mm\""));
    assert!(!svg.contains("<defs"));
}

#[test]
fn render_json_document() {
    let json = r#"{
        "width": 1000,
        "height": 500,
        "root": {
            "id": "page1",
            "kind": {"type": "page"},
            "children": [{
                "id": "m1",
                "kind": {"type": "measure", "offsets": [{"score_time": 4.0, "real_time_ms": 2000}]},
                "attrs": {"color": "red", "label": "bar 2"},
                "children": [{
                    "id": "r1",
                    "kind": {"type": "rest", "timing": {"score_time_onset": 0.0, "score_time_offset": 2.0,
                             "real_time_onset_ms": 0, "real_time_offset_ms": 1000}}
                }]
            }]
        }
    }"#;
    let svg = render_json_to_svg(json, &FontResources::new(), &RenderOptions::default()).unwrap();
    let parsed = roxmltree::Document::parse(&svg).unwrap();
    let measure = groups_with_class(&parsed, "measure")[0];
    assert_eq!(measure.attribute("fill"), Some("red"));
    assert_eq!(measure.attribute("qstamp_start"), Some("4"));
    let title = measure.first_element_child().unwrap();
    assert_eq!(title.tag_name().name(), "title");
    assert_eq!(title.text(), Some("bar 2"));

    let rest = groups_with_class(&parsed, "rest")[0];
    assert_eq!(rest.attribute("qstamp_on"), Some("4"));
    assert_eq!(rest.attribute("qstamp_off"), Some("6"));

    assert!(render_json_to_svg("{", &FontResources::new(), &RenderOptions::default()).is_err());
}

#[test]
fn resumed_group_receives_later_children() {
    let fonts = FontResources::new();
    let ctx = ElementContext::default();
    let measure = Element::new("m1", ElementKind::Measure(MeasureData::default()));
    let mut svg = SvgBuilder::new(100, 100, &fonts);

    svg.start_page();
    let depth = svg.depth();
    svg.start_graphic(&measure, "", "m1", &ctx);
    svg.end_graphic(&measure, None);
    svg.start_custom_graphic("grpSym", "", "g1");
    svg.end_custom_graphic();

    svg.resume_graphic(&measure, "m1");
    svg.draw_line(0, 0, 10, 10);
    svg.end_resumed_graphic(&measure, None);
    assert_eq!(svg.depth(), depth);
    svg.end_page();

    let out = svg.into_string(false);
    let parsed = roxmltree::Document::parse(&out).unwrap();
    let m1 = groups_with_class(&parsed, "measure")[0];
    assert_eq!(m1.first_element_child().map(|n| n.tag_name().name()), Some("path"));
}

#[test]
fn commit_twice_is_stable() {
    let fonts = fonts();
    let mut svg = SvgBuilder::new(100, 100, &fonts);
    svg.set_font(FontInfo {
        point_size: 100,
        ..Default::default()
    });
    svg.draw_music_text("\u{E0A4}", 0, 0);
    svg.commit(false);
    let once = svg.serialized_text(false).to_string();
    svg.commit(false);
    assert_eq!(svg.serialized_text(false), once);
    assert_eq!(once.matches("<defs>").count(), 1);
}

// ── Font bundles ────────────────────────────────────────────────────

fn font_zip(with_text_font: bool) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("Bravura.xml", options).unwrap();
    zip.write_all(METRICS.as_bytes()).unwrap();
    zip.start_file("Bravura/E0A4.xml", options).unwrap();
    zip.write_all(NOTEHEAD.as_bytes()).unwrap();
    zip.start_file("Bravura/E4E5.xml", options).unwrap();
    zip.write_all(QUARTER_REST.as_bytes()).unwrap();
    if with_text_font {
        zip.start_file("woff.xml", options).unwrap();
        zip.write_all(
            br#"<style type="text/css">@font-face { font-family: 'VerovioText'; src: url(data:application/font-woff2;base64,AAAA) format('woff2'); }</style>"#,
        )
        .unwrap();
    }
    zip.finish().unwrap().into_inner()
}

#[test]
fn font_bundle_from_zip() {
    let fonts = FontResources::from_zip(&font_zip(false)).unwrap();
    assert_eq!(fonts.glyph_count(), 2);
    assert!(fonts.glyph_markup("Bravura/E4E5.xml").is_some());
    assert!(fonts.text_font_markup().is_none());

    let mut doc = one_measure(vec![quarter_rest("r1", 100)]);
    let (svg, _) = render_with_timemap(&mut doc, &fonts, &RenderOptions::default());
    assert!(svg.contains("<symbol id=\"E4E5\""));
}

#[test]
fn text_font_is_embedded_only_when_used() {
    let fonts = FontResources::from_zip(&font_zip(true)).unwrap();

    let plain = render_document(&one_measure(Vec::new()), &fonts, &RenderOptions::default());
    assert!(!plain.contains("@font-face"));

    let text = Element::new(
        "t1",
        ElementKind::Text(TextData {
            x: 100,
            y: 100,
            ..Default::default()
        }),
    )
    .with_child(Element::new(
        "r1",
        ElementKind::Rend(RendData {
            text: "\u{E262}".into(),
            font: Some(FontInfo {
                face_name: "VerovioText".into(),
                point_size: 40,
                ..Default::default()
            }),
            ..Default::default()
        }),
    ));
    let doc = Document::new(1000, 1000, Element::new("p1", ElementKind::Page).with_child(text));
    let svg = render_document(&doc, &fonts, &RenderOptions::default());
    assert_eq!(svg.matches("@font-face").count(), 1);
    let parsed = roxmltree::Document::parse(&svg).unwrap();
    let first = parsed.root_element().children().find(|n| n.is_element()).unwrap();
    // the description is prepended last, so it comes first
    assert_eq!(first.tag_name().name(), "desc");
}

#[test]
fn broken_font_bundle_is_an_error() {
    assert!(matches!(
        FontResources::from_zip(b"not a zip"),
        Err(Error::Archive(_))
    ));

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("Bravura/E0A4.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(NOTEHEAD.as_bytes()).unwrap();
    let data = zip.finish().unwrap().into_inner();
    assert!(matches!(
        FontResources::from_zip(&data),
        Err(Error::MissingResource(_))
    ));
}
