//! Decomposition of small in-memory decks.

use std::io::{Cursor, Write};

use deck_core::{DeckDecomposer, Error, WarningKind};
use deck_pptx::{PptxParser, DEFAULT_PAGE_SIZE};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;
const SLIDE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const MASTER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";

fn build_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn presentation(slide_ids: &[&str], size: Option<(u64, u64)>) -> String {
    let ids: String = slide_ids
        .iter()
        .enumerate()
        .map(|(i, id)| format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + i, id))
        .collect();
    let size = size
        .map(|(cx, cy)| format!(r#"<p:sldSz cx="{}" cy="{}"/>"#, cx, cy))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {}><p:sldIdLst>{}</p:sldIdLst>{}</p:presentation>"#,
        NS, ids, size
    )
}

fn presentation_rels(slides: &[(&str, &str)]) -> String {
    let mut rels = format!(
        r#"<Relationship Id="rId1" Type="{}" Target="slideMasters/slideMaster1.xml"/>"#,
        MASTER_REL
    );
    for (id, target) in slides {
        rels.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id, SLIDE_REL, target
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        rels
    )
}

fn text_shape(text: &str, x: u64, y: u64) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Text"/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="500" cy="100"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        x, y, text
    )
}

fn picture(embed: &str, cx: u64, cy: u64) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture"/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{}" cy="{}"/></a:xfrm></p:spPr></p:pic>"#,
        embed, cx, cy
    )
}

fn table(cells: &[&str], x: u64, y: u64) -> String {
    let cells: String = cells
        .iter()
        .map(|text| {
            format!(
                r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>{}</a:t></a:r></a:p></a:txBody><a:tcPr/></a:tc>"#,
                text
            )
        })
        .collect();
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="5" name="Table"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm><a:off x="{}" y="{}"/><a:ext cx="800" cy="200"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr/><a:tr h="100">{}</a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        x, y, cells
    )
}

fn slide(shapes: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {}><p:cSld><p:spTree><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></a:xfrm></p:grpSpPr>{}</p:spTree></p:cSld></p:sld>"#,
        NS,
        shapes.concat()
    )
}

fn image_rels(target: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="{}" Target="{}"/></Relationships>"#,
        IMAGE_REL, target
    )
}

#[test]
fn test_text_images_and_area_ratio() {
    let pres = presentation(&["rId2"], Some((1000, 800)));
    let rels = presentation_rels(&[("rId2", "slides/slide1.xml")]);
    let slide1 = slide(&[
        text_shape("Details   below", 0, 400),
        text_shape("Quarterly results", 0, 10),
        picture("rId2", 600, 1000),
    ]);
    let slide1_rels = image_rels("../media/image1.png");
    let png = [0x89, b'P', b'N', b'G'];

    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", slide1.as_bytes()),
        ("ppt/slides/_rels/slide1.xml.rels", slide1_rels.as_bytes()),
        ("ppt/media/image1.png", &png),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    assert!(deck.warnings.is_empty(), "{:?}", deck.warnings);
    assert_eq!(deck.slides.len(), 1);
    let slide = &deck.slides[0];
    assert_eq!(slide.index, 1);
    assert_eq!(slide.text, "Quarterly results\nDetails below");
    assert_eq!(slide.images.len(), 1);
    assert_eq!(slide.images[0].name, "ppt/media/image1.png");
    assert_eq!(slide.images[0].data, png.to_vec());
    assert_eq!(slide.images[0].mime_type(), "image/png");
    assert!((slide.area_ratio - 0.75).abs() < 1e-9);
    assert!((slide.images[0].area_ratio - 0.75).abs() < 1e-9);
}

#[test]
fn test_slide_id_list_sets_order() {
    let pres = presentation(&["rId3", "rId2"], None);
    let rels = presentation_rels(&[("rId2", "slides/slide1.xml"), ("rId3", "slides/slide2.xml")]);
    let first = slide(&[text_shape("Part one", 0, 0)]);
    let second = slide(&[text_shape("Part two", 0, 0)]);

    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", first.as_bytes()),
        ("ppt/slides/slide2.xml", second.as_bytes()),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    let texts: Vec<_> = deck.slides.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Part two", "Part one"]);
    assert_eq!(deck.slides[0].index, 1);
    assert_eq!(deck.slides[1].index, 2);
}

#[test]
fn test_missing_size_uses_default_page() {
    let pres = presentation(&["rId2"], None);
    let rels = presentation_rels(&[("rId2", "slides/slide1.xml")]);
    let slide1 = slide(&[picture("rId2", 9_144_000, 3_429_000)]);
    let slide1_rels = image_rels("../media/image1.jpeg");

    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", slide1.as_bytes()),
        ("ppt/slides/_rels/slide1.xml.rels", slide1_rels.as_bytes()),
        ("ppt/media/image1.jpeg", &[0xFF, 0xD8]),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    assert_eq!(DEFAULT_PAGE_SIZE.width, 9_144_000.0);
    assert!((deck.slides[0].area_ratio - 0.5).abs() < 1e-9);
    assert!(deck.slides[0].text.is_empty());
}

#[test]
fn test_unreadable_slide_becomes_empty_record() {
    let pres = presentation(&["rId2", "rId3", "rId4"], Some((1000, 800)));
    let rels = presentation_rels(&[
        ("rId2", "slides/slide1.xml"),
        ("rId3", "slides/slide2.xml"),
        ("rId4", "slides/slide3.xml"),
    ]);
    let good = slide(&[text_shape("Still here", 0, 0)]);
    let broken = "<p:sld><p:cSld></p:sld>";

    // slide3.xml is listed but absent from the package
    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", good.as_bytes()),
        ("ppt/slides/slide2.xml", broken.as_bytes()),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    assert_eq!(deck.slides.len(), 3);
    assert_eq!(deck.slides[0].text, "Still here");
    assert!(deck.slides[1].text.is_empty() && deck.slides[1].images.is_empty());
    assert!(deck.slides[2].text.is_empty());

    let flagged: Vec<_> = deck.warnings.iter().map(|w| (w.kind, w.slide)).collect();
    assert_eq!(
        flagged,
        vec![
            (WarningKind::Extraction, Some(2)),
            (WarningKind::Extraction, Some(3)),
        ]
    );
}

#[test]
fn test_missing_media_is_skipped_with_warning() {
    let pres = presentation(&["rId2"], Some((1000, 800)));
    let rels = presentation_rels(&[("rId2", "slides/slide1.xml")]);
    let slide1 = slide(&[text_shape("Chart", 0, 0), picture("rId2", 100, 100)]);
    let slide1_rels = image_rels("../media/gone.png");

    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", slide1.as_bytes()),
        ("ppt/slides/_rels/slide1.xml.rels", slide1_rels.as_bytes()),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    assert_eq!(deck.slides[0].text, "Chart");
    assert!(deck.slides[0].images.is_empty());
    assert_eq!(deck.slides[0].area_ratio, 0.0);
    assert_eq!(deck.warnings.len(), 1);
    assert_eq!(deck.warnings[0].slide, Some(1));
}

#[test]
fn test_not_a_package_fails_to_open() {
    let result = PptxParser::new().decompose(b"definitely not a zip file");

    match result {
        Err(err @ Error::DocumentOpen(_)) => assert!(err.is_fatal()),
        other => panic!("expected DocumentOpen, got {:?}", other.map(|d| d.slides.len())),
    }
}

#[test]
fn test_legacy_ppt_is_rejected() {
    let mut header = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    header.extend_from_slice(&[0; 64]);

    match PptxParser::new().decompose(&header) {
        Err(Error::DocumentOpen(message)) => assert!(message.contains(".ppt")),
        other => panic!("expected DocumentOpen, got {:?}", other.map(|d| d.slides.len())),
    }
}

#[test]
fn test_package_without_presentation_fails_to_open() {
    let bytes = build_package(&[("docProps/app.xml", b"<Properties/>")]);

    assert!(matches!(
        PptxParser::new().decompose(&bytes),
        Err(Error::DocumentOpen(_))
    ));
}

#[test]
fn test_table_text_is_extracted() {
    let pres = presentation(&["rId2"], Some((1000, 800)));
    let rels = presentation_rels(&[("rId2", "slides/slide1.xml")]);
    let slide1 = slide(&[
        table(&["Revenue 2024", "Up 12%"], 0, 300),
        text_shape("Annual figures", 0, 10),
    ]);

    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", slide1.as_bytes()),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    assert!(deck.warnings.is_empty(), "{:?}", deck.warnings);
    assert_eq!(deck.slides[0].text, "Annual figures\nRevenue 2024\nUp 12%");
}

#[test]
fn test_missing_slide_relationships_keep_text() {
    let pres = presentation(&["rId2"], Some((1000, 800)));
    let rels = presentation_rels(&[("rId2", "slides/slide1.xml")]);
    let slide1 = slide(&[text_shape("Roadmap", 0, 0), picture("rId2", 500, 500)]);

    // no ppt/slides/_rels/slide1.xml.rels in the package
    let bytes = build_package(&[
        ("ppt/presentation.xml", pres.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", rels.as_bytes()),
        ("ppt/slides/slide1.xml", slide1.as_bytes()),
    ]);

    let deck = PptxParser::new().decompose(&bytes).unwrap();

    assert_eq!(deck.slides.len(), 1);
    assert_eq!(deck.slides[0].text, "Roadmap");
    assert!(deck.slides[0].images.is_empty());
    assert_eq!(deck.warnings.len(), 1);
    assert_eq!(deck.warnings[0].kind, WarningKind::Extraction);
    assert_eq!(deck.warnings[0].slide, Some(1));
}
