//! PPTX deck decomposer.

use deck_core::pipeline::DeckDecomposer;
use deck_core::types::sort_by_position;
use deck_core::{
    Deck, DeckFormat, Error, ImageAsset, PageSize, PipelineWarning, Rect, Result, SlideRecord, SlideText,
    TextNormalizer, WarningKind,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

/// Default 4:3 slide size in EMU, used when `p:sldSz` is absent.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width: 9_144_000.0,
    height: 6_858_000.0,
};

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Parser for PPTX (Office Open XML) decks.
pub struct PptxParser {
    normalizer: TextNormalizer,
}

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self {
            normalizer: TextNormalizer::new(),
        }
    }

    /// Parse a PPTX deck from a reader.
    ///
    /// Fails only when the package itself cannot be opened. A slide that
    /// cannot be read becomes an empty record plus a warning.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<Deck> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::DocumentOpen(format!("not a ZIP package: {}", e)))?;

        let info = self.read_presentation(&mut archive)?;
        let slide_order = self
            .get_slide_order(&mut archive, &info.slide_ids)
            .map_err(|e| Error::DocumentOpen(e.to_string()))?;
        log::debug!(
            "deck has {} slides, page {}x{}",
            slide_order.len(),
            info.page.width,
            info.page.height
        );

        let mut deck = Deck::new();
        for (idx, slide_path) in slide_order.iter().enumerate() {
            let index = idx + 1;
            match self.parse_slide(&mut archive, slide_path, index, info.page) {
                Ok((slide, warnings)) => {
                    deck.add_slide(slide);
                    deck.warnings.extend(warnings);
                }
                Err(e) => {
                    let err = Error::Extraction {
                        page: index,
                        reason: e.to_string(),
                    };
                    deck.warnings.push(PipelineWarning::from_error(
                        WarningKind::Extraction,
                        Some(index),
                        &err,
                    ));
                    deck.add_slide(SlideRecord::new(index));
                }
            }
        }

        Ok(deck)
    }

    /// Read the slide size and the ordered slide relationship ids.
    fn read_presentation<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<PresentationInfo> {
        let content = self
            .read_file_from_archive(archive, PRESENTATION_PATH)
            .map_err(|e| Error::DocumentOpen(e.to_string()))?;

        let mut info = PresentationInfo {
            page: DEFAULT_PAGE_SIZE,
            slide_ids: Vec::new(),
        };

        let mut reader = Reader::from_str(&content);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match local_name(e.name().as_ref()) {
                        b"sldSz" => {
                            let cx = attr_f64(e, b"cx");
                            let cy = attr_f64(e, b"cy");
                            if let (Some(cx), Some(cy)) = (cx, cy) {
                                info.page = PageSize::new(cx, cy);
                            }
                        }
                        b"sldId" => {
                            if let Some(id) = relationship_id(e, b"id") {
                                info.slide_ids.push(id);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::DocumentOpen(format!(
                        "Error parsing {}: {}",
                        PRESENTATION_PATH, e
                    )));
                }
                _ => {}
            }
        }

        Ok(info)
    }

    /// Get the ordered list of slide paths.
    ///
    /// Follows `p:sldIdLst` when present; otherwise sorts the slide
    /// relationships by the number in their id or target.
    fn get_slide_order<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_ids: &[String],
    ) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let slide_rels: Vec<Relationship> = parse_relationships(&rels_content)?
            .into_iter()
            .filter(|rel| rel.is_slide())
            .collect();

        if !slide_ids.is_empty() {
            let by_id: HashMap<&str, &Relationship> =
                slide_rels.iter().map(|rel| (rel.id.as_str(), rel)).collect();
            let ordered: Vec<String> = slide_ids
                .iter()
                .filter_map(|id| {
                    let rel = by_id.get(id.as_str());
                    if rel.is_none() {
                        log::warn!("slide id {} has no relationship, skipping", id);
                    }
                    rel.map(|rel| resolve_part_path("ppt", &rel.target))
                })
                .collect();
            if !ordered.is_empty() {
                return Ok(ordered);
            }
        }

        let mut slides: Vec<(String, Option<usize>)> = slide_rels
            .iter()
            .map(|rel| {
                let order_num = extract_slide_number(&rel.id).or_else(|| extract_slide_number(&rel.target));
                (resolve_part_path("ppt", &rel.target), order_num)
            })
            .collect();

        // Sort slides by their number
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide: text frames, pictures and their geometry.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        index: usize,
        page: PageSize,
    ) -> Result<(SlideRecord, Vec<PipelineWarning>)> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let shapes = extract_shapes_from_xml(&content)?;
        let mut warnings = Vec::new();

        let mut lines: Vec<SlideText> = shapes
            .iter()
            .filter(|shape| !shape.text.trim().is_empty())
            .map(|shape| SlideText::with_position(shape.text.clone(), shape.y, shape.x))
            .collect();
        sort_by_position(&mut lines);

        let mut slide = SlideRecord::with_text(
            index,
            self.normalizer
                .normalize_frames(lines.iter().map(|line| line.text.as_str())),
        );

        let embeds: Vec<&ShapeInfo> = shapes.iter().filter(|s| s.embed.is_some()).collect();
        let mut images = Vec::with_capacity(embeds.len());
        let targets = if embeds.is_empty() {
            None
        } else {
            match self.read_slide_relationships(archive, slide_path) {
                Ok(targets) => Some(targets),
                Err(err) => {
                    // keep the text; only the pictures are lost
                    let err = Error::Extraction {
                        page: index,
                        reason: format!("{} picture(s) skipped: {}", embeds.len(), err),
                    };
                    warnings.push(PipelineWarning::from_error(
                        WarningKind::Extraction,
                        Some(index),
                        &err,
                    ));
                    None
                }
            }
        };
        if let Some(targets) = targets {
            for shape in embeds {
                let rel_id = shape.embed.as_deref().unwrap_or_default();
                let media = match targets.get(rel_id) {
                    Some(path) => path,
                    None => {
                        warnings.push(missing_media(index, &format!("relationship {}", rel_id)));
                        continue;
                    }
                };
                match self.read_bytes_from_archive(archive, media) {
                    Ok(data) => images.push(ImageAsset::new(
                        media.clone(),
                        data,
                        Rect::new(shape.x, shape.y, shape.cx, shape.cy),
                    )),
                    Err(_) => warnings.push(missing_media(index, media)),
                }
            }
        }
        slide.set_images(images, page);

        log::debug!(
            "slide {}: {} chars of text, {} images, area ratio {:.2}",
            index,
            slide.text.len(),
            slide.images.len(),
            slide.area_ratio
        );
        Ok((slide, warnings))
    }

    /// Map relationship ids of a slide to archive part paths.
    fn read_slide_relationships<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
    ) -> Result<HashMap<String, String>> {
        let (dir, file) = slide_path.rsplit_once('/').unwrap_or(("", slide_path));
        let rels_path = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };

        let content = self.read_file_from_archive(archive, &rels_path)?;
        Ok(parse_relationships(&content)?
            .into_iter()
            .filter(|rel| !rel.external)
            .map(|rel| {
                let path = resolve_part_path(dir, &rel.target);
                (rel.id, path)
            })
            .collect())
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }

    /// Read a binary part from the ZIP archive.
    fn read_bytes_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<Vec<u8>> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(data)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckDecomposer for PptxParser {
    fn decompose(&self, document: &[u8]) -> Result<Deck> {
        if DeckFormat::from_magic(document) == Some(DeckFormat::LegacyPpt) {
            return Err(Error::DocumentOpen(
                "legacy binary .ppt is not supported; save the deck as .pptx".to_string(),
            ));
        }
        self.parse(Cursor::new(document))
    }
}

fn missing_media(index: usize, what: &str) -> PipelineWarning {
    let err = Error::Extraction {
        page: index,
        reason: format!("image {} is missing from the package", what),
    };
    PipelineWarning::from_error(WarningKind::Extraction, Some(index), &err)
}

/// Slide size and slide order from `presentation.xml`.
#[derive(Debug)]
struct PresentationInfo {
    page: PageSize,
    slide_ids: Vec<String>,
}

/// One entry of a `.rels` part.
#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
    external: bool,
}

impl Relationship {
    fn is_slide(&self) -> bool {
        self.rel_type.ends_with("/slide")
    }
}

/// Information about a shape or picture extracted from slide XML.
#[derive(Debug, Default)]
struct ShapeInfo {
    text: String,
    x: f64,
    y: f64,
    cx: f64,
    cy: f64,
    /// Relationship id of an embedded image, if any.
    embed: Option<String>,
}

impl ShapeInfo {
    fn read_offset(&mut self, e: &BytesStart<'_>) {
        if let Some(x) = attr_f64(e, b"x") {
            self.x = x;
        }
        if let Some(y) = attr_f64(e, b"y") {
            self.y = y;
        }
    }

    fn read_extent(&mut self, e: &BytesStart<'_>) {
        // a:ext inside a:extLst carries a uri, not a size
        if let (Some(cx), Some(cy)) = (attr_f64(e, b"cx"), attr_f64(e, b"cy")) {
            self.cx = cx;
            self.cy = cy;
        }
    }
}

/// Parse relationships from a `.rels` part.
fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.external = value == "External",
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Extract shapes, pictures and graphic frames (tables) with their text and
/// geometry from slide XML. Table cells become separate lines.
fn extract_shapes_from_xml(xml_content: &str) -> Result<Vec<ShapeInfo>> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    // Whitespace inside a:t runs is significant
    reader.trim_text(false);

    let mut current_shape: Option<ShapeInfo> = None;
    let mut in_text_body = false;
    let mut in_paragraph = false;
    let mut in_run_text = false;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" | b"graphicFrame" => {
                    current_shape = Some(ShapeInfo::default());
                    current_text.clear();
                }
                b"off" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.read_offset(e);
                    }
                }
                b"ext" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.read_extent(e);
                    }
                }
                b"blip" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.embed = relationship_id(e, b"embed");
                    }
                }
                b"txBody" => {
                    in_text_body = true;
                }
                b"p" if in_text_body => {
                    in_paragraph = true;
                    if !current_text.is_empty() {
                        current_text.push('\n');
                    }
                }
                b"t" if in_paragraph => {
                    in_run_text = true;
                }
                b"br" if in_paragraph => {
                    current_text.push('\n');
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"off" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.read_offset(e);
                    }
                }
                b"ext" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.read_extent(e);
                    }
                }
                b"blip" => {
                    if let Some(ref mut shape) = current_shape {
                        shape.embed = relationship_id(e, b"embed");
                    }
                }
                b"br" if in_paragraph => {
                    current_text.push('\n');
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_run_text {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::XmlError(format!("Bad text run: {}", err)))?;
                    current_text.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" | b"graphicFrame" => {
                    if let Some(mut shape) = current_shape.take() {
                        shape.text = current_text.trim().to_string();
                        if !shape.text.is_empty() || shape.embed.is_some() {
                            shapes.push(shape);
                        }
                    }
                    current_text.clear();
                    in_text_body = false;
                    in_paragraph = false;
                    in_run_text = false;
                }
                b"txBody" => {
                    in_text_body = false;
                }
                b"p" => {
                    in_paragraph = false;
                }
                b"t" => {
                    in_run_text = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(shapes)
}

/// Value of a namespaced relationship attribute such as `r:embed` or `r:id`.
fn relationship_id(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        let key = attr.key.as_ref();
        let prefixed = key.contains(&b':');
        (prefixed && local_name(key) == local)
            .then(|| String::from_utf8_lossy(&attr.value).to_string())
    })
}

/// Numeric value of an unprefixed attribute.
fn attr_f64(e: &BytesStart<'_>, key: &[u8]) -> Option<f64> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| String::from_utf8_lossy(&attr.value).parse::<f64>().ok())
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
