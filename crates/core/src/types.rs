//! Domain types for decks, slides, chunks and narration output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Error;

/// A decomposed slide deck.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deck {
    /// Slides in presentation order, numbered 1..N.
    pub slides: Vec<SlideRecord>,

    /// Problems met while decomposing that did not stop the deck.
    pub warnings: Vec<PipelineWarning>,
}

impl Deck {
    /// Create an empty deck.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slide. Its index must be the next one in sequence.
    pub fn add_slide(&mut self, slide: SlideRecord) {
        debug_assert_eq!(slide.index, self.slides.len() + 1);
        self.slides.push(slide);
    }

    /// Build a deck from plain text pages, numbering them from 1.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slides = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| SlideRecord::with_text(i + 1, text))
            .collect();
        Self {
            slides,
            warnings: Vec::new(),
        }
    }
}

/// The container format of a deck file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckFormat {
    /// Office Open XML presentation.
    Pptx,
    /// Legacy binary PowerPoint, which we can recognize but not read.
    LegacyPpt,
}

impl DeckFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::LegacyPpt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
            return Some(Self::LegacyPpt);
        }

        None
    }
}

/// Width and height of a page in the deck's native units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Bounding box of an image on its page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area of the box. Negative extents count as empty.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Sum of image areas divided by the page area.
///
/// Not clamped: overlapping boxes may push the ratio past 1.
pub fn cumulative_area_ratio<'a, I>(boxes: I, page: PageSize) -> f64
where
    I: IntoIterator<Item = &'a Rect>,
{
    let page_area = page.area();
    if page_area <= 0.0 {
        return 0.0;
    }
    boxes.into_iter().map(Rect::area).sum::<f64>() / page_area
}

/// An image embedded in a slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Part name inside the deck, e.g. `ppt/media/image1.png`.
    pub name: String,

    /// Raw encoded image bytes.
    #[serde(skip)]
    pub data: Vec<u8>,

    /// Where the image sits on the page.
    pub bounds: Rect,

    /// Page-level cumulative image area ratio.
    pub area_ratio: f64,

    /// Whether the image warrants spoken description.
    pub relevant: bool,

    /// Spoken-style description, filled in for relevant images.
    pub description: Option<String>,
}

impl ImageAsset {
    /// Create a new image with the given bytes and bounding box.
    pub fn new(name: impl Into<String>, data: Vec<u8>, bounds: Rect) -> Self {
        Self {
            name: name.into(),
            data,
            bounds,
            area_ratio: 0.0,
            relevant: false,
            description: None,
        }
    }

    /// MIME type guessed from the part name's extension.
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            "svg" => "image/svg+xml",
            "webp" => "image/webp",
            _ => "image/png",
        }
    }
}

/// A single decomposed slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRecord {
    /// 1-based slide number.
    pub index: usize,

    /// Whitespace-normalized text layer.
    pub text: String,

    /// Embedded images in document order.
    pub images: Vec<ImageAsset>,

    /// Sum of image areas on this page divided by the page area.
    pub area_ratio: f64,
}

impl SlideRecord {
    /// Create a new empty slide with the given number.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            text: String::new(),
            images: Vec::new(),
            area_ratio: 0.0,
        }
    }

    /// Create a slide carrying only text.
    pub fn with_text(index: usize, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new(index)
        }
    }

    /// Attach images and compute the page-level area ratio for them.
    pub fn set_images(&mut self, images: Vec<ImageAsset>, page: PageSize) {
        let ratio = cumulative_area_ratio(images.iter().map(|img| &img.bounds), page);
        self.area_ratio = ratio;
        self.images = images
            .into_iter()
            .map(|mut img| {
                img.area_ratio = ratio;
                img
            })
            .collect();
    }

    /// Descriptions of the relevant images, in order.
    pub fn image_descriptions(&self) -> Vec<&str> {
        self.images
            .iter()
            .filter(|img| img.relevant)
            .filter_map(|img| img.description.as_deref())
            .filter(|d| !d.trim().is_empty())
            .collect()
    }
}

/// Text content from a shape or text frame, with its position for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideText {
    /// The actual text content.
    pub text: String,

    /// Y position for ordering (top-to-bottom). None if unknown.
    pub y_position: Option<f64>,

    /// X position for ordering (left-to-right). None if unknown.
    pub x_position: Option<f64>,
}

impl SlideText {
    /// Create new slide text with position info.
    pub fn with_position(text: impl Into<String>, y: f64, x: f64) -> Self {
        Self {
            text: text.into(),
            y_position: Some(y),
            x_position: Some(x),
        }
    }
}

/// Sort text frames top-to-bottom, then left-to-right.
pub fn sort_by_position(lines: &mut [SlideText]) {
    lines.sort_by(|a, b| {
        let y_cmp = a
            .y_position
            .partial_cmp(&b.y_position)
            .unwrap_or(std::cmp::Ordering::Equal);
        if y_cmp == std::cmp::Ordering::Equal {
            a.x_position
                .partial_cmp(&b.x_position)
                .unwrap_or(std::cmp::Ordering::Equal)
        } else {
            y_cmp
        }
    });
}

/// Structural position of a chunk within the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRole {
    Head,
    Body,
    End,
}

impl ChunkRole {
    /// Role of chunk `position` (0-based) out of `count` chunks.
    ///
    /// A lone chunk is the end of the deck.
    pub fn for_position(position: usize, count: usize) -> Self {
        if position + 1 >= count {
            ChunkRole::End
        } else if position == 0 {
            ChunkRole::Head
        } else {
            ChunkRole::Body
        }
    }

    /// Whether closing remarks are allowed.
    pub fn allows_closing(&self) -> bool {
        matches!(self, ChunkRole::End)
    }
}

/// A contiguous group of slides narrated by one oracle call.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    /// 1-based position of this chunk.
    pub number: usize,
    /// Index of the first slide (inclusive).
    pub start_index: usize,
    /// Index of the last slide (inclusive).
    pub end_index: usize,
    pub role: ChunkRole,
    pub slides: &'a [SlideRecord],
}

impl Chunk<'_> {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Whether the chunk holds slide `index`.
    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }
}

/// Narration produced for one slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationResult {
    pub slide_index: usize,
    pub text: String,
    /// True when the text is a recovery placeholder, not oracle output.
    #[serde(default)]
    pub recovered: bool,
}

impl NarrationResult {
    pub fn new(slide_index: usize, text: impl Into<String>) -> Self {
        Self {
            slide_index,
            text: text.into(),
            recovered: false,
        }
    }

    pub fn placeholder(slide_index: usize, text: impl Into<String>) -> Self {
        Self {
            slide_index,
            text: text.into(),
            recovered: true,
        }
    }
}

/// One row of the final output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationRecord {
    pub page: usize,
    pub text: String,
    pub narration: String,
    #[serde(default)]
    pub recovered: bool,
}

/// Category of a contained failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Extraction,
    Classification,
    Description,
    GenerationMismatch,
    Generation,
    Embedding,
    Speech,
}

/// A failure that was contained and did not stop the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineWarning {
    pub kind: WarningKind,
    pub slide: Option<usize>,
    pub message: String,
}

impl PipelineWarning {
    pub fn new(kind: WarningKind, slide: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            slide,
            message: message.into(),
        }
    }

    /// Record `err` as a warning and log it.
    pub fn from_error(kind: WarningKind, slide: Option<usize>, err: &Error) -> Self {
        match slide {
            Some(n) => log::warn!("slide {}: {}", n, err),
            None => log::warn!("{}", err),
        }
        Self::new(kind, slide, err.to_string())
    }
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrationOutput {
    /// One record per slide, in slide order.
    pub narrations: Vec<NarrationRecord>,
    /// Compiled SSML keyed by slide index.
    pub markup: BTreeMap<usize, String>,
    /// Words chosen for vocal emphasis.
    pub emphasis: Vec<String>,
    pub warnings: Vec<PipelineWarning>,
}

impl NarrationOutput {
    /// Whether any unit of work fell back to a recovery path.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All narration joined into one text, in slide order.
    pub fn full_script(&self) -> String {
        self.narrations
            .iter()
            .map(|n| n.narration.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
