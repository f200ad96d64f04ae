//! PPTX (Office Open XML) decomposer for the narration pipeline.
//!
//! A .pptx file is a ZIP archive of XML parts. Each slide becomes a
//! [`deck_core::SlideRecord`] carrying its reading-order text, embedded
//! pictures and their share of the page area.

pub mod parser;

pub use parser::{PptxParser, DEFAULT_PAGE_SIZE};
