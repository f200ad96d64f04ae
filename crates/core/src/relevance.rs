//! Deciding which images deserve spoken description.
//!
//! Pages dominated by imagery are described without asking anyone. Smaller
//! images go to the vision classifier, and only charts and graphs survive.

use rayon::prelude::*;

use crate::config::RetryPolicy;
use crate::oracle::{call_with_retry, ImageLabel, VisionClassifierOracle};
use crate::types::{ImageAsset, PipelineWarning, SlideRecord, WarningKind};
use crate::Error;

/// Default page image ratio above which images are always relevant.
pub const DEFAULT_AREA_THRESHOLD: f64 = 0.5;

/// Image relevance classifier.
pub struct RelevanceClassifier<'a> {
    oracle: &'a dyn VisionClassifierOracle,
    threshold: f64,
    retry: RetryPolicy,
}

impl<'a> RelevanceClassifier<'a> {
    pub fn new(oracle: &'a dyn VisionClassifierOracle) -> Self {
        Self {
            oracle,
            threshold: DEFAULT_AREA_THRESHOLD,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Decide whether `image` needs description.
    ///
    /// Never calls the oracle when `page_area_ratio` reaches the threshold.
    /// When the oracle fails for good the image counts as not relevant and
    /// the error is returned next to the decision.
    pub fn decide(
        &self,
        slide: usize,
        image: &ImageAsset,
        page_area_ratio: f64,
    ) -> (bool, Option<Error>) {
        if page_area_ratio >= self.threshold {
            log::debug!(
                "slide {}: {} relevant by area ratio {:.2}",
                slide,
                image.name,
                page_area_ratio
            );
            return (true, None);
        }

        let label = call_with_retry(&self.retry, "image classification", || {
            self.oracle.classify(&image.data, image.mime_type())
        });

        match label {
            Ok(label) => {
                log::debug!("slide {}: {} classified as {}", slide, image.name, label.as_str());
                (label == ImageLabel::ChartOrGraph, None)
            }
            Err(err) => (
                false,
                Some(Error::Classification {
                    slide,
                    reason: format!("{}: {}", image.name, err),
                }),
            ),
        }
    }

    /// Set the `relevant` flag on every image of a slide.
    ///
    /// Classifier calls for one page run concurrently.
    pub fn classify_slide(&self, slide: &mut SlideRecord) -> Vec<PipelineWarning> {
        let index = slide.index;
        let ratio = slide.area_ratio;

        let decisions: Vec<(bool, Option<Error>)> = slide
            .images
            .par_iter()
            .map(|image| self.decide(index, image, ratio))
            .collect();

        let mut warnings = Vec::new();
        for (image, (relevant, err)) in slide.images.iter_mut().zip(decisions) {
            image.relevant = relevant;
            if let Some(err) = err {
                warnings.push(PipelineWarning::from_error(
                    WarningKind::Classification,
                    Some(index),
                    &err,
                ));
            }
        }
        warnings
    }

    /// Classify every image of every slide.
    pub fn classify_all(&self, slides: &mut [SlideRecord]) -> Vec<PipelineWarning> {
        slides
            .iter_mut()
            .flat_map(|slide| self.classify_slide(slide))
            .collect()
    }
}
