//! Spoken-style descriptions for relevant images.

use rayon::prelude::*;

use crate::config::RetryPolicy;
use crate::oracle::{call_with_retry, DescriptionContext, ImageDescriptionOracle};
use crate::types::{PipelineWarning, SlideRecord, WarningKind};

/// Fills in `description` for every relevant image.
pub struct ImageDescriber<'a> {
    oracle: &'a dyn ImageDescriptionOracle,
    retry: RetryPolicy,
}

impl<'a> ImageDescriber<'a> {
    pub fn new(oracle: &'a dyn ImageDescriptionOracle) -> Self {
        Self {
            oracle,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Describe the relevant images of one slide, concurrently.
    ///
    /// An image whose description fails keeps `description = None`.
    pub fn describe_slide(&self, slide: &mut SlideRecord, summary: &str) -> Vec<PipelineWarning> {
        let index = slide.index;
        let text = slide.text.as_str();

        let results: Vec<_> = slide
            .images
            .par_iter()
            .map(|image| {
                if !image.relevant {
                    return None;
                }
                let context = DescriptionContext {
                    summary,
                    slide_text: text,
                    mime_type: image.mime_type(),
                };
                Some(call_with_retry(&self.retry, "image description", || {
                    self.oracle.describe(&image.data, context)
                }))
            })
            .collect();

        let mut warnings = Vec::new();
        for (image, result) in slide.images.iter_mut().zip(results) {
            match result {
                Some(Ok(description)) => {
                    let description = description.trim();
                    if !description.is_empty() {
                        image.description = Some(description.to_string());
                    }
                }
                Some(Err(err)) => warnings.push(PipelineWarning::from_error(
                    WarningKind::Description,
                    Some(index),
                    &err,
                )),
                None => {}
            }
        }
        warnings
    }

    pub fn describe_all(&self, slides: &mut [SlideRecord], summary: &str) -> Vec<PipelineWarning> {
        slides
            .iter_mut()
            .flat_map(|slide| self.describe_slide(slide, summary))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageAsset, Rect};
    use crate::OracleError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDescriber {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ImageDescriptionOracle for FakeDescriber {
        fn describe(&self, image: &[u8], context: DescriptionContext<'_>) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OracleError::Rejected("too large".into()));
            }
            Ok(format!(" {} bytes on '{}' ", image.len(), context.slide_text))
        }
    }

    fn slide() -> SlideRecord {
        let mut slide = SlideRecord::with_text(3, "Sales");
        let mut chart = ImageAsset::new("chart.png", vec![0; 4], Rect::default());
        chart.relevant = true;
        let photo = ImageAsset::new("photo.jpg", vec![0; 9], Rect::default());
        slide.images = vec![chart, photo];
        slide
    }

    #[test]
    fn test_only_relevant_images_described() {
        let oracle = FakeDescriber {
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let describer = ImageDescriber::new(&oracle);
        let mut slide = slide();

        let warnings = describer.describe_slide(&mut slide, "summary");

        assert!(warnings.is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert_eq!(slide.images[0].description.as_deref(), Some("4 bytes on 'Sales'"));
        assert_eq!(slide.images[1].description, None);
    }

    #[test]
    fn test_failure_is_contained() {
        let oracle = FakeDescriber {
            fail: true,
            calls: AtomicUsize::new(0),
        };
        let describer = ImageDescriber::new(&oracle).with_retry(RetryPolicy::immediate(3));
        let mut slide = slide();

        let warnings = describer.describe_slide(&mut slide, "summary");

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Description);
        assert_eq!(warnings[0].slide, Some(3));
        assert_eq!(slide.images[0].description, None);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }
}
