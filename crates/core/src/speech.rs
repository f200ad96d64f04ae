//! Handing compiled markup to the speech oracle.

use std::collections::BTreeMap;

use crate::config::RetryPolicy;
use crate::oracle::{call_with_retry, SpeechOracle};
use crate::types::{PipelineWarning, WarningKind};

/// Audio per slide plus the slides that could not be voiced.
#[derive(Debug, Clone, Default)]
pub struct SpeechOutput {
    pub audio: BTreeMap<usize, Vec<u8>>,
    pub warnings: Vec<PipelineWarning>,
}

/// Synthesize audio for each slide's markup, one slide at a time.
///
/// A slide whose synthesis fails is left out of `audio`.
pub fn synthesize_markup(
    oracle: &dyn SpeechOracle,
    markup: &BTreeMap<usize, String>,
    retry: &RetryPolicy,
) -> SpeechOutput {
    let mut output = SpeechOutput::default();
    for (&slide, ssml) in markup {
        log::debug!("synthesizing speech for slide {}", slide);
        match call_with_retry(retry, "speech synthesis", || oracle.synthesize(ssml)) {
            Ok(audio) => {
                output.audio.insert(slide, audio);
            }
            Err(err) => output.warnings.push(PipelineWarning::from_error(
                WarningKind::Speech,
                Some(slide),
                &err,
            )),
        }
    }
    log::info!(
        "synthesized audio for {}/{} slides",
        output.audio.len(),
        markup.len()
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OracleError;

    struct EchoSpeech;

    impl SpeechOracle for EchoSpeech {
        fn synthesize(&self, markup: &str) -> Result<Vec<u8>, OracleError> {
            if markup.contains("fail") {
                Err(OracleError::Rejected("invalid SSML".into()))
            } else {
                Ok(markup.as_bytes().to_vec())
            }
        }
    }

    #[test]
    fn test_failed_slide_is_skipped() {
        let markup: BTreeMap<usize, String> = [
            (1, "<speak>hello</speak>".to_string()),
            (2, "<speak>fail</speak>".to_string()),
            (3, "<speak>bye</speak>".to_string()),
        ]
        .into_iter()
        .collect();

        let output = synthesize_markup(&EchoSpeech, &markup, &RetryPolicy::immediate(1));

        assert_eq!(output.audio.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(output.audio[&1], b"<speak>hello</speak>".to_vec());
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].slide, Some(2));
        assert_eq!(output.warnings[0].kind, WarningKind::Speech);
    }
}
