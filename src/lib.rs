//! Streaming French Cued Speech recognition core.
//!
//! [`StreamRecognizer`] is the facade every other module in this crate exists to
//! support: it owns one stream's [`FeatureExtractor`] and [`WindowProcessor`] state and
//! drives them against a shared, read-only [`decoder::CtcDecoder`], acoustic model and
//! [`corrector::SentenceCorrector`]. Construct one `StreamRecognizer` per camera feed;
//! the three shared components underneath may be reused across as many concurrent
//! streams as the caller likes (see each component's own doc comment for its
//! concurrency contract).
use std::env;
use tracing::{debug, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{Layer, Registry};

pub mod acoustic_model;
pub mod config;
pub mod corrector;
pub mod decoder;
pub mod error;
pub mod features;
pub mod landmarks;
pub mod phoneme_codec;
pub mod types;
pub mod window_processor;

use acoustic_model::SequenceModel;
use corrector::SentenceCorrector;
use decoder::CtcDecoder;
use error::Result;
use features::FeatureExtractor;
use landmarks::LandmarkTuple;
use ndarray::{concatenate, Array2, Axis};
use types::{ConfidenceBand, Hypothesis, RecognitionResult};
use window_processor::WindowProcessor;

/// Owns one stream's feature history and committed-logit accumulator. Feed it
/// landmark tuples in order with [`StreamRecognizer::push`]; call
/// [`StreamRecognizer::finish`] once after the last frame to flush the tail.
///
/// `StreamRecognizer` itself is single-owner, non-`Sync` state (see §5 of the core's
/// concurrency model: `push`/`finish` must come from one logical caller in order), but
/// the `model`, `decoder` and `corrector` references it borrows are all safely shared
/// across as many concurrent `StreamRecognizer`s as the caller needs.
pub struct StreamRecognizer<'a> {
    extractor: FeatureExtractor,
    window: WindowProcessor,
    logits: Option<Array2<f32>>,
    model: &'a dyn SequenceModel,
    decoder: &'a CtcDecoder,
    corrector: &'a SentenceCorrector,
}

impl<'a> StreamRecognizer<'a> {
    pub fn new(model: &'a dyn SequenceModel, decoder: &'a CtcDecoder, corrector: &'a SentenceCorrector) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            window: WindowProcessor::new(),
            logits: None,
            model,
            decoder,
            corrector,
        }
    }

    /// Feeds one frame's landmarks through feature extraction and the window
    /// processor. Returns an incremental [`RecognitionResult`] as soon as a window
    /// commits; most calls return `None` since commits only happen every `COMMIT`
    /// valid frames.
    pub fn push(&mut self, landmarks: LandmarkTuple) -> Option<RecognitionResult> {
        let frame = self.extractor.push(landmarks);
        if !self.window.push_frame(frame) {
            return None;
        }
        match self.window.process_window(self.model) {
            Ok(Some(chunk)) => self.absorb_chunk(chunk),
            Ok(None) => None,
            Err(e) => {
                warn!("acoustic model inference failed on a committed window: {e}");
                None
            }
        }
    }

    /// Flushes the stream's tail after the last frame has been pushed, producing one
    /// final (possibly empty) [`RecognitionResult`].
    pub fn finish(&mut self) -> RecognitionResult {
        match self.window.finalize(self.model) {
            Ok(Some(chunk)) => self
                .absorb_chunk(chunk)
                .unwrap_or_else(|| RecognitionResult::empty(self.window.total_frames_seen())),
            Ok(None) => RecognitionResult::empty(self.window.total_frames_seen()),
            Err(e) => {
                warn!("acoustic model inference failed while finalizing the stream: {e}");
                RecognitionResult::empty(self.window.total_frames_seen())
            }
        }
    }

    fn absorb_chunk(&mut self, chunk: window_processor::CommittedChunk) -> Option<RecognitionResult> {
        self.logits = Some(match self.logits.take() {
            Some(existing) => concatenate(Axis(0), &[existing.view(), chunk.logits.view()]).ok()?,
            None => chunk.logits,
        });
        let logits = self.logits.as_ref()?;
        let hypotheses = self.decoder.decode(logits.view());
        let best = hypotheses.into_iter().next()?;
        Some(self.build_result(best, chunk.end_frame + 1))
    }

    fn build_result(&self, hypothesis: Hypothesis, frame_number: usize) -> RecognitionResult {
        let french_sentence = self.corrector.correct(&hypothesis.word_phonemes);
        // spec.md's worked example sets confidence to the hypothesis score directly,
        // with no normalization - the beam score's scale and sign are whatever the
        // decoder's knobs (lm_weight, word_score, ...) produce.
        let confidence = hypothesis.score;
        debug!(
            confidence,
            band = ?ConfidenceBand::from_score(confidence),
            "committed recognition result"
        );
        RecognitionResult {
            frame_number,
            phonemes: hypothesis.tokens,
            french_sentence,
            confidence,
        }
    }
}

/// Sets up `tracing` for any binary built on this crate. Honors `RUST_LOG` if set,
/// otherwise defaults this crate and the `recognize` binary to `info`.
pub fn setup_logging() {
    let filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_env("RUST_LOG"),
        _ => EnvFilter::new("cued_speech_rt=info,recognize=info"),
    };

    let fmt = tracing_subscriber::fmt::Layer::default();

    let subscriber = filter.and_then(fmt).with_subscriber(Registry::default());

    tracing::subscriber::set_global_default(subscriber).unwrap();
}
