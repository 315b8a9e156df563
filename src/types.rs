//! Shared result types threaded between the decoder, the corrector and the pipeline
//! facade.
use serde::{Deserialize, Serialize};

/// Opaque identifier for a logical stream in a multi-stream deployment. Not
/// load-bearing for single-stream use; threaded through logs so concurrent streams
/// are distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

/// One decoded path through the beam search: a sequence of phoneme tokens, the words
/// the lexicon accepted along the way, a total score, and a per-token timestep so
/// callers can align output back to the input frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub tokens: Vec<String>,
    pub words: Vec<String>,
    pub score: f32,
    pub timesteps: Vec<usize>,
    /// Phoneme tokens grouped by the word boundary the beam search completed them
    /// against - one inner list per entry in `words`, silence tokens excluded. This is
    /// the segmentation the sentence corrector needs to look up homophone classes per
    /// word rather than over the whole flattened `tokens` sequence.
    pub word_phonemes: Vec<Vec<String>>,
}

impl Hypothesis {
    pub fn empty() -> Self {
        Self {
            tokens: Vec::new(),
            words: Vec::new(),
            score: 0.0,
            timesteps: Vec::new(),
            word_phonemes: Vec::new(),
        }
    }
}

/// A coarse classification of [`RecognitionResult::confidence`] for human-readable
/// CLI output. Not part of the decoding contract; the `0.66`/`0.33` cutoffs are an
/// arbitrary heuristic over the raw beam score (see [`RecognitionResult::confidence`])
/// rather than a calibrated probability threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn from_score(confidence: f32) -> Self {
        if confidence >= 0.66 {
            ConfidenceBand::High
        } else if confidence >= 0.33 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// The output of one committed window or stream finalization: the frame number the
/// commit ends at, the raw phoneme sequence, the corrected French sentence, and
/// `confidence`, the winning [`Hypothesis::score`] copied through unchanged (a
/// beam-search log-score, unbounded and usually negative - not a `[0, 1]` probability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub frame_number: usize,
    pub phonemes: Vec<String>,
    pub french_sentence: String,
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn empty(frame_number: usize) -> Self {
        Self {
            frame_number,
            phonemes: Vec::new(),
            french_sentence: String::new(),
            confidence: 0.0,
        }
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence)
    }
}
