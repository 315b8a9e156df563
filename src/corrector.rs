//! Homophone-aware sentence correction (component F).
//!
//! The acoustic pipeline can only ever recover a phoneme sequence; several distinct
//! French words routinely share one. `SentenceCorrector` resolves that ambiguity with a
//! second beam search, this time over words rather than phonemes, scored by a
//! French word-level n-gram LM that is entirely separate from the CTC decoder's LM in
//! [`crate::decoder::lm`].
use crate::decoder::lm::{LanguageModel, LmState, NgramLm};
use crate::error::{CoreError, Result};
use crate::phoneme_codec::liaphon_to_ipa;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// One line of the homophones file, deserialized permissively: `words` is optional and
/// key order in the source JSON is irrelevant to `serde`.
#[derive(Debug, Deserialize)]
struct HomophoneLine {
    ipa: String,
    #[serde(default)]
    words: Vec<String>,
}

/// `ipa -> [french_word]` lookup, insertion order preserved so a tie in LM score falls
/// back to the order the homophones file listed the candidates in.
#[derive(Debug, Clone, Default)]
pub struct HomophoneTable {
    classes: HashMap<String, Vec<String>>,
}

impl HomophoneTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            CoreError::Config(format!("failed to open homophones file {}: {e}", path.as_ref().display()))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut classes = HashMap::new();
        for line in reader.lines() {
            let line = line.map_err(|e| CoreError::Config(format!("reading homophones file: {e}")))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed: HomophoneLine = serde_json::from_str(trimmed)
                .map_err(|e| CoreError::Config(format!("malformed homophones line {trimmed:?}: {e}")))?;
            let words = if parsed.words.is_empty() {
                vec![parsed.ipa.clone()]
            } else {
                parsed.words
            };
            classes.insert(parsed.ipa, words);
        }
        Ok(Self { classes })
    }

    /// The homophone class for `ipa`, or the identity fallback `[ipa]` if the table has
    /// no entry for it.
    pub fn class_for<'a>(&'a self, ipa: &'a str) -> Vec<&'a str> {
        match self.classes.get(ipa) {
            Some(words) => words.iter().map(String::as_str).collect(),
            None => vec![ipa],
        }
    }
}

/// Default beam width over the homophone Cartesian product, used by [`SentenceCorrector::new`].
/// [`PipelineConfig::corrector_beam_width`](crate::config::PipelineConfig::corrector_beam_width)
/// overrides this for callers that construct a corrector via [`SentenceCorrector::load`].
const BEAM_WIDTH: usize = 20;

#[derive(Debug, Clone)]
struct CorrectionBeam {
    state: LmState,
    score: f32,
    words: Vec<String>,
}

/// Resolves a phoneme sequence, segmented into per-word IPA groups, into the
/// best-scoring French sentence.
pub struct SentenceCorrector {
    homophones: HomophoneTable,
    lm: NgramLm,
    beam_width: usize,
}

impl SentenceCorrector {
    pub fn new(homophones: HomophoneTable, lm: NgramLm) -> Self {
        Self::with_beam_width(homophones, lm, BEAM_WIDTH)
    }

    pub fn with_beam_width(homophones: HomophoneTable, lm: NgramLm, beam_width: usize) -> Self {
        Self {
            homophones,
            lm,
            beam_width: beam_width.max(1),
        }
    }

    pub fn load(homophones_path: impl AsRef<Path>, lm_path: impl AsRef<Path>, lm_dict_path: Option<&Path>) -> Result<Self> {
        let homophones = HomophoneTable::load(homophones_path)?;
        let lm = NgramLm::load(lm_path, lm_dict_path)?;
        Ok(Self::new(homophones, lm))
    }

    /// As [`SentenceCorrector::load`], but with an explicit beam width (typically
    /// [`PipelineConfig::corrector_beam_width`](crate::config::PipelineConfig::corrector_beam_width)).
    pub fn load_with_beam_width(
        homophones_path: impl AsRef<Path>,
        lm_path: impl AsRef<Path>,
        lm_dict_path: Option<&Path>,
        beam_width: usize,
    ) -> Result<Self> {
        let homophones = HomophoneTable::load(homophones_path)?;
        let lm = NgramLm::load(lm_path, lm_dict_path)?;
        Ok(Self::with_beam_width(homophones, lm, beam_width))
    }

    /// Corrects one utterance given its LIAPHON phonemes grouped by word boundary
    /// (each inner slice is the phoneme run the decoder attributed to a single word).
    /// A single flat phoneme run with no word boundaries at all is also accepted: it is
    /// treated as one word, per the fallback in step 2 of the correction pipeline.
    pub fn correct(&self, words: &[Vec<String>]) -> String {
        let ipa_tokens: Vec<String> = if words.is_empty() {
            Vec::new()
        } else {
            words.iter().map(|w| liaphon_to_ipa(w.iter())).collect()
        };
        let ipa_tokens: Vec<String> = if ipa_tokens.is_empty() {
            Vec::new()
        } else if ipa_tokens.iter().all(|t| t.is_empty()) {
            Vec::new()
        } else {
            ipa_tokens
        };

        if ipa_tokens.is_empty() {
            return String::new();
        }

        let sentence = self.beam_search(&ipa_tokens);
        Self::finish_sentence(&sentence)
    }

    fn beam_search(&self, ipa_tokens: &[String]) -> Vec<String> {
        let mut beams = vec![CorrectionBeam {
            state: self.lm.start_state(),
            score: 0.0,
            words: Vec::new(),
        }];

        for ipa in ipa_tokens {
            let candidates = self.homophones.class_for(ipa);
            let mut next: Vec<CorrectionBeam> = Vec::with_capacity(beams.len() * candidates.len());
            for beam in &beams {
                for &word in &candidates {
                    let word_index = self.lm.word_index(word).unwrap_or(u32::MAX);
                    let (next_state, delta) = self.lm.score(&beam.state, word_index);
                    let mut words = beam.words.clone();
                    words.push(word.to_string());
                    next.push(CorrectionBeam {
                        state: next_state,
                        score: beam.score + delta,
                        words,
                    });
                }
            }
            next.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            next.truncate(self.beam_width);
            beams = next;
        }

        beams
            .into_iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|b| b.words)
            .unwrap_or_default()
    }

    fn finish_sentence(words: &[String]) -> String {
        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get(0..1) {
            let upper = first.to_uppercase();
            sentence.replace_range(0..1, &upper);
        }
        if !sentence.ends_with('.') && !sentence.is_empty() {
            sentence.push('.');
        }
        sentence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bigram_lm_favoring_cest_la() -> NgramLm {
        // vocab: 0=c'est 1=s'est 2=ses 3=ces 4=la 5=là 6=l'a
        let vocab: Vec<String> = ["c'est", "s'est", "ses", "ces", "la", "là", "l'a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let unigrams = (0..vocab.len())
            .map(|i| (vec![], i as u32, -2.0f32, 0.0f32))
            .collect::<Vec<_>>();
        // Only "c'est -> la" gets a strong bigram; everything else backs off to the
        // flat unigram floor.
        let bigrams = vec![(vec![0u32], 4u32, -0.1f32, 0.0f32)];
        NgramLm::from_parts(2, vocab, vec![unigrams, bigrams])
    }

    #[test]
    fn homophone_table_defaults_to_identity_when_words_missing() {
        let table = HomophoneTable::from_reader(Cursor::new("{\"ipa\": \"se\"}\n")).unwrap();
        assert_eq!(table.class_for("se"), vec!["se"]);
    }

    #[test]
    fn homophone_table_is_robust_to_key_order() {
        let table = HomophoneTable::from_reader(Cursor::new(
            "{\"words\": [\"la\", \"là\", \"l'a\"], \"ipa\": \"la\"}\n",
        ))
        .unwrap();
        assert_eq!(table.class_for("la"), vec!["la", "là", "l'a"]);
    }

    #[test]
    fn unlisted_ipa_falls_back_to_identity() {
        let table = HomophoneTable::default();
        assert_eq!(table.class_for("bonjour"), vec!["bonjour"]);
    }

    /// Reproduces the spec's homophone selection scenario: given the IPA tokens `se`
    /// and `la`, and an LM that only scores the bigram `(c'est, la)` favorably, the
    /// corrector should pick `"c'est la"` and format it as a sentence.
    #[test]
    fn selects_highest_scoring_homophone_sequence() {
        let mut lines = String::new();
        lines.push_str("{\"ipa\": \"se\", \"words\": [\"c'est\", \"s'est\", \"ses\", \"ces\"]}\n");
        lines.push_str("{\"ipa\": \"la\", \"words\": [\"la\", \"là\", \"l'a\"]}\n");
        let homophones = HomophoneTable::from_reader(Cursor::new(lines)).unwrap();
        let lm = bigram_lm_favoring_cest_la();
        let corrector = SentenceCorrector::new(homophones, lm);

        // liaphon_to_ipa("se"/"la") round-trips through single-char table entries, so
        // passing the IPA strings directly as the per-word "phoneme" groups exercises
        // the same code path as passing genuine LIAPHON tokens would.
        let words = vec![vec!["s".to_string(), "e".to_string()], vec!["l".to_string(), "a".to_string()]];
        let sentence = corrector.correct(&words);
        assert_eq!(sentence, "C'est la.");
    }

    #[test]
    fn empty_input_yields_empty_sentence() {
        let corrector = SentenceCorrector::new(HomophoneTable::default(), NgramLm::from_parts(1, vec![], vec![vec![]]));
        assert_eq!(corrector.correct(&[]), "");
    }

    #[test]
    fn sentence_gets_capitalized_and_terminated() {
        let homophones = HomophoneTable::default();
        let lm = NgramLm::from_parts(1, vec!["bonjour".to_string()], vec![vec![(vec![], 0, -1.0, 0.0)]]);
        let corrector = SentenceCorrector::new(homophones, lm);
        let words = vec![vec!["bonjour".to_string()]];
        assert_eq!(corrector.correct(&words), "Bonjour.");
    }

    /// A beam width of 1 must still pick the single best candidate at each step (just
    /// with no room to recover from a locally-suboptimal choice), rather than panicking
    /// or silently falling back to the default width.
    #[test]
    fn narrow_beam_width_still_selects_best_candidate() {
        let homophones_text = "{\"ipa\": \"se\", \"words\": [\"c'est\", \"ces\"]}\n\
                                {\"ipa\": \"la\", \"words\": [\"la\", \"l'a\"]}\n";
        let homophones = HomophoneTable::from_reader(Cursor::new(homophones_text)).unwrap();
        let lm = bigram_lm_favoring_cest_la();
        let corrector = SentenceCorrector::with_beam_width(homophones, lm, 1);
        let words = vec![vec!["s".to_string(), "e".to_string()], vec!["l".to_string(), "a".to_string()]];
        assert_eq!(corrector.correct(&words), "C'est la.");
    }
}
