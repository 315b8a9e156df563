//! Integration tests stitching several components together the way `StreamRecognizer`
//! does internally, reproducing the spec's worked end-to-end scenarios rather than
//! re-testing any one component's internals (those live in the component's own
//! `#[cfg(test)]` module).
use cued_speech_rt::acoustic_model::SequenceModel;
use cued_speech_rt::config::DecoderConfig;
use cued_speech_rt::corrector::{HomophoneTable, SentenceCorrector};
use cued_speech_rt::decoder::alphabet::Alphabet;
use cued_speech_rt::decoder::lexicon::Lexicon;
use cued_speech_rt::decoder::lm::NgramLm;
use cued_speech_rt::decoder::trie::Trie;
use cued_speech_rt::decoder::CtcDecoder;
use cued_speech_rt::error::Result;
use cued_speech_rt::features::FrameFeatures;
use cued_speech_rt::landmarks::{Landmark, LandmarkTuple};
use cued_speech_rt::window_processor::WINDOW;
use cued_speech_rt::StreamRecognizer;
use ndarray::Array3;
use std::io::Cursor;
use std::path::Path;

/// Feeds a fixed logit row for every frame it sees, turning the acoustic model into a
/// deterministic stand-in so the beam search's behavior can be pinned down exactly.
struct ScriptedModel {
    vocab: usize,
}

impl SequenceModel for ScriptedModel {
    fn load(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
    fn infer(&self, _frames: &[FrameFeatures], t: usize) -> Result<Array3<f32>> {
        // Every timestep strongly favors blank: a silent window.
        let mut out = Array3::<f32>::from_elem((1, t, self.vocab), -10.0);
        for i in 0..t {
            out[[0, i, 0]] = 10.0;
        }
        Ok(out)
    }
    fn vocab_size(&self) -> Option<usize> {
        Some(self.vocab)
    }
    fn last_sequence_length(&self) -> Option<usize> {
        Some(WINDOW)
    }
    fn is_loaded(&self) -> bool {
        true
    }
}

fn origin_tuple() -> LandmarkTuple {
    LandmarkTuple {
        face: vec![Landmark::new(0.0, 0.0, 0.0); 455],
        hand: vec![Landmark::new(0.0, 0.0, 0.0); 21],
        pose: Vec::new(),
    }
}

fn bonjour_decoder() -> CtcDecoder {
    let alphabet = Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\n_\n")).unwrap();
    let lexicon = Lexicon::from_reader(Cursor::new("bonjour\tb o z^ u r\n"), &alphabet, None).unwrap();
    let lm = NgramLm::from_parts(1, vec!["bonjour".to_string()], vec![vec![(vec![], 0, -1.0, 0.0)]]);
    let trie = Trie::build(&lexicon, &alphabet, &lm);
    CtcDecoder::from_parts(alphabet, lexicon, trie, lm, DecoderConfig::default())
}

fn passthrough_corrector() -> SentenceCorrector {
    SentenceCorrector::new(HomophoneTable::default(), NgramLm::from_parts(1, vec![], vec![vec![]]))
}

/// A stream short enough that it never triggers a regular window commit should still
/// flush cleanly and silently on `finish`, producing an empty (not erroring) result -
/// the "stream of <= WINDOW valid frames" boundary case from §8.
#[test]
fn short_degenerate_stream_flushes_empty_on_finish() {
    let model = ScriptedModel { vocab: 6 };
    let decoder = bonjour_decoder();
    let corrector = passthrough_corrector();
    let mut stream = StreamRecognizer::new(&model, &decoder, &corrector);

    // Every frame here is degenerate (zero face width) so feature extraction rejects
    // all of them; nothing should ever commit.
    for _ in 0..30 {
        assert!(stream.push(origin_tuple()).is_none());
    }
    let result = stream.finish();
    assert!(result.phonemes.is_empty());
    assert_eq!(result.french_sentence, "");
    assert_eq!(result.confidence, 0.0);
}

/// Homophone selection end to end (S5): the corrector alone, driven by a real
/// homophones file parsed from JSON lines text and a tiny bigram LM.
#[test]
fn homophone_disambiguation_end_to_end() {
    let homophones_text = "{\"ipa\": \"se\", \"words\": [\"c'est\", \"s'est\", \"ses\", \"ces\"]}\n\
                            {\"ipa\": \"la\", \"words\": [\"la\", \"là\", \"l'a\"]}\n";
    let homophones = HomophoneTable::from_reader(Cursor::new(homophones_text)).unwrap();

    let vocab: Vec<String> = ["c'est", "s'est", "ses", "ces", "la", "là", "l'a"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let unigrams: Vec<(Vec<u32>, u32, f32, f32)> =
        (0..vocab.len()).map(|i| (vec![], i as u32, -2.0, 0.0)).collect();
    let bigrams = vec![(vec![0u32], 4u32, -0.1f32, 0.0f32)];
    let lm = NgramLm::from_parts(2, vocab, vec![unigrams, bigrams]);

    let corrector = SentenceCorrector::new(homophones, lm);
    let words = vec![vec!["s".to_string(), "e".to_string()], vec!["l".to_string(), "a".to_string()]];
    assert_eq!(corrector.correct(&words), "C'est la.");
}

/// A model that deterministically spells "bonjour" (`b o z^ u r`) across the first few
/// timesteps of every window it is asked to score, padded with blank everywhere else.
struct BonjourModel {
    alphabet: Alphabet,
}

impl SequenceModel for BonjourModel {
    fn load(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
    fn infer(&self, _frames: &[FrameFeatures], t: usize) -> Result<Array3<f32>> {
        let v = self.alphabet.len();
        let mut out = Array3::<f32>::from_elem((1, t, v), -10.0);
        let blank = self.alphabet.blank_index();
        for i in 0..t {
            out[[0, i, blank]] = 10.0;
        }
        let path = ["b", "o", "z^", "u", "r"];
        for (i, tok) in path.iter().enumerate() {
            let idx = self.alphabet.token_to_index(tok).unwrap();
            out[[0, i + 1, blank]] = -10.0;
            out[[0, i + 1, idx]] = 10.0;
        }
        Ok(out)
    }
    fn vocab_size(&self) -> Option<usize> {
        Some(self.alphabet.len())
    }
    fn last_sequence_length(&self) -> Option<usize> {
        Some(WINDOW)
    }
    fn is_loaded(&self) -> bool {
        true
    }
}

fn distinct_face_tuple() -> LandmarkTuple {
    let mut tuple = origin_tuple();
    // A spread-out face (and hand) so face_width/hand_span are well clear of the
    // degenerate-span floor; exact coordinates don't matter to this test beyond that.
    for (i, l) in tuple.face.iter_mut().enumerate() {
        *l = Landmark::new(i as f64 * 0.01, (i as f64 * 0.017).sin(), 0.0);
    }
    for (i, l) in tuple.hand.iter_mut().enumerate() {
        *l = Landmark::new(1.0 + i as f64 * 0.01, 1.0 + i as f64 * 0.02, 0.0);
    }
    tuple
}

/// A full window's worth of well-formed frames should commit chunk 0 and decode to
/// "bonjour", exercising feature extraction, windowing, beam search and the
/// passthrough corrector together.
#[test]
fn well_formed_window_decodes_to_bonjour() {
    let decoder = bonjour_decoder();
    let model = BonjourModel { alphabet: Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\n_\n")).unwrap() };
    let corrector = passthrough_corrector();
    let mut stream = StreamRecognizer::new(&model, &decoder, &corrector);

    let tuple = distinct_face_tuple();
    let mut result = None;
    // The feature extractor needs two frames of history before it emits anything, so
    // push two extra frames beyond WINDOW to guarantee a full window of valid features.
    for _ in 0..(WINDOW + 2) {
        if let Some(r) = stream.push(tuple.clone()) {
            result = Some(r);
        }
    }
    let result = result.expect("chunk 0 should have committed once a full window of valid frames accumulated");
    assert_eq!(result.phonemes, vec!["b", "o", "z^", "u", "r"]);
}

fn two_word_decoder() -> CtcDecoder {
    let alphabet = Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\ng\na\n_\n")).unwrap();
    let lexicon = Lexicon::from_reader(
        Cursor::new("bonjour\tb o z^ u r\ngare\tg a r\n"),
        &alphabet,
        None,
    )
    .unwrap();
    let lm = NgramLm::from_parts(
        1,
        vec!["bonjour".to_string(), "gare".to_string()],
        vec![vec![(vec![], 0, -1.0, 0.0), (vec![], 1, -1.0, 0.0)]],
    );
    let trie = Trie::build(&lexicon, &alphabet, &lm);
    CtcDecoder::from_parts(alphabet, lexicon, trie, lm, DecoderConfig::default())
}

/// Spells "bonjour" then "gare" across one window, separated only by ordinary CTC
/// blank frames - no explicit silence token anywhere in the path.
struct TwoWordModel {
    alphabet: Alphabet,
}

impl SequenceModel for TwoWordModel {
    fn load(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
    fn infer(&self, _frames: &[FrameFeatures], t: usize) -> Result<Array3<f32>> {
        let v = self.alphabet.len();
        let mut out = Array3::<f32>::from_elem((1, t, v), -10.0);
        let blank = self.alphabet.blank_index();
        for i in 0..t {
            out[[0, i, blank]] = 10.0;
        }
        let path: [Option<&str>; 11] = [
            Some("b"),
            Some("o"),
            Some("z^"),
            Some("u"),
            Some("r"),
            None,
            None,
            Some("g"),
            Some("a"),
            Some("r"),
            None,
        ];
        for (i, tok) in path.iter().enumerate() {
            if let Some(tok) = tok {
                let idx = self.alphabet.token_to_index(tok).unwrap();
                out[[0, i, blank]] = -10.0;
                out[[0, i, idx]] = 10.0;
            }
        }
        Ok(out)
    }
    fn vocab_size(&self) -> Option<usize> {
        Some(self.alphabet.len())
    }
    fn last_sequence_length(&self) -> Option<usize> {
        Some(WINDOW)
    }
    fn is_loaded(&self) -> bool {
        true
    }
}

/// A multi-word utterance separated only by blank frames (no mid-utterance silence
/// token) must still segment into both words end to end through `StreamRecognizer`.
/// Regression test for the beam search's blank arm missing the accepting-node/
/// `complete_word` check that the silence arm already had.
#[test]
fn multi_word_stream_segments_on_blank_only_separator() {
    let decoder = two_word_decoder();
    let model = TwoWordModel {
        alphabet: Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\ng\na\n_\n")).unwrap(),
    };
    let corrector = passthrough_corrector();
    let mut stream = StreamRecognizer::new(&model, &decoder, &corrector);

    let tuple = distinct_face_tuple();
    let mut result = None;
    for _ in 0..(WINDOW + 2) {
        if let Some(r) = stream.push(tuple.clone()) {
            result = Some(r);
        }
    }
    let result = result.expect("chunk 0 should have committed");
    assert_eq!(result.phonemes, vec!["b", "o", "z^", "u", "r", "g", "a", "r"]);
}

/// A stream that accumulates only silence (blank everywhere) should decode to an empty
/// phoneme sequence and an empty corrected sentence, never panicking on the empty
/// `word_phonemes` the corrector receives.
#[test]
fn all_silence_stream_decodes_to_empty_sentence() {
    let model = ScriptedModel { vocab: 6 };
    let decoder = bonjour_decoder();
    let corrector = passthrough_corrector();
    let mut stream = StreamRecognizer::new(&model, &decoder, &corrector);

    let tuple = origin_tuple();
    let mut committed = false;
    for _ in 0..(WINDOW + 30) {
        if stream.push(tuple.clone()).is_some() {
            committed = true;
        }
    }
    // Every pushed frame is degenerate, so no window should ever have committed.
    assert!(!committed);
    let result = stream.finish();
    assert!(result.phonemes.is_empty());
    assert_eq!(result.french_sentence, "");
}
