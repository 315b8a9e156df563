//! Lexicon-constrained CTC beam search.
//!
//! Standard CTC beam decoding (blank handling, consecutive-repeat collapsing) folded
//! together with the [`Trie`]'s word-boundary constraint and an n-gram [`LanguageModel`]
//! scoring completed words. The knob set (`beam_size`, `beam_size_token`,
//! `beam_threshold`, `lm_weight`, `word_score`, `unk_score`, `sil_score`, `log_add`)
//! follows the shape of the lexicon-based CTC decoders used across the wav2letter/
//! flashlight family: separate beam widths for the hypothesis pool and the per-step
//! token fan-out, plus a relative-threshold prune alongside the absolute width cap.
use crate::config::DecoderConfig;
use crate::decoder::alphabet::Alphabet;
use crate::decoder::lexicon::Lexicon;
use crate::decoder::lm::{LanguageModel, LmState};
use crate::decoder::trie::{self, Trie};
use crate::types::Hypothesis;
use ndarray::ArrayView2;
use std::collections::HashMap;

/// Sentinel for "no token emitted yet at this position" - distinct from any valid
/// token index, used to track CTC repeat-collapsing across timesteps.
const NONE_TOKEN: usize = usize::MAX;

#[derive(Clone)]
struct BeamHyp {
    node: usize,
    last_token: usize,
    lm_state: LmState,
    acoustic_score: f32,
    lm_score: f32,
    word_score: f32,
    words: Vec<(usize, usize, usize)>, // (word_index, start_timestep, end_timestep)
    tokens: Vec<(usize, usize)>,       // (token_index, timestep), since the last word boundary
    all_tokens: Vec<(usize, usize)>,
    /// `tokens` snapshotted at each word completion, before it is cleared - the
    /// phoneme span the lexicon attributed to that word.
    word_tokens: Vec<Vec<(usize, usize)>>,
}

impl BeamHyp {
    fn total_score(&self, cfg: &DecoderConfig) -> f32 {
        self.acoustic_score + cfg.lm_weight * self.lm_score + self.word_score
    }

    fn state_key(&self) -> (usize, usize, Vec<u32>) {
        (self.node, self.last_token, self.lm_state.context().to_vec())
    }
}

fn log_softmax_row(row: &[f32]) -> Vec<f32> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = row.iter().map(|&v| (v - max).exp()).sum();
    let log_sum = sum.ln() + max;
    row.iter().map(|&v| v - log_sum).collect()
}

fn log_add(a: f32, b: f32) -> f32 {
    if a.is_infinite() && a < 0.0 {
        return b;
    }
    if b.is_infinite() && b < 0.0 {
        return a;
    }
    let hi = a.max(b);
    let lo = a.min(b);
    hi + (lo - hi).exp().ln_1p()
}

/// Runs the beam search over one window's `[T, V]` logit matrix, returning up to
/// `cfg.nbest` hypotheses sorted best-first. `logits` must have `V == alphabet.len()`.
pub fn search(
    logits: ArrayView2<f32>,
    alphabet: &Alphabet,
    lexicon: &Lexicon,
    tree: &Trie,
    lm: &dyn LanguageModel,
    cfg: &DecoderConfig,
) -> Vec<Hypothesis> {
    let blank = alphabet.blank_index();
    let sil = alphabet.token_to_index(&cfg.sil_token);
    let unk_word_index = lexicon.unk_word_index();

    let start = BeamHyp {
        node: trie::ROOT,
        last_token: NONE_TOKEN,
        lm_state: lm.start_state(),
        acoustic_score: 0.0,
        lm_score: 0.0,
        word_score: 0.0,
        words: Vec::new(),
        tokens: Vec::new(),
        all_tokens: Vec::new(),
        word_tokens: Vec::new(),
    };
    let mut beams: Vec<BeamHyp> = vec![start];

    let t_total = logits.shape()[0];
    let vocab = logits.shape()[1];
    for t in 0..t_total {
        let row: Vec<f32> = logits.row(t).to_vec();
        let log_probs = log_softmax_row(&row);

        let mut candidate_tokens: Vec<usize> = (0..vocab).collect();
        if cfg.beam_size_token > 0 {
            candidate_tokens.sort_by(|&a, &b| log_probs[b].partial_cmp(&log_probs[a]).unwrap());
            candidate_tokens.truncate(cfg.beam_size_token as usize);
        }
        let best_log_prob = candidate_tokens
            .iter()
            .map(|&c| log_probs[c])
            .fold(f32::NEG_INFINITY, f32::max);

        let mut next: HashMap<(usize, usize, Vec<u32>), BeamHyp> = HashMap::new();

        for hyp in &beams {
            for &token in &candidate_tokens {
                let lp = log_probs[token];
                if best_log_prob - lp > cfg.beam_threshold {
                    continue;
                }

                if token == blank {
                    let mut new_hyp = hyp.clone();
                    new_hyp.acoustic_score += lp;
                    new_hyp.last_token = NONE_TOKEN;
                    // Blank is the ordinary inter-word separator (far more common than an
                    // explicit silence token), so a word completes here exactly as it does
                    // on silence: if the trie sits on an accepting node, resolve the best
                    // word there, advance the LM and reset to the root. Unlike silence,
                    // landing on a non-accepting node is not a dead end - blank also occurs
                    // freely *inside* a word's spelling (between per-phoneme frame spans),
                    // so the hypothesis simply stays put and keeps extending the same word.
                    if !tree.is_root(hyp.node) {
                        if let Some(&(word_index, _)) = tree
                            .accepting(hyp.node)
                            .iter()
                            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                        {
                            complete_word(&mut new_hyp, word_index, lexicon, lm, unk_word_index, cfg, t);
                        }
                    }
                    merge(&mut next, new_hyp, cfg.log_add);
                    continue;
                }

                if token == hyp.last_token {
                    // Repeated symbol with no intervening blank: CTC collapse, no move.
                    let mut new_hyp = hyp.clone();
                    new_hyp.acoustic_score += lp;
                    merge(&mut next, new_hyp, cfg.log_add);
                    continue;
                }

                if Some(token) == sil {
                    let mut new_hyp = hyp.clone();
                    new_hyp.acoustic_score += lp + cfg.sil_score;
                    new_hyp.last_token = token;
                    if !tree.is_root(hyp.node) {
                        if let Some(&(word_index, _)) = tree
                            .accepting(hyp.node)
                            .iter()
                            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                        {
                            complete_word(&mut new_hyp, word_index, lexicon, lm, unk_word_index, cfg, t);
                        } else {
                            continue; // mid-word silence with no accepting node: dead end
                        }
                    }
                    merge(&mut next, new_hyp, cfg.log_add);
                    continue;
                }

                let Some(child) = tree.child(hyp.node, token) else {
                    continue; // token doesn't extend any lexicon spelling from here
                };
                let mut new_hyp = hyp.clone();
                new_hyp.acoustic_score += lp;
                new_hyp.last_token = token;
                new_hyp.node = child;
                new_hyp.tokens.push((token, t));
                new_hyp.all_tokens.push((token, t));
                merge(&mut next, new_hyp, cfg.log_add);
            }
        }

        beams = prune(next.into_values().collect(), cfg);
        if beams.is_empty() {
            break;
        }
    }

    // Stream ended: allow a final word completion for hypotheses sitting on an
    // accepting node, the way a trailing blank/silence would at runtime.
    for hyp in &mut beams {
        if !tree.is_root(hyp.node) {
            if let Some(&(word_index, _)) = tree
                .accepting(hyp.node)
                .iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            {
                complete_word(hyp, word_index, lexicon, lm, unk_word_index, cfg, t_total);
            }
        }
    }

    beams.sort_by(|a, b| b.total_score(cfg).partial_cmp(&a.total_score(cfg)).unwrap());
    beams.truncate(cfg.nbest.max(1));

    beams
        .into_iter()
        .map(|hyp| to_hypothesis(hyp, alphabet, lexicon, cfg))
        .collect()
}

fn complete_word(
    hyp: &mut BeamHyp,
    word_index: usize,
    lexicon: &Lexicon,
    lm: &dyn LanguageModel,
    unk_word_index: Option<usize>,
    cfg: &DecoderConfig,
    timestep: usize,
) {
    let (next_state, log_prob) = lm.score(&hyp.lm_state, word_index as u32);
    hyp.lm_state = next_state;
    hyp.lm_score += log_prob;
    hyp.word_score += cfg.word_score;
    if Some(word_index) == unk_word_index {
        hyp.word_score += cfg.unk_score;
    }
    let start = hyp.tokens.first().map(|&(_, ts)| ts).unwrap_or(timestep);
    let end = hyp.tokens.last().map(|&(_, ts)| ts).unwrap_or(timestep);
    hyp.words.push((word_index, start, end));
    hyp.word_tokens.push(std::mem::take(&mut hyp.tokens));
    hyp.node = trie::ROOT;
    let _ = lexicon;
}

fn merge(map: &mut HashMap<(usize, usize, Vec<u32>), BeamHyp>, hyp: BeamHyp, combine_log_add: bool) {
    let key = hyp.state_key();
    match map.get_mut(&key) {
        Some(existing) => {
            // Compare on acoustic+lm score only: word_score differences at an
            // identical state are impossible (both paths completed the same words).
            let existing_score = existing.acoustic_score + existing.lm_score;
            let new_score = hyp.acoustic_score + hyp.lm_score;
            if combine_log_add {
                existing.acoustic_score = log_add(existing.acoustic_score, hyp.acoustic_score);
            } else if new_score > existing_score {
                *existing = hyp;
            }
        }
        None => {
            map.insert(key, hyp);
        }
    }
}

fn prune(mut hyps: Vec<BeamHyp>, cfg: &DecoderConfig) -> Vec<BeamHyp> {
    hyps.sort_by(|a, b| b.total_score(cfg).partial_cmp(&a.total_score(cfg)).unwrap());
    hyps.truncate(cfg.beam_size.max(1));
    hyps
}

fn to_hypothesis(hyp: BeamHyp, alphabet: &Alphabet, lexicon: &Lexicon, cfg: &DecoderConfig) -> Hypothesis {
    let mut tokens = Vec::new();
    let mut timesteps = Vec::new();
    for &(token, t) in &hyp.all_tokens {
        if let Some(name) = alphabet.index_to_token(token) {
            if name != cfg.sil_token {
                tokens.push(name.to_string());
                timesteps.push(t);
            }
        }
    }
    let words = hyp
        .words
        .iter()
        .filter_map(|&(w, _, _)| lexicon.word(w).map(|s| s.to_string()))
        .collect();
    let word_phonemes = hyp
        .word_tokens
        .iter()
        .map(|span| {
            span.iter()
                .filter_map(|&(token, _)| alphabet.index_to_token(token))
                .filter(|name| *name != cfg.sil_token)
                .map(|name| name.to_string())
                .collect()
        })
        .collect();
    Hypothesis {
        tokens,
        words,
        score: hyp.total_score(cfg),
        timesteps,
        word_phonemes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::lm::NgramLm;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::io::Cursor;

    /// §8's testable property: applying `log_softmax` to an already-normalized row is
    /// idempotent up to numerical noise.
    #[test]
    fn log_softmax_is_idempotent() {
        let row = [2.0f32, -1.0, 0.5, 0.5, -3.0];
        let once = log_softmax_row(&row);
        let twice = log_softmax_row(&once);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    fn bonjour_alphabet() -> Alphabet {
        Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\n_\n")).unwrap()
    }

    fn unigram_lm(vocab: Vec<String>) -> NgramLm {
        let unigrams: Vec<(Vec<u32>, u32, f32, f32)> = vocab
            .iter()
            .enumerate()
            .map(|(i, _)| (vec![], i as u32, -1.0, 0.0))
            .collect();
        NgramLm::from_parts(1, vocab, vec![unigrams])
    }

    #[test]
    fn decodes_single_clean_path_to_one_word() {
        let alphabet = bonjour_alphabet();
        let lexicon =
            Lexicon::from_reader(Cursor::new("bonjour\tb o z^ u r\n"), &alphabet, None).unwrap();
        let lm = unigram_lm(vec!["bonjour".to_string()]);
        let tree = Trie::build(&lexicon, &alphabet, &lm);

        let path = ["b", "o", "z^", "u", "r"];
        let t = path.len() + 2; // leading blank, trailing blank
        let v = alphabet.len();
        let mut logits = Array2::<f32>::from_elem((t, v), -10.0);
        logits[[0, alphabet.blank_index()]] = 10.0;
        for (i, tok) in path.iter().enumerate() {
            logits[[i + 1, alphabet.token_to_index(tok).unwrap()]] = 10.0;
        }
        logits[[t - 1, alphabet.blank_index()]] = 10.0;

        let cfg = DecoderConfig::default();
        let hyps = search(logits.view(), &alphabet, &lexicon, &tree, &lm, &cfg);
        assert!(!hyps.is_empty());
        assert_eq!(hyps[0].words, vec!["bonjour".to_string()]);
        assert_eq!(hyps[0].word_phonemes, vec![vec!["b", "o", "z^", "u", "r"]]);
    }

    #[test]
    fn repeated_frames_collapse_to_one_token() {
        let alphabet = bonjour_alphabet();
        let lexicon =
            Lexicon::from_reader(Cursor::new("bonjour\tb o z^ u r\n"), &alphabet, None).unwrap();
        let lm = unigram_lm(vec!["bonjour".to_string()]);
        let tree = Trie::build(&lexicon, &alphabet, &lm);

        // "b" held for two consecutive frames before moving on: should collapse.
        let path = ["b", "b", "o", "z^", "u", "r"];
        let t = path.len() + 2;
        let v = alphabet.len();
        let mut logits = Array2::<f32>::from_elem((t, v), -10.0);
        logits[[0, alphabet.blank_index()]] = 10.0;
        for (i, tok) in path.iter().enumerate() {
            logits[[i + 1, alphabet.token_to_index(tok).unwrap()]] = 10.0;
        }
        logits[[t - 1, alphabet.blank_index()]] = 10.0;

        let cfg = DecoderConfig::default();
        let hyps = search(logits.view(), &alphabet, &lexicon, &tree, &lm, &cfg);
        assert_eq!(hyps[0].words, vec!["bonjour".to_string()]);
    }

    /// Two words separated only by ordinary CTC blank frames (no explicit silence
    /// token anywhere in the path) must still segment into two completed words. This
    /// exercises the blank arm's own accepting-node/`complete_word` check: without it
    /// the beam would keep extending "bonjour"'s trie node into "gare"'s prefix and
    /// never complete either word mid-stream.
    #[test]
    fn blank_only_separator_segments_two_words() {
        let alphabet = Alphabet::from_reader(Cursor::new("b\no\nz^\nu\nr\ng\na\n_\n")).unwrap();
        let lexicon = Lexicon::from_reader(
            Cursor::new("bonjour\tb o z^ u r\ngare\tg a r\n"),
            &alphabet,
            None,
        )
        .unwrap();
        let lm = unigram_lm(vec!["bonjour".to_string(), "gare".to_string()]);
        let tree = Trie::build(&lexicon, &alphabet, &lm);

        // blank, b o z^ u r, blank blank, g a r, blank
        let path = [
            None,
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
        let t = path.len();
        let v = alphabet.len();
        let mut logits = Array2::<f32>::from_elem((t, v), -10.0);
        for (i, tok) in path.iter().enumerate() {
            let idx = match tok {
                Some(tok) => alphabet.token_to_index(tok).unwrap(),
                None => alphabet.blank_index(),
            };
            logits[[i, idx]] = 10.0;
        }

        let cfg = DecoderConfig::default();
        let hyps = search(logits.view(), &alphabet, &lexicon, &tree, &lm, &cfg);
        assert!(!hyps.is_empty());
        assert_eq!(hyps[0].words, vec!["bonjour".to_string(), "gare".to_string()]);
        assert_eq!(
            hyps[0].word_phonemes,
            vec![vec!["b", "o", "z^", "u", "r"], vec!["g", "a", "r"]]
        );
    }
}
