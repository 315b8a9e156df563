//! Lexicon-constrained CTC decoder facade (component E).
//!
//! [`CtcDecoder`] ties the token alphabet, pronunciation lexicon, arena trie and
//! n-gram language model together behind one `decode` call. It is read-only and
//! `Send + Sync` after [`CtcDecoder::initialize`] returns, so one instance is safely
//! shared across concurrent streams. A decode attempted before initialization, or
//! against an empty logit matrix, is never an `Err`: it yields an empty hypothesis
//! list and records the reason in a thread-local diagnostic slot retrievable via
//! [`CtcDecoder::last_error`].
pub mod alphabet;
pub mod beam;
pub mod lexicon;
pub mod lm;
pub mod trie;

use crate::config::DecoderConfig;
use crate::error::Result;
use crate::types::Hypothesis;
use alphabet::Alphabet;
use lexicon::Lexicon;
use lm::{LanguageModel, NgramLm};
use ndarray::ArrayView2;
use std::cell::RefCell;
use trie::Trie;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(message: impl Into<String>) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message.into()));
}

/// Fully initialized, immutable decoder state.
pub struct CtcDecoder {
    alphabet: Alphabet,
    lexicon: Lexicon,
    trie: Trie,
    lm: NgramLm,
    config: DecoderConfig,
}

impl CtcDecoder {
    /// Loads the token alphabet, lexicon and LM from the paths in `config`, builds
    /// the trie over the lexicon's accepted spellings, and returns the ready-to-use
    /// decoder. Every failure here is fatal and propagates as [`crate::error::CoreError`].
    pub fn initialize(config: DecoderConfig) -> Result<Self> {
        let alphabet = Alphabet::load_with_blank_token(&config.tokens_path, &config.blank_token)?;
        let lexicon = Lexicon::load(&config.lexicon_path, &alphabet, Some(&config.unk_word))?;
        let lm = NgramLm::load(&config.lm_path, config.lm_dict_path.as_deref())?;
        let trie = Trie::build(&lexicon, &alphabet, &lm);
        Ok(Self {
            alphabet,
            lexicon,
            trie,
            lm,
            config,
        })
    }

    /// Assembles a decoder from already-loaded parts, bypassing file I/O. Used by
    /// tests and by callers (e.g. the pipeline facade's own test suite) that build a
    /// trivial decoder in-process rather than round-tripping through files.
    pub fn from_parts(alphabet: Alphabet, lexicon: Lexicon, trie: Trie, lm: NgramLm, config: DecoderConfig) -> Self {
        Self {
            alphabet,
            lexicon,
            trie,
            lm,
            config,
        }
    }

    /// Runs the beam search over one window's `[T, V]` logit matrix. Returns an empty
    /// list (never an error) if `logits` is empty along either axis or its vocabulary
    /// dimension doesn't match the alphabet - the caller (the window processor) treats
    /// an empty result as "nothing committed this window", not as a fatal condition.
    pub fn decode(&self, logits: ArrayView2<f32>) -> Vec<Hypothesis> {
        if logits.shape()[0] == 0 {
            set_last_error("decode called with zero timesteps");
            return Vec::new();
        }
        if logits.shape()[1] != self.alphabet.len() {
            set_last_error(format!(
                "logit vocab size {} does not match alphabet size {}",
                logits.shape()[1],
                self.alphabet.len()
            ));
            return Vec::new();
        }
        beam::search(
            logits,
            &self.alphabet,
            &self.lexicon,
            &self.trie,
            &self.lm,
            &self.config,
        )
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The most recent non-fatal diagnostic recorded on this thread, if any.
    pub fn last_error() -> Option<String> {
        LAST_ERROR.with(|slot| slot.borrow().clone())
    }
}
