//! Decoder and pipeline configuration (component G).
//!
//! `DecoderConfig` is deserializable from a JSON config file via `serde`, the way a
//! real deployment would load it alongside `clap`-parsed CLI flags; its `Default`
//! carries the same numeric defaults a lexicon-constrained CTC decoder is typically
//! tuned around.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub lexicon_path: PathBuf,
    pub tokens_path: PathBuf,
    pub lm_path: PathBuf,
    pub lm_dict_path: Option<PathBuf>,

    /// Number of hypotheses returned per decode call.
    #[serde(default = "default_nbest")]
    pub nbest: usize,
    /// Max number of hypotheses retained after each timestep.
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,
    /// Max number of candidate tokens considered per hypothesis per timestep.
    /// Negative (the default) means "no limit beyond `beam_threshold`".
    #[serde(default = "default_beam_size_token")]
    pub beam_size_token: i64,
    /// Tokens whose log-probability trails the timestep's best by more than this are
    /// pruned before expansion.
    #[serde(default = "default_beam_threshold")]
    pub beam_threshold: f32,
    /// Weight applied to the language model's log-probability contribution.
    #[serde(default = "default_lm_weight")]
    pub lm_weight: f32,
    /// Flat bonus (or penalty, if negative) applied per completed word.
    #[serde(default)]
    pub word_score: f32,
    /// Additional penalty applied when the completed word is the out-of-vocabulary
    /// placeholder. Defaults to negative infinity: the unk word is never preferred
    /// unless a lexicon entry for it carries a real spelling.
    #[serde(default = "default_unk_score")]
    pub unk_score: f32,
    /// Bonus/penalty applied per emitted silence token.
    #[serde(default)]
    pub sil_score: f32,
    /// When two hypotheses converge to the same state, `true` sums their
    /// probabilities (log-add) instead of keeping only the higher-scoring one.
    #[serde(default)]
    pub log_add: bool,
    #[serde(default = "default_blank_token")]
    pub blank_token: String,
    #[serde(default = "default_sil_token")]
    pub sil_token: String,
    #[serde(default = "default_unk_word")]
    pub unk_word: String,
}

fn default_nbest() -> usize {
    1
}
fn default_beam_size() -> usize {
    40
}
fn default_beam_size_token() -> i64 {
    -1
}
fn default_beam_threshold() -> f32 {
    50.0
}
fn default_lm_weight() -> f32 {
    3.23
}
fn default_unk_score() -> f32 {
    f32::NEG_INFINITY
}
fn default_blank_token() -> String {
    "<BLANK>".to_string()
}
fn default_sil_token() -> String {
    "_".to_string()
}
fn default_unk_word() -> String {
    "<UNK>".to_string()
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            lexicon_path: PathBuf::new(),
            tokens_path: PathBuf::new(),
            lm_path: PathBuf::new(),
            lm_dict_path: None,
            nbest: default_nbest(),
            beam_size: default_beam_size(),
            beam_size_token: default_beam_size_token(),
            beam_threshold: default_beam_threshold(),
            lm_weight: default_lm_weight(),
            word_score: 0.0,
            unk_score: default_unk_score(),
            sil_score: 0.0,
            log_add: false,
            blank_token: default_blank_token(),
            sil_token: default_sil_token(),
            unk_word: default_unk_word(),
        }
    }
}

impl DecoderConfig {
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::CoreError::Config(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| crate::error::CoreError::Config(format!("failed to parse config file: {e}")))
    }
}

/// Top-level pipeline configuration: where the corrector's homophone table and French
/// word LM live, on top of the decoder config above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub decoder: DecoderConfig,
    pub homophones_path: PathBuf,
    pub corrector_lm_path: PathBuf,
    pub corrector_lm_dict_path: Option<PathBuf>,
    pub acoustic_model_path: PathBuf,
    /// Corrector beam width over the Cartesian product of homophone classes.
    #[serde(default = "default_corrector_beam_width")]
    pub corrector_beam_width: usize,
}

fn default_corrector_beam_width() -> usize {
    20
}
