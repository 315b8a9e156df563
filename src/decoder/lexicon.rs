//! Pronunciation lexicon loading.
//!
//! Each line is `word TAB|SPACE token token ...`. A spelling referencing an unknown
//! token is rejected; if every spelling for a word is rejected the word is dropped
//! entirely (it is still indexed if at least one spelling survives).
use crate::decoder::alphabet::Alphabet;
use crate::error::{CoreError, Result};
use std::io::BufRead;

/// One accepted word, alongside the index it will carry in the trie / LM vocabulary.
#[derive(Debug, Clone)]
pub struct LexiconWord {
    pub word: String,
    pub spellings: Vec<Vec<usize>>,
}

/// Ordered list of accepted words (insertion order becomes the word index space) plus
/// the optional out-of-vocabulary word, if configured.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: Vec<LexiconWord>,
    unk_word_index: Option<usize>,
}

impl Lexicon {
    pub fn load(
        path: impl AsRef<std::path::Path>,
        alphabet: &Alphabet,
        unk_word: Option<&str>,
    ) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            CoreError::Config(format!("failed to open lexicon file {}: {e}", path.as_ref().display()))
        })?;
        Self::from_reader(std::io::BufReader::new(file), alphabet, unk_word)
    }

    pub fn from_reader(
        reader: impl BufRead,
        alphabet: &Alphabet,
        unk_word: Option<&str>,
    ) -> Result<Self> {
        let mut words: Vec<LexiconWord> = Vec::new();
        let mut index_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

        for line in reader.lines() {
            let line = line.map_err(|e| CoreError::Config(format!("reading lexicon file: {e}")))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.splitn(2, |c: char| c == '\t' || c.is_whitespace());
            let Some(word) = parts.next() else {
                continue;
            };
            let Some(rest) = parts.next() else {
                continue;
            };
            let mut spelling = Vec::new();
            let mut rejected = false;
            for token in rest.split_whitespace() {
                match alphabet.token_to_index(token) {
                    Some(idx) => spelling.push(idx),
                    None => {
                        rejected = true;
                        break;
                    }
                }
            }
            if rejected || spelling.is_empty() {
                continue;
            }

            match index_of.get(word) {
                Some(&i) => words[i].spellings.push(spelling),
                None => {
                    index_of.insert(word.to_string(), words.len());
                    words.push(LexiconWord {
                        word: word.to_string(),
                        spellings: vec![spelling],
                    });
                }
            }
        }

        let unk_word_index = unk_word.and_then(|w| index_of.get(w).copied()).or_else(|| {
            unk_word.map(|w| {
                let i = words.len();
                words.push(LexiconWord {
                    word: w.to_string(),
                    spellings: Vec::new(),
                });
                i
            })
        });

        Ok(Self {
            words,
            unk_word_index,
        })
    }

    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(|w| w.word.as_str())
    }

    pub fn words(&self) -> &[LexiconWord] {
        &self.words
    }

    pub fn unk_word_index(&self) -> Option<usize> {
        self.unk_word_index
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
