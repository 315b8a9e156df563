//! Token alphabet loading.
//!
//! A plain-text token file, one entry per line, loaded into bidirectional
//! token<->index maps with the blank token (configurable via
//! [`crate::config::DecoderConfig::blank_token`], `<BLANK>` by default) guaranteed to
//! sit at index 0 and the other special tokens injected near the front if the source
//! file doesn't already carry them - mirroring the way a line-oriented corpus file is
//! turned into an in-memory lookup via a `BufRead` abstraction, testable without a
//! real file on disk.
use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::io::BufRead;

pub const BLANK_TOKEN: &str = "<BLANK>";
pub const UNK_TOKEN: &str = "<UNK>";
pub const SOS_TOKEN: &str = "<SOS>";
pub const EOS_TOKEN: &str = "<EOS>";
pub const PAD_TOKEN: &str = "<PAD>";

/// The `<UNK>, <SOS>, <EOS>, <PAD>` specials (blank is handled separately, since its
/// text is configurable via [`crate::config::DecoderConfig::blank_token`]), in the
/// order they are injected at the front of the alphabet if missing from the source
/// file.
const SPECIALS: [&str; 4] = [UNK_TOKEN, SOS_TOKEN, EOS_TOKEN, PAD_TOKEN];

/// Bidirectional token <-> index table. `<BLANK>` is always index 0.
#[derive(Debug, Clone)]
pub struct Alphabet {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Alphabet {
    /// Loads using the default blank spelling (`BLANK_TOKEN`, `"<BLANK>"`). Most
    /// callers reach this through [`crate::config::DecoderConfig::blank_token`] and
    /// [`Alphabet::load_with_blank_token`] instead.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::load_with_blank_token(path, BLANK_TOKEN)
    }

    /// As [`Alphabet::load`], but with an explicit blank-token spelling (typically
    /// [`crate::config::DecoderConfig::blank_token`]).
    pub fn load_with_blank_token(path: impl AsRef<std::path::Path>, blank_token: &str) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            CoreError::Config(format!("failed to open token file {}: {e}", path.as_ref().display()))
        })?;
        Self::from_reader_with_blank_token(std::io::BufReader::new(file), blank_token)
    }

    /// Parses from any `BufRead`, separating file I/O from parsing so the logic is
    /// testable with an in-memory cursor. Uses the default blank spelling; see
    /// [`Alphabet::from_reader_with_blank_token`] for a configurable one.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        Self::from_reader_with_blank_token(reader, BLANK_TOKEN)
    }

    /// As [`Alphabet::from_reader`], but `blank_token` names the string guaranteed to
    /// occupy index 0 rather than the hardcoded `"<BLANK>"`.
    pub fn from_reader_with_blank_token(reader: impl BufRead, blank_token: &str) -> Result<Self> {
        let mut tokens: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for line in reader.lines() {
            let line = line.map_err(|e| CoreError::Config(format!("reading token file: {e}")))?;
            let field_end = line
                .find([',', ';', '\t', '\r'])
                .unwrap_or(line.len());
            let token = line[..field_end].trim();
            if token.is_empty() {
                continue;
            }
            if seen.insert(token.to_string()) {
                tokens.push(token.to_string());
            }
        }

        // Inject missing specials at the front, preserving SPECIALS order.
        let mut prefix = Vec::new();
        for special in SPECIALS {
            if !seen.contains(special) {
                prefix.push(special.to_string());
            }
        }
        let mut full = prefix;
        full.extend(tokens);

        // Guarantee the blank token occupies index 0 even if it was present but not first.
        if let Some(pos) = full.iter().position(|t| t == blank_token) {
            if pos != 0 {
                let blank = full.remove(pos);
                full.insert(0, blank);
            }
        } else {
            full.insert(0, blank_token.to_string());
        }

        let index = full
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Ok(Self { tokens: full, index })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token_to_index(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn index_to_token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(|s| s.as_str())
    }

    pub fn blank_index(&self) -> usize {
        0
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}
