//! N-gram language model.
//!
//! No concrete LM backend is assumed, so this module defines a compact binary n-gram
//! format of our own and a [`NgramLm`] reader for it, memory-mapped via `memmap2` to
//! avoid copying a large model file onto the heap. The same reader and
//! [`LanguageModel`] trait serve both the CTC decoder's word LM and the corrector's
//! French word LM - two independent instances over two independent files, never
//! shared.
//!
//! # Binary format
//!
//! ```text
//! magic:       u32 = 0x474d_4e31 ("NMG1" as little-endian bytes, offset)
//! order:       u32 — highest n-gram order present
//! vocab_mode:  u8  — 0 = vocabulary embedded below, 1 = vocabulary supplied externally
//! [if vocab_mode == 0]
//!   vocab_count: u32
//!   repeated vocab_count times: len:u32, utf8 bytes (word, in index order)
//! for order_n in 1..=order:
//!   record_count: u32
//!   repeated record_count times:
//!     context_hash: u64   — hash of the (order_n - 1)-word context (0 for unigrams)
//!     word_index:   u32
//!     log_prob:     f32   — natural-log probability of word given context
//!     backoff:      f32   — backoff weight associated with this context
//! ```
//!
//! Records within an order are not required to be sorted; the reader indexes them
//! into an in-memory hash map at load time (simplicity over memory-mapped zero-copy
//! lookup, since the binary format's only job here is to avoid re-parsing a text
//! corpus on every load, not to avoid a hash map).
use crate::error::{CoreError, Result};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

const MAGIC: u32 = 0x474d_4e31;
/// Fallback log-probability for a word whose n-gram (at every order down to and
/// including the unigram) is absent from the model - keeps scoring total rather than
/// panicking on out-of-vocabulary lookups.
const OOV_LOG_PROB: f32 = -100.0;

/// Opaque LM context, carried through scoring. Immutable once created; holds the most
/// recent `order - 1` word indices (fewer at the start of a sequence).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LmState {
    context: Vec<u32>,
}

impl LmState {
    /// The most recent context words, oldest first. Exposed so callers (the beam
    /// search) can use it as part of a hash-map key without reaching into the LM.
    pub fn context(&self) -> &[u32] {
        &self.context
    }
}

fn context_hash(context: &[u32]) -> u64 {
    // FNV-1a, folding in the length so contexts of different order never collide on
    // an all-zero or otherwise coincidentally-equal prefix.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &word in context {
        for byte in word.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash ^= context.len() as u64;
    hash
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    log_prob: f32,
    backoff: f32,
}

/// Scoring contract any n-gram LM backend implements: advance `state` by `word`,
/// returning the next state and the log-probability increment.
pub trait LanguageModel {
    fn start_state(&self) -> LmState;
    fn score(&self, state: &LmState, word: u32) -> (LmState, f32);
    fn vocab(&self) -> &[String];
    fn word_index(&self, word: &str) -> Option<u32>;
}

/// In-memory n-gram LM loaded from the binary format documented above.
pub struct NgramLm {
    order: usize,
    vocab: Vec<String>,
    word_to_index: HashMap<String, u32>,
    /// `tables[n]` holds the order-(n+1) entries: key is `(context_hash, word_index)`.
    tables: Vec<HashMap<(u64, u32), Entry>>,
    /// Backoff weight for a context, keyed by the context's own hash, independent of
    /// which word follows it.
    backoffs: Vec<HashMap<u64, f32>>,
    _mmap: Option<Mmap>,
}

impl NgramLm {
    pub fn load(path: impl AsRef<Path>, external_vocab: Option<&Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| CoreError::Config(format!("opening LM file {}: {e}", path.as_ref().display())))?;
        // SAFETY: the mapped file is treated as read-only for the lifetime of this
        // struct and is never concurrently truncated by this process.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| CoreError::Config(format!("mmap LM file: {e}")))?
        };
        let mut lm = Self::parse(&mmap)?;
        if let Some(dict_path) = external_vocab {
            lm.vocab = read_vocab_file(dict_path)?;
            lm.word_to_index = lm
                .vocab
                .iter()
                .enumerate()
                .map(|(i, w)| (w.clone(), i as u32))
                .collect();
        }
        lm._mmap = Some(mmap);
        Ok(lm)
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let magic = cursor.read_u32()?;
        if magic != MAGIC {
            return Err(CoreError::Config("LM file has bad magic number".to_string()));
        }
        let order = cursor.read_u32()? as usize;
        let vocab_mode = cursor.read_u8()?;
        let mut vocab = Vec::new();
        if vocab_mode == 0 {
            let count = cursor.read_u32()?;
            for _ in 0..count {
                vocab.push(cursor.read_string()?);
            }
        }
        let mut tables = Vec::with_capacity(order);
        let mut backoffs = Vec::with_capacity(order);
        for _ in 0..order {
            let count = cursor.read_u32()?;
            let mut table = HashMap::with_capacity(count as usize);
            let mut bo = HashMap::new();
            for _ in 0..count {
                let context_hash = cursor.read_u64()?;
                let word_index = cursor.read_u32()?;
                let log_prob = cursor.read_f32()?;
                let backoff = cursor.read_f32()?;
                table.insert((context_hash, word_index), Entry { log_prob, backoff });
                bo.insert(context_hash, backoff);
            }
            tables.push(table);
            backoffs.push(bo);
        }
        let word_to_index = vocab
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Ok(Self {
            order: order.max(1),
            vocab,
            word_to_index,
            tables,
            backoffs,
            _mmap: None,
        })
    }

    /// Builds an in-memory model directly, bypassing file I/O - used by tests and by
    /// callers that already hold the scored n-grams in memory.
    pub fn from_parts(
        order: usize,
        vocab: Vec<String>,
        ngrams: Vec<Vec<(Vec<u32>, u32, f32, f32)>>,
    ) -> Self {
        let word_to_index = vocab
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        let mut tables = Vec::with_capacity(order);
        let mut backoffs = Vec::with_capacity(order);
        for level in ngrams {
            let mut table = HashMap::new();
            let mut bo = HashMap::new();
            for (context, word, log_prob, backoff) in level {
                let hash = context_hash(&context);
                table.insert((hash, word), Entry { log_prob, backoff });
                bo.insert(hash, backoff);
            }
            tables.push(table);
            backoffs.push(bo);
        }
        Self {
            order: order.max(1),
            vocab,
            word_to_index,
            tables,
            backoffs,
            _mmap: None,
        }
    }
}

impl LanguageModel for NgramLm {
    fn start_state(&self) -> LmState {
        LmState::default()
    }

    fn score(&self, state: &LmState, word: u32) -> (LmState, f32) {
        let max_context = self.order.saturating_sub(1);
        let mut context = state.context.clone();
        if context.len() > max_context {
            let start = context.len() - max_context;
            context = context[start..].to_vec();
        }

        let mut accumulated_backoff = 0.0f32;
        let mut len = context.len();
        loop {
            let ctx_slice = &context[context.len() - len..];
            let hash = context_hash(ctx_slice);
            let level = len; // order-(len+1) table lives at tables[len]
            if let Some(table) = self.tables.get(level) {
                if let Some(entry) = table.get(&(hash, word)) {
                    let mut next_context = context.clone();
                    next_context.push(word);
                    if next_context.len() > max_context {
                        let drop = next_context.len() - max_context;
                        next_context.drain(0..drop);
                    }
                    return (
                        LmState { context: next_context },
                        entry.log_prob + accumulated_backoff,
                    );
                }
            }
            if len == 0 {
                break;
            }
            // Back off: fold in this context's backoff weight and shrink the context.
            let hash_here = context_hash(ctx_slice);
            if let Some(bo) = self.backoffs.get(level).and_then(|m| m.get(&hash_here)) {
                accumulated_backoff += bo;
            }
            len -= 1;
        }

        let mut next_context = context;
        next_context.push(word);
        if next_context.len() > max_context {
            let drop = next_context.len() - max_context;
            next_context.drain(0..drop);
        }
        (
            LmState { context: next_context },
            OOV_LOG_PROB + accumulated_backoff,
        )
    }

    fn vocab(&self) -> &[String] {
        &self.vocab
    }

    fn word_index(&self, word: &str) -> Option<u32> {
        self.word_to_index.get(word).copied()
    }
}

fn read_vocab_file(path: &Path) -> Result<Vec<String>> {
    use std::io::BufRead;
    let file = File::open(path).map_err(|e| CoreError::Config(format!("opening LM dict {}: {e}", path.display())))?;
    let reader = std::io::BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| CoreError::Config(format!("reading LM dict: {e}")))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
    Ok(out)
}

/// Minimal little-endian byte cursor used to parse the LM binary format without
/// pulling in a dedicated byte-parsing crate for a handful of fixed-width reads.
struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(CoreError::Config("LM file truncated".to_string()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| CoreError::Config(format!("LM vocab not utf8: {e}")))
    }
}
