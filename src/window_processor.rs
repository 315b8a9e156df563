//! Overlap-save windowed inference (component D), the central piece tying the feature
//! extractor to the acoustic model.
//!
//! Valid frames accumulate into a growing buffer. Windows of `WINDOW` frames are run
//! through the acoustic model as soon as enough frames are available, but only a
//! central "commit" slice of each window's output is kept: the margins exist purely to
//! give the model `LEFT_CONTEXT`/`RIGHT_CONTEXT` frames of lookaround at the edges of
//! the window. Chunk 0 has no left context available at all (nothing precedes the
//! stream), so it commits starting at frame 0; chunk 1 then fills the
//! `[COMMIT, COMMIT+LEFT_CONTEXT)` gap chunk 0 could not safely emit; every chunk from
//! 2 onward commits a full `COMMIT`-row slice starting `LEFT_CONTEXT` frames into its
//! own window (`window_start + LEFT_CONTEXT`), since the window's first `LEFT_CONTEXT`
//! rows were already committed by the previous chunk - committed ranges must stay
//! disjoint for overlap-save to mean anything. `finalize` picks up wherever the last
//! regular chunk left off and flushes the remainder of the stream.
use crate::acoustic_model::SequenceModel;
use crate::error::Result;
use crate::features::{self, make_window, FrameFeatures};
use ndarray::Array2;

pub const WINDOW: usize = features::WINDOW;
pub const COMMIT: usize = 50;
pub const LEFT_CONTEXT: usize = 25;
pub const RIGHT_CONTEXT: usize = 25;

const _: () = assert!(LEFT_CONTEXT + COMMIT + RIGHT_CONTEXT == WINDOW);

/// One contiguous slab of committed logits, plus the absolute frame range it covers
/// (both ends inclusive, matching the spec's `[commit_start, commit_end]` notation).
#[derive(Debug)]
pub struct CommittedChunk {
    pub logits: Array2<f32>,
    pub start_frame: usize,
    pub end_frame: usize,
}

struct ChunkPlan {
    window_start: usize,
    window_len: usize,
    commit_start: usize,
    commit_end: usize,
    next_window_needed: usize,
}

/// Computes the window/commit geometry for `chunk_idx`, given the number of valid
/// frames seen so far (`n`). All bounds are clamped to `n - 1` as the spec requires.
fn plan_for_chunk(chunk_idx: usize, n: usize) -> ChunkPlan {
    let last = n.saturating_sub(1);
    match chunk_idx {
        0 => ChunkPlan {
            window_start: 0,
            window_len: (WINDOW - 1).min(last) + 1,
            commit_start: 0,
            commit_end: (COMMIT - 1).min(last),
            next_window_needed: LEFT_CONTEXT + WINDOW,
        },
        1 => {
            let window_start = LEFT_CONTEXT;
            let window_end = (LEFT_CONTEXT + WINDOW - 1).min(last);
            ChunkPlan {
                window_start,
                window_len: window_end.saturating_sub(window_start) + 1,
                commit_start: COMMIT.min(last),
                commit_end: (COMMIT + LEFT_CONTEXT - 1).min(last),
                next_window_needed: COMMIT + WINDOW,
            }
        }
        k => {
            // The window's first LEFT_CONTEXT rows were already committed by the
            // previous chunk (chunk 1 committed up through COMMIT+LEFT_CONTEXT-1, and
            // each chunk since has committed a further COMMIT rows past that), so this
            // chunk commits the next COMMIT rows starting at window_start+LEFT_CONTEXT,
            // never re-committing what a prior chunk already emitted.
            let window_start = COMMIT * (k - 1);
            let window_end = (window_start + WINDOW - 1).min(last);
            let commit_start = (window_start + LEFT_CONTEXT).min(last);
            ChunkPlan {
                window_start,
                window_len: window_end.saturating_sub(window_start) + 1,
                commit_start,
                commit_end: (commit_start + COMMIT - 1).min(last),
                next_window_needed: COMMIT * k + WINDOW,
            }
        }
    }
}

#[derive(Default)]
pub struct WindowProcessor {
    valid_features: Vec<FrameFeatures>,
    total_frames_seen: usize,
    chunk_idx: usize,
    next_window_needed: usize,
    /// One past the last frame index committed by a regular (non-finalize) chunk;
    /// `finalize` resumes from here rather than re-deriving it from `chunk_idx`.
    committed_through: usize,
    effective_vocab_size: Option<usize>,
}

impl WindowProcessor {
    pub fn new() -> Self {
        // The very first window only needs a full WINDOW of frames; chunk 0's own
        // `next_window_needed` column (LEFT_CONTEXT + WINDOW) is the threshold that
        // gates chunk *1*, set only after chunk 0 has actually been processed.
        Self {
            next_window_needed: WINDOW,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn frame_count(&self) -> usize {
        self.valid_features.len()
    }

    pub fn total_frames_seen(&self) -> usize {
        self.total_frames_seen
    }

    pub fn chunk_idx(&self) -> usize {
        self.chunk_idx
    }

    pub fn effective_vocab_size(&self) -> Option<usize> {
        self.effective_vocab_size
    }

    /// Pushes one frame (`None` for a frame the feature extractor rejected as
    /// invalid). Increments `total_frames_seen` unconditionally; an invalid frame is
    /// silently dropped (not appended to `valid_features`, not counted toward
    /// `frame_count`). Returns whether enough valid frames have now accumulated to run
    /// the next window.
    pub fn push_frame(&mut self, frame: Option<FrameFeatures>) -> bool {
        self.total_frames_seen += 1;
        if let Some(f) = frame {
            self.valid_features.push(f);
        }
        self.valid_features.len() >= self.next_window_needed
    }

    /// Runs the next ready window through `model` and returns its committed chunk, or
    /// `None` if not enough valid frames have accumulated yet.
    pub fn process_window(&mut self, model: &dyn SequenceModel) -> Result<Option<CommittedChunk>> {
        let n = self.valid_features.len();
        if n < self.next_window_needed {
            return Ok(None);
        }
        let plan = plan_for_chunk(self.chunk_idx, n);
        let window = &self.valid_features[plan.window_start..plan.window_start + plan.window_len];
        let window = make_window(window);
        let output = match model.infer(&window, WINDOW) {
            Ok(output) => output,
            Err(e) => {
                // Per spec §7, InferenceFailed is isolated to this window: it is
                // skipped (no logits appended) but chunk_idx/next_window_needed still
                // advance, or the next push_frame would immediately re-satisfy this
                // same threshold and retry the identical failing window forever.
                self.committed_through = plan.commit_end + 1;
                self.next_window_needed = plan.next_window_needed;
                self.chunk_idx += 1;
                return Err(e);
            }
        };
        self.effective_vocab_size = Some(output.shape()[2]);

        let seq_len = output.shape()[1];
        let rel_start = (plan.commit_start - plan.window_start).min(seq_len.saturating_sub(1));
        let rel_end = (plan.commit_end - plan.window_start).min(seq_len.saturating_sub(1));
        let committed = output
            .index_axis(ndarray::Axis(0), 0)
            .slice(ndarray::s![rel_start..=rel_end, ..])
            .to_owned();

        self.committed_through = plan.commit_end + 1;
        self.next_window_needed = plan.next_window_needed;
        self.chunk_idx += 1;

        Ok(Some(CommittedChunk {
            logits: committed,
            start_frame: plan.commit_start,
            end_frame: plan.commit_end,
        }))
    }

    /// Drains every remaining ready window, in order. In normal streaming use at most
    /// one window becomes ready per pushed frame, but this handles callers that push
    /// frames in batches.
    pub fn drain_ready(&mut self, model: &dyn SequenceModel) -> Result<Vec<CommittedChunk>> {
        let mut out = Vec::new();
        while self.valid_features.len() >= self.next_window_needed {
            match self.process_window(model)? {
                Some(chunk) => out.push(chunk),
                None => break,
            }
        }
        Ok(out)
    }

    /// Flushes the stream's tail after the last frame has been pushed. Returns `None`
    /// if every valid frame has already been committed. Otherwise builds one final
    /// window ending at the last valid frame and commits from wherever the last
    /// regular chunk left off through the end of the stream, provided that window
    /// holds at least `LEFT_CONTEXT` frames.
    pub fn finalize(&mut self, model: &dyn SequenceModel) -> Result<Option<CommittedChunk>> {
        let n = self.valid_features.len();
        if self.committed_through >= n {
            return Ok(None);
        }
        let window_start = n.saturating_sub(WINDOW);
        let window_len = n - window_start;
        if window_len < LEFT_CONTEXT {
            return Ok(None);
        }
        let commit_start = self.committed_through.max(window_start);

        let window = &self.valid_features[window_start..n];
        let window = make_window(window);
        let output = model.infer(&window, WINDOW)?;
        self.effective_vocab_size = Some(output.shape()[2]);

        let seq_len = output.shape()[1];
        let rel_start = (commit_start - window_start).min(seq_len.saturating_sub(1));
        let rel_end = (n - 1 - window_start).min(seq_len.saturating_sub(1));
        if rel_end < rel_start {
            return Ok(None);
        }
        let committed_logits = output
            .index_axis(ndarray::Axis(0), 0)
            .slice(ndarray::s![rel_start..=rel_end, ..])
            .to_owned();

        self.committed_through = n;
        self.chunk_idx += 1;
        Ok(Some(CommittedChunk {
            logits: committed_logits,
            start_frame: commit_start,
            end_frame: n - 1,
        }))
    }
}
