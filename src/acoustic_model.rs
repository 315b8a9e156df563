//! Acoustic model adapter (component C).
//!
//! The acoustic model is treated as an opaque sequence-to-sequence function: it takes
//! three parallel fixed-size input tensors (`lips: [1,T,8]`, `hand_shape: [1,T,7]`,
//! `hand_position: [1,T,18]`) and returns a `[1, T', V]` logit tensor. [`SequenceModel`]
//! is a dynamic-dispatch seam so the rest of the core never depends on a specific
//! inference runtime; [`OrtSequenceModel`] is the concrete ONNX Runtime-backed
//! implementation (`ort::{Session, inputs!, CPUExecutionProvider}`), modelled on a
//! single feed-forward graph rather than an autoregressive decode loop, so one
//! `Session::run` call is enough.
use crate::error::{CoreError, Result};
use crate::features::FrameFeatures;
use ndarray::Array3;
use ort::{inputs, CPUExecutionProvider, GraphOptimizationLevel, Session};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

/// Dynamic-dispatch contract for the acoustic model, so the rest of the core never
/// depends on ONNX Runtime directly. Implementations must serialize concurrent
/// `infer` calls internally: callers may share one instance across streams but will
/// observe queueing.
pub trait SequenceModel: Send + Sync {
    /// Loads the model from `path`. Must fail with [`CoreError::ModelLoadFailed`] if
    /// the model cannot be parsed or doesn't have the documented 3-input structure,
    /// and with [`CoreError::ModelShapeMismatch`] if a rank/size is already known to
    /// be wrong at load time.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Runs inference over exactly `t` frames (padded/truncated by the caller via
    /// [`crate::features::make_window`] before this point is reached in practice, but
    /// implementations still defend against a mismatched `frames.len()`).
    fn infer(&self, frames: &[FrameFeatures], t: usize) -> Result<Array3<f32>>;

    /// Vocabulary size observed from the most recent successful `infer` call. `None`
    /// until the first inference.
    fn vocab_size(&self) -> Option<usize>;

    /// Output sequence length (`T'`) observed from the most recent successful
    /// `infer` call.
    fn last_sequence_length(&self) -> Option<usize>;

    fn is_loaded(&self) -> bool;
}

#[derive(Default)]
struct ObservedShape {
    vocab_size: Option<usize>,
    last_sequence_length: Option<usize>,
}

/// ONNX Runtime-backed [`SequenceModel`]. Holds its `ort::Session` plus the tensor
/// allocations `infer` reuses, guarded by a mutex so one adapter instance can be
/// shared across streams: only one `infer` runs at a time, the rest queue on the lock
/// rather than racing the session's internal buffers.
pub struct OrtSequenceModel {
    session: Mutex<Option<Session>>,
    observed: Mutex<ObservedShape>,
}

impl Default for OrtSequenceModel {
    fn default() -> Self {
        Self {
            session: Mutex::new(None),
            observed: Mutex::new(ObservedShape::default()),
        }
    }
}

impl OrtSequenceModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn frames_to_tensors(frames: &[FrameFeatures], t: usize) -> (Array3<f32>, Array3<f32>, Array3<f32>) {
        let mut lips = Array3::<f32>::zeros((1, t, 8));
        let mut hand_shape = Array3::<f32>::zeros((1, t, 7));
        let mut hand_position = Array3::<f32>::zeros((1, t, 18));
        for i in 0..t {
            let frame = frames.get(i).copied().unwrap_or_else(FrameFeatures::zero);
            for (j, v) in frame.lips.iter().enumerate() {
                lips[[0, i, j]] = *v as f32;
            }
            for (j, v) in frame.hand_shape.iter().enumerate() {
                hand_shape[[0, i, j]] = *v as f32;
            }
            for (j, v) in frame.hand_position.iter().enumerate() {
                hand_position[[0, i, j]] = *v as f32;
            }
        }
        (lips, hand_shape, hand_position)
    }
}

impl SequenceModel for OrtSequenceModel {
    fn load(&mut self, path: &Path) -> Result<()> {
        ort::init()
            .with_name("cued-speech-rt")
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .commit()
            .map_err(|e| CoreError::ModelLoadFailed(format!("ort global init: {e}")))?;

        let session = Session::builder()
            .map_err(|e| CoreError::ModelLoadFailed(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| CoreError::ModelLoadFailed(e.to_string()))?
            .with_model_from_file(path)
            .map_err(|e| CoreError::ModelLoadFailed(format!("{}: {e}", path.display())))?;

        let input_count = session.inputs.len();
        if input_count != 3 {
            return Err(CoreError::ModelShapeMismatch(format!(
                "expected 3 named inputs (lips, hand_shape, hand_position), model has {input_count}"
            )));
        }
        info!("loaded acoustic model from {}", path.display());
        *self.session.lock() = Some(session);
        Ok(())
    }

    fn infer(&self, frames: &[FrameFeatures], t: usize) -> Result<Array3<f32>> {
        let guard = self.session.lock();
        let session = guard
            .as_ref()
            .ok_or_else(|| CoreError::InferenceFailed("model not loaded".to_string()))?;

        let (lips, hand_shape, hand_position) = Self::frames_to_tensors(frames, t);
        debug!("running inference over {} frames", t);

        let outputs = session
            .run(inputs!["lips" => lips.view(), "hand_shape" => hand_shape.view(), "hand_position" => hand_position.view()]
                .map_err(|e| CoreError::InferenceFailed(e.to_string()))?)
            .map_err(|e| CoreError::InferenceFailed(e.to_string()))?;

        let logits = outputs[0]
            .extract_tensor::<f32>()
            .map_err(|e| CoreError::ModelShapeMismatch(e.to_string()))?;
        let view = logits.view();
        if view.ndim() != 3 {
            return Err(CoreError::ModelShapeMismatch(format!(
                "expected rank-3 output [1, T', V], got rank {}",
                view.ndim()
            )));
        }
        let shape = view.shape();
        let (seq_len, vocab_size) = (shape[1], shape[2]);
        let array: Array3<f32> = view
            .to_owned()
            .into_dimensionality()
            .map_err(|e| CoreError::ModelShapeMismatch(e.to_string()))?;

        let mut observed = self.observed.lock();
        observed.vocab_size = Some(vocab_size);
        observed.last_sequence_length = Some(seq_len);
        Ok(array)
    }

    fn vocab_size(&self) -> Option<usize> {
        self.observed.lock().vocab_size
    }

    fn last_sequence_length(&self) -> Option<usize> {
        self.observed.lock().last_sequence_length
    }

    fn is_loaded(&self) -> bool {
        self.session.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_model_reports_no_shape() {
        let model = OrtSequenceModel::new();
        assert!(!model.is_loaded());
        assert_eq!(model.vocab_size(), None);
        assert_eq!(model.last_sequence_length(), None);
    }

    #[test]
    fn frames_to_tensors_pads_short_input() {
        let frames = vec![FrameFeatures::zero(); 3];
        let (lips, hand_shape, hand_position) = OrtSequenceModel::frames_to_tensors(&frames, 5);
        assert_eq!(lips.shape(), &[1, 5, 8]);
        assert_eq!(hand_shape.shape(), &[1, 5, 7]);
        assert_eq!(hand_position.shape(), &[1, 5, 18]);
    }
}
