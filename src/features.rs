//! Geometric feature extraction (component B).
//!
//! Converts a 3-frame sliding window of landmark tuples (current, previous,
//! previous-previous) into a fixed 33-dimensional [`FrameFeatures`] vector: an 18-float
//! hand-position block, a 7-float hand-shape block (5 static + 2 velocity), and an
//! 8-float lips block. Field ordering within each block is load-bearing: the acoustic
//! model was trained against this exact layout.
use crate::landmarks::{Landmark, LandmarkTuple, LIP_OUTER_20};
use std::collections::VecDeque;

/// A frame's worth of input to the window processor. `WINDOW` fixed-size frames make
/// up a [`FeatureWindow`]; the tail is zero-padded if a stream ends short.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameFeatures {
    pub hand_shape: [f64; 7],
    pub hand_position: [f64; 18],
    pub lips: [f64; 8],
}

impl FrameFeatures {
    /// The all-zero frame used to pad a short [`FeatureWindow`] tail.
    pub const fn zero() -> Self {
        Self {
            hand_shape: [0.0; 7],
            hand_position: [0.0; 18],
            lips: [0.0; 8],
        }
    }

    /// A `FrameFeatures` is valid iff every component across all three blocks is
    /// finite (lengths are always correct by construction, fixed-size arrays).
    pub fn is_valid(&self) -> bool {
        self.hand_shape.iter().all(|v| v.is_finite())
            && self.hand_position.iter().all(|v| v.is_finite())
            && self.lips.iter().all(|v| v.is_finite())
    }

    /// Flattens the three blocks into the 33-dim vector in hand_shape, hand_position,
    /// lips order, for callers (e.g. the acoustic model adapter) that want a single
    /// contiguous slice.
    pub fn to_vec33(&self) -> [f64; 33] {
        let mut out = [0.0; 33];
        out[..7].copy_from_slice(&self.hand_shape);
        out[7..25].copy_from_slice(&self.hand_position);
        out[25..33].copy_from_slice(&self.lips);
        out
    }
}

impl Default for FrameFeatures {
    fn default() -> Self {
        Self::zero()
    }
}

/// Exactly `WINDOW` frames, owned transiently by the window processor.
pub const WINDOW: usize = 100;

/// A fixed-size window of features, zero-padded if the source ran short.
pub type FeatureWindow = Vec<FrameFeatures>;

/// Builds a [`FeatureWindow`] from a slice, truncating or zero-padding to exactly
/// `WINDOW` entries.
pub fn make_window(frames: &[FrameFeatures]) -> FeatureWindow {
    let mut window: FeatureWindow = frames.iter().copied().take(WINDOW).collect();
    window.resize(WINDOW, FrameFeatures::zero());
    window
}

const MIN_SPAN: f64 = 1e-6;

fn dist(a: &Landmark, b: &Landmark) -> f64 {
    a.distance(b)
}

/// Streaming feature extractor: maintains the 3-frame history (current, previous,
/// previous-previous) required by the motion features and produces one
/// [`FrameFeatures`] (or `None` for an invalid frame) per landmark tuple pushed.
#[derive(Debug, Default)]
pub struct FeatureExtractor {
    history: VecDeque<LandmarkTuple>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(3),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Pushes the next landmark tuple and attempts to extract features for it. Returns
    /// `None` if the frame is invalid: the first two frames of any stream are always
    /// invalid (insufficient history for motion features), as is any frame missing a
    /// required landmark, non-finite, or with a degenerate `face_width`.
    pub fn push(&mut self, tuple: LandmarkTuple) -> Option<FrameFeatures> {
        self.history.push_back(tuple);
        if self.history.len() > 3 {
            self.history.pop_front();
        }
        if self.history.len() < 3 {
            return None;
        }
        let prev2 = &self.history[0];
        let prev = &self.history[1];
        let current = &self.history[2];
        extract(current, prev, prev2)
    }
}

/// Pure function form of the extractor's per-frame computation, exposed for direct
/// testing independent of the streaming history it normally runs behind.
pub fn extract(
    current: &LandmarkTuple,
    prev: &LandmarkTuple,
    prev2: &LandmarkTuple,
) -> Option<FrameFeatures> {
    // 1. Normalization.
    let face_454 = current.face_at(454)?;
    let face_234 = current.face_at(234)?;
    let face_width = dist(face_454, face_234);
    if face_width <= MIN_SPAN {
        return None;
    }

    let hand_0 = current.hand_at(0)?;
    let hand_9 = current.hand_at(9)?;
    let hand_span_raw = dist(hand_0, hand_9);
    let hand_span = if hand_span_raw > MIN_SPAN {
        hand_span_raw
    } else {
        face_width
    };

    // 2. Hand-position (18 floats).
    let mut hand_position = [0.0f64; 18];
    let mut idx = 0;
    let hand_position_hands = [8usize, 9, 12];
    let hand_position_faces = [234usize, 200, 214, 454, 280];
    for &h in &hand_position_hands {
        let hand_pt = current.hand_at(h)?;
        for &f in &hand_position_faces {
            let face_pt = current.face_at(f)?;
            let d = dist(hand_pt, face_pt) / face_width;
            hand_position[idx] = d;
            idx += 1;
            if f == 200 {
                let angle = ((face_pt.y - hand_pt.y) / face_width)
                    .atan2((face_pt.x - hand_pt.x) / face_width);
                hand_position[idx] = angle;
                idx += 1;
            }
        }
    }
    debug_assert_eq!(idx, 18);

    // 3. Hand-shape (7 floats: 5 static + 2 velocity).
    let mut hand_shape = [0.0f64; 7];
    for (i, &k) in [4usize, 8, 12, 16, 20].iter().enumerate() {
        let hand_k = current.hand_at(k)?;
        hand_shape[i] = dist(hand_0, hand_k) / hand_span;
    }
    let hand_t8 = current.hand_at(8)?;
    let hand_prev8 = prev.hand_at(8)?;
    hand_shape[5] = (hand_t8.x - hand_prev8.x) / hand_span;
    hand_shape[6] = (hand_t8.y - hand_prev8.y) / hand_span;

    // 4. Lips (8 floats).
    let face_61 = current.face_at(61)?;
    let face_291 = current.face_at(291)?;
    let mouth_width = dist(face_61, face_291) / face_width;

    let face_0 = current.face_at(0)?;
    let face_17 = current.face_at(17)?;
    let mouth_height = dist(face_0, face_17) / face_width;

    let lip_poly_current = lip_polygon(current)?;
    let area = polygon_area(&lip_poly_current) / (face_width * face_width);
    let curvature = mean_turning_angle(&lip_poly_current);

    let prev_face_0 = prev.face_at(0)?;
    let prev2_face_0 = prev2.face_at(0)?;

    let lip_vel_x_t = (face_0.x - prev_face_0.x) / face_width;
    let lip_vel_y_t = (face_0.y - prev_face_0.y) / face_width;
    let lip_vel_x_prev = (prev_face_0.x - prev2_face_0.x) / face_width;
    let lip_vel_y_prev = (prev_face_0.y - prev2_face_0.y) / face_width;

    let lips = [
        mouth_width,
        mouth_height,
        area,
        curvature,
        lip_vel_x_t,
        lip_vel_y_t,
        lip_vel_x_t - lip_vel_x_prev,
        lip_vel_y_t - lip_vel_y_prev,
    ];

    let features = FrameFeatures {
        hand_shape,
        hand_position,
        lips,
    };
    if features.is_valid() {
        Some(features)
    } else {
        None
    }
}

fn lip_polygon(tuple: &LandmarkTuple) -> Option<Vec<(f64, f64)>> {
    let mut points = Vec::with_capacity(LIP_OUTER_20.len());
    for &idx in &LIP_OUTER_20 {
        let pt = tuple.face_at(idx)?;
        points.push((pt.x, pt.y));
    }
    Some(points)
}

/// Shoelace formula for the polygon's unsigned area.
fn polygon_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    (sum.abs()) * 0.5
}

/// Mean interior turning angle over the polygon's vertices, in radians. Degenerate
/// vertices (a zero-length adjoining edge) contribute nothing to the mean - they are
/// excluded from both the sum and the count. An empty (too-small) polygon yields 0.
fn mean_turning_angle(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];
        let v1 = (cur.0 - prev.0, cur.1 - prev.1);
        let v2 = (next.0 - cur.0, next.1 - cur.1);
        let len1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
        let len2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
        if len1 <= MIN_SPAN || len2 <= MIN_SPAN {
            continue;
        }
        let cos_theta = ((v1.0 * v2.0 + v1.1 * v2.1) / (len1 * len2)).clamp(-1.0, 1.0);
        sum += cos_theta.acos();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
