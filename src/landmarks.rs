//! Landmark data model: the input side of the feature extractor.
//!
//! A [`LandmarkTuple`] is the opaque output of a face/hand/pose detector - that
//! detector itself is out of scope here; this module only defines the shape it is
//! contracted to produce and the small set of indices the feature extractor reads.
use serde::{Deserialize, Serialize};

/// Number of face landmarks a detector is expected to provide (MediaPipe-style face
/// mesh topology). Only a documented subset of indices is ever consulted.
pub const MIN_FACE_LANDMARKS: usize = 455;
/// Number of hand landmarks a detector is expected to provide.
pub const HAND_LANDMARKS: usize = 21;

/// Face landmark indices consulted by the feature extractor, outside of the lip outer
/// ring (see [`LIP_OUTER_20`]).
pub const FACE_INDICES: [usize; 9] = [0, 17, 61, 200, 214, 234, 280, 291, 454];

/// The 20 outer-lip contour indices (MediaPipe face mesh numbering) used for the mouth
/// polygon area and curvature features.
pub const LIP_OUTER_20: [usize; 20] = [
    61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 375, 321, 405, 314, 17, 84, 181, 91, 146,
];

/// Hand landmark indices consulted by the feature extractor.
pub const HAND_INDICES: [usize; 7] = [0, 4, 8, 9, 12, 16, 20];

/// A single 3D landmark point. Non-finite components mark the landmark invalid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A landmark is valid iff every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean distance in the x/y/z plane.
    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

/// The per-frame output of the landmark detector: face, hand and (optional) pose
/// landmarks. Only face and hand are consulted by the extractor; pose is carried for
/// forward compatibility with detectors that supply it but is otherwise unused here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LandmarkTuple {
    pub face: Vec<Landmark>,
    pub hand: Vec<Landmark>,
    #[serde(default)]
    pub pose: Vec<Landmark>,
}

impl LandmarkTuple {
    /// Fetch a face landmark by index, or `None` if missing or non-finite.
    pub fn face_at(&self, index: usize) -> Option<&Landmark> {
        self.face.get(index).filter(|l| l.is_finite())
    }

    /// Fetch a hand landmark by index, or `None` if missing or non-finite.
    pub fn hand_at(&self, index: usize) -> Option<&Landmark> {
        self.hand.get(index).filter(|l| l.is_finite())
    }

    /// Whether this tuple carries enough landmarks for the extractor to even attempt
    /// a computation (doesn't check finiteness of individual indices - that is done at
    /// the point of use so a single NaN coordinate doesn't invalidate unrelated
    /// features).
    pub fn has_minimum_shape(&self) -> bool {
        self.face.len() >= MIN_FACE_LANDMARKS && self.hand.len() >= HAND_LANDMARKS
    }
}

/// Reads one [`LandmarkTuple`] per non-empty line of a JSON-lines file.
///
/// This is a test/CLI convenience standing in for a real-time detector; a malformed
/// line is skipped with a logged warning rather than aborting the whole stream, since a
/// single bad line is analogous to one missing detector frame.
pub fn read_landmark_jsonl(path: impl AsRef<std::path::Path>) -> std::io::Result<Vec<LandmarkTuple>> {
    use std::io::BufRead;
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<LandmarkTuple>(trimmed) {
            Ok(tuple) => out.push(tuple),
            Err(e) => {
                tracing::warn!("skipping malformed landmark line {}: {}", lineno, e);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_finiteness() {
        let good = Landmark::new(1.0, 2.0, 3.0);
        assert!(good.is_finite());
        let bad = Landmark::new(f64::NAN, 0.0, 0.0);
        assert!(!bad.is_finite());
    }

    #[test]
    fn face_at_rejects_non_finite() {
        let mut tuple = LandmarkTuple::default();
        tuple.face = vec![Landmark::default(); MIN_FACE_LANDMARKS];
        tuple.face[234] = Landmark::new(f64::NAN, 0.0, 0.0);
        assert!(tuple.face_at(0).is_some());
        assert!(tuple.face_at(234).is_none());
    }
}
