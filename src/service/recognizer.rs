use crate::error::RecognitionError;
use futures::future::BoxFuture;
use std::path::Path;

/// Outcome of comparing a probe image against one reference image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub verified: bool,
    /// Distance reported by the backend; lower is more similar.
    pub distance: f64,
}

impl Verification {
    pub fn confidence(&self) -> f64 {
        1.0 - self.distance
    }
}

/// Face detection and verification backend.
///
/// Thresholds and model choice belong to the implementation; callers only
/// see the face count and the verified flag with its distance.
pub trait FaceRecognizer: Send + Sync {
    fn detect_face_count<'a>(
        &'a self,
        image: &'a Path,
    ) -> BoxFuture<'a, Result<usize, RecognitionError>>;

    fn verify<'a>(
        &'a self,
        probe: &'a Path,
        reference: &'a Path,
    ) -> BoxFuture<'a, Result<Verification, RecognitionError>>;
}
