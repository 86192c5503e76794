//! Capability seams for external ML inference.
//!
//! Inference engines (ONNX sessions, cloud vision APIs, OpenCV cascades)
//! live outside this crate. They plug in through two narrow traits, and the
//! family tag chosen in configuration decides which suppression variant
//! their raw output gets. One backend is selected at startup; there is no
//! runtime type probing.

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::{DetectionBox, Suppression};

/// A detector that turns decoded pixels into raw bounding boxes.
pub trait ObjectDetector: Send + Sync {
    /// Human-readable backend name, recorded as each box's `source`.
    fn name(&self) -> &str;

    /// The detector family, which fixes the suppression variant.
    fn family(&self) -> DetectorFamily;

    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionBox>>;
}

/// An embedder that turns a cropped face into a fixed-length vector.
///
/// Dimensionality is model-specific and treated opaquely downstream; the
/// identity resolver guards against comparing mismatched lengths.
pub trait FaceEmbedder: Send + Sync {
    fn embed(&self, face: &DynamicImage) -> Result<Vec<f32>>;
}

/// Closed set of supported detector families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectorFamily {
    /// Cascade classifiers emit loosely clustered boxes without useful
    /// scores; they get the legacy overlap suppression.
    #[default]
    Cascade,
    /// Single-shot detectors emit scored anchors; they get IoU NMS.
    Yolo,
}

impl DetectorFamily {
    pub fn suppression(self, overlap_threshold_pct: f64, iou_threshold: f32) -> Suppression {
        match self {
            DetectorFamily::Cascade => Suppression::Overlap {
                threshold_pct: overlap_threshold_pct,
            },
            DetectorFamily::Yolo => Suppression::Iou {
                threshold: iou_threshold,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_selects_suppression_variant() {
        match DetectorFamily::Cascade.suppression(90.0, 0.3) {
            Suppression::Overlap { threshold_pct } => assert_eq!(threshold_pct, 90.0),
            other => panic!("expected overlap suppression, got {:?}", other),
        }
        match DetectorFamily::Yolo.suppression(90.0, 0.3) {
            Suppression::Iou { threshold } => assert_eq!(threshold, 0.3),
            other => panic!("expected iou suppression, got {:?}", other),
        }
    }
}
