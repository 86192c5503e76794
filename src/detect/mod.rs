//! Bounding-box post-processing for raw ML detections.
//!
//! Two suppression variants are carried because they serve different
//! detector families: cascade classifiers get the legacy directional
//! overlap suppression, YOLO-style detectors get confidence-ranked NMS.

pub mod backend;

pub use backend::{DetectorFamily, FaceEmbedder, ObjectDetector};

use serde::{Deserialize, Serialize};

/// An axis-aligned detection rectangle with its label and score.
///
/// Produced fresh per detection pass; kept or discarded by suppression,
/// never persisted with identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub label: String,
    /// Detection confidence in [0, 1].
    pub confidence: f32,
    /// Name of the detector/service that produced the box.
    pub source: String,
}

impl DetectionBox {
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Area of the intersecting rectangle with another box.
    pub fn intersection_area(&self, other: &DetectionBox) -> i64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        (x2 - x1).max(0) as i64 * (y2 - y1).max(0) as i64
    }

    /// Intersection over union with another box, in [0, 1].
    pub fn iou(&self, other: &DetectionBox) -> f32 {
        let intersection = self.intersection_area(other) as f32;
        let union = (self.area() + other.area()) as f32 - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Which suppression variant a detector family requires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suppression {
    /// Legacy cascade-classifier dedup: directional overlap over the first
    /// box's own area, threshold in percent.
    Overlap { threshold_pct: f64 },
    /// True-IoU non-max suppression keeping the higher-confidence box.
    Iou { threshold: f32 },
}

impl Suppression {
    pub fn apply(self, boxes: Vec<DetectionBox>) -> Vec<DetectionBox> {
        match self {
            Suppression::Overlap { threshold_pct } => suppress_overlapping(boxes, threshold_pct),
            Suppression::Iou { threshold } => nms(boxes, threshold),
        }
    }
}

/// Remove boxes that mostly coincide with another box.
///
/// For every ordered pair (i, j) with i != j, the overlap percentage is
/// `intersection * 100 / area(i)` -- relative to box i's own area, not the
/// union. When it exceeds the threshold and box i has not itself been
/// marked, box j is marked for removal. Survivors keep their original
/// relative order; scores are not consulted, so the first-encountered box
/// of a cluster wins.
///
/// The directional test and the "skip when i is already marked" short
/// circuit make the result iteration-sensitive for clusters of three or
/// more boxes. That behavior is load-bearing for compatibility and is kept
/// as-is; see DESIGN.md before changing it.
pub fn suppress_overlapping(boxes: Vec<DetectionBox>, threshold_pct: f64) -> Vec<DetectionBox> {
    let mut removed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        let area_i = boxes[i].area();
        if area_i <= 0 {
            continue;
        }
        for j in 0..boxes.len() {
            if i == j {
                continue;
            }
            let overlap_pct = boxes[i].intersection_area(&boxes[j]) as f64 * 100.0 / area_i as f64;
            if overlap_pct > threshold_pct && !removed[i] {
                removed[j] = true;
            }
        }
    }

    boxes
        .into_iter()
        .zip(removed)
        .filter(|(_, gone)| !gone)
        .map(|(b, _)| b)
        .collect()
}

/// Non-maximum suppression: of any pair whose IoU exceeds the threshold,
/// the lower-confidence box is dropped. Output is ordered by descending
/// confidence; equal scores keep their input order.
pub fn nms(mut boxes: Vec<DetectionBox>, threshold: f32) -> Vec<DetectionBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut suppressed = vec![false; boxes.len()];
    let mut keep = Vec::new();

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..boxes.len() {
            if suppressed[j] {
                continue;
            }
            if boxes[i].iou(&boxes[j]) > threshold {
                suppressed[j] = true;
            }
        }
        keep.push(i);
    }

    let mut kept_flags = vec![false; boxes.len()];
    for &i in &keep {
        kept_flags[i] = true;
    }
    boxes
        .into_iter()
        .zip(kept_flags)
        .filter(|(_, k)| *k)
        .map(|(b, _)| b)
        .collect()
}
