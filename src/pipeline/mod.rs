//! Ingest orchestration: pixels and raw detections in, index rows out.
//!
//! The surrounding system decodes files and runs ML inference; this module
//! owns the order of operations between the leaves: hash, suppress, resolve,
//! write. Everything is synchronous. A batch parallelizes only its pure
//! hashing stage; database writes and identity resolution stay on the
//! calling thread, with the resolver's own lock guarding its store.

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;

use crate::config::Config;
use crate::db::{Database, NewPhoto, SimilarPhoto};
use crate::detect::{DetectionBox, FaceEmbedder, ObjectDetector};
use crate::hash::{sha256_bytes, PerceptualHash};
use crate::identity::IdentityResolver;

/// Label under which face detectors report their boxes.
pub const FACE_LABEL: &str = "face";

/// A decoded photo handed in by the surrounding scanner.
#[derive(Debug, Clone, Default)]
pub struct PhotoInput {
    pub path: String,
    pub image: Option<DynamicImage>,
    /// Raw source bytes, when the caller still has them, for content-hash
    /// change detection.
    pub raw_bytes: Option<Vec<u8>>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub taken_at: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
    pub credit: Option<String>,
}

/// What indexing one photo produced.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub photo_id: i64,
    pub hash: Option<PerceptualHash>,
    /// Photos already in the index within the duplicate distance.
    pub near_duplicates: Vec<SimilarPhoto>,
    pub objects_indexed: usize,
    pub faces_indexed: usize,
    pub new_people: usize,
}

/// Batch ingest counters.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub indexed: usize,
    pub failed: usize,
    pub new_people: usize,
}

pub struct Indexer {
    db: Database,
    resolver: IdentityResolver,
    config: Config,
}

impl Indexer {
    pub fn new(db: Database, resolver: IdentityResolver, config: Config) -> Self {
        Self {
            db,
            resolver,
            config,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Index one photo: hash it, check for near-duplicates, store the row
    /// and its caption text.
    pub fn index_photo(&self, input: &PhotoInput) -> Result<IndexOutcome> {
        let hash = input.image.as_ref().map(PerceptualHash::from_image);
        self.index_hashed(input, hash)
    }

    /// Index a photo whose perceptual hash was computed elsewhere (the
    /// batch path hashes on worker threads before this serial stage).
    fn index_hashed(&self, input: &PhotoInput, hash: Option<PerceptualHash>) -> Result<IndexOutcome> {
        let sha256 = input.raw_bytes.as_deref().map(sha256_bytes);

        let near_duplicates = match hash {
            Some(h) => self.db.find_similar(h, self.config.hashing.duplicate_distance)?,
            None => Vec::new(),
        };

        let (width, height) = input
            .image
            .as_ref()
            .map(|img| {
                let (w, h) = img.dimensions();
                (Some(w as i64), Some(h as i64))
            })
            .unwrap_or((None, None));

        let (directory, filename) = split_path(&input.path);
        let photo_id = self.db.insert_photo(&NewPhoto {
            path: input.path.clone(),
            filename,
            directory,
            size_bytes: input.raw_bytes.as_ref().map_or(0, |b| b.len() as i64),
            width,
            height,
            camera_make: input.camera_make.clone(),
            camera_model: input.camera_model.clone(),
            lens: input.lens.clone(),
            taken_at: input.taken_at.clone(),
            rating: 0,
            description: input.description.clone(),
            copyright: input.copyright.clone(),
            credit: input.credit.clone(),
            sha256_hash: sha256,
            perceptual_hash: hash,
        })?;

        if !near_duplicates.is_empty() {
            tracing::info!(
                path = %input.path,
                count = near_duplicates.len(),
                "indexed photo has near-duplicates"
            );
        }

        Ok(IndexOutcome {
            photo_id,
            hash,
            near_duplicates,
            objects_indexed: 0,
            faces_indexed: 0,
            new_people: 0,
        })
    }

    /// Run detection over an indexed photo and write the surviving boxes.
    ///
    /// Face boxes are cropped, embedded, and resolved to a person; all other
    /// labels become AI object tags. A box whose embedding fails is logged
    /// and skipped; one bad detection never sinks the photo.
    pub fn annotate(
        &self,
        photo_id: i64,
        image: &DynamicImage,
        detector: &dyn ObjectDetector,
        embedder: &dyn FaceEmbedder,
    ) -> Result<(usize, usize, usize)> {
        let raw = detector.detect(image)?;
        let suppression = detector.family().suppression(
            self.config.detection.overlap_threshold_pct,
            self.config.detection.iou_threshold,
        );
        let kept = suppression.apply(raw);

        let mut objects = 0usize;
        let mut faces = 0usize;
        let mut new_people = 0usize;

        for detection in &kept {
            if detection.label == FACE_LABEL {
                let crop = crop_detection(image, detection);
                let embedding = match embedder.embed(&crop) {
                    Ok(e) => e,
                    Err(err) => {
                        tracing::warn!(photo_id, %err, "face embedding failed, skipping box");
                        continue;
                    }
                };
                let resolution = self.resolver.resolve(&embedding);
                if resolution.is_new {
                    new_people += 1;
                }
                self.db.record_face(photo_id, &resolution.key, detection)?;
                faces += 1;
            } else {
                self.db.add_object_tag(photo_id, detection)?;
                objects += 1;
            }
        }

        Ok((objects, faces, new_people))
    }

    /// Full single-photo flow: index, then detect and annotate.
    pub fn ingest(
        &self,
        input: &PhotoInput,
        detector: &dyn ObjectDetector,
        embedder: &dyn FaceEmbedder,
    ) -> Result<IndexOutcome> {
        let hash = input.image.as_ref().map(PerceptualHash::from_image);
        self.ingest_hashed(input, hash, detector, embedder)
    }

    fn ingest_hashed(
        &self,
        input: &PhotoInput,
        hash: Option<PerceptualHash>,
        detector: &dyn ObjectDetector,
        embedder: &dyn FaceEmbedder,
    ) -> Result<IndexOutcome> {
        let mut outcome = self.index_hashed(input, hash)?;
        if let Some(image) = &input.image {
            let (objects, faces, new_people) =
                self.annotate(outcome.photo_id, image, detector, embedder)?;
            outcome.objects_indexed = objects;
            outcome.faces_indexed = faces;
            outcome.new_people = new_people;
        }
        Ok(outcome)
    }

    /// Ingest a batch. Hashing runs across worker threads; everything that
    /// touches the database or the resolver stays serialized here. A photo
    /// that fails is counted and logged, and the batch continues.
    pub fn ingest_batch(
        &self,
        inputs: &[PhotoInput],
        detector: &dyn ObjectDetector,
        embedder: &dyn FaceEmbedder,
    ) -> BatchSummary {
        let hashes: Vec<Option<PerceptualHash>> = inputs
            .par_iter()
            .map(|input| input.image.as_ref().map(PerceptualHash::from_image))
            .collect();
        tracing::debug!(total = inputs.len(), "starting batch ingest");

        let mut summary = BatchSummary::default();
        for (input, hash) in inputs.iter().zip(hashes) {
            match self.ingest_hashed(input, hash, detector, embedder) {
                Ok(outcome) => {
                    summary.indexed += 1;
                    summary.new_people += outcome.new_people;
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(path = %input.path, %err, "failed to ingest photo");
                }
            }
        }
        summary
    }
}

fn split_path(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, file)) => (dir.to_string(), file.to_string()),
        None => (String::new(), path.to_string()),
    }
}

/// Crop a detection region with 20% padding, clamped to the image.
fn crop_detection(img: &DynamicImage, bbox: &DetectionBox) -> DynamicImage {
    let (img_width, img_height) = img.dimensions();

    let padding_x = (bbox.width as f32 * 0.2) as i32;
    let padding_y = (bbox.height as f32 * 0.2) as i32;

    let x = (bbox.x - padding_x).max(0) as u32;
    let y = (bbox.y - padding_y).max(0) as u32;
    let w = ((bbox.width + padding_x * 2) as u32).min(img_width.saturating_sub(x));
    let h = ((bbox.height + padding_y * 2) as u32).min(img_height.saturating_sub(y));

    img.crop_imm(x, y, w.max(1), h.max(1))
}
