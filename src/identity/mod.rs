//! Face identity resolution against a growing embedding store.
//!
//! Each stored identity holds one or more exemplar embeddings. Resolving a
//! new embedding scans every exemplar, tracks the best match under the
//! configured metric, and either attaches the embedding to the winning
//! identity or mints a fresh one. The store only grows; pruning is an
//! external maintenance operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

use crate::error::IndexError;

/// Default cosine-similarity acceptance threshold for normalized embeddings.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;

/// Stable string key identifying a person across detection passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonKey(String);

impl PersonKey {
    /// Mint a fresh unique key for a never-before-seen person.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PersonKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PersonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Similarity metric for embedding comparison.
///
/// Cosine is the preferred metric for normalized face embeddings; Euclidean
/// is the alternate supported one. Both sit behind the same resolve
/// contract: a score either beats the current best or it doesn't, and the
/// best score is either accepted or a new identity is minted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Metric {
    Cosine { threshold: f32 },
    Euclidean { ceiling: f32 },
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl Metric {
    /// Score a pair of embeddings. Mismatched dimensionality (e.g. after an
    /// embedding model change) is an error for this pair only.
    pub fn score(self, a: &[f32], b: &[f32]) -> Result<f32, IndexError> {
        if a.len() != b.len() {
            return Err(IndexError::DimensionMismatch {
                query: a.len(),
                stored: b.len(),
            });
        }
        Ok(match self {
            Metric::Cosine { .. } => cosine_similarity(a, b),
            Metric::Euclidean { .. } => euclidean_distance(a, b),
        })
    }

    /// Whether `candidate` is a better score than `best` under this metric.
    fn improves(self, candidate: f32, best: f32) -> bool {
        match self {
            Metric::Cosine { .. } => candidate > best,
            Metric::Euclidean { .. } => candidate < best,
        }
    }

    /// Whether the best score is good enough to attach to an existing
    /// identity rather than mint a new one.
    fn accepts(self, best: f32) -> bool {
        match self {
            Metric::Cosine { threshold } => best >= threshold,
            Metric::Euclidean { ceiling } => best <= ceiling,
        }
    }
}

/// Cosine similarity between two equal-length vectors, in [-1, 1].
/// Zero-norm inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityEntry {
    key: PersonKey,
    exemplars: Vec<Vec<f32>>,
}

/// Outcome of resolving one embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub key: PersonKey,
    pub is_new: bool,
}

/// Mapping from person identity to representative embedding vectors.
///
/// Entries keep insertion order, so ties resolve deterministically to the
/// earliest-seen identity. Exemplar lengths may differ across entries when
/// model versions change; comparison guards against that per exemplar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingStore {
    entries: Vec<IdentityEntry>,
}

impl EmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of exemplars held for one identity.
    pub fn exemplar_count(&self, key: &PersonKey) -> usize {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map_or(0, |e| e.exemplars.len())
    }

    /// Register a known identity with an exemplar, e.g. when reloading
    /// persisted state. Empty exemplars are rejected by debug assertion;
    /// every key must map to at least one non-empty vector.
    pub fn insert(&mut self, key: PersonKey, exemplar: Vec<f32>) {
        debug_assert!(!exemplar.is_empty(), "exemplar vectors must be non-empty");
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.exemplars.push(exemplar),
            None => self.entries.push(IdentityEntry {
                key,
                exemplars: vec![exemplar],
            }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &PersonKey> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Find the best match for `embedding`, then attach or mint.
    ///
    /// The whole match-and-insert sequence runs on `&mut self`, so two
    /// concurrent resolutions cannot both mint an identity for the same
    /// person; callers sharing a store wrap it in [`IdentityResolver`].
    ///
    /// Stored exemplars whose dimensionality differs from the query are
    /// skipped, not fatal: the rest of the store still competes.
    pub fn resolve(&mut self, embedding: &[f32], metric: Metric) -> Resolution {
        let mut best: Option<(usize, f32)> = None;
        let mut mismatched = 0usize;

        for (idx, entry) in self.entries.iter().enumerate() {
            for exemplar in &entry.exemplars {
                match metric.score(embedding, exemplar) {
                    Ok(score) => match best {
                        Some((_, b)) if !metric.improves(score, b) => {}
                        _ => best = Some((idx, score)),
                    },
                    Err(IndexError::DimensionMismatch { .. }) => mismatched += 1,
                    Err(_) => {}
                }
            }
        }

        if mismatched > 0 {
            tracing::debug!(
                skipped = mismatched,
                "skipped stored exemplars with mismatched dimensionality"
            );
        }

        match best {
            Some((idx, score)) if metric.accepts(score) => {
                let entry = &mut self.entries[idx];
                entry.exemplars.push(embedding.to_vec());
                tracing::trace!(key = %entry.key, score, "matched existing identity");
                Resolution {
                    key: entry.key.clone(),
                    is_new: false,
                }
            }
            _ => {
                let key = PersonKey::mint();
                self.entries.push(IdentityEntry {
                    key: key.clone(),
                    exemplars: vec![embedding.to_vec()],
                });
                tracing::trace!(key = %key, "minted new identity");
                Resolution { key, is_new: true }
            }
        }
    }
}

/// Shared-use wrapper serializing resolution against one store.
///
/// The lock covers the whole find-best-then-insert critical section; without
/// it, two concurrent first sightings of the same person would race into
/// duplicate identities. The store is injected and owned here, never global.
pub struct IdentityResolver {
    store: Mutex<EmbeddingStore>,
    metric: Metric,
}

impl IdentityResolver {
    pub fn new(store: EmbeddingStore, metric: Metric) -> Self {
        Self {
            store: Mutex::new(store),
            metric,
        }
    }

    pub fn resolve(&self, embedding: &[f32]) -> Resolution {
        let mut store = self.store.lock().expect("embedding store lock poisoned");
        store.resolve(embedding, self.metric)
    }

    /// Copy of the current store, for persistence or read-heavy access.
    pub fn snapshot(&self) -> EmbeddingStore {
        self.store.lock().expect("embedding store lock poisoned").clone()
    }

    pub fn into_store(self) -> EmbeddingStore {
        self.store.into_inner().expect("embedding store lock poisoned")
    }
}
