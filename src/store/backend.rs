/// Search backends for the in-memory vector store.
///
/// Two interchangeable exact-search implementations sit behind the
/// [`VectorBackend`] trait: a flat matrix index that scores a whole
/// collection with one matrix-vector product, and a plain per-vector
/// fallback. Both rank by cosine similarity, which reduces to the dot
/// product because all stored vectors and queries are L2-normalized.
/// The store never branches on which backend is active.
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Sentinel index returned by a backend for a slot with no valid match
/// (fewer stored vectors than requested results). Callers must skip it.
pub const NO_MATCH: usize = usize::MAX;

/// Backend selection, fixed at store construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Flat,
    BruteForce,
}

/// Exact top-k search over append-only normalized vectors.
///
/// Implementations must rank identically: descending score, ties broken
/// by insertion order (lower index wins).
pub trait VectorBackend: Send + Sync {
    /// Append vectors in order. Dimensionality is validated by the store.
    fn add(&mut self, vectors: &[Vec<f32>]);

    /// Return up to `k` `(index, score)` pairs, best first. Slots without
    /// a valid match carry [`NO_MATCH`].
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Construct the backend for the given kind and dimensionality.
pub fn new_backend(kind: BackendKind, dimensions: usize) -> Box<dyn VectorBackend> {
    match kind {
        BackendKind::Flat => Box::new(FlatIndex::new(dimensions)),
        BackendKind::BruteForce => Box::new(BruteForce::new(dimensions)),
    }
}

// ── Flat index ───────────────────────────────────────────────────────

/// Accelerated exact search over a contiguous row-major matrix.
///
/// Scores all rows at once via `ndarray`'s matrix-vector product, then
/// selects the top k in linear time instead of sorting the whole score
/// vector.
pub struct FlatIndex {
    dimensions: usize,
    data: Vec<f32>,
    rows: usize,
}

impl FlatIndex {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
            rows: 0,
        }
    }
}

impl VectorBackend for FlatIndex {
    fn add(&mut self, vectors: &[Vec<f32>]) {
        for v in vectors {
            debug_assert_eq!(v.len(), self.dimensions);
            self.data.extend_from_slice(v);
        }
        self.rows += vectors.len();
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.rows == 0 || k == 0 {
            return vec![(NO_MATCH, f32::NEG_INFINITY); k];
        }

        let matrix = ArrayView2::from_shape((self.rows, self.dimensions), &self.data)
            .expect("row count times dimensions equals data length");
        let scores = matrix.dot(&ArrayView1::from(query));

        let mut order: Vec<usize> = (0..self.rows).collect();
        let by_rank = |&a: &usize, &b: &usize| {
            scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b))
        };

        // Linear-time selection of the k best rows, then sort only those
        let valid = k.min(self.rows);
        if valid < self.rows {
            order.select_nth_unstable_by(valid - 1, by_rank);
            order.truncate(valid);
        }
        order.sort_unstable_by(by_rank);

        let mut hits: Vec<(usize, f32)> = order.into_iter().map(|i| (i, scores[i])).collect();
        // Pad short collections with the no-match sentinel
        hits.resize(k, (NO_MATCH, f32::NEG_INFINITY));
        hits
    }

    fn len(&self) -> usize {
        self.rows
    }
}

// ── Brute force ──────────────────────────────────────────────────────

/// Fallback exact search: one dot product per stored vector and a stable
/// full sort.
pub struct BruteForce {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl BruteForce {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }
}

impl VectorBackend for BruteForce {
    fn add(&mut self, vectors: &[Vec<f32>]) {
        for v in vectors {
            debug_assert_eq!(v.len(), self.dimensions);
            self.vectors.push(v.clone());
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(query, v)))
            .collect();

        // Stable sort keeps insertion order for equal scores
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(k);
        hits
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

/// Dot product; equals cosine similarity for unit-length inputs.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
