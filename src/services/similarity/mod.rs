// ============================================
// Item Similarity Engine (物品相似度)
// ============================================
//
// Builds the global item×item cosine similarity matrix from the user×item
// interaction matrix, after truncated-SVD dimensionality reduction. The
// component count adapts to matrix sparsity.

use ndarray::{Array2, Axis};
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{GourmetId, Interaction, UserId};

/// Symmetric item×item similarity, indexed by item id.
#[derive(Debug, Clone)]
pub struct ItemSimilarity {
    ids: Vec<GourmetId>,
    index: HashMap<GourmetId, usize>,
    matrix: Array2<f64>,
}

impl ItemSimilarity {
    /// Similarity row for one item: every other known item with its score.
    pub fn row(&self, id: GourmetId) -> Option<Vec<(GourmetId, f64)>> {
        let row_idx = *self.index.get(&id)?;
        Some(
            self.ids
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != row_idx)
                .map(|(i, other)| (*other, self.matrix[[row_idx, i]]))
                .collect(),
        )
    }

    pub fn score(&self, a: GourmetId, b: GourmetId) -> Option<f64> {
        let i = *self.index.get(&a)?;
        let j = *self.index.get(&b)?;
        Some(self.matrix[[i, j]])
    }
}

/// Build the item similarity matrix from the interaction table.
///
/// Returns `None` on an empty table: callers must treat that as "no
/// similarity available" and skip collaborative filtering.
pub fn build_item_similarity<R: Rng + ?Sized>(
    interactions: &[Interaction],
    rng: &mut R,
) -> Option<ItemSimilarity> {
    if interactions.is_empty() {
        return None;
    }

    let (user_ids, item_ids, matrix) = build_interaction_matrix(interactions);
    let user_count = user_ids.len();
    let item_count = item_ids.len();

    let nonzero = matrix.iter().filter(|v| **v != 0.0).count();
    let sparsity = 1.0 - nonzero as f64 / (user_count * item_count) as f64;
    let n_components = select_components(sparsity, item_count, user_count);

    debug!(
        user_count,
        item_count, sparsity, n_components, "building item similarity matrix"
    );

    // Item factors from the item-transposed matrix (items × users), reduced
    // to n_components dimensions.
    let item_matrix = matrix.t().to_owned();
    let factors = truncated_factors(&item_matrix, n_components, rng);
    let similarity = pairwise_cosine(&factors);

    let index = item_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    info!(item_count, n_components, "item similarity matrix ready");

    Some(ItemSimilarity {
        ids: item_ids,
        index,
        matrix: similarity,
    })
}

/// User×item matrix, duplicate (user, item) pairs aggregated by mean score.
fn build_interaction_matrix(
    interactions: &[Interaction],
) -> (Vec<UserId>, Vec<GourmetId>, Array2<f64>) {
    let mut user_ids: Vec<UserId> = interactions.iter().map(|i| i.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let mut item_ids: Vec<GourmetId> = interactions.iter().map(|i| i.gourmet_id).collect();
    item_ids.sort_unstable();
    item_ids.dedup();

    let user_index: HashMap<UserId, usize> =
        user_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let item_index: HashMap<GourmetId, usize> =
        item_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut sums = Array2::<f64>::zeros((user_ids.len(), item_ids.len()));
    let mut counts = Array2::<f64>::zeros((user_ids.len(), item_ids.len()));
    for i in interactions {
        let u = user_index[&i.user_id];
        let g = item_index[&i.gourmet_id];
        sums[[u, g]] += i.score;
        counts[[u, g]] += 1.0;
    }
    let mut matrix = sums;
    for (cell, count) in matrix.iter_mut().zip(counts.iter()) {
        if *count > 0.0 {
            *cell /= count;
        }
    }

    (user_ids, item_ids, matrix)
}

/// Sparsity-driven component count, capped by matrix shape.
fn select_components(sparsity: f64, item_count: usize, user_count: usize) -> usize {
    let raw = if sparsity > 0.99 {
        20.min(item_count / 4)
    } else if sparsity > 0.95 {
        30.min(item_count / 3)
    } else {
        50.min(item_count / 2)
    };
    raw.clamp(1, item_count.min(user_count))
}

/// Truncated SVD factors via randomized subspace iteration.
///
/// For X (items × users) this returns X·V where V is an orthonormal basis of
/// the dominant k-dimensional row space, i.e. U·Σ up to rotation — which
/// leaves pairwise cosine unchanged.
fn truncated_factors<R: Rng + ?Sized>(x: &Array2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let (n_items, n_users) = x.dim();
    let k = k.min(n_items).min(n_users).max(1);

    let mut probe = Array2::<f64>::zeros((n_items, k));
    for v in probe.iter_mut() {
        *v = rng.gen_range(-1.0..1.0);
    }

    // y spans the dominant row space of x (users × k)
    let mut y = x.t().dot(&probe);
    orthonormalize(&mut y);
    for _ in 0..2 {
        y = x.t().dot(&x.dot(&y));
        orthonormalize(&mut y);
    }

    x.dot(&y)
}

/// Modified Gram–Schmidt over columns; dependent columns collapse to zero.
fn orthonormalize(m: &mut Array2<f64>) {
    let cols = m.ncols();
    for j in 0..cols {
        for i in 0..j {
            let prev = m.column(i).to_owned();
            let proj = m.column(j).dot(&prev);
            let mut col = m.column_mut(j);
            col.scaled_add(-proj, &prev);
        }
        let norm = m.column(j).dot(&m.column(j)).sqrt();
        if norm > 1e-12 {
            m.column_mut(j).mapv_inplace(|v| v / norm);
        } else {
            m.column_mut(j).fill(0.0);
        }
    }
}

/// Pairwise cosine similarity over factor rows. Zero rows get similarity 0
/// against everything and 1.0 on the diagonal.
fn pairwise_cosine(factors: &Array2<f64>) -> Array2<f64> {
    let n = factors.nrows();
    let norms: Vec<f64> = factors
        .axis_iter(Axis(0))
        .map(|row| row.dot(&row).sqrt())
        .collect();

    let mut out = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        out[[i, i]] = 1.0;
        for j in (i + 1)..n {
            let denom = norms[i] * norms[j];
            let sim = if denom > 1e-12 {
                factors.row(i).dot(&factors.row(j)) / denom
            } else {
                0.0
            };
            out[[i, j]] = sim;
            out[[j, i]] = sim;
        }
    }
    out
}

/// Cache for the similarity matrix, keyed by a content hash of the
/// interaction table. Stale data is never reused: any change to the table
/// changes the stamp and forces a rebuild.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    stamp: Option<u64>,
    matrix: Option<Arc<ItemSimilarity>>,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build<R: Rng + ?Sized>(
        &mut self,
        interactions: &[Interaction],
        rng: &mut R,
    ) -> Option<Arc<ItemSimilarity>> {
        let stamp = interaction_stamp(interactions);
        if self.stamp == Some(stamp) {
            if let Some(matrix) = &self.matrix {
                debug!(stamp, "similarity cache hit");
                return Some(matrix.clone());
            }
        }

        let matrix = build_item_similarity(interactions, rng).map(Arc::new);
        self.stamp = Some(stamp);
        self.matrix = matrix.clone();
        matrix
    }
}

fn interaction_stamp(interactions: &[Interaction]) -> u64 {
    let mut hasher = DefaultHasher::new();
    interactions.len().hash(&mut hasher);
    for i in interactions {
        i.user_id.hash(&mut hasher);
        i.gourmet_id.hash(&mut hasher);
        i.kind.hash(&mut hasher);
        i.score.to_bits().hash(&mut hasher);
        i.created_at.timestamp().hash(&mut hasher);
    }
    hasher.finish()
}
