//! # Neighbourhood matrix builder
//!
//! For every entity along an [`Axis`] the builder keeps the top-K most similar
//! other entities, sorted by descending score. The resulting
//! [`NeighbourhoodMatrix`] is the trained model of the memory-based and
//! decomposition-based recommenders: computed once per dataset, read-only
//! afterwards, and serialisable so it can be reloaded instead of rebuilt.
//!
//! ## Algorithm
//!
//! 1. **Pre-fetch co-participants**: the sparse rating row of entity E lists every
//!    third party that shares at least one rating with E.
//! 2. **Candidate generation**: only entities reachable through those third parties
//!    can score above zero, so the pairwise loop runs over that union instead of
//!    every entity.
//! 3. **Scoring**: merge-join the two sparse rows into co-rating pairs and apply the
//!    configured [`SimilarityMetric`].
//! 4. **Ranking**: drop scores below `min_similarity`, sort descending (ties by
//!    ascending id), truncate to `top_k`.
//!
//! ## Complexity
//!
//! `O(n × c × m)` for n entities, c candidates per entity and m average row
//! length; `c` reaches `n` on dense data. Entities are processed in parallel with
//! rayon and collected in id order, so the output does not depend on scheduling.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{Axis, RatingMatrix};
use crate::similarity::{co_ratings, SimilarityMetric};

/// Scores below this are not kept as neighbours.
pub const MIN_SIMILARITY: f64 = 0.00001;

/// One neighbour of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEntry {
    pub id: u64,
    pub similarity: f64,
}

impl SimilarityEntry {
    pub fn new(id: u64, similarity: f64) -> Self {
        Self { id, similarity }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighbourhoodParams {
    pub metric: SimilarityMetric,
    pub min_similarity: f64,
    /// `None` keeps every neighbour above the threshold.
    pub top_k: Option<usize>,
}

impl Default for NeighbourhoodParams {
    fn default() -> Self {
        debug!("Creating NeighbourhoodParams with default parameters");
        Self {
            metric: SimilarityMetric::Euclidean,
            min_similarity: MIN_SIMILARITY,
            top_k: None,
        }
    }
}

// Custom PartialEq implementation using approximate equality for floats
impl PartialEq for NeighbourhoodParams {
    fn eq(&self, other: &Self) -> bool {
        self.metric == other.metric
            && approx::relative_eq!(self.min_similarity, other.min_similarity)
            && self.top_k == other.top_k
    }
}

/// Per-entity neighbour lists along one axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodMatrix {
    axis: Axis,
    neighbours: BTreeMap<u64, Vec<SimilarityEntry>>,
}

impl NeighbourhoodMatrix {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            neighbours: BTreeMap::new(),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Neighbours of `id`, most similar first. `None` when the entity has no entry.
    pub fn neighbours(&self, id: u64) -> Option<&[SimilarityEntry]> {
        self.neighbours.get(&id).map(Vec::as_slice)
    }

    /// The single most similar neighbour of `id`.
    pub fn top_neighbour(&self, id: u64) -> Option<&SimilarityEntry> {
        self.neighbours.get(&id).and_then(|list| list.first())
    }

    pub fn insert(&mut self, id: u64, entries: Vec<SimilarityEntry>) {
        self.neighbours.insert(id, entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[SimilarityEntry])> + '_ {
        self.neighbours.iter().map(|(&id, list)| (id, list.as_slice()))
    }

    /// Number of entities with an entry (possibly empty).
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }
}

/// Filter, sort and truncate raw scores into a neighbour list.
pub fn rank_neighbours(
    mut entries: Vec<SimilarityEntry>,
    min_similarity: f64,
    top_k: Option<usize>,
) -> Vec<SimilarityEntry> {
    entries.retain(|e| e.similarity >= min_similarity);
    entries.sort_unstable_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some(k) = top_k {
        entries.truncate(k);
    }
    entries
}

/// Score every candidate neighbour of the entity at row `index` along `axis`.
pub fn neighbours_of(
    matrix: &RatingMatrix,
    axis: Axis,
    index: usize,
    params: &NeighbourhoodParams,
) -> Vec<SimilarityEntry> {
    let Some(own) = matrix.vector(axis, index) else {
        return Vec::new();
    };

    // every third party that rated alongside this entity links it to candidates
    let counterpart = axis.counterpart();
    let mut candidates = BTreeSet::new();
    for &third in own.indices() {
        if let Some(row) = matrix.vector(counterpart, third) {
            candidates.extend(row.indices().iter().copied());
        }
    }
    candidates.remove(&index);

    let ids = matrix.ids(axis);
    let scored: Vec<SimilarityEntry> = candidates
        .into_iter()
        .filter_map(|other| {
            let row = matrix.vector(axis, other)?;
            let pairs = co_ratings(&own, &row);
            Some(SimilarityEntry::new(ids[other], params.metric.score(&pairs)))
        })
        .collect();

    rank_neighbours(scored, params.min_similarity, params.top_k)
}

/// Build the neighbourhood matrix for every entity along `axis`.
pub fn build_neighbourhood(
    matrix: &RatingMatrix,
    axis: Axis,
    params: &NeighbourhoodParams,
) -> NeighbourhoodMatrix {
    let start = Instant::now();
    let n = matrix.len(axis);
    info!("Creating {:?} neighbourhood matrix for {} entities", axis, n);
    debug!(
        "Neighbourhood parameters: metric={:?}, min_similarity={}, top_k={:?}",
        params.metric, params.min_similarity, params.top_k
    );

    let ids = matrix.ids(axis);
    let rows: Vec<(u64, Vec<SimilarityEntry>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let entries = neighbours_of(matrix, axis, i, params);
            trace!("Entity {} has {} neighbours", ids[i], entries.len());
            (ids[i], entries)
        })
        .collect();

    let mut out = NeighbourhoodMatrix::new(axis);
    let mut total = 0usize;
    for (id, entries) in rows {
        total += entries.len();
        out.insert(id, entries);
    }

    info!(
        "Neighbourhood matrix built: {} entities, {} entries in {:.3?}",
        out.len(),
        total,
        start.elapsed()
    );
    out
}
