// Reciprocal Rank Fusion (RRF) across corpora and index kinds

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use localsearch_core::{ChunkId, Corpus, IndexKind, SearchHit};

/// Standard RRF k parameter value from the literature (Cormack, Clarke and
/// Buettcher, SIGIR 2009). Smaller k puts more weight on the top ranks.
pub const RRF_K: f32 = 60.0;

/// One ranked candidate list, best first.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub corpus: Corpus,
    pub kind: IndexKind,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub corpus: Corpus,
    pub chunk_id: ChunkId,
    pub score: f32,
    /// Lowest 1-based rank in any contributing list.
    pub best_rank: usize,
    pub matched_by: Vec<IndexKind>,
}

#[derive(Default)]
struct Acc {
    score: f64,
    best_rank: usize,
    kinds: BTreeSet<IndexKind>,
}

/// Combine ranked lists with RRF
///
/// RRF Formula: RRF_score(d) = sum_{r} 1 / (k + rank_r(d))
///
/// Where:
/// - d is a chunk, keyed by `(corpus, chunk_id)`
/// - r is a ranked list (one per corpus and index kind)
/// - rank_r(d) is the 1-indexed position of d in r
///
/// Raw scores are ignored, so BM25 and cosine lists need no normalization.
/// Ties on the fused score go to the better single-list rank, then to
/// `(corpus, chunk_id)`.
pub fn reciprocal_rank_fusion(lists: &[RankedList], k: f32) -> Vec<FusedHit> {
    let k_param = f64::from(k);
    let mut fused: HashMap<(Corpus, &str), Acc> = HashMap::new();

    for list in lists {
        let mut seen = BTreeSet::new();
        for (rank, hit) in list.hits.iter().enumerate() {
            if !seen.insert(hit.id.as_str()) { continue; }
            let rank_position = rank + 1; // 1-indexed
            let acc = fused.entry((list.corpus, hit.id.as_str())).or_insert_with(|| Acc { best_rank: usize::MAX, ..Acc::default() });
            acc.score += 1.0 / (k_param + rank_position as f64);
            acc.best_rank = acc.best_rank.min(rank_position);
            acc.kinds.insert(list.kind);
        }
    }

    let mut combined: Vec<((Corpus, &str), Acc)> = fused.into_iter().collect();
    combined.sort_by(|(ka, a), (kb, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.best_rank.cmp(&b.best_rank))
            .then_with(|| ka.cmp(kb))
    });

    combined
        .into_iter()
        .map(|((corpus, chunk_id), acc)| FusedHit {
            corpus,
            chunk_id: chunk_id.to_string(),
            score: acc.score as f32,
            best_rank: acc.best_rank,
            matched_by: acc.kinds.into_iter().collect(),
        })
        .collect()
}
