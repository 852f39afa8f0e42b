//! Retrieval over a read-only document corpus
//!
//! [`RetrievalEngine`] is the seam the workflow consumes; [`InMemoryIndex`]
//! is the bundled implementation (keyword overlap, TF-IDF cosine and a
//! min-max normalized hybrid of the two).

pub mod document;
pub mod filter;
pub mod index;

use std::sync::Arc;

pub use document::{Author, Corpus, Document, Engagement, Sentiment};
pub use filter::MetadataFilter;
pub use index::InMemoryIndex;

/// A document with its retrieval score
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Arc<Document>,
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(document: Arc<Document>, score: f64) -> Self {
        Self { document, score }
    }
}

/// Search engine over the corpus
///
/// Calls are synchronous and side-effect free; one engine is shared by every
/// concurrent run.
pub trait RetrievalEngine: Send + Sync {
    /// Word-overlap search, best first
    fn keyword_search(&self, query: &str, k: usize) -> Vec<ScoredDocument>;

    /// Vector-similarity search, best first
    fn semantic_search(&self, query: &str, k: usize) -> Vec<ScoredDocument>;

    /// Weighted blend of both searches; `alpha` weights the semantic side
    fn hybrid_search(&self, query: &str, k: usize, alpha: f64) -> Vec<Arc<Document>>;

    /// Keep documents matching every criterion
    fn filter_by_metadata(&self, documents: &[Arc<Document>], filters: &MetadataFilter) -> Vec<Arc<Document>> {
        filters.apply(documents)
    }
}
