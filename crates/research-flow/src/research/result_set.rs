//! Deduplicating, order-preserving result accumulation

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

use crate::retrieval::Document;

/// Documents accumulated for the current plan
///
/// Unique by id, first-seen order, never longer than its cap.
#[derive(Debug, Clone)]
pub struct ResultSet {
    documents: Vec<Arc<Document>>,
    ids: HashSet<String>,
    cap: usize,
}

impl ResultSet {
    /// Empty set holding at most `cap` documents
    pub fn new(cap: usize) -> Self {
        Self {
            documents: Vec::new(),
            ids: HashSet::new(),
            cap: cap.max(1),
        }
    }

    /// Build from documents, keeping the first occurrence of each id
    pub fn from_documents(documents: impl IntoIterator<Item = Arc<Document>>, cap: usize) -> Self {
        Self::new(cap).merged(documents)
    }

    /// Pure merge: a new set with unseen documents appended up to the cap
    pub fn merged(&self, documents: impl IntoIterator<Item = Arc<Document>>) -> Self {
        let mut next = self.clone();
        for doc in documents {
            if next.documents.len() >= next.cap {
                break;
            }
            if next.ids.insert(doc.id.clone()) {
                next.documents.push(doc);
            }
        }
        next
    }

    /// Number of documents the merge would add
    pub fn count_new<'a>(&self, documents: impl IntoIterator<Item = &'a Arc<Document>>) -> usize {
        let mut seen = HashSet::new();
        documents
            .into_iter()
            .filter(|d| !self.ids.contains(&d.id) && seen.insert(d.id.clone()))
            .count()
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn ids(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Drop everything (replan)
    pub fn clear(&mut self) {
        self.documents.clear();
        self.ids.clear();
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.documents.iter().map(|d| d.as_ref()))
    }
}
