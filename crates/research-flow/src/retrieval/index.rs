//! In-memory hybrid index
//!
//! Built once per corpus and shared across runs. Semantic similarity is a
//! TF-IDF cosine; it needs no model download and is deterministic.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use super::document::{Corpus, Document};
use super::{RetrievalEngine, ScoredDocument};

/// Interactions above which a document gets a small keyword boost
const ENGAGEMENT_BOOST_THRESHOLD: u64 = 100;
const EXACT_PHRASE_BOOST: f64 = 2.0;
const VERIFIED_BOOST: f64 = 1.2;
const ENGAGEMENT_BOOST: f64 = 1.1;

fn word_pattern() -> Option<&'static Regex> {
    static WORD: OnceLock<Option<Regex>> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").ok()).as_ref()
}

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    match word_pattern() {
        Some(words) => words.find_iter(&lower).map(|m| m.as_str().to_string()).collect(),
        None => lower
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

struct IndexEntry {
    lower_text: String,
    words: HashSet<String>,
    weights: HashMap<String, f64>,
    norm: f64,
}

/// Keyword + TF-IDF index over a [`Corpus`]
pub struct InMemoryIndex {
    documents: Vec<Arc<Document>>,
    entries: Vec<IndexEntry>,
    idf: HashMap<String, f64>,
}

impl InMemoryIndex {
    /// Index every document in the corpus
    pub fn new(corpus: &Corpus) -> Self {
        let documents: Vec<Arc<Document>> = corpus.documents().to_vec();
        let tokenized: Vec<(String, Vec<String>)> = documents
            .iter()
            .map(|d| {
                let text = d.searchable_text().to_lowercase();
                let tokens = tokenize(&text);
                (text, tokens)
            })
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for (_, tokens) in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f64;
        let idf: HashMap<String, f64> = doc_freq
            .into_iter()
            .map(|(term, df)| (term.to_string(), ((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0))
            .collect();

        let entries = tokenized
            .into_iter()
            .map(|(lower_text, tokens)| {
                let weights = Self::weigh(&tokens, &idf);
                let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
                IndexEntry {
                    lower_text,
                    words: tokens.into_iter().collect(),
                    weights,
                    norm,
                }
            })
            .collect();

        debug!(documents = documents.len(), terms = idf.len(), "Index built");
        Self {
            documents,
            entries,
            idf,
        }
    }

    /// Index size
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn weigh(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
        let mut counts: HashMap<String, f64> = HashMap::new();
        for token in tokens {
            *counts.entry(token.clone()).or_insert(0.0) += 1.0;
        }
        let len = tokens.len().max(1) as f64;
        counts
            .into_iter()
            .map(|(term, count)| {
                let weight = (count / len) * idf.get(&term).copied().unwrap_or(0.0);
                (term, weight)
            })
            .collect()
    }

    fn ranked(&self, scores: Vec<(usize, f64)>, k: usize) -> Vec<ScoredDocument> {
        let mut scores: Vec<(usize, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredDocument::new(self.documents[i].clone(), score))
            .collect()
    }
}

/// Min-max normalize scores into [0, 1]; a flat list maps to 1.0
fn min_max_normalize(results: &[ScoredDocument]) -> HashMap<&str, f64> {
    let min = results.iter().map(|r| r.score).fold(f64::INFINITY, f64::min);
    let max = results.iter().map(|r| r.score).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    results
        .iter()
        .map(|r| {
            let normalized = if range > f64::EPSILON {
                (r.score - min) / range
            } else if max > 0.0 {
                1.0
            } else {
                0.0
            };
            (r.document.id.as_str(), normalized)
        })
        .collect()
}

impl RetrievalEngine for InMemoryIndex {
    fn keyword_search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        let query_lower = query.trim().to_lowercase();
        let query_words: HashSet<String> = tokenize(&query_lower).into_iter().collect();
        if query_words.is_empty() {
            return Vec::new();
        }

        let scores = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let overlap = query_words.intersection(&entry.words).count() as f64;
                let mut score = overlap / query_words.len() as f64;

                if entry.lower_text.contains(&query_lower) {
                    score *= EXACT_PHRASE_BOOST;
                }
                let doc = &self.documents[i];
                if doc.author.verified {
                    score *= VERIFIED_BOOST;
                }
                if doc.engagement.interactions() > ENGAGEMENT_BOOST_THRESHOLD {
                    score *= ENGAGEMENT_BOOST;
                }
                (i, score)
            })
            .collect();

        self.ranked(scores, k)
    }

    fn semantic_search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        let query_weights = Self::weigh(&tokenize(query), &self.idf);
        let query_norm = query_weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if query_norm == 0.0 {
            return Vec::new();
        }

        let scores = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                if entry.norm == 0.0 {
                    return (i, 0.0);
                }
                let dot: f64 = query_weights
                    .iter()
                    .filter_map(|(term, qw)| entry.weights.get(term).map(|dw| qw * dw))
                    .sum();
                (i, dot / (query_norm * entry.norm))
            })
            .collect();

        self.ranked(scores, k)
    }

    fn hybrid_search(&self, query: &str, k: usize, alpha: f64) -> Vec<Arc<Document>> {
        let alpha = alpha.clamp(0.0, 1.0);
        let semantic = self.semantic_search(query, k * 2);
        let keyword = self.keyword_search(query, k * 2);

        let semantic_scores = min_max_normalize(&semantic);
        let keyword_scores = min_max_normalize(&keyword);

        let mut combined: Vec<(Arc<Document>, f64)> = Vec::new();
        let mut seen = HashSet::new();
        for candidate in semantic.iter().chain(keyword.iter()) {
            let id = candidate.document.id.as_str();
            if !seen.insert(id) {
                continue;
            }
            let sem = semantic_scores.get(id).copied().unwrap_or(0.0);
            let key = keyword_scores.get(id).copied().unwrap_or(0.0);
            combined.push((candidate.document.clone(), alpha * sem + (1.0 - alpha) * key));
        }

        combined.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        combined.into_iter().take(k).map(|(doc, _)| doc).collect()
    }
}
