//! Document and corpus model
//!
//! Documents are loaded once and shared read-only as `Arc<Document>` across
//! every concurrent run.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::RetrievalError;

/// Sentiment tag attached to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Parse a loose sentiment label
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub username: String,
    pub display_name: String,
    pub verified: bool,
    pub followers: u64,
    pub author_type: String,
}

/// Engagement counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engagement {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub bookmarks: u64,
}

impl Engagement {
    /// Sum of every counter
    pub fn total(&self) -> u64 {
        self.likes + self.retweets + self.replies + self.bookmarks
    }

    /// Likes, retweets and replies
    pub fn interactions(&self) -> u64 {
        self.likes + self.retweets + self.replies
    }
}

/// A unit of retrieved content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Accepts RFC 3339 timestamps and naive ISO-8601 timestamps (read as UTC)
fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

impl Document {
    /// Minimal document, mostly for tests and fixtures
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: Author::default(),
            created_at: None,
            engagement: Engagement::default(),
            sentiment: Sentiment::default(),
            topics: Vec::new(),
            language: default_language(),
            category: None,
            is_reply: false,
            reply_to: None,
        }
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.author = author;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_engagement(mut self, engagement: Engagement) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Text used for indexing: body, topics and author display name
    pub fn searchable_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.topics.len() + 2);
        parts.push(self.text.as_str());
        parts.extend(self.topics.iter().map(String::as_str));
        parts.push(self.author.display_name.as_str());
        parts.join(" ")
    }
}

/// Read-only document collection
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Arc<Document>>,
}

impl Corpus {
    /// Build a corpus, rejecting duplicate ids
    pub fn from_documents(documents: Vec<Document>) -> Result<Self, RetrievalError> {
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(RetrievalError::DuplicateId(doc.id.clone()));
            }
        }

        Ok(Self {
            documents: documents.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a JSON array of documents
    pub fn from_json_str(json: &str) -> Result<Self, RetrievalError> {
        let documents: Vec<Document> = serde_json::from_str(json)?;
        Self::from_documents(documents)
    }

    /// Load a JSON array of documents from disk
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RetrievalError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let corpus = Self::from_json_str(&raw)?;
        info!(path = %path.display(), documents = corpus.len(), "Corpus loaded");
        Ok(corpus)
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Document>> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {
            "id": "post_1",
            "text": "Just read an amazing paper on LLMs",
            "author": {"username": "researcher_1", "display_name": "Researcher 7", "verified": true, "followers": 1200, "author_type": "researcher"},
            "created_at": "2024-05-01T12:30:00.123456",
            "engagement": {"likes": 10, "retweets": 2, "replies": 1, "bookmarks": 4},
            "sentiment": "positive",
            "topics": ["LLMs", "AI"],
            "language": "en",
            "has_media": false,
            "is_reply": false,
            "reply_to": null
        },
        {"id": "post_2", "text": "LLMs are overhyped", "sentiment": "negative", "created_at": "2024-05-02T08:00:00Z"}
    ]"#;

    #[test]
    fn test_parse_corpus() {
        let corpus = Corpus::from_json_str(SAMPLE).unwrap();
        assert_eq!(corpus.len(), 2);

        let first = corpus.get("post_1").unwrap();
        assert!(first.author.verified);
        assert_eq!(first.engagement.total(), 17);
        assert_eq!(first.engagement.interactions(), 13);
        assert_eq!(first.sentiment, Sentiment::Positive);
        assert!(first.created_at.is_some());

        let second = corpus.get("post_2").unwrap();
        assert_eq!(second.sentiment, Sentiment::Negative);
        assert_eq!(second.language, "en");
        assert_eq!(second.author, Author::default());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let docs = vec![Document::new("a", "x"), Document::new("a", "y")];
        let result = Corpus::from_documents(docs);
        assert!(matches!(result, Err(RetrievalError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let corpus = Corpus::from_json_file(file.path()).unwrap();
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Corpus::from_json_file("/nonexistent/corpus.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/corpus.json"));
    }

    #[test]
    fn test_searchable_text() {
        let doc = Document::new("a", "hello")
            .with_topics(vec!["Rust".into()])
            .with_author(Author {
                display_name: "Dev 1".into(),
                ..Default::default()
            });
        assert_eq!(doc.searchable_text(), "hello Rust Dev 1");
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!(Sentiment::parse(" Negative "), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse("sarcastic"), None);
    }
}
