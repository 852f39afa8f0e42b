//! Metadata filters
//!
//! Filters arrive from oracle JSON in loose shapes (a string or a list, a
//! number or a numeric string). [`MetadataFilter::from_value`] accepts those
//! shapes; every present criterion is AND-combined.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::document::{Document, Sentiment};

/// Metadata filter criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Vec<Sentiment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_engagement: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_type: Option<Vec<String>>,
}

fn string_or_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

fn loose_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn loose_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl MetadataFilter {
    /// Parse loose oracle JSON; unusable criteria are dropped
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            verified: obj.get("verified").and_then(loose_bool),
            sentiment: obj.get("sentiment").and_then(string_or_list).map(|labels| {
                labels.iter().filter_map(|l| Sentiment::parse(l)).collect()
            }),
            min_engagement: obj.get("min_engagement").and_then(loose_u64),
            author_type: obj.get("author_type").and_then(string_or_list),
        }
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    pub fn with_sentiment(mut self, sentiment: Vec<Sentiment>) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_min_engagement(mut self, min: u64) -> Self {
        self.min_engagement = Some(min);
        self
    }

    pub fn with_author_type(mut self, types: Vec<String>) -> Self {
        self.author_type = Some(types);
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.verified.is_none()
            && self.sentiment.is_none()
            && self.min_engagement.is_none()
            && self.author_type.is_none()
    }

    /// Whether a document satisfies every criterion
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(verified) = self.verified {
            if doc.author.verified != verified {
                return false;
            }
        }
        if let Some(sentiments) = &self.sentiment {
            if !sentiments.contains(&doc.sentiment) {
                return false;
            }
        }
        if let Some(min) = self.min_engagement {
            if doc.engagement.total() < min {
                return false;
            }
        }
        if let Some(types) = &self.author_type {
            if !types.iter().any(|t| t == &doc.author.author_type) {
                return false;
            }
        }
        true
    }

    /// Keep matching documents, preserving order
    pub fn apply(&self, documents: &[Arc<Document>]) -> Vec<Arc<Document>> {
        documents.iter().filter(|d| self.matches(d)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::document::{Author, Engagement};
    use serde_json::json;

    fn doc(id: &str, verified: bool, sentiment: Sentiment, likes: u64, author_type: &str) -> Arc<Document> {
        Arc::new(
            Document::new(id, "text")
                .with_author(Author {
                    verified,
                    author_type: author_type.into(),
                    ..Default::default()
                })
                .with_sentiment(sentiment)
                .with_engagement(Engagement {
                    likes,
                    ..Default::default()
                }),
        )
    }

    fn docs() -> Vec<Arc<Document>> {
        vec![
            doc("a", true, Sentiment::Positive, 500, "researcher"),
            doc("b", false, Sentiment::Negative, 50, "developer"),
            doc("c", true, Sentiment::Negative, 1000, "journalist"),
        ]
    }

    #[test]
    fn test_loose_shapes() {
        let filter = MetadataFilter::from_value(&json!({
            "verified": "true",
            "sentiment": "negative",
            "min_engagement": "100",
            "author_type": ["journalist", "researcher"]
        }));

        assert_eq!(filter.verified, Some(true));
        assert_eq!(filter.sentiment, Some(vec![Sentiment::Negative]));
        assert_eq!(filter.min_engagement, Some(100));
        assert_eq!(filter.author_type.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_unparseable_criteria_dropped() {
        let filter = MetadataFilter::from_value(&json!({"min_engagement": "lots", "verified": 3}));
        assert!(filter.is_empty());
        assert!(MetadataFilter::from_value(&json!("verified")).is_empty());
    }

    #[test]
    fn test_and_combined() {
        let filter = MetadataFilter::default()
            .with_verified(true)
            .with_sentiment(vec![Sentiment::Negative]);
        let kept = filter.apply(&docs());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "c");
    }

    #[test]
    fn test_min_engagement_and_author_type() {
        let filter = MetadataFilter::default().with_min_engagement(100);
        let ids: Vec<_> = filter.apply(&docs()).iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let filter = MetadataFilter::default().with_author_type(vec!["developer".into()]);
        assert_eq!(filter.apply(&docs())[0].id, "b");
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        assert_eq!(MetadataFilter::default().apply(&docs()).len(), 3);
    }
}
