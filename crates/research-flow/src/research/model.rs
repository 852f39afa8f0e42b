//! Research data model
//!
//! Typed values produced by the step executors. Oracle JSON is coerced into
//! these shapes in [`super::normalize`]; every type also has a documented
//! conservative fallback used when the oracle is unreachable.

use serde::{Deserialize, Serialize};

use crate::retrieval::{Document, MetadataFilter, Sentiment};

/// Kind of research question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    TrendAnalysis,
    InfoExtraction,
    Comparison,
    Sentiment,
    Temporal,
    #[default]
    Other,
}

impl QueryType {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "trend_analysis" | "trend" => Self::TrendAnalysis,
            "info_extraction" | "information_extraction" => Self::InfoExtraction,
            "comparison" => Self::Comparison,
            "sentiment" | "sentiment_analysis" => Self::Sentiment,
            "temporal" => Self::Temporal,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrendAnalysis => "trend_analysis",
            Self::InfoExtraction => "info_extraction",
            Self::Comparison => "comparison",
            Self::Sentiment => "sentiment",
            Self::Temporal => "temporal",
            Self::Other => "other",
        }
    }
}

/// Expected effort of a plan or query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" | "simple" => Self::Low,
            "high" | "complex" => Self::High,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Plan step action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Search,
    Filter,
    Analyze,
    /// Anything the executor cannot act on
    #[serde(other)]
    Other,
}

impl StepAction {
    /// Loose match: any label mentioning search or filter resolves to it
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.contains("search") || label.contains("retriev") {
            Self::Search
        } else if label.contains("filter") {
            Self::Filter
        } else if label.contains("analy") {
            Self::Analyze
        } else {
            Self::Other
        }
    }
}

/// Retrieval method hint on a search step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolHint {
    #[serde(rename = "hybrid_search")]
    Hybrid,
    #[serde(rename = "semantic_search")]
    Semantic,
    #[serde(rename = "keyword_search")]
    Keyword,
    #[serde(rename = "filter_by_metadata")]
    Filter,
}

impl ToolHint {
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.contains("hybrid") {
            Some(Self::Hybrid)
        } else if label.contains("semantic") || label.contains("vector") {
            Some(Self::Semantic)
        } else if label.contains("keyword") {
            Some(Self::Keyword)
        } else if label.contains("filter") {
            Some(Self::Filter)
        } else {
            None
        }
    }
}

/// Search dispatch resolved from a step's hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    Hybrid,
    Semantic,
    Keyword,
}

impl SearchMethod {
    /// Hybrid unless exactly one of semantic/keyword is hinted
    pub fn from_hints(hints: &[ToolHint]) -> Self {
        let semantic = hints.contains(&ToolHint::Semantic);
        let keyword = hints.contains(&ToolHint::Keyword);
        if hints.contains(&ToolHint::Hybrid) {
            return Self::Hybrid;
        }
        match (semantic, keyword) {
            (true, false) => Self::Semantic,
            (false, true) => Self::Keyword,
            _ => Self::Hybrid,
        }
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: StepAction,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_hints: Vec<ToolHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<MetadataFilter>,
}

impl PlanStep {
    pub fn search(description: impl Into<String>, tool_hints: Vec<ToolHint>) -> Self {
        Self {
            action: StepAction::Search,
            description: description.into(),
            tool_hints,
            filters: None,
        }
    }

    pub fn filter(filters: MetadataFilter) -> Self {
        Self {
            action: StepAction::Filter,
            description: String::new(),
            tool_hints: vec![ToolHint::Filter],
            filters: Some(filters),
        }
    }

    pub fn analyze(description: impl Into<String>) -> Self {
        Self {
            action: StepAction::Analyze,
            description: description.into(),
            tool_hints: Vec::new(),
            filters: None,
        }
    }

    pub fn with_filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Whether Execute can act on this step
    pub fn is_executable(&self) -> bool {
        match self.action {
            StepAction::Search => true,
            StepAction::Filter => self.filters.as_ref().is_some_and(|f| !f.is_empty()),
            StepAction::Analyze | StepAction::Other => false,
        }
    }
}

/// Decomposition of a query into steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub query_type: QueryType,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    pub complexity: Complexity,
    #[serde(default)]
    pub use_dynamic_tools: bool,
    /// Substituted because the oracle failed or returned an invalid shape
    #[serde(default)]
    pub is_fallback: bool,
}

impl Plan {
    /// Search-then-analyze plan used when the planner cannot be trusted.
    ///
    /// The search step has no description, so Execute searches the query itself.
    pub fn fallback(query_type: QueryType) -> Self {
        Self {
            query_type,
            steps: vec![
                PlanStep::search("", vec![ToolHint::Hybrid]),
                PlanStep::analyze("Analyze retrieved results"),
            ],
            success_criteria: vec!["Relevant results found".into(), "Analysis completed".into()],
            complexity: Complexity::Medium,
            use_dynamic_tools: false,
            is_fallback: true,
        }
    }

    pub fn executable_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.is_executable())
    }
}

/// Self-reported quality of the analyzed data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    High,
    #[default]
    Medium,
    Low,
}

impl DataQuality {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Self::High)
    }
}

/// Sentiment counts over analyzed documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentHistogram {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl SentimentHistogram {
    /// Count sentiment tags directly from documents
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Self {
        docs.into_iter().fold(Self::default(), |mut hist, doc| {
            match doc.sentiment {
                Sentiment::Positive => hist.positive += 1,
                Sentiment::Negative => hist.negative += 1,
                Sentiment::Neutral => hist.neutral += 1,
            }
            hist
        })
    }

    pub fn total(&self) -> u64 {
        self.positive + self.negative + self.neutral
    }

    /// Share of negative documents; 0 when empty
    pub fn negative_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.negative as f64 / total as f64,
        }
    }
}

/// The oracle's read of the result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub themes: Vec<String>,
    pub insights: Vec<String>,
    pub sentiment: SentimentHistogram,
    #[serde(default)]
    pub notable_findings: Vec<String>,
    /// Clamped to [0, 1]
    pub confidence: f64,
    pub data_quality: DataQuality,
    pub gaps: Vec<String>,
    #[serde(default)]
    pub is_fallback: bool,
    /// Unparseable oracle text, kept for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl Analysis {
    /// Used when the analyzer call fails
    pub fn fallback(results_count: usize) -> Self {
        Self {
            themes: vec!["Unable to analyze - API error".into()],
            insights: vec![format!("Retrieved {} items", results_count)],
            sentiment: SentimentHistogram::default(),
            notable_findings: Vec::new(),
            confidence: 0.3,
            data_quality: DataQuality::Low,
            gaps: vec!["API error prevented full analysis".into()],
            is_fallback: true,
            raw_response: None,
        }
    }

    /// Used when there is nothing to analyze
    pub fn no_results() -> Self {
        Self {
            themes: Vec::new(),
            insights: vec!["No documents were retrieved".into()],
            sentiment: SentimentHistogram::default(),
            notable_findings: Vec::new(),
            confidence: 0.1,
            data_quality: DataQuality::Low,
            gaps: vec!["No documents retrieved for this query".into()],
            is_fallback: true,
            raw_response: None,
        }
    }
}

/// Decision to retrieve more without discarding results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub needed: bool,
    pub reason: String,
    /// Only executable search/filter steps
    pub next_steps: Vec<PlanStep>,
}

impl Refinement {
    pub fn not_needed(reason: impl Into<String>) -> Self {
        Self {
            needed: false,
            reason: reason.into(),
            next_steps: Vec::new(),
        }
    }

    /// Used when the refiner call fails
    pub fn fallback() -> Self {
        Self::not_needed("API error - skipping refinement to avoid invalid state")
    }

    /// Refinement with the given steps; needed only when any is executable
    pub fn with_steps(reason: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let next_steps: Vec<PlanStep> = steps.into_iter().filter(PlanStep::is_executable).collect();
        Self {
            needed: !next_steps.is_empty(),
            reason: reason.into(),
            next_steps,
        }
    }
}

/// Decision to discard the plan and start over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub replan_needed: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_strategy: Option<String>,
    /// Negative-sentiment share shown to the evaluator; informational only
    pub negative_ratio: f64,
    #[serde(default)]
    pub skipped: bool,
}

impl Evaluation {
    /// Used when the evaluator call fails
    pub fn fallback(negative_ratio: f64) -> Self {
        Self {
            replan_needed: false,
            reason: "API error - proceeding with current plan".into(),
            suggested_strategy: None,
            negative_ratio,
            skipped: false,
        }
    }

    /// Evaluate skipped by fast mode or high confidence
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            replan_needed: false,
            reason: reason.into(),
            suggested_strategy: None,
            negative_ratio: 0.0,
            skipped: true,
        }
    }
}

/// Post-hoc review of the draft summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub passed: bool,
    pub hallucinations: Vec<String>,
    pub biases: Vec<String>,
    pub corrections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_adjustment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_summary: Option<String>,
    #[serde(default)]
    pub skipped: bool,
}

impl Critique {
    /// Used when the critique call fails; never blocks the run
    pub fn fallback() -> Self {
        Self {
            passed: true,
            hallucinations: Vec::new(),
            biases: vec!["Could not complete critique due to API error".into()],
            corrections: Vec::new(),
            confidence_adjustment: None,
            revised_summary: None,
            skipped: false,
        }
    }

    /// Critique skipped by fast mode or high confidence
    pub fn skipped() -> Self {
        Self {
            passed: true,
            hallucinations: Vec::new(),
            biases: Vec::new(),
            corrections: Vec::new(),
            confidence_adjustment: None,
            revised_summary: None,
            skipped: true,
        }
    }

    /// Failed when the critic says so or lists any unsupported claim.
    ///
    /// Routing, summary revision and pass rates all read this.
    pub fn failed(&self) -> bool {
        !self.passed || !self.hallucinations.is_empty()
    }
}

/// Validator verdict on the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    #[default]
    Proceed,
    Refine,
    Replan,
}

impl ValidationAction {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "refine" | "refinement" => Self::Refine,
            "replan" | "re-plan" => Self::Replan,
            _ => Self::Proceed,
        }
    }
}

/// Relevance check of retrieved documents against the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub relevance_score: f64,
    pub action: ValidationAction,
    pub reason: String,
    /// Extra retrieval steps suggested by the validator
    #[serde(default)]
    pub recommendations: Vec<PlanStep>,
}

impl Validation {
    /// Deterministic verdict for an empty result set
    pub fn empty_results() -> Self {
        Self {
            relevance_score: 0.0,
            action: ValidationAction::Replan,
            reason: "No documents retrieved".into(),
            recommendations: Vec::new(),
        }
    }

    /// Used when the validator call fails
    pub fn fallback() -> Self {
        Self {
            relevance_score: 0.5,
            action: ValidationAction::Proceed,
            reason: "API error - proceeding without validation".into(),
            recommendations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_action_parse() {
        assert_eq!(StepAction::parse("Search"), StepAction::Search);
        assert_eq!(StepAction::parse("semantic_search"), StepAction::Search);
        assert_eq!(StepAction::parse("filter_results"), StepAction::Filter);
        assert_eq!(StepAction::parse("analyze"), StepAction::Analyze);
        assert_eq!(StepAction::parse("summarize"), StepAction::Other);
    }

    #[test]
    fn test_search_method_from_hints() {
        assert_eq!(SearchMethod::from_hints(&[]), SearchMethod::Hybrid);
        assert_eq!(SearchMethod::from_hints(&[ToolHint::Semantic]), SearchMethod::Semantic);
        assert_eq!(SearchMethod::from_hints(&[ToolHint::Keyword]), SearchMethod::Keyword);
        assert_eq!(
            SearchMethod::from_hints(&[ToolHint::Semantic, ToolHint::Keyword]),
            SearchMethod::Hybrid
        );
        assert_eq!(
            SearchMethod::from_hints(&[ToolHint::Keyword, ToolHint::Hybrid]),
            SearchMethod::Hybrid
        );
    }

    #[test]
    fn test_step_executability() {
        assert!(PlanStep::search("q", vec![]).is_executable());
        assert!(!PlanStep::analyze("a").is_executable());
        assert!(!PlanStep::filter(MetadataFilter::default()).is_executable());
        assert!(PlanStep::filter(MetadataFilter::default().with_verified(true)).is_executable());
    }

    #[test]
    fn test_fallback_plan_shape() {
        let plan = Plan::fallback(QueryType::Sentiment);
        assert!(plan.is_fallback);
        assert_eq!(plan.query_type, QueryType::Sentiment);
        assert_eq!(plan.executable_steps().count(), 1);
        assert_eq!(plan.steps[0].tool_hints, vec![ToolHint::Hybrid]);
        assert!(plan.steps[0].description.is_empty());
    }

    #[test]
    fn test_refinement_with_steps_drops_unexecutable() {
        let refinement = Refinement::with_steps("gaps", vec![PlanStep::analyze("think")]);
        assert!(!refinement.needed);
        assert!(refinement.next_steps.is_empty());

        let refinement = Refinement::with_steps("gaps", vec![PlanStep::search("more", vec![])]);
        assert!(refinement.needed);
    }

    #[test]
    fn test_sentiment_histogram() {
        let docs = vec![
            Document::new("a", "").with_sentiment(Sentiment::Negative),
            Document::new("b", "").with_sentiment(Sentiment::Negative),
            Document::new("c", "").with_sentiment(Sentiment::Positive),
            Document::new("d", ""),
        ];
        let hist = SentimentHistogram::from_documents(&docs);
        assert_eq!(hist.total(), 4);
        assert!((hist.negative_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(SentimentHistogram::default().negative_ratio(), 0.0);
    }

    #[test]
    fn test_critique_failure_check() {
        let mut critique = Critique::fallback();
        assert!(!critique.failed());
        assert!(!Critique::skipped().failed());

        critique.hallucinations.push("made up".into());
        assert!(critique.passed);
        assert!(critique.failed());

        critique.hallucinations.clear();
        critique.passed = false;
        assert!(critique.failed());
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(QueryType::parse("Trend Analysis"), QueryType::TrendAnalysis);
        assert_eq!(QueryType::parse("unknown"), QueryType::Other);
        assert_eq!(Complexity::parse("HIGH"), Complexity::High);
        assert_eq!(DataQuality::parse("unknown"), DataQuality::Low);
        assert_eq!(ValidationAction::parse("Replan"), ValidationAction::Replan);
        assert_eq!(ToolHint::parse("keyword_search"), Some(ToolHint::Keyword));
        assert_eq!(ToolHint::parse("web"), None);
    }
}
