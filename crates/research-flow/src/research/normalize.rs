//! Coercion of recovered oracle JSON into typed phase outputs
//!
//! Oracle output is untrusted: keys may be missing, renamed, or carry the
//! wrong JSON type. Every function here accepts any [`Value`] (including the
//! `raw_response` wrapper) and returns a complete value with safe defaults.

use serde_json::Value;

use super::model::{
    Analysis, Complexity, Critique, DataQuality, Evaluation, Plan, PlanStep, QueryType, Refinement,
    SentimentHistogram, StepAction, ToolHint, Validation, ValidationAction,
};
use crate::llm::RAW_RESPONSE_KEY;
use crate::retrieval::MetadataFilter;

/// Suffix appended when the oracle asked for refinement without usable steps
pub const NO_EXECUTABLE_STEPS: &str = " (no executable steps after normalization)";

fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k)).filter(|v| !v.is_null())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

fn unit(value: Option<&Value>, default: f64) -> f64 {
    number(value).filter(|f| f.is_finite()).unwrap_or(default).clamp(0.0, 1.0)
}

fn raw_text(value: &Value) -> Option<String> {
    value
        .get(RAW_RESPONSE_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn tool_hints(value: Option<&Value>) -> Vec<ToolHint> {
    let hints: Vec<ToolHint> = string_list(value).iter().filter_map(|t| ToolHint::parse(t)).collect();
    if hints.is_empty() {
        vec![ToolHint::Hybrid]
    } else {
        hints
    }
}

fn filters(value: &Value) -> Option<MetadataFilter> {
    field(value, &["filters"])
        .map(MetadataFilter::from_value)
        .filter(|f| !f.is_empty())
}

/// Canonical executable step, or `None` when the entry cannot be executed
///
/// Any action mentioning search becomes a search whose description falls
/// back to the query; a filter survives only with a non-empty filter object.
pub fn executable_step(value: &Value, query: &str) -> Option<PlanStep> {
    if !value.is_object() {
        return None;
    }
    let action = text(field(value, &["action"]))
        .map(|a| StepAction::parse(&a))
        .unwrap_or(StepAction::Search);

    match action {
        StepAction::Search => {
            let description = text(field(value, &["description", "query"])).unwrap_or_else(|| query.to_string());
            let mut step = PlanStep::search(description, tool_hints(field(value, &["tools", "tool_hints"])));
            step.filters = filters(value);
            Some(step)
        }
        StepAction::Filter => filters(value).map(PlanStep::filter),
        StepAction::Analyze | StepAction::Other => None,
    }
}

fn plan_step(value: &Value, query: &str) -> Option<PlanStep> {
    let action = text(field(value, &["action"])).map(|a| StepAction::parse(&a));
    if action == Some(StepAction::Analyze) {
        let description = text(field(value, &["description"])).unwrap_or_else(|| "Analyze retrieved results".into());
        return Some(PlanStep::analyze(description));
    }
    executable_step(value, query)
}

/// Plan from planner output
///
/// A missing or empty step list, or one with nothing executable, falls back
/// to the default search-then-analyze steps while keeping the query type.
pub fn plan_from_value(value: &Value, query: &str) -> Plan {
    let query_type = text(field(value, &["query_type"]))
        .map(|t| QueryType::parse(&t))
        .unwrap_or_default();

    let steps: Vec<PlanStep> = match field(value, &["steps"]) {
        Some(Value::Array(items)) => items.iter().filter_map(|s| plan_step(s, query)).collect(),
        _ => Vec::new(),
    };

    if !steps.iter().any(PlanStep::is_executable) {
        let mut plan = Plan::fallback(query_type);
        plan.success_criteria.truncate(1);
        return plan;
    }

    Plan {
        query_type,
        steps,
        success_criteria: string_list(field(value, &["success_criteria"])),
        complexity: text(field(value, &["expected_complexity", "complexity"]))
            .map(|c| Complexity::parse(&c))
            .unwrap_or_default(),
        use_dynamic_tools: flag(field(value, &["use_dynamic_tools"])).unwrap_or(false),
        is_fallback: false,
    }
}

fn histogram(value: Option<&Value>) -> SentimentHistogram {
    let count = |key: &str| {
        number(value.and_then(|v| v.get(key)))
            .filter(|n| *n >= 0.0)
            .map(|n| n as u64)
            .unwrap_or(0)
    };
    SentimentHistogram {
        positive: count("positive"),
        negative: count("negative"),
        neutral: count("neutral"),
    }
}

/// Analysis from analyst output; missing confidence is 0.5
pub fn analysis_from_value(value: &Value) -> Analysis {
    Analysis {
        themes: string_list(field(value, &["main_themes", "themes"])),
        insights: string_list(field(value, &["key_insights", "insights"])),
        sentiment: histogram(field(value, &["sentiment_analysis", "sentiment"])),
        notable_findings: string_list(field(value, &["notable_findings"])),
        confidence: unit(field(value, &["confidence"]), 0.5),
        data_quality: text(field(value, &["data_quality"]))
            .map(|q| DataQuality::parse(&q))
            .unwrap_or_default(),
        gaps: string_list(field(value, &["gaps_or_limitations", "gaps"])),
        is_fallback: false,
        raw_response: raw_text(value),
    }
}

/// Refinement from refiner output
///
/// Only executable steps survive; with none left `needed` is forced false
/// whatever the oracle claimed.
pub fn refinement_from_value(value: &Value, query: &str) -> Refinement {
    if !value.is_object() {
        return Refinement::not_needed("Invalid refinement response");
    }

    let next_steps: Vec<PlanStep> = match field(value, &["next_steps"]) {
        Some(Value::Array(items)) => items.iter().filter_map(|s| executable_step(s, query)).collect(),
        _ => Vec::new(),
    };
    let claimed = flag(field(value, &["refinement_needed"])).unwrap_or(!next_steps.is_empty());
    let mut reason = text(field(value, &["reason"])).unwrap_or_else(|| "Refinement check completed".into());

    if claimed && next_steps.is_empty() {
        reason.push_str(NO_EXECUTABLE_STEPS);
    }

    Refinement {
        needed: claimed && !next_steps.is_empty(),
        reason,
        next_steps,
    }
}

/// Evaluation from evaluator output; missing `replan_needed` is false
pub fn evaluation_from_value(value: &Value, negative_ratio: f64) -> Evaluation {
    Evaluation {
        replan_needed: flag(field(value, &["replan_needed"])).unwrap_or(false),
        reason: text(field(value, &["reason"])).unwrap_or_else(|| "Strategy evaluation completed".into()),
        suggested_strategy: text(field(value, &["suggested_strategy"])),
        negative_ratio,
        skipped: false,
    }
}

/// Critique from critic output; missing `critique_passed` means "no hallucinations"
pub fn critique_from_value(value: &Value) -> Critique {
    let hallucinations = string_list(field(value, &["hallucinations"]));
    Critique {
        passed: flag(field(value, &["critique_passed", "passed"])).unwrap_or(hallucinations.is_empty()),
        hallucinations,
        biases: string_list(field(value, &["biases"])),
        corrections: string_list(field(value, &["corrections"])),
        confidence_adjustment: number(field(value, &["confidence_adjustment"]))
            .filter(|f| f.is_finite())
            .map(|f| f.clamp(0.0, 1.0)),
        revised_summary: text(field(value, &["revised_summary"])),
        skipped: false,
    }
}

/// Validation from validator output; missing relevance is 0.5
pub fn validation_from_value(value: &Value, query: &str) -> Validation {
    let recommendations = match field(value, &["recommendations", "next_steps"]) {
        Some(Value::Array(items)) => items.iter().filter_map(|s| executable_step(s, query)).collect(),
        _ => Vec::new(),
    };
    Validation {
        relevance_score: unit(field(value, &["relevance_score", "relevance"]), 0.5),
        action: text(field(value, &["action"]))
            .map(|a| ValidationAction::parse(&a))
            .unwrap_or_default(),
        reason: text(field(value, &["reason"])).unwrap_or_else(|| "Validation completed".into()),
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parse_json_response;
    use crate::retrieval::Sentiment;
    use serde_json::json;

    #[test]
    fn test_plan_normalization() {
        let value = json!({
            "query_type": "sentiment",
            "steps": [
                {"step_number": 1, "action": "search", "description": "rust async complaints", "tools": ["keyword_search"]},
                {"step_number": 2, "action": "filter", "filters": {"sentiment": "negative"}},
                {"step_number": 3, "action": "filter", "filters": {}},
                {"step_number": 4, "action": "analyze", "description": "count themes"},
                "not a step"
            ],
            "success_criteria": ["themes found"],
            "expected_complexity": "high"
        });
        let plan = plan_from_value(&value, "q");

        assert!(!plan.is_fallback);
        assert_eq!(plan.query_type, QueryType::Sentiment);
        assert_eq!(plan.complexity, Complexity::High);
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0].tool_hints, vec![ToolHint::Keyword]);
        assert_eq!(
            plan.steps[1].filters.as_ref().and_then(|f| f.sentiment.clone()),
            Some(vec![Sentiment::Negative])
        );
        assert_eq!(plan.executable_steps().count(), 2);
    }

    #[test]
    fn test_plan_without_steps_keeps_query_type() {
        let plan = plan_from_value(&json!({"query_type": "comparison"}), "q");
        assert!(plan.is_fallback);
        assert_eq!(plan.query_type, QueryType::Comparison);
        assert_eq!(plan.success_criteria, vec!["Relevant results found"]);

        let plan = plan_from_value(&parse_json_response("no json at all"), "q");
        assert!(plan.is_fallback);
        assert_eq!(plan.query_type, QueryType::Other);
    }

    #[test]
    fn test_search_step_defaults() {
        let step = executable_step(&json!({"action": "search"}), "the query").unwrap();
        assert_eq!(step.description, "the query");
        assert_eq!(step.tool_hints, vec![ToolHint::Hybrid]);

        let step = executable_step(&json!({"action": "semantic_search", "description": " more "}), "q").unwrap();
        assert_eq!(step.description, "more");
        assert!(executable_step(&json!({"action": "think"}), "q").is_none());
    }

    #[test]
    fn test_analysis_defaults_and_clamping() {
        let analysis = analysis_from_value(&json!({"main_themes": ["a"]}));
        assert_eq!(analysis.confidence, 0.5);
        assert_eq!(analysis.themes, vec!["a"]);
        assert_eq!(analysis.data_quality, DataQuality::Medium);

        let analysis = analysis_from_value(&json!({"confidence": 1.7, "data_quality": "HIGH"}));
        assert_eq!(analysis.confidence, 1.0);
        assert!(analysis.data_quality.is_high());

        let analysis = analysis_from_value(&json!({"confidence": "0.42", "sentiment_analysis": {"negative": 3, "positive": "1"}}));
        assert_eq!(analysis.confidence, 0.42);
        assert_eq!(analysis.sentiment.negative, 3);
        assert_eq!(analysis.sentiment.positive, 1);
    }

    #[test]
    fn test_analysis_keeps_raw_text() {
        let analysis = analysis_from_value(&parse_json_response("I think it is fine"));
        assert_eq!(analysis.raw_response.as_deref(), Some("I think it is fine"));
        assert_eq!(analysis.confidence, 0.5);
    }

    #[test]
    fn test_refinement_without_executable_steps_is_not_needed() {
        let value = json!({
            "refinement_needed": true,
            "reason": "need more",
            "next_steps": [{"action": "analyze", "description": "think harder"}, {"action": "filter"}]
        });
        let refinement = refinement_from_value(&value, "q");
        assert!(!refinement.needed);
        assert!(refinement.next_steps.is_empty());
        assert_eq!(refinement.reason, format!("need more{}", NO_EXECUTABLE_STEPS));
    }

    #[test]
    fn test_refinement_needed_defaults_to_step_presence() {
        let refinement = refinement_from_value(&json!({"next_steps": [{"description": "x"}]}), "q");
        assert!(refinement.needed);
        assert_eq!(refinement.reason, "Refinement check completed");

        let refinement = refinement_from_value(&json!({"refinement_needed": false, "next_steps": [{"action": "search"}]}), "q");
        assert!(!refinement.needed);

        assert!(!refinement_from_value(&json!([1, 2]), "q").needed);
    }

    #[test]
    fn test_critique_defaults() {
        let critique = critique_from_value(&json!({"hallucinations": ["made up"]}));
        assert!(!critique.passed);
        assert!(critique.failed());

        let critique = critique_from_value(&json!({"revised_summary": "  "}));
        assert!(critique.passed);
        assert!(critique.revised_summary.is_none());
    }

    #[test]
    fn test_evaluation_and_validation_defaults() {
        let evaluation = evaluation_from_value(&json!({"replan_needed": "true"}), 0.9);
        assert!(evaluation.replan_needed);
        assert_eq!(evaluation.negative_ratio, 0.9);
        assert!(!evaluation_from_value(&json!({}), 0.0).replan_needed);

        let validation = validation_from_value(
            &json!({"relevance_score": 0.35, "action": "refine", "recommendations": [{"action": "search", "description": "x"}]}),
            "q",
        );
        assert_eq!(validation.action, ValidationAction::Refine);
        assert_eq!(validation.recommendations.len(), 1);
        assert_eq!(validation_from_value(&json!({}), "q").relevance_score, 0.5);
    }
}
