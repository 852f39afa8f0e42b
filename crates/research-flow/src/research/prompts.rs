//! Prompt templates for the workflow phases
//!
//! System prompts fix the role and the JSON schema each phase expects; user
//! prompts carry the query and the run-specific context.

use chrono::Utc;

/// Prompt templates for every oracle-backed phase
pub struct WorkflowPrompts;

impl WorkflowPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    pub fn planner_system() -> String {
        format!(
            r#"You are an expert research planner. Break down queries into clear steps.
For context, today's date is {date}.

Return JSON:
{{
    "query_type": "trend_analysis|info_extraction|comparison|sentiment|temporal|other",
    "steps": [
        {{"action": "search", "description": "exact search query", "tools": ["semantic_search", "keyword_search"]}},
        {{"action": "filter", "description": "...", "filters": {{"verified": true, "sentiment": ["negative"], "min_engagement": 100, "author_type": ["expert"]}}}},
        {{"action": "analyze", "description": "..."}}
    ],
    "success_criteria": ["criterion1", "criterion2"],
    "expected_complexity": "low|medium|high"
}}"#,
            date = Self::current_date()
        )
    }

    pub fn planner_user(query: &str) -> String {
        format!(
            r#"Analyze this research query and create a detailed plan:

Query: "{query}"

Consider:
- What type of query is this?
- What information needs to be retrieved?
- What filters or constraints apply?
- How will we know if we've succeeded?"#
        )
    }

    pub fn validator_system() -> &'static str {
        r#"You are a retrieval relevance validator. Judge whether the retrieved posts can answer the query.

Return JSON:
{
    "relevance_score": 0.0-1.0,
    "action": "proceed|refine|replan",
    "reason": "explanation",
    "recommendations": [
        {"action": "search", "description": "exact search query that would fill the gap"}
    ]
}

Use "replan" when the results are about the wrong subject, "refine" when they are on topic but incomplete."#
    }

    pub fn validator_user(query: &str, sample: &str) -> String {
        format!("Query: {query}\n\n{sample}\nHow relevant are these results to the query?")
    }

    pub fn analyst_system() -> &'static str {
        r#"You are a research analyst. Analyze data and identify patterns, themes, insights.

Return JSON:
{
    "main_themes": ["theme1", "theme2"],
    "key_insights": ["insight1", "insight2"],
    "sentiment_analysis": {"positive": count, "negative": count, "neutral": count},
    "notable_findings": ["finding1", "finding2"],
    "data_quality": "high|medium|low",
    "confidence": 0.0-1.0,
    "gaps_or_limitations": ["gap1", "gap2"]
}"#
    }

    pub fn analyst_user(query: &str, sample: &str, plan_steps: &str) -> String {
        format!(
            "Query: {query}\n\n{sample}\nAnalyze this data according to the plan:\n{plan_steps}\n\nProvide comprehensive analysis."
        )
    }

    pub fn evaluator_system() -> &'static str {
        r#"You are a research strategy evaluator. Determine if the current research plan needs to be completely revised (not just refined with more searches).

Return JSON:
{
    "replan_needed": true|false,
    "reason": "explanation",
    "suggested_strategy": "description of new approach if replan needed"
}

Replan if:
- The retrieved data is fundamentally wrong (e.g. mostly sarcasm when the query asks for serious analysis)
- The search strategy is misaligned with query intent

Do NOT replan if more data or a filter would be enough; refinement handles that."#
    }

    pub fn evaluator_user(
        query: &str,
        plan: &str,
        analysis: &str,
        negative_ratio: f64,
        results_count: usize,
    ) -> String {
        format!(
            r#"Original Query: {query}

Current Plan:
{plan}

Analysis Results:
{analysis}

Data Quality Signals:
- Negative sentiment ratio: {negative_ratio:.2}
- Retrieved {results_count} items

Does the PLAN need to be replaced, or do we only need more or better data?"#
        )
    }

    pub fn refiner_system() -> &'static str {
        r#"You are a research refinement specialist. Evaluate if the current analysis is sufficient or if additional steps are needed.

Return JSON:
{
    "refinement_needed": true|false,
    "reason": "explanation",
    "next_steps": [
        {"action": "search", "description": "exact search query to run for this step"}
    ]
}

For next_steps use action "search" with a "description" that is the exact search query to run, or action "filter" with a "filters" object."#
    }

    pub fn refiner_user(query: &str, analysis: &str, plan: &str, corrections: &[String]) -> String {
        let mut prompt = format!(
            "Query: {query}\n\nAnalysis: {analysis}\nPlan: {plan}\n\nEvaluate if refinement is needed: gaps, completeness, need for more searches, confidence."
        );
        if !corrections.is_empty() {
            prompt.push_str(
                "\n\nA review found unsupported claims. Additional retrieval is required to address:\n",
            );
            for correction in corrections {
                prompt.push_str(&format!("- {correction}\n"));
            }
        }
        prompt
    }

    pub fn critic_system() -> &'static str {
        r#"You are a research critique specialist. Review the analysis and summary for hallucinations (unsupported claims), bias, and factual errors.

Return JSON:
{
    "critique_passed": true|false,
    "hallucinations": ["claim not supported by the data"],
    "biases": ["selection bias: only positive posts"],
    "corrections": ["correction1"],
    "confidence_adjustment": 0.0-1.0,
    "revised_summary": "corrected summary if critique failed"
}

Be strict: flag any claim that cannot be directly supported by the retrieved data."#
    }

    pub fn critic_user(query: &str, sample: &str, analysis: &str, summary: &str) -> String {
        format!(
            r#"Original Query: {query}

Retrieved Data Sample:
{sample}
Analysis:
{analysis}

Summary:
{summary}

Are all claims supported by the retrieved data? Is there selection, temporal or sentiment bias?"#
        )
    }

    pub fn summarizer_system() -> &'static str {
        "You are a research summarization expert. Create clear summaries.\n\nStructure: 1) Executive Summary (2-3 sentences), 2) Key Findings, 3) Analysis, 4) Limitations, 5) Recommendations"
    }

    pub fn summarizer_user(query: &str, plan: &str, analysis: &str) -> String {
        format!(
            "Research Query: {query}\n\nPlan Executed:\n{plan}\n\nAnalysis Results:\n{analysis}\n\nCreate a comprehensive final summary that answers the original query."
        )
    }
}
