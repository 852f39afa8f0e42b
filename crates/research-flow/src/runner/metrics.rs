//! Evaluation metrics over a set of runs
//!
//! The autonomy score summarizes how often a run needed to correct itself:
//! `1 - (replan_rate * w1 + refinement_rate * w2 + (1 - critique_pass_rate) * w3)`,
//! clamped to [0, 1].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::batch::TaskOutcome;
use crate::research::ResearchResult;

const HIGH_CONFIDENCE: f64 = 0.8;
const MEDIUM_CONFIDENCE: f64 = 0.5;

/// Weights of the three self-correction rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutonomyWeights {
    pub replan: f64,
    pub refinement: f64,
    pub critique: f64,
}

impl Default for AutonomyWeights {
    fn default() -> Self {
        Self {
            replan: 0.3,
            refinement: 0.2,
            critique: 0.5,
        }
    }
}

impl AutonomyWeights {
    pub fn score(&self, replan_rate: f64, refinement_rate: f64, critique_pass_rate: f64) -> f64 {
        let penalty = replan_rate * self.replan
            + refinement_rate * self.refinement
            + (1.0 - critique_pass_rate) * self.critique;
        (1.0 - penalty).clamp(0.0, 1.0)
    }

    /// Score of a single run, each rate being 0 or 1
    pub fn score_run(&self, result: &ResearchResult) -> f64 {
        let indicator = |b: bool| if b { 1.0 } else { 0.0 };
        self.score(
            indicator(result.replan_count > 0),
            indicator(result.refinement_iterations > 0),
            indicator(result.critique_passed()),
        )
    }
}

/// Runs bucketed by final confidence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    /// >= 0.8
    pub high: usize,
    /// [0.5, 0.8)
    pub medium: usize,
    /// < 0.5
    pub low: usize,
}

impl ConfidenceDistribution {
    fn add(&mut self, confidence: f64) {
        if confidence >= HIGH_CONFIDENCE {
            self.high += 1;
        } else if confidence >= MEDIUM_CONFIDENCE {
            self.medium += 1;
        } else {
            self.low += 1;
        }
    }
}

/// Metrics of one category or complexity bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub total: usize,
    pub completed: usize,
    pub avg_confidence: f64,
    pub avg_phases: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub total_queries: usize,
    pub completed: usize,
    pub failed: usize,
    pub completion_rate: f64,

    pub avg_phases: f64,
    pub min_phases: usize,
    pub max_phases: usize,
    pub avg_steps: f64,
    pub min_steps: usize,
    pub max_steps: usize,

    pub avg_refinement_iterations: f64,
    pub avg_replans: f64,
    pub avg_tokens: f64,

    pub avg_confidence: f64,
    pub high_confidence_rate: f64,
    pub confidence_distribution: ConfidenceDistribution,

    pub replan_rate: f64,
    pub refinement_rate: f64,
    pub critique_pass_rate: f64,
    pub autonomy_score: f64,

    pub by_category: BTreeMap<String, GroupMetrics>,
    pub by_complexity: BTreeMap<String, GroupMetrics>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn group<'a>(outcomes: impl Iterator<Item = &'a TaskOutcome>) -> GroupMetrics {
    let outcomes: Vec<&TaskOutcome> = outcomes.collect();
    let results: Vec<&ResearchResult> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
    GroupMetrics {
        total: outcomes.len(),
        completed: results.len(),
        avg_confidence: mean(results.iter().map(|r| r.confidence)),
        avg_phases: mean(results.iter().map(|r| r.phases_visited.len() as f64)),
    }
}

fn breakdown<'a>(
    outcomes: &'a [TaskOutcome],
    key: impl Fn(&'a TaskOutcome) -> Option<&'a str>,
) -> BTreeMap<String, GroupMetrics> {
    let mut labels: Vec<&str> = outcomes.iter().filter_map(&key).collect();
    labels.sort_unstable();
    labels.dedup();
    labels
        .into_iter()
        .map(|label| {
            let metrics = group(outcomes.iter().filter(|o| key(*o) == Some(label)));
            (label.to_string(), metrics)
        })
        .collect()
}

impl EvaluationMetrics {
    pub fn from_outcomes(outcomes: &[TaskOutcome], weights: &AutonomyWeights) -> Self {
        let results: Vec<&ResearchResult> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
        let completed = results.len();

        let phases: Vec<usize> = results.iter().map(|r| r.phases_visited.len()).collect();
        let steps: Vec<usize> = results.iter().map(|r| r.execution_steps).collect();

        let mut confidence_distribution = ConfidenceDistribution::default();
        for r in &results {
            confidence_distribution.add(r.confidence);
        }

        // skipped critiques count as passes
        let reviewed: Vec<bool> = results
            .iter()
            .filter_map(|r| r.critique.as_ref())
            .map(|c| !c.failed())
            .collect();
        let critique_pass_rate = if reviewed.is_empty() {
            1.0
        } else {
            rate(reviewed.iter().filter(|p| **p).count(), reviewed.len())
        };

        let replan_rate = rate(results.iter().filter(|r| r.replan_count > 0).count(), completed);
        let refinement_rate = rate(results.iter().filter(|r| r.refinement_iterations > 0).count(), completed);

        Self {
            total_queries: outcomes.len(),
            completed,
            failed: outcomes.len() - completed,
            completion_rate: rate(completed, outcomes.len()),
            avg_phases: mean(phases.iter().map(|p| *p as f64)),
            min_phases: phases.iter().copied().min().unwrap_or(0),
            max_phases: phases.iter().copied().max().unwrap_or(0),
            avg_steps: mean(steps.iter().map(|s| *s as f64)),
            min_steps: steps.iter().copied().min().unwrap_or(0),
            max_steps: steps.iter().copied().max().unwrap_or(0),
            avg_refinement_iterations: mean(results.iter().map(|r| r.refinement_iterations as f64)),
            avg_replans: mean(results.iter().map(|r| r.replan_count as f64)),
            avg_tokens: mean(results.iter().map(|r| r.total_tokens as f64)),
            avg_confidence: mean(results.iter().map(|r| r.confidence)),
            high_confidence_rate: rate(confidence_distribution.high, completed),
            confidence_distribution,
            replan_rate,
            refinement_rate,
            critique_pass_rate,
            autonomy_score: weights.score(replan_rate, refinement_rate, critique_pass_rate),
            by_category: breakdown(outcomes, |o| o.category.as_deref()),
            by_complexity: breakdown(outcomes, |o| o.complexity.as_deref()),
        }
    }
}
