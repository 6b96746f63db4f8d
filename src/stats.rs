//! Aggregate statistics over a result history.
//!
//! Everything here is a pure function of its input. Histories are ordered by
//! occurrence, oldest first. Functions that only make sense over measured
//! latencies skip timeouts themselves, so callers may pass the raw history.
//! "No data" is reported as `None`, never as 0 or NaN.

use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    result::TestResult,
    test_type::TestType,
    user_stats::TestsByType,
    util::{mean, percent, round_half_up, std_dev},
};

/// Fewer valid results than this and `improvement` reports 0
pub const IMPROVEMENT_MIN_RESULTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeBreakdown {
    pub count: usize,
    pub average: i64,
    pub best: i64,
    pub accuracy: f64,
}

/// Everything the statistics screen and the export summary show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_tests: usize,
    pub successful_tests: usize,
    pub accuracy: i64,
    pub average_reaction_time: Option<f64>,
    pub best_reaction_time: Option<i64>,
    pub worst_reaction_time: Option<i64>,
    pub consistency: i64,
    pub improvement: i64,
    pub test_type_performance: BTreeMap<TestType, TypeBreakdown>,
}

pub fn valid_results(results: &[TestResult]) -> Vec<&TestResult> {
    results.iter().filter(|r| r.is_valid()).collect()
}

fn valid_times(results: &[TestResult]) -> Vec<f64> {
    results
        .iter()
        .filter(|r| r.is_valid())
        .map(|r| r.reaction_time_ms() as f64)
        .collect()
}

/// Share of results that succeeded with a measured latency, in whole percent.
///
/// The numerator requires both `success` and a positive reaction time while
/// the denominator counts every result, timeouts included.
pub fn accuracy(results: &[TestResult]) -> Option<i64> {
    let hits = results
        .iter()
        .filter(|r| r.success() && r.reaction_time_ms() > 0)
        .count();
    percent(hits, results.len()).map(round_half_up)
}

pub fn average_reaction_time(results: &[TestResult]) -> Option<f64> {
    mean(&valid_times(results))
}

pub fn best_reaction_time(results: &[TestResult]) -> Option<i64> {
    results
        .iter()
        .filter(|r| r.is_valid())
        .map(|r| r.reaction_time_ms())
        .min()
}

pub fn worst_reaction_time(results: &[TestResult]) -> Option<i64> {
    results
        .iter()
        .filter(|r| r.is_valid())
        .map(|r| r.reaction_time_ms())
        .max()
}

/// `100 - coefficient of variation` in percent, floored at 0.
/// Needs at least two valid results, otherwise 0.
pub fn consistency(results: &[TestResult]) -> i64 {
    let times = valid_times(results);
    if times.len() < 2 {
        return 0;
    }

    match (mean(&times), std_dev(&times)) {
        (Some(m), Some(sd)) if m > 0.0 => round_half_up((100.0 - (sd / m) * 100.0).max(0.0)),
        _ => 0,
    }
}

/// Percent by which the second half of the valid results is faster than the
/// first half. Negative means slower. 0 below [`IMPROVEMENT_MIN_RESULTS`].
pub fn improvement(results: &[TestResult]) -> i64 {
    let times = valid_times(results);
    if times.len() < IMPROVEMENT_MIN_RESULTS {
        return 0;
    }

    let (first, second) = times.split_at(times.len() / 2);
    match (mean(first), mean(second)) {
        (Some(first_mean), Some(second_mean)) if first_mean > 0.0 => {
            round_half_up((first_mean - second_mean) / first_mean * 100.0)
        }
        _ => 0,
    }
}

/// Per-type count, rounded mean, fastest time and success share over valid
/// results. Types with no valid results are left out.
pub fn per_type_breakdown(results: &[TestResult]) -> BTreeMap<TestType, TypeBreakdown> {
    results
        .iter()
        .filter(|r| r.is_valid())
        .into_group_map_by(|r| r.test_type())
        .into_iter()
        .filter_map(|(test_type, group)| {
            let times: Vec<f64> = group.iter().map(|r| r.reaction_time_ms() as f64).collect();
            let best = group.iter().map(|r| r.reaction_time_ms()).min()?;
            let successes = group.iter().filter(|r| r.success()).count();

            Some((
                test_type,
                TypeBreakdown {
                    count: group.len(),
                    average: round_half_up(mean(&times)?),
                    best,
                    accuracy: percent(successes, group.len())?,
                },
            ))
        })
        .collect()
}

/// Full performance summary, or `None` for an empty history
pub fn compute(results: &[TestResult]) -> Option<Summary> {
    let accuracy = accuracy(results)?;

    Some(Summary {
        total_tests: results.len(),
        successful_tests: results.iter().filter(|r| r.is_valid()).count(),
        accuracy,
        average_reaction_time: average_reaction_time(results),
        best_reaction_time: best_reaction_time(results),
        worst_reaction_time: worst_reaction_time(results),
        consistency: consistency(results),
        improvement: improvement(results),
        test_type_performance: per_type_breakdown(results),
    })
}

/// Chart points for the most recent `limit` results: (1-based index, ms),
/// timeouts dropped
pub fn trend(results: &[TestResult], limit: usize) -> Vec<(f64, f64)> {
    let start = results.len().saturating_sub(limit);
    results[start..]
        .iter()
        .filter(|r| r.is_valid())
        .enumerate()
        .map(|(i, r)| ((i + 1) as f64, r.reaction_time_ms() as f64))
        .collect()
}

/// How many tests of each type were taken and their rounded share of the total
pub fn type_distribution(counts: &TestsByType) -> Vec<(TestType, u64, i64)> {
    let total: u64 = TestType::ALL.iter().map(|t| counts.get(*t)).sum();

    TestType::ALL
        .iter()
        .map(|t| {
            let n = counts.get(*t);
            let share = percent(n as usize, total as usize)
                .map(round_half_up)
                .unwrap_or(0);
            (*t, n, share)
        })
        .collect()
}
