use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::{fs, io::Write, path::Path};

use crate::{
    error::ExportError,
    result::TestResult,
    stats::{self, Summary},
    user_stats::{TestsByType, UserStats},
    util::round_half_up,
};

pub const CSV_HEADER: [&str; 6] = [
    "Date",
    "Time",
    "Test Type",
    "Reaction Time (ms)",
    "Success",
    "Attempts",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_tests: u64,
    pub average_reaction_time: Option<i64>,
    pub best_reaction_time: Option<i64>,
    pub accuracy: Option<i64>,
    pub test_distribution: TestsByType,
}

/// The JSON export document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    pub export_date: DateTime<Utc>,
    pub statistics: &'a UserStats,
    pub test_results: &'a [TestResult],
    pub summary: ExportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Summary>,
}

impl<'a> ExportDocument<'a> {
    pub fn new(stats: &'a UserStats, results: &'a [TestResult], export_date: DateTime<Utc>) -> Self {
        Self {
            export_date,
            statistics: stats,
            test_results: results,
            summary: ExportSummary {
                total_tests: stats.total_tests,
                average_reaction_time: stats.average_reaction_time.map(round_half_up),
                best_reaction_time: stats.best_reaction_time,
                accuracy: stats::accuracy(results),
                test_distribution: stats.tests_by_type,
            },
            performance: stats::compute(results),
        }
    }
}

pub fn to_json(stats: &UserStats, results: &[TestResult]) -> Result<String, ExportError> {
    let doc = ExportDocument::new(stats, results, Utc::now());
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// One CSV row per result. Dates and times are rendered in local time.
pub fn write_csv<W: Write>(writer: W, results: &[TestResult]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for result in results {
        let completed = result.completed_at().with_timezone(&Local);
        let reaction = if result.is_valid() {
            result.reaction_time_ms().to_string()
        } else {
            "Timeout".to_string()
        };

        wtr.write_record([
            completed.format("%Y-%m-%d").to_string(),
            completed.format("%H:%M:%S").to_string(),
            result.test_type().to_string(),
            reaction,
            if result.success() { "Yes" } else { "No" }.to_string(),
            result.attempts().max(1).to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn to_csv(results: &[TestResult]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, results)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn export_json_file(
    path: &Path,
    stats: &UserStats,
    results: &[TestResult],
) -> Result<(), ExportError> {
    fs::write(path, to_json(stats, results)?)?;
    Ok(())
}

pub fn export_csv_file(path: &Path, results: &[TestResult]) -> Result<(), ExportError> {
    let file = fs::File::create(path)?;
    write_csv(file, results)
}

/// Plain-text performance report for the `--summary` flag
pub fn summary_text(results: &[TestResult]) -> String {
    let Some(summary) = stats::compute(results) else {
        return "No reaction tests recorded yet.\n".to_string();
    };

    let ms = |v: Option<i64>| v.map_or("--".to_string(), |v| format!("{v} ms"));
    let mut out = format!(
        "Tests:        {} ({} successful)\n\
         Accuracy:     {}%\n\
         Average:      {}\n\
         Best:         {}\n\
         Worst:        {}\n\
         Consistency:  {}%\n\
         Improvement:  {}%\n",
        summary.total_tests,
        summary.successful_tests,
        summary.accuracy,
        ms(summary.average_reaction_time.map(round_half_up)),
        ms(summary.best_reaction_time),
        ms(summary.worst_reaction_time),
        summary.consistency,
        summary.improvement,
    );
    for (test_type, data) in &summary.test_type_performance {
        out.push_str(&format!(
            "  {:<7} {:>4} tests  avg {} ms  best {} ms  {:.0}% accurate\n",
            test_type.to_string(),
            data.count, data.average, data.best, data.accuracy
        ));
    }
    out
}
