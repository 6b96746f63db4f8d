use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::test_type::{Choice, TestType};

/// Stored in place of a reaction time when the response window expired
pub const TIMEOUT_SENTINEL: i64 = -1;

/// The outcome of one completed reaction test.
///
/// Values are only produced by [`ResultBuilder`]; once built a result is never
/// mutated apart from the persistence layer stamping an id on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type")]
    test_type: TestType,
    reaction_time_ms: i64,
    success: bool,
    attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chosen_answer: Option<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_choice: Option<Choice>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl TestResult {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    /// Milliseconds from onset to response, or [`TIMEOUT_SENTINEL`]
    pub fn reaction_time_ms(&self) -> i64 {
        self.reaction_time_ms
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn chosen_answer(&self) -> Option<Choice> {
        self.chosen_answer
    }

    pub fn correct_choice(&self) -> Option<Choice> {
        self.correct_choice
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn is_timeout(&self) -> bool {
        self.reaction_time_ms == TIMEOUT_SENTINEL
    }

    /// A measured latency exists (the response arrived inside the window)
    pub fn is_valid(&self) -> bool {
        self.reaction_time_ms > 0
    }

    pub(crate) fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }
}

/// Collects what is known about a run and finalizes it exactly once
#[derive(Debug, Clone)]
pub struct ResultBuilder {
    test_type: TestType,
    started_at: DateTime<Utc>,
    attempts: u32,
    correct_choice: Option<Choice>,
}

impl ResultBuilder {
    pub fn new(test_type: TestType, started_at: DateTime<Utc>) -> Self {
        Self {
            test_type,
            started_at,
            attempts: 1,
            correct_choice: None,
        }
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn correct_choice(mut self, choice: Option<Choice>) -> Self {
        self.correct_choice = choice;
        self
    }

    /// Finalize with a measured response.
    ///
    /// Choice tests succeed only when `chosen` matches the target; the other
    /// types succeed unconditionally. A zero measurement is stored as 1 ms so
    /// it can never be mistaken for a missing value.
    pub fn respond(
        self,
        reaction_time_ms: u64,
        chosen: Option<Choice>,
        completed_at: DateTime<Utc>,
    ) -> TestResult {
        let (success, chosen_answer) = match self.test_type {
            TestType::Choice => (chosen.is_some() && chosen == self.correct_choice, chosen),
            TestType::Visual | TestType::Audio => (true, None),
        };

        TestResult {
            id: None,
            test_type: self.test_type,
            reaction_time_ms: i64::try_from(reaction_time_ms).unwrap_or(i64::MAX).max(1),
            success,
            attempts: self.attempts,
            chosen_answer,
            correct_choice: self.correct_choice,
            started_at: self.started_at,
            completed_at,
        }
    }

    /// Finalize as a timeout: no latency, never successful
    pub fn timeout(self, completed_at: DateTime<Utc>) -> TestResult {
        TestResult {
            id: None,
            test_type: self.test_type,
            reaction_time_ms: TIMEOUT_SENTINEL,
            success: false,
            attempts: self.attempts,
            chosen_answer: None,
            correct_choice: self.correct_choice,
            started_at: self.started_at,
            completed_at,
        }
    }
}
