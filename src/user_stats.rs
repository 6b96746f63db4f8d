use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{result::TestResult, stats, test_type::TestType};

pub const STATS_VERSION: &str = "1.0.0";

/// Results faster than this keep a streak going
pub const STREAK_THRESHOLD_MS: i64 = 1000;
pub const LIGHTNING_FAST_MS: i64 = 200;
pub const CONSISTENT_STREAK: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestsByType {
    pub visual: u64,
    pub audio: u64,
    pub choice: u64,
}

impl TestsByType {
    pub fn get(&self, test_type: TestType) -> u64 {
        match test_type {
            TestType::Visual => self.visual,
            TestType::Audio => self.audio,
            TestType::Choice => self.choice,
        }
    }

    fn increment(&mut self, test_type: TestType) {
        match test_type {
            TestType::Visual => self.visual += 1,
            TestType::Audio => self.audio += 1,
            TestType::Choice => self.choice += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    pub current: u32,
    pub best: u32,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchievementId {
    FirstTest,
    LightningFast,
    Consistent,
}

impl AchievementId {
    pub fn title(&self) -> &'static str {
        match self {
            AchievementId::FirstTest => "First Steps",
            AchievementId::LightningFast => "Lightning Fast",
            AchievementId::Consistent => "Consistent Performer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementId::FirstTest => "Complete your first reaction test",
            AchievementId::LightningFast => "React in under 200ms",
            AchievementId::Consistent => "Complete 10 successful tests in a row",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: AchievementId,
    pub name: String,
    pub description: String,
    pub unlocked_at: DateTime<Utc>,
}

impl Achievement {
    pub fn new(id: AchievementId, unlocked_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: id.title().to_string(),
            description: id.description().to_string(),
            unlocked_at,
        }
    }
}

/// Running totals kept next to the result history and updated once per saved result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_tests: u64,
    pub average_reaction_time: Option<f64>,
    pub best_reaction_time: Option<i64>,
    pub tests_by_type: TestsByType,
    pub streaks: Streaks,
    pub achievements: Vec<Achievement>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    pub version: String,
}

impl UserStats {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            total_tests: 0,
            average_reaction_time: None,
            best_reaction_time: None,
            tests_by_type: TestsByType::default(),
            streaks: Streaks::default(),
            achievements: Vec::new(),
            created_at,
            last_updated: None,
            version: STATS_VERSION.to_string(),
        }
    }

    /// Fold one newly saved result into the totals. `history` is the stored
    /// history after the save, used for the average and best times. Returns
    /// the achievements this update unlocked.
    pub fn record(
        &mut self,
        result: &TestResult,
        history: &[TestResult],
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        self.total_tests += 1;
        self.tests_by_type.increment(result.test_type());

        if let Some(average) = stats::average_reaction_time(history) {
            self.average_reaction_time = Some(average);
            self.best_reaction_time = stats::best_reaction_time(history);
        }

        if result.is_valid() && result.reaction_time_ms() < STREAK_THRESHOLD_MS {
            self.streaks.current += 1;
            self.streaks.best = self.streaks.best.max(self.streaks.current);
        } else {
            self.streaks.current = 0;
        }

        let unlocked = self.check_achievements(result, now);
        self.last_updated = Some(now);
        unlocked
    }

    pub fn check_achievements(
        &mut self,
        result: &TestResult,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        let mut earned = Vec::new();
        if self.total_tests == 1 {
            earned.push(AchievementId::FirstTest);
        }
        if result.is_valid() && result.reaction_time_ms() < LIGHTNING_FAST_MS {
            earned.push(AchievementId::LightningFast);
        }
        if self.streaks.current == CONSISTENT_STREAK {
            earned.push(AchievementId::Consistent);
        }

        earned
            .into_iter()
            .filter_map(|id| self.award(Achievement::new(id, now)))
            .collect()
    }

    /// Adds the achievement unless one with the same id is already unlocked
    pub fn award(&mut self, achievement: Achievement) -> Option<Achievement> {
        if self.has_achievement(achievement.id) {
            return None;
        }
        self.achievements.push(achievement.clone());
        Some(achievement)
    }

    pub fn has_achievement(&self, id: AchievementId) -> bool {
        self.achievements.iter().any(|a| a.id == id)
    }
}
