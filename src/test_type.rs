use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::error::SessionError;

/// Response window after stimulus onset, identical for every test type
pub const RESPONSE_TIMEOUT_MS: u64 = 3000;

/// The kind of stimulus a test presents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestType {
    Visual,
    Audio,
    Choice,
}

impl TestType {
    pub const ALL: [TestType; 3] = [TestType::Visual, TestType::Audio, TestType::Choice];

    pub fn config(&self) -> TestConfig {
        match self {
            TestType::Visual => TestConfig {
                name: "Visual Reaction Test",
                description: "React when the screen changes color",
                instruction: "Wait for the screen to change color, then react as fast as you can!",
                min_delay_ms: 1000,
                max_delay_ms: 5000,
                timeout_ms: RESPONSE_TIMEOUT_MS,
                stimulus: StimulusKind::Visual,
            },
            TestType::Audio => TestConfig {
                name: "Audio Reaction Test",
                description: "React when you hear the sound",
                instruction: "Wait for the sound, then react as fast as you can!",
                min_delay_ms: 1000,
                max_delay_ms: 5000,
                timeout_ms: RESPONSE_TIMEOUT_MS,
                stimulus: StimulusKind::Tone(Tone {
                    frequency_hz: 800.0,
                    volume: 0.2,
                    duration_ms: 200,
                }),
            },
            TestType::Choice => TestConfig {
                name: "Choice Reaction Test",
                description: "Choose the correct response",
                instruction: "Choose the correct response as fast as you can!",
                min_delay_ms: 500,
                max_delay_ms: 3000,
                timeout_ms: RESPONSE_TIMEOUT_MS,
                stimulus: StimulusKind::Choice(Choice::ALL),
            },
        }
    }
}

impl FromStr for TestType {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visual" => Ok(TestType::Visual),
            "audio" => Ok(TestType::Audio),
            "choice" => Ok(TestType::Choice),
            other => Err(SessionError::InvalidArgument(format!(
                "unknown test type: {other:?}"
            ))),
        }
    }
}

/// Static per-type parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_ms: u64,
    pub stimulus: StimulusKind,
}

impl TestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Type-specific stimulus payload
#[derive(Debug, Clone, PartialEq)]
pub enum StimulusKind {
    Visual,
    Tone(Tone),
    Choice([Choice; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f64,
    pub volume: f64,
    pub duration_ms: u64,
}

/// One of the four directional answers in a choice test
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Choice {
    Left,
    Right,
    Up,
    Down,
}

impl Choice {
    pub const ALL: [Choice; 4] = [Choice::Left, Choice::Right, Choice::Up, Choice::Down];

    pub fn arrow(&self) -> &'static str {
        match self {
            Choice::Left => "←",
            Choice::Right => "→",
            Choice::Up => "↑",
            Choice::Down => "↓",
        }
    }
}

/// What the stimulus collaborator is asked to present at onset
#[derive(Debug, Clone, PartialEq)]
pub enum Stimulus {
    Visual,
    Tone(Tone),
    Choice { target: Choice, options: [Choice; 4] },
}
