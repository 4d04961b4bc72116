//! Participant responses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Respondent role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Management,
    Employee,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Management, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Management => "management",
            Role::Employee => "employee",
        }
    }

    /// Token used inside access codes
    pub fn code_token(&self) -> &'static str {
        match self {
            Role::Management => "MGMT",
            Role::Employee => "EMP",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "management" => Ok(Role::Management),
            "employee" => Ok(Role::Employee),
            other => Err(Error::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

/// One answer; `score` is `None` when the question was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub score: Option<f64>,
    pub category: String,
}

/// One respondent's in-progress or completed set of answers
///
/// Identity is (`assessment_id`, `participant_id`). `participant_id` is an
/// application token and never the remote table's native key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub assessment_id: String,
    pub participant_id: String,
    pub role: Role,
    /// Raw department value as recorded; classify before use
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub survey_id: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub current_index: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ParticipantResponse {
    /// Start a new response with a freshly generated participant id
    pub fn start(assessment_id: impl Into<String>, role: Role, department: Option<String>) -> Self {
        Self {
            assessment_id: assessment_id.into(),
            participant_id: crate::identifiers::participant_id(),
            role,
            department,
            survey_id: String::new(),
            answers: Vec::new(),
            current_index: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Composite identity used for merge and upsert
    pub fn key(&self) -> (&str, &str) {
        (&self.assessment_id, &self.participant_id)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Non-null scores in answer order
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.answers.iter().filter_map(|a| a.score)
    }
}
