use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type StudyId = i64;
pub type PostId = i64;
pub type QuestionId = i64;
pub type CategoryId = i64;

/// One annotator's choice of one category for a (post, question) pair.
/// Multi-select questions produce several votes for the same pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: UserId,
    pub post_id: PostId,
    pub question_id: QuestionId,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn pair(&self) -> PairKey {
        PairKey {
            post_id: self.post_id,
            question_id: self.question_id,
        }
    }
}

/// The unit consensus is resolved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub post_id: PostId,
    pub question_id: QuestionId,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "post {} / question {}", self.post_id, self.question_id)
    }
}

/// Consensus parameters exactly as stored. Either may be missing on a study
/// that was created before they existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyThresholds {
    pub study_id: StudyId,
    pub min_classifications_per_post: Option<i64>,
    pub validation_agreement_percent: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: PostId,
    pub study_id: StudyId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRef {
    pub id: QuestionId,
    pub study_id: StudyId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub question_id: QuestionId,
}

/// What the stats engine reads for a single request: the votes in scope plus
/// the catalog needed to attribute and validate them.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub votes: Vec<Vote>,
    pub studies: Vec<StudyThresholds>,
    pub posts: Vec<PostRef>,
    pub questions: Vec<QuestionRef>,
    pub categories: Vec<CategoryRef>,
}

/// Vote-set scope. Threaded explicitly through every stats call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Study(StudyId),
}

impl Scope {
    pub fn from_study(study_id: Option<StudyId>) -> Self {
        study_id.map_or(Scope::Global, Scope::Study)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Study(id) => write!(f, "study {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[serde(rename = "user")]
    Annotator,
    Investigator,
    Admin,
}

impl UserRole {
    /// Privileged roles see real identities in aggregate statistics.
    pub fn is_privileged(self) -> bool {
        matches!(self, UserRole::Investigator | UserRole::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Annotator => "user",
            UserRole::Investigator => "investigator",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::Annotator),
            "investigator" => Some(UserRole::Investigator),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// How a resubmitted classification interacts with earlier votes on the
/// same (post, question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// Delete the annotator's previous votes for the pair, then insert.
    #[default]
    Replace,
    /// Insert, silently skipping votes that already exist.
    Append,
}

impl SubmitMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(SubmitMode::Replace),
            "append" => Some(SubmitMode::Append),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        let role: UserRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, UserRole::Annotator);
        assert_eq!(serde_json::to_string(&UserRole::Investigator).unwrap(), "\"investigator\"");
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert!(UserRole::Admin.is_privileged());
        assert!(!UserRole::Annotator.is_privileged());
    }

    #[test]
    fn submit_mode_parsing() {
        assert_eq!(SubmitMode::parse("Replace"), Some(SubmitMode::Replace));
        assert_eq!(SubmitMode::parse(" append "), Some(SubmitMode::Append));
        assert_eq!(SubmitMode::parse("merge"), None);
        assert_eq!(SubmitMode::default(), SubmitMode::Replace);
    }
}
