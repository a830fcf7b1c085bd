use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CategoryId, PostId, QuestionId, StudyId, UserRole};

// -- JWT Claims --

/// Bearer-token claims. Tokens are issued by the account service; this backend
/// only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: UserRole,
    pub exp: usize,
}

// -- Classifications --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClassifyRequest {
    pub post_id: PostId,
    pub question_id: QuestionId,
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub inserted: usize,
    pub removed: usize,
}

/// post id -> question id -> chosen category ids.
pub type ClassificationsByPost = BTreeMap<PostId, BTreeMap<QuestionId, Vec<CategoryId>>>;

// -- Stats --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub study_id: Option<StudyId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatsResponse {
    pub validated: f64,
    pub not_validated: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyStatsResponse {
    #[serde(rename = "studyId")]
    pub study_id: StudyId,
    pub validated: f64,
    pub not_validated: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralStatsRow {
    #[serde(rename = "anonymizedUser")]
    pub anonymized_user: String,
    pub validated: f64,
    pub not_validated: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusRow {
    pub post_id: PostId,
    pub question_id: QuestionId,
    pub category_id: Option<CategoryId>,
    pub total_votes: u32,
    /// `resolved`, `below_quorum`, `tied`, `insufficient_agreement` or `unconfigured`.
    pub verdict: String,
}

/// A study whose thresholds keep its pairs from resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyIssue {
    pub study_id: StudyId,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResponse {
    pub pairs: Vec<ConsensusRow>,
    pub unconfigured_studies: Vec<StudyIssue>,
}
