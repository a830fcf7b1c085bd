use annota_types::models::{CategoryId, PostId, QuestionId, StudyId};
use thiserror::Error;

/// A study cannot take part in consensus until both thresholds are set to
/// usable values. Its pairs stay unresolved meanwhile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("study {study_id} has no minClassificationsPerPost")]
    MissingQuorum { study_id: StudyId },

    #[error("study {study_id} has no validationAgreementPercent")]
    MissingAgreement { study_id: StudyId },

    #[error("study {study_id} has minClassificationsPerPost {value}, expected at least 1")]
    InvalidQuorum { study_id: StudyId, value: i64 },

    #[error("study {study_id} has validationAgreementPercent {value}, expected 0..=100")]
    InvalidAgreement { study_id: StudyId, value: i64 },
}

/// Why a vote was left out of aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityIssue {
    #[error("post {0} does not exist")]
    UnknownPost(PostId),

    #[error("study {0} does not exist")]
    UnknownStudy(StudyId),

    #[error("question {0} does not exist")]
    UnknownQuestion(QuestionId),

    #[error("category {0} does not exist")]
    UnknownCategory(CategoryId),

    #[error("question {question_id} belongs to study {question_study}, post is in study {post_study}")]
    QuestionOutsideStudy {
        question_id: QuestionId,
        question_study: StudyId,
        post_study: StudyId,
    },

    #[error("category {category_id} belongs to question {owner}, not {question_id}")]
    CategoryOutsideQuestion {
        category_id: CategoryId,
        owner: QuestionId,
        question_id: QuestionId,
    },
}
