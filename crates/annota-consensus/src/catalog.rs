use std::collections::HashMap;

use annota_types::models::{
    CategoryId, PostId, QuestionId, Snapshot, StudyId, StudyThresholds, Vote,
};
use tracing::warn;

use crate::error::{ConfigurationError, IntegrityIssue};

/// Validated consensus parameters of one study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Inclusive lower bound on the total votes of a pair.
    pub min_votes: u32,
    /// Inclusive lower bound on the plurality share, in percent.
    pub agreement_percent: u32,
}

impl Thresholds {
    pub fn from_stored(stored: &StudyThresholds) -> Result<Self, ConfigurationError> {
        let study_id = stored.study_id;
        let min = stored
            .min_classifications_per_post
            .ok_or(ConfigurationError::MissingQuorum { study_id })?;
        let percent = stored
            .validation_agreement_percent
            .ok_or(ConfigurationError::MissingAgreement { study_id })?;

        let min_votes = u32::try_from(min)
            .ok()
            .filter(|m| *m >= 1)
            .ok_or(ConfigurationError::InvalidQuorum { study_id, value: min })?;
        if !(0..=100).contains(&percent) {
            return Err(ConfigurationError::InvalidAgreement { study_id, value: percent });
        }

        Ok(Self {
            min_votes,
            agreement_percent: percent as u32,
        })
    }
}

/// Ownership lookups for one snapshot: which study a post or question lives
/// in, which question a category belongs to, and each study's thresholds.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    thresholds: HashMap<StudyId, Result<Thresholds, ConfigurationError>>,
    post_study: HashMap<PostId, StudyId>,
    question_study: HashMap<QuestionId, StudyId>,
    category_question: HashMap<CategoryId, QuestionId>,
}

impl Catalog {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            thresholds: snapshot
                .studies
                .iter()
                .map(|s| (s.study_id, Thresholds::from_stored(s)))
                .collect(),
            post_study: snapshot.posts.iter().map(|p| (p.id, p.study_id)).collect(),
            question_study: snapshot.questions.iter().map(|q| (q.id, q.study_id)).collect(),
            category_question: snapshot
                .categories
                .iter()
                .map(|c| (c.id, c.question_id))
                .collect(),
        }
    }

    /// `None` when the study is not part of this catalog at all.
    pub fn thresholds(&self, study_id: StudyId) -> Option<&Result<Thresholds, ConfigurationError>> {
        self.thresholds.get(&study_id)
    }

    pub fn study_of_post(&self, post_id: PostId) -> Option<StudyId> {
        self.post_study.get(&post_id).copied()
    }

    /// Attribute a vote to its study, or explain why it cannot be.
    pub fn attribute(&self, vote: &Vote) -> Result<StudyId, IntegrityIssue> {
        let post_study = self
            .study_of_post(vote.post_id)
            .ok_or(IntegrityIssue::UnknownPost(vote.post_id))?;
        if !self.thresholds.contains_key(&post_study) {
            return Err(IntegrityIssue::UnknownStudy(post_study));
        }

        let question_study = *self
            .question_study
            .get(&vote.question_id)
            .ok_or(IntegrityIssue::UnknownQuestion(vote.question_id))?;
        if question_study != post_study {
            return Err(IntegrityIssue::QuestionOutsideStudy {
                question_id: vote.question_id,
                question_study,
                post_study,
            });
        }

        let owner = *self
            .category_question
            .get(&vote.category_id)
            .ok_or(IntegrityIssue::UnknownCategory(vote.category_id))?;
        if owner != vote.question_id {
            return Err(IntegrityIssue::CategoryOutsideQuestion {
                category_id: vote.category_id,
                owner,
                question_id: vote.question_id,
            });
        }

        Ok(post_study)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedVote {
    pub vote: Vote,
    pub study_id: StudyId,
}

/// Votes of one scope that passed integrity checks, plus the ones that did
/// not and why.
#[derive(Debug, Clone, Default)]
pub struct VoteSet {
    catalog: Catalog,
    votes: Vec<AttributedVote>,
    excluded: Vec<(Vote, IntegrityIssue)>,
}

impl VoteSet {
    pub fn build(snapshot: Snapshot) -> Self {
        let catalog = Catalog::from_snapshot(&snapshot);
        let mut votes = Vec::with_capacity(snapshot.votes.len());
        let mut excluded = Vec::new();

        for vote in snapshot.votes {
            match catalog.attribute(&vote) {
                Ok(study_id) => votes.push(AttributedVote { vote, study_id }),
                Err(issue) => {
                    warn!(
                        "Excluding vote of user {} on {}: {}",
                        vote.user_id,
                        vote.pair(),
                        issue
                    );
                    excluded.push((vote, issue));
                }
            }
        }

        Self {
            catalog,
            votes,
            excluded,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn votes(&self) -> &[AttributedVote] {
        &self.votes
    }

    pub fn excluded(&self) -> &[(Vote, IntegrityIssue)] {
        &self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
