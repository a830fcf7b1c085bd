use annota_types::models::{
    CategoryId, CategoryRef, PostId, PostRef, QuestionId, QuestionRef, Snapshot, StudyId,
    StudyThresholds, UserId, Vote,
};
use uuid::Uuid;

/// Builds snapshots with unique ids across every entity kind.
pub struct SnapshotBuilder {
    next_id: i64,
    next_user: u128,
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_user: 1,
            snapshot: Snapshot::default(),
        }
    }

    fn id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn study(&mut self, min_votes: i64, agreement_percent: i64) -> StudyId {
        self.study_with(Some(min_votes), Some(agreement_percent))
    }

    pub fn study_with(&mut self, min: Option<i64>, percent: Option<i64>) -> StudyId {
        let study_id = self.id();
        self.snapshot.studies.push(StudyThresholds {
            study_id,
            min_classifications_per_post: min,
            validation_agreement_percent: percent,
        });
        study_id
    }

    pub fn post(&mut self, study_id: StudyId) -> PostId {
        let id = self.id();
        self.snapshot.posts.push(PostRef { id, study_id });
        id
    }

    pub fn question(&mut self, study_id: StudyId) -> QuestionId {
        let id = self.id();
        self.snapshot.questions.push(QuestionRef { id, study_id });
        id
    }

    pub fn category(&mut self, question_id: QuestionId) -> CategoryId {
        let id = self.id();
        self.snapshot.categories.push(CategoryRef { id, question_id });
        id
    }

    pub fn user(&mut self) -> UserId {
        let id = Uuid::from_u128(self.next_user);
        self.next_user += 1;
        id
    }

    pub fn vote(
        &mut self,
        user_id: UserId,
        post_id: PostId,
        question_id: QuestionId,
        category_id: CategoryId,
    ) {
        self.snapshot.votes.push(Vote {
            user_id,
            post_id,
            question_id,
            category_id,
            created_at: chrono::Utc::now(),
        });
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}
