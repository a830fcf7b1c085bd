//! Database row types : these map directly to SQLite rows.
//! Distinct from annota-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

pub struct StudyRow {
    pub id: i64,
    pub name: String,
    pub added_by: Option<String>,
    pub min_classifications_per_post: Option<i64>,
    pub validation_agreement_percent: Option<i64>,
    pub created_at: String,
}

pub struct QuestionRow {
    pub id: i64,
    pub study_id: i64,
    pub question: String,
    pub input_type: String,
}

impl QuestionRow {
    /// Only checkbox questions accept more than one category per submission.
    pub fn is_multi_select(&self) -> bool {
        self.input_type == "checkbox"
    }
}
