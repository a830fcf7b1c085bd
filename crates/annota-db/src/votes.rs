use std::collections::BTreeSet;

use annota_types::api::ClassificationsByPost;
use annota_types::models::{
    CategoryId, CategoryRef, PostId, PostRef, QuestionId, QuestionRef, Scope, Snapshot,
    StudyThresholds, SubmitMode, Vote,
};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Database;
use crate::queries::query_question;

/// A classification the store refuses to record. Travels inside
/// `anyhow::Error`; callers downcast to map it to a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("no categories selected")]
    NoCategories,

    #[error("post {0} does not exist")]
    UnknownPost(PostId),

    #[error("question {0} does not exist")]
    UnknownQuestion(QuestionId),

    #[error("question {0} does not belong to the post's study")]
    QuestionOutsideStudy(QuestionId),

    #[error("category {0} does not belong to the question")]
    ForeignCategory(CategoryId),

    #[error("question {0} accepts a single category")]
    SingleChoice(QuestionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordOutcome {
    /// Earlier votes of the annotator on the pair that were deleted.
    pub removed: usize,
    /// New rows actually written.
    pub inserted: usize,
}

impl Database {
    /// All votes and catalog rows of `scope`, read under a single lock.
    pub fn snapshot(&self, scope: Scope) -> Result<Snapshot> {
        self.with_conn(|conn| load_snapshot(conn, scope, None))
    }

    /// Like `snapshot`, but only loads votes on pairs `user_id` voted on.
    /// Every annotator's votes on those pairs are included, which is all the
    /// resolver needs to score that one user.
    pub fn snapshot_for_annotator(&self, scope: Scope, user_id: &str) -> Result<Snapshot> {
        self.with_conn(|conn| load_snapshot(conn, scope, Some(user_id)))
    }

    /// Store a user's classification of one (post, question) atomically.
    ///
    /// With `SubmitMode::Replace` the user's previous votes on the pair are
    /// deleted and the new set inserted in the same transaction. With
    /// `SubmitMode::Append` existing votes stay and duplicates are skipped.
    pub fn record_classification(
        &self,
        user_id: &str,
        post_id: PostId,
        question_id: QuestionId,
        category_ids: &[CategoryId],
        mode: SubmitMode,
    ) -> Result<RecordOutcome> {
        let categories: BTreeSet<CategoryId> = category_ids.iter().copied().collect();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            validate_submission(&tx, post_id, question_id, &categories)?;

            let removed = match mode {
                SubmitMode::Replace => tx.execute(
                    "DELETE FROM classifications WHERE user_id = ?1 AND post_id = ?2 AND question_id = ?3",
                    rusqlite::params![user_id, post_id, question_id],
                )?,
                SubmitMode::Append => 0,
            };

            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO classifications (user_id, post_id, question_id, category_id)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for category_id in &categories {
                    inserted += stmt.execute(rusqlite::params![
                        user_id,
                        post_id,
                        question_id,
                        category_id
                    ])?;
                }
            }

            tx.commit()?;
            debug!(
                "User {} classified post {} / question {}: {} removed, {} inserted",
                user_id, post_id, question_id, removed, inserted
            );
            Ok(RecordOutcome { removed, inserted })
        })
    }

    /// The user's current votes grouped as post -> question -> categories.
    pub fn classifications_for_user(&self, user_id: &str) -> Result<ClassificationsByPost> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT post_id, question_id, category_id FROM classifications
                 WHERE user_id = ?1
                 ORDER BY post_id, question_id, category_id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut grouped = ClassificationsByPost::new();
            for (post_id, question_id, category_id) in rows {
                grouped
                    .entry(post_id)
                    .or_default()
                    .entry(question_id)
                    .or_default()
                    .push(category_id);
            }
            Ok(grouped)
        })
    }
}

fn validate_submission(
    conn: &Connection,
    post_id: PostId,
    question_id: QuestionId,
    categories: &BTreeSet<CategoryId>,
) -> Result<()> {
    if categories.is_empty() {
        return Err(SubmitError::NoCategories.into());
    }

    let post_study: i64 = conn
        .query_row("SELECT study_id FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
        .optional()?
        .ok_or(SubmitError::UnknownPost(post_id))?;

    let question = query_question(conn, question_id)?.ok_or(SubmitError::UnknownQuestion(question_id))?;
    if question.study_id != post_study {
        return Err(SubmitError::QuestionOutsideStudy(question_id).into());
    }
    if categories.len() > 1 && !question.is_multi_select() {
        return Err(SubmitError::SingleChoice(question_id).into());
    }

    let mut stmt = conn.prepare("SELECT question_id FROM categories WHERE id = ?1")?;
    for category_id in categories {
        let owner: Option<i64> = stmt.query_row([category_id], |row| row.get(0)).optional()?;
        if owner != Some(question_id) {
            return Err(SubmitError::ForeignCategory(*category_id).into());
        }
    }
    Ok(())
}

/// `WHERE` fragment and parameters selecting rows of one scope.
struct ScopeFilter {
    clause: &'static str,
    params: Vec<Value>,
}

impl ScopeFilter {
    fn new(scope: Scope, study_clause: &'static str) -> Self {
        match scope {
            Scope::Global => Self {
                clause: "1 = 1",
                params: Vec::new(),
            },
            Scope::Study(id) => Self {
                clause: study_clause,
                params: vec![Value::Integer(id)],
            },
        }
    }
}

fn load_snapshot(conn: &Connection, scope: Scope, voter: Option<&str>) -> Result<Snapshot> {
    let filter = ScopeFilter::new(scope, "id = ?1");
    let studies = query_all(
        conn,
        &format!(
            "SELECT id, min_classifications_per_post, validation_agreement_percent
             FROM studies WHERE {} ORDER BY id",
            filter.clause
        ),
        filter.params,
        |row| {
            Ok(StudyThresholds {
                study_id: row.get(0)?,
                min_classifications_per_post: row.get(1)?,
                validation_agreement_percent: row.get(2)?,
            })
        },
    )?;

    let filter = ScopeFilter::new(scope, "study_id = ?1");
    let posts = query_all(
        conn,
        &format!("SELECT id, study_id FROM posts WHERE {}", filter.clause),
        filter.params,
        |row| {
            Ok(PostRef {
                id: row.get(0)?,
                study_id: row.get(1)?,
            })
        },
    )?;

    let filter = ScopeFilter::new(scope, "study_id = ?1");
    let questions = query_all(
        conn,
        &format!("SELECT id, study_id FROM questions WHERE {}", filter.clause),
        filter.params,
        |row| {
            Ok(QuestionRef {
                id: row.get(0)?,
                study_id: row.get(1)?,
            })
        },
    )?;

    let filter = ScopeFilter::new(
        scope,
        "question_id IN (SELECT id FROM questions WHERE study_id = ?1)",
    );
    let categories = query_all(
        conn,
        &format!("SELECT id, question_id FROM categories WHERE {}", filter.clause),
        filter.params,
        |row| {
            Ok(CategoryRef {
                id: row.get(0)?,
                question_id: row.get(1)?,
            })
        },
    )?;

    let filter = ScopeFilter::new(scope, "post_id IN (SELECT id FROM posts WHERE study_id = ?1)");
    let mut params = filter.params;
    let mut sql = format!(
        "SELECT user_id, post_id, question_id, category_id, created_at
         FROM classifications WHERE {}",
        filter.clause
    );
    if let Some(user_id) = voter {
        params.push(Value::Text(user_id.to_string()));
        sql.push_str(&format!(
            " AND (post_id, question_id) IN
                (SELECT post_id, question_id FROM classifications WHERE user_id = ?{})",
            params.len()
        ));
    }
    let raw = query_all(conn, &sql, params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let votes = raw
        .into_iter()
        .filter_map(|(user_id, post_id, question_id, category_id, created_at)| {
            let user_id = match user_id.parse::<Uuid>() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping vote with corrupt user_id '{}': {}", user_id, e);
                    return None;
                }
            };
            Some(Vote {
                user_id,
                post_id,
                question_id,
                category_id,
                created_at: parse_timestamp(&created_at),
            })
        })
        .collect();

    Ok(Snapshot {
        votes,
        studies,
        posts,
        questions,
        categories,
    })
}

fn query_all<T, F>(conn: &Connection, sql: &str, params: Vec<Value>, map: F) -> Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}': {}", raw, e);
            chrono::DateTime::default()
        })
}
