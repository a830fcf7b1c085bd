use std::collections::{HashMap, HashSet};

use crate::models::{QuestionRow, StudyRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, role) VALUES (?1, ?2, ?3)",
                (id, username, role),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Usernames for the given user ids. Ids without a user are left out.
    pub fn usernames(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, username FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(id_strings.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, username)| {
                    let id = id
                        .parse::<Uuid>()
                        .map_err(|e| anyhow!("Corrupt user id '{}': {}", id, e))?;
                    Ok((id, username))
                })
                .collect()
        })
    }

    // -- Studies --

    pub fn create_study(
        &self,
        name: &str,
        added_by: Option<&str>,
        min_classifications_per_post: Option<i64>,
        validation_agreement_percent: Option<i64>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO studies (name, added_by, min_classifications_per_post, validation_agreement_percent)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    name,
                    added_by,
                    min_classifications_per_post,
                    validation_agreement_percent
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_study(&self, id: i64) -> Result<Option<StudyRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, added_by, min_classifications_per_post,
                            validation_agreement_percent, created_at
                     FROM studies WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(StudyRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            added_by: row.get(2)?,
                            min_classifications_per_post: row.get(3)?,
                            validation_agreement_percent: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn set_study_thresholds(
        &self,
        id: i64,
        min_classifications_per_post: Option<i64>,
        validation_agreement_percent: Option<i64>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE studies SET min_classifications_per_post = ?2, validation_agreement_percent = ?3
                 WHERE id = ?1",
                rusqlite::params![id, min_classifications_per_post, validation_agreement_percent],
            )?;
            if n == 0 {
                return Err(anyhow!("Study not found: {}", id));
            }
            Ok(())
        })
    }

    // -- Memberships --

    pub fn add_member(&self, user_id: &str, study_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO study_members (user_id, study_id) VALUES (?1, ?2)",
                rusqlite::params![user_id, study_id],
            )?;
            Ok(())
        })
    }

    /// Usernames of everyone sharing at least one study with `user_id`,
    /// the user included when they belong to any study.
    pub fn co_members(&self, user_id: &str) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT u.username
                 FROM study_members me
                 JOIN study_members other ON other.study_id = me.study_id
                 JOIN users u ON u.id = other.user_id
                 WHERE me.user_id = ?1",
            )?;
            let names = stmt
                .query_map([user_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(names)
        })
    }

    // -- Questions, categories, posts --

    pub fn create_question(&self, study_id: i64, question: &str, input_type: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO questions (study_id, question, input_type) VALUES (?1, ?2, ?3)",
                rusqlite::params![study_id, question, input_type],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn create_category(
        &self,
        question_id: i64,
        name: &str,
        category_type: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (question_id, name, category_type) VALUES (?1, ?2, ?3)",
                rusqlite::params![question_id, name, category_type],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn create_post(&self, study_id: i64, post_link: Option<&str>, details: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (study_id, post_link, details) VALUES (?1, ?2, ?3)",
                rusqlite::params![study_id, post_link, details],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Remove a post and, by cascade, every vote on it.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? > 0))
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, role, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                role: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_question(conn: &Connection, id: i64) -> Result<Option<QuestionRow>> {
    let row = conn
        .query_row(
            "SELECT id, study_id, question, input_type FROM questions WHERE id = ?1",
            [id],
            |row| {
                Ok(QuestionRow {
                    id: row.get(0)?,
                    study_id: row.get(1)?,
                    question: row.get(2)?,
                    input_type: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}
