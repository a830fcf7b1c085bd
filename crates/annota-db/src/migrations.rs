use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            role        TEXT NOT NULL DEFAULT 'user',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS studies (
            id                              INTEGER PRIMARY KEY AUTOINCREMENT,
            name                            TEXT NOT NULL,
            added_by                        TEXT REFERENCES users(id) ON DELETE SET NULL,
            min_classifications_per_post    INTEGER,
            validation_agreement_percent    INTEGER,
            created_at                      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS study_members (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            study_id    INTEGER NOT NULL REFERENCES studies(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, study_id)
        );

        CREATE INDEX IF NOT EXISTS idx_study_members_study
            ON study_members(study_id);

        CREATE TABLE IF NOT EXISTS questions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            study_id    INTEGER NOT NULL REFERENCES studies(id) ON DELETE CASCADE,
            question    TEXT NOT NULL,
            input_type  TEXT NOT NULL DEFAULT 'radio',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS categories (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id     INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            category_type   TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            study_id    INTEGER NOT NULL REFERENCES studies(id) ON DELETE CASCADE,
            post_link   TEXT,
            details     TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS classifications (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, post_id, question_id, category_id)
        );

        CREATE INDEX IF NOT EXISTS idx_classifications_pair
            ON classifications(post_id, question_id);

        CREATE INDEX IF NOT EXISTS idx_classifications_user
            ON classifications(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
