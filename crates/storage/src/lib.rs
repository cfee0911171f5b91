use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{AgendaId, VoteChoice, VoteId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredAgenda {
    pub agenda_id: AgendaId,
    pub name: String,
    pub duration_minutes: i64,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct StoredVote {
    pub vote_id: VoteId,
    pub agenda_id: AgendaId,
    pub associate: String,
    pub choice: VoteChoice,
    pub cast_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // An in-memory database exists per connection; cap the pool at one
        // so every handle sees the same schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Inserts a new agenda with the start time unset. Returns `None` when
    /// the unique index on the name rejects the insert.
    pub async fn insert_agenda(
        &self,
        name: &str,
        duration_minutes: i64,
    ) -> Result<Option<StoredAgenda>> {
        let row = sqlx::query(
            "INSERT INTO agendas (name, duration_minutes) VALUES (?, ?)
             ON CONFLICT(name) DO NOTHING
             RETURNING id, name, duration_minutes, start_time",
        )
        .bind(name)
        .bind(duration_minutes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(agenda_from_row))
    }

    pub async fn find_agenda(&self, agenda_id: AgendaId) -> Result<Option<StoredAgenda>> {
        let row =
            sqlx::query("SELECT id, name, duration_minutes, start_time FROM agendas WHERE id = ?")
                .bind(agenda_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.as_ref().map(agenda_from_row))
    }

    /// Stamps the start time on an agenda that has never been started.
    /// Returns `true` iff this call performed the transition; a concurrent
    /// caller that already set the start time leaves nothing to update.
    pub async fn start_agenda(
        &self,
        agenda_id: AgendaId,
        started_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated =
            sqlx::query("UPDATE agendas SET start_time = ? WHERE id = ? AND start_time IS NULL")
                .bind(started_at)
                .bind(agenda_id.0)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(updated > 0)
    }

    /// Inserts a vote. Returns `None` when the unique index on
    /// (agenda_id, associate) rejects the insert.
    pub async fn insert_vote(
        &self,
        agenda_id: AgendaId,
        associate: &str,
        choice: VoteChoice,
    ) -> Result<Option<StoredVote>> {
        let row = sqlx::query(
            "INSERT INTO votes (agenda_id, associate, choice) VALUES (?, ?, ?)
             ON CONFLICT(agenda_id, associate) DO NOTHING
             RETURNING id, agenda_id, associate, choice, cast_at",
        )
        .bind(agenda_id.0)
        .bind(associate)
        .bind(choice_column(choice))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(vote_from_row))
    }

    pub async fn find_vote(
        &self,
        associate: &str,
        agenda_id: AgendaId,
    ) -> Result<Option<StoredVote>> {
        let row = sqlx::query(
            "SELECT id, agenda_id, associate, choice, cast_at
             FROM votes
             WHERE associate = ? AND agenda_id = ?",
        )
        .bind(associate)
        .bind(agenda_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(vote_from_row))
    }

    pub async fn list_votes_for_agenda(&self, agenda_id: AgendaId) -> Result<Vec<StoredVote>> {
        let rows = sqlx::query(
            "SELECT id, agenda_id, associate, choice, cast_at
             FROM votes
             WHERE agenda_id = ?
             ORDER BY id ASC",
        )
        .bind(agenda_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(vote_from_row).collect())
    }
}

fn agenda_from_row(row: &SqliteRow) -> StoredAgenda {
    StoredAgenda {
        agenda_id: AgendaId(row.get::<i64, _>(0)),
        name: row.get::<String, _>(1),
        duration_minutes: row.get::<i64, _>(2),
        start_time: row.get::<Option<DateTime<Utc>>, _>(3),
    }
}

fn vote_from_row(row: &SqliteRow) -> StoredVote {
    StoredVote {
        vote_id: VoteId(row.get::<i64, _>(0)),
        agenda_id: AgendaId(row.get::<i64, _>(1)),
        associate: row.get::<String, _>(2),
        choice: match row.get::<String, _>(3).as_str() {
            "negative" => VoteChoice::Negative,
            _ => VoteChoice::Affirmative,
        },
        cast_at: row.get::<DateTime<Utc>, _>(4),
    }
}

fn choice_column(choice: VoteChoice) -> &'static str {
    match choice {
        VoteChoice::Affirmative => "affirmative",
        VoteChoice::Negative => "negative",
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
