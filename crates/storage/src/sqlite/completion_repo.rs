use cc_core::model::{CompletionId, CompletionMark, CompletionUpdate, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_completion_row, write_err};
use crate::repository::{CompletionRepository, StorageError};

#[async_trait::async_trait]
impl CompletionRepository for SqliteRepository {
    async fn completions_for_user(&self, user: UserId) -> Result<Vec<CompletionMark>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, question_id, completed, updated_at
            FROM question_completions
            WHERE user_id = ?1
            ORDER BY updated_at DESC
            ",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut marks = Vec::with_capacity(rows.len());
        for row in rows {
            marks.push(map_completion_row(&row)?);
        }
        Ok(marks)
    }

    async fn upsert_completion(&self, update: CompletionUpdate) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO question_completions (id, user_id, question_id, completed, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, question_id) DO UPDATE SET
                -- the row id stays the one from the first insert
                completed = excluded.completed,
                updated_at = excluded.updated_at
            ",
        )
        .bind(CompletionId::random().to_string())
        .bind(update.user_id.to_string())
        .bind(update.question_id.to_string())
        .bind(update.completed)
        .bind(update.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }
}
