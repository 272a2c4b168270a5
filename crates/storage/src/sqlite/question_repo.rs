use cc_core::model::{CategoryId, QuestionId, QuestionWithCategory};

use super::SqliteRepository;
use super::mapping::{conn, map_question_row, placeholders};
use crate::repository::{QuestionRepository, StorageError};

const SELECT_JOINED: &str = r"
    SELECT
        q.id, q.category_id, q.text, q.is_active, q.created_at, q.updated_at,
        c.name AS category_name
    FROM questions q
    LEFT JOIN categories c ON c.id = q.category_id
";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn active_questions_in(
        &self,
        categories: &[CategoryId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{SELECT_JOINED} WHERE q.is_active = 1 AND q.category_id IN ({}) ORDER BY q.created_at ASC, q.id ASC",
            placeholders(1, categories.len())
        );
        let mut q = sqlx::query(&sql);
        for id in categories {
            q = q.bind(id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;
        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(map_question_row(&row)?);
        }
        Ok(questions)
    }

    async fn questions_by_ids(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{SELECT_JOINED} WHERE q.id IN ({})",
            placeholders(1, ids.len())
        );
        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;
        let mut by_id = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id(), question);
        }

        // Preserve the caller's order; skip ids with no row.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
