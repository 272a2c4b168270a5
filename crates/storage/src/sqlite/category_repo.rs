use cc_core::model::{Category, Question};

use super::SqliteRepository;
use super::mapping::{conn, map_category_row, write_err};
use crate::repository::{CatalogWriter, CategoryRepository, StorageError};

#[async_trait::async_trait]
impl CategoryRepository for SqliteRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, description, sort_order, created_at
            FROM categories
            ORDER BY sort_order ASC, name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            categories.push(map_category_row(&row)?);
        }
        Ok(categories)
    }
}

#[async_trait::async_trait]
impl CatalogWriter for SqliteRepository {
    async fn upsert_category(&self, category: &Category) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO categories (id, name, description, sort_order, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                sort_order = excluded.sort_order
            ",
        )
        .bind(category.id().to_string())
        .bind(category.name().to_owned())
        .bind(category.description().map(str::to_owned))
        .bind(i64::from(category.sort_order()))
        .bind(category.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (id, category_id, text, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert
                category_id = excluded.category_id,
                text = excluded.text,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            ",
        )
        .bind(question.id().to_string())
        .bind(question.category_id().to_string())
        .bind(question.text().to_owned())
        .bind(question.is_active())
        .bind(question.created_at())
        .bind(question.updated_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }
}
