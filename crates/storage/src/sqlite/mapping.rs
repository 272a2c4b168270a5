use cc_core::model::{
    Category, CategoryId, CompletionId, CompletionMark, Question, QuestionId,
    QuestionWithCategory, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn parse_id<T>(row: &SqliteRow, column: &'static str) -> Result<T, StorageError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(ser)?;
    raw.parse::<T>().map_err(ser)
}

pub(crate) fn map_category_row(row: &SqliteRow) -> Result<Category, StorageError> {
    let sort_order: i64 = row.try_get("sort_order").map_err(ser)?;
    let sort_order = i32::try_from(sort_order)
        .map_err(|_| StorageError::Serialization(format!("sort_order overflow: {sort_order}")))?;

    Ok(Category::from_persisted(
        parse_id::<CategoryId>(row, "id")?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        sort_order,
        row.try_get("created_at").map_err(ser)?,
    ))
}

/// Maps a question row that carries a `category_name` column from a
/// `LEFT JOIN categories`.
pub(crate) fn map_question_row(row: &SqliteRow) -> Result<QuestionWithCategory, StorageError> {
    let question = Question::from_persisted(
        parse_id::<QuestionId>(row, "id")?,
        parse_id::<CategoryId>(row, "category_id")?,
        row.try_get::<String, _>("text").map_err(ser)?,
        row.try_get::<bool, _>("is_active").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    );

    let category_name: Option<String> = row.try_get("category_name").map_err(ser)?;
    Ok(QuestionWithCategory::new(question, category_name))
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<CompletionMark, StorageError> {
    Ok(CompletionMark {
        id: parse_id::<CompletionId>(row, "id")?,
        user_id: parse_id::<UserId>(row, "user_id")?,
        question_id: parse_id::<QuestionId>(row, "question_id")?,
        completed: row.try_get::<bool, _>("completed").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

/// Maps a failed write; a dangling foreign key means the referenced row is missing.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    let dangling = e
        .as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation());
    if dangling { StorageError::NotFound } else { conn(e) }
}

/// Builds `?{start}, ?{start+1}, ...` for an `IN (...)` list of `count` binds.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
