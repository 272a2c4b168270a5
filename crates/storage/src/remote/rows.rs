use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cc_core::model::{
    Category, CategoryId, CompletionId, CompletionMark, CompletionUpdate, Question, QuestionId,
    QuestionWithCategory, UserId,
};

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl CategoryRow {
    pub(crate) fn into_category(self) -> Category {
        Category::from_persisted(
            CategoryId::new(self.id),
            self.name,
            self.description,
            self.sort_order,
            self.created_at,
        )
    }
}

/// Embedded `categories(name)` resource on a question row.
#[derive(Debug, Deserialize)]
pub(crate) struct CategoryNameRow {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionRow {
    id: Uuid,
    category_id: Uuid,
    text: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    categories: Option<CategoryNameRow>,
}

impl QuestionRow {
    pub(crate) fn into_joined(self) -> QuestionWithCategory {
        let question = Question::from_persisted(
            QuestionId::new(self.id),
            CategoryId::new(self.category_id),
            self.text,
            self.is_active,
            self.created_at,
            self.updated_at,
        );
        let name = self.categories.and_then(|c| c.name);
        QuestionWithCategory::new(question, name)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionRow {
    id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl From<CompletionRow> for CompletionMark {
    fn from(row: CompletionRow) -> Self {
        Self {
            id: CompletionId::new(row.id),
            user_id: UserId::new(row.user_id),
            question_id: QuestionId::new(row.question_id),
            completed: row.completed,
            updated_at: row.updated_at,
        }
    }
}

/// Body of the completion upsert. The store fills in `id` on insert.
#[derive(Debug, Serialize)]
pub(crate) struct CompletionUpsertRow {
    user_id: Uuid,
    question_id: Uuid,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl From<CompletionUpdate> for CompletionUpsertRow {
    fn from(update: CompletionUpdate) -> Self {
        Self {
            user_id: update.user_id.value(),
            question_id: update.question_id.value(),
            completed: update.completed,
            updated_at: update.updated_at,
        }
    }
}
