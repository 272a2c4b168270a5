use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, QuestionId};

/// Display name used when a question's category join comes back empty.
pub const UNKNOWN_CATEGORY_NAME: &str = "Unknown";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("updated_at is before created_at")]
    InvalidTimeRange,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single conversation prompt belonging to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    category_id: CategoryId,
    text: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Question {
    /// Build a question that is about to be written, e.g. by the seed tool.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` for blank prompts and
    /// `QuestionError::InvalidTimeRange` if `updated_at < created_at`.
    pub fn new(
        id: QuestionId,
        category_id: CategoryId,
        text: impl Into<String>,
        is_active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if updated_at < created_at {
            return Err(QuestionError::InvalidTimeRange);
        }
        Ok(Self::from_persisted(
            id,
            category_id,
            text.trim(),
            is_active,
            created_at,
            updated_at,
        ))
    }

    /// Rehydrate a question exactly as the store holds it.
    ///
    /// The catalog is maintained outside the application, so stored rows are
    /// taken as-is rather than re-validated.
    #[must_use]
    pub fn from_persisted(
        id: QuestionId,
        category_id: CategoryId,
        text: impl Into<String>,
        is_active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            category_id,
            text: text.into(),
            is_active,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A question joined with its category's display name.
///
/// This is the record shape handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionWithCategory {
    #[serde(flatten)]
    question: Question,
    category_name: String,
}

impl QuestionWithCategory {
    /// Pair a question with the name from its category join.
    ///
    /// A missing or blank name falls back to [`UNKNOWN_CATEGORY_NAME`].
    #[must_use]
    pub fn new(question: Question, category_name: Option<String>) -> Self {
        let category_name = category_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_CATEGORY_NAME.to_owned());
        Self {
            question,
            category_name,
        }
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.question.id
    }

    #[must_use]
    pub fn category_id(&self) -> CategoryId {
        self.question.category_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.question.text
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.question.is_active
    }

    #[must_use]
    pub fn category_name(&self) -> &str {
        &self.category_name
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
