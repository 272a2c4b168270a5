use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::CategoryId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CategoryError {
    #[error("category name cannot be empty")]
    EmptyName,
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// A labeled grouping of questions.
///
/// Categories are maintained outside the application and never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    description: Option<String>,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl Category {
    /// Creates a new Category for writing, e.g. from the seed tool.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        description: Option<String>,
        sort_order: i32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CategoryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CategoryError::EmptyName);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            description,
            sort_order,
            created_at,
        })
    }

    /// Rehydrate a category exactly as the store holds it.
    #[must_use]
    pub fn from_persisted(
        id: CategoryId,
        name: impl Into<String>,
        description: Option<String>,
        sort_order: i32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description,
            sort_order,
            created_at,
        }
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> CategoryId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Sorts categories into presentation order: ascending sort key, then name,
/// then id so equal keys still come out in a stable order.
pub fn sort_for_display(categories: &mut [Category]) {
    categories.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
