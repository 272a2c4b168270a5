use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::CategoryId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("select at least one category")]
    Empty,
}

/// The categories a user chose for one browsing session.
///
/// Always non-empty. It is handed from the category picker straight to the
/// question browser and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CategoryId>", into = "Vec<CategoryId>")]
pub struct SelectionSet {
    categories: BTreeSet<CategoryId>,
}

impl SelectionSet {
    /// Build a selection from category ids; duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Empty` when no ids are given.
    pub fn new(ids: impl IntoIterator<Item = CategoryId>) -> Result<Self, SelectionError> {
        let categories: BTreeSet<_> = ids.into_iter().collect();
        if categories.is_empty() {
            return Err(SelectionError::Empty);
        }
        Ok(Self { categories })
    }

    #[must_use]
    pub fn contains(&self, id: CategoryId) -> bool {
        self.categories.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.categories.iter().copied()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<CategoryId> {
        self.iter().collect()
    }
}

impl TryFrom<Vec<CategoryId>> for SelectionSet {
    type Error = SelectionError;

    fn try_from(ids: Vec<CategoryId>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<SelectionSet> for Vec<CategoryId> {
    fn from(set: SelectionSet) -> Self {
        set.categories.into_iter().collect()
    }
}
