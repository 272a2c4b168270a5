use async_trait::async_trait;
use cc_core::model::{
    Category, CategoryId, CompletionId, CompletionMark, CompletionUpdate, Question, QuestionId,
    QuestionWithCategory, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store rejected request ({status}): {message}")]
    Remote { status: u16, message: String },
}

/// Read access to the category catalog.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// List every category. Order is adapter-defined; callers sort for display.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;
}

/// Read access to questions joined with their category name.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetch active questions whose category is one of `categories`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn active_questions_in(
        &self,
        categories: &[CategoryId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError>;

    /// Fetch questions by id regardless of their active flag.
    ///
    /// Ids with no matching row are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn questions_by_ids(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError>;
}

/// Per-user completion marks, keyed by `(user_id, question_id)`.
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Fetch every completion mark belonging to `user`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn completions_for_user(&self, user: UserId) -> Result<Vec<CompletionMark>, StorageError>;

    /// Insert or overwrite the mark for `(update.user_id, update.question_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist, or
    /// other storage errors if the write fails.
    async fn upsert_completion(&self, update: CompletionUpdate) -> Result<(), StorageError>;
}

/// Write access to the catalog, for seeding and tests.
///
/// The hosted store maintains its catalog out of band, so only the local
/// adapters implement this.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    /// Persist or update a category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the category cannot be stored.
    async fn upsert_category(&self, category: &Category) -> Result<(), StorageError>;

    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;
}

#[derive(Default)]
struct MemoryState {
    categories: HashMap<CategoryId, Category>,
    questions: HashMap<QuestionId, Question>,
    completions: HashMap<(UserId, QuestionId), CompletionMark>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// `set_offline(true)` makes every call fail with `StorageError::Connection`,
/// and `calls()` counts trait calls so tests can assert the store was never hit.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of repository trait calls served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of completion rows currently stored for `(user, question)`.
    ///
    /// Always 0 or 1; exposed so tests can check upserts never duplicate.
    #[must_use]
    pub fn completion_rows(&self, user: UserId, question: QuestionId) -> usize {
        self.state
            .lock()
            .map(|s| {
                s.completions
                    .values()
                    .filter(|m| m.user_id == user && m.question_id == question)
                    .count()
            })
            .unwrap_or(0)
    }

    fn enter(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("store offline".into()));
        }
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn join_category(state: &MemoryState, question: &Question) -> QuestionWithCategory {
    let name = state
        .categories
        .get(&question.category_id())
        .map(|c| c.name().to_owned());
    QuestionWithCategory::new(question.clone(), name)
}

#[async_trait]
impl CategoryRepository for InMemoryRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let guard = self.enter()?;
        Ok(guard.categories.values().cloned().collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn active_questions_in(
        &self,
        categories: &[CategoryId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError> {
        let guard = self.enter()?;
        let mut found: Vec<_> = guard
            .questions
            .values()
            .filter(|q| q.is_active() && categories.contains(&q.category_id()))
            .map(|q| join_category(&guard, q))
            .collect();
        found.sort_by_key(|q| (q.question().created_at(), q.id()));
        Ok(found)
    }

    async fn questions_by_ids(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError> {
        let guard = self.enter()?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.questions.get(id))
            .map(|q| join_category(&guard, q))
            .collect())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn completions_for_user(&self, user: UserId) -> Result<Vec<CompletionMark>, StorageError> {
        let guard = self.enter()?;
        Ok(guard
            .completions
            .values()
            .filter(|m| m.user_id == user)
            .cloned()
            .collect())
    }

    async fn upsert_completion(&self, update: CompletionUpdate) -> Result<(), StorageError> {
        let mut guard = self.enter()?;
        if !guard.questions.contains_key(&update.question_id) {
            return Err(StorageError::NotFound);
        }
        guard
            .completions
            .entry((update.user_id, update.question_id))
            .and_modify(|mark| {
                mark.completed = update.completed;
                mark.updated_at = update.updated_at;
            })
            .or_insert_with(|| CompletionMark {
                id: CompletionId::random(),
                user_id: update.user_id,
                question_id: update.question_id,
                completed: update.completed,
                updated_at: update.updated_at,
            });
        Ok(())
    }
}

#[async_trait]
impl CatalogWriter for InMemoryRepository {
    async fn upsert_category(&self, category: &Category) -> Result<(), StorageError> {
        let mut guard = self.enter()?;
        guard.categories.insert(category.id(), category.clone());
        Ok(())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.enter()?;
        guard.questions.insert(question.id(), question.clone());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub categories: Arc<dyn CategoryRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub completions: Arc<dyn CompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryRepository::new())
    }

    /// Share an existing in-memory repository, e.g. one a test has seeded.
    #[must_use]
    pub fn from_memory(repo: InMemoryRepository) -> Self {
        let categories: Arc<dyn CategoryRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CompletionRepository> = Arc::new(repo);
        Self {
            categories,
            questions,
            completions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::time::fixed_now;
    use chrono::Duration;

    fn category(id: u128, name: &str) -> Category {
        Category::new(CategoryId::from_u128(id), name, None, 0, fixed_now()).unwrap()
    }

    fn question(id: u128, category: u128, active: bool) -> Question {
        Question::new(
            QuestionId::from_u128(id),
            CategoryId::from_u128(category),
            format!("Question {id}"),
            active,
            fixed_now(),
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn active_questions_filter_by_category_and_flag() {
        let repo = InMemoryRepository::new();
        repo.upsert_category(&category(1, "Past")).await.unwrap();
        repo.upsert_category(&category(2, "Future")).await.unwrap();
        repo.upsert_question(&question(10, 1, true)).await.unwrap();
        repo.upsert_question(&question(11, 1, false)).await.unwrap();
        repo.upsert_question(&question(12, 2, true)).await.unwrap();

        let found = repo
            .active_questions_in(&[CategoryId::from_u128(1)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), QuestionId::from_u128(10));
        assert_eq!(found[0].category_name(), "Past");
    }

    #[tokio::test]
    async fn upsert_completion_keeps_one_row_per_pair() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(&question(10, 1, true)).await.unwrap();
        let user = UserId::from_u128(7);
        let qid = QuestionId::from_u128(10);

        for (completed, offset) in [(true, 0), (true, 1), (false, 2)] {
            repo.upsert_completion(CompletionUpdate {
                user_id: user,
                question_id: qid,
                completed,
                updated_at: fixed_now() + Duration::seconds(offset),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.completion_rows(user, qid), 1);
        let marks = repo.completions_for_user(user).await.unwrap();
        assert_eq!(marks.len(), 1);
        assert!(!marks[0].completed);
        assert_eq!(marks[0].updated_at, fixed_now() + Duration::seconds(2));
    }

    #[tokio::test]
    async fn upsert_completion_for_unknown_question_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .upsert_completion(CompletionUpdate {
                user_id: UserId::from_u128(1),
                question_id: QuestionId::from_u128(99),
                completed: true,
                updated_at: fixed_now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn offline_repository_fails_and_counts_calls() {
        let repo = InMemoryRepository::new();
        repo.set_offline(true);
        let err = repo.list_categories().await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
        assert_eq!(repo.calls(), 1);
    }
}
