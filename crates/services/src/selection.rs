use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use cc_core::model::{QuestionId, QuestionWithCategory, SelectionSet};
use storage::repository::{CompletionRepository, QuestionRepository};

use crate::error::ServiceError;
use crate::session_gate::{RequestContext, SessionGate};

/// Uniform in-place Fisher-Yates shuffle.
///
/// Walks from the last index down to 1, swapping each slot with one drawn
/// uniformly from `0..=i`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Deals the questions a user has not yet completed from a set of categories.
#[derive(Clone)]
pub struct QuestionSelectionService {
    gate: Arc<dyn SessionGate>,
    questions: Arc<dyn QuestionRepository>,
    completions: Arc<dyn CompletionRepository>,
}

impl QuestionSelectionService {
    #[must_use]
    pub fn new(
        gate: Arc<dyn SessionGate>,
        questions: Arc<dyn QuestionRepository>,
        completions: Arc<dyn CompletionRepository>,
    ) -> Self {
        Self {
            gate,
            questions,
            completions,
        }
    }

    /// Active, not-yet-completed questions from `selection`, in random order.
    ///
    /// An empty result means everything in the selection is done.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unauthenticated` before touching the store when no
    /// session resolves, and `ServiceError::Upstream` when a store call fails.
    pub async fn get_incomplete_questions(
        &self,
        ctx: &RequestContext,
        selection: &SelectionSet,
    ) -> Result<Vec<QuestionWithCategory>, ServiceError> {
        let mut remaining = self.fetch_remaining(ctx, selection).await?;
        shuffle(&mut remaining, &mut rand::rng());
        Ok(remaining)
    }

    /// Same as [`Self::get_incomplete_questions`] with a caller-supplied random source.
    ///
    /// # Errors
    ///
    /// See [`Self::get_incomplete_questions`].
    pub async fn get_incomplete_questions_with_rng<R: Rng + ?Sized + Send>(
        &self,
        ctx: &RequestContext,
        selection: &SelectionSet,
        rng: &mut R,
    ) -> Result<Vec<QuestionWithCategory>, ServiceError> {
        let mut remaining = self.fetch_remaining(ctx, selection).await?;
        shuffle(&mut remaining, rng);
        Ok(remaining)
    }

    async fn fetch_remaining(
        &self,
        ctx: &RequestContext,
        selection: &SelectionSet,
    ) -> Result<Vec<QuestionWithCategory>, ServiceError> {
        let session = self
            .gate
            .resolve_session(ctx)
            .ok_or(ServiceError::Unauthenticated)?;

        let categories = selection.to_vec();
        let candidates = self
            .questions
            .active_questions_in(&categories)
            .await
            .inspect_err(|err| warn!(error = %err, "question fetch failed"))?;
        let marks = self
            .completions
            .completions_for_user(session.user_id)
            .await
            .inspect_err(|err| warn!(error = %err, "completion fetch failed"))?;

        let done: HashSet<QuestionId> = marks
            .into_iter()
            .filter(|mark| mark.completed)
            .map(|mark| mark.question_id)
            .collect();

        let fetched = candidates.len();
        let remaining: Vec<_> = candidates
            .into_iter()
            .filter(|q| !done.contains(&q.id()))
            .collect();

        debug!(
            user = %session.user_id,
            categories = categories.len(),
            fetched,
            remaining = remaining.len(),
            "dealt questions"
        );
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn shuffle_keeps_every_element() {
        let mut items: Vec<u32> = (0..20).collect();
        shuffle(&mut items, &mut StdRng::seed_from_u64(7));
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_handles_tiny_slices() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u8> = Vec::new();
        shuffle(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut one = vec![42];
        shuffle(&mut one, &mut rng);
        assert_eq!(one, [42]);
    }

    #[test]
    fn shuffle_is_deterministic_for_a_seed() {
        let mut a: Vec<u32> = (0..10).collect();
        let mut b = a.clone();
        shuffle(&mut a, &mut StdRng::seed_from_u64(99));
        shuffle(&mut b, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
