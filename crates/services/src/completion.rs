use std::sync::Arc;

use tracing::{debug, warn};

use cc_core::Clock;
use cc_core::model::{CompletionUpdate, QuestionId, QuestionWithCategory};
use storage::repository::{CompletionRepository, QuestionRepository};

use crate::error::ServiceError;
use crate::session_gate::{RequestContext, SessionGate};

/// Records and lists per-user completion marks.
#[derive(Clone)]
pub struct CompletionTracker {
    clock: Clock,
    gate: Arc<dyn SessionGate>,
    completions: Arc<dyn CompletionRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl CompletionTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        gate: Arc<dyn SessionGate>,
        completions: Arc<dyn CompletionRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            gate,
            completions,
            questions,
        }
    }

    /// Mark a question complete or incomplete for the signed-in user.
    ///
    /// Repeating the same call leaves a single mark with the same flag; the
    /// timestamp moves to now.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unauthenticated` without a store call when no
    /// session resolves, or `ServiceError::Upstream` if the write fails.
    pub async fn set_question_completion(
        &self,
        ctx: &RequestContext,
        question_id: QuestionId,
        completed: bool,
    ) -> Result<(), ServiceError> {
        let session = self
            .gate
            .resolve_session(ctx)
            .ok_or(ServiceError::Unauthenticated)?;

        let update = CompletionUpdate {
            user_id: session.user_id,
            question_id,
            completed,
            updated_at: self.clock.now(),
        };
        self.completions
            .upsert_completion(update)
            .await
            .inspect_err(|err| warn!(error = %err, question = %question_id, "completion write failed"))?;
        debug!(user = %session.user_id, question = %question_id, completed, "completion saved");
        Ok(())
    }

    /// Questions the user has marked complete, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unauthenticated` or `ServiceError::Upstream`.
    pub async fn list_completed_questions(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<QuestionWithCategory>, ServiceError> {
        let session = self
            .gate
            .resolve_session(ctx)
            .ok_or(ServiceError::Unauthenticated)?;

        let mut marks = self
            .completions
            .completions_for_user(session.user_id)
            .await
            .inspect_err(|err| warn!(error = %err, "completion fetch failed"))?;
        marks.retain(|mark| mark.completed);
        marks.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.question_id.cmp(&b.question_id))
        });

        if marks.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<QuestionId> = marks.iter().map(|mark| mark.question_id).collect();
        let found = self
            .questions
            .questions_by_ids(&ids)
            .await
            .inspect_err(|err| warn!(error = %err, "question fetch failed"))?;
        Ok(found)
    }
}
