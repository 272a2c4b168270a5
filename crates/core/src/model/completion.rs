use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CompletionId, QuestionId, UserId};

/// A user's done/not-done flag for one question.
///
/// At most one mark exists per `(user_id, question_id)`; storage adapters
/// upsert on that pair and never delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMark {
    pub id: CompletionId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Write-side shape of a completion toggle. The store assigns the row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionUpdate {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}
