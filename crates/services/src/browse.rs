use std::collections::BTreeSet;

use cc_core::model::{
    Category, CategoryId, QuestionId, QuestionWithCategory, SelectionError, SelectionSet,
    sort_for_display,
};

use crate::completion::CompletionTracker;
use crate::error::ServiceError;
use crate::session_gate::RequestContext;

//
// ─── CATEGORY PICKER ───────────────────────────────────────────────────────────
//

/// Builds a [`SelectionSet`] from the category list.
///
/// Starts with every category picked. Choosing "random" deals from all
/// categories and clears individual picks; picking a category individually
/// turns "random" off again.
#[derive(Debug, Clone)]
pub struct CategoryPicker {
    categories: Vec<Category>,
    picked: BTreeSet<CategoryId>,
    random: bool,
}

impl CategoryPicker {
    #[must_use]
    pub fn new(mut categories: Vec<Category>) -> Self {
        sort_for_display(&mut categories);
        let picked = categories.iter().map(Category::id).collect();
        Self {
            categories,
            picked,
            random: false,
        }
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn is_picked(&self, id: CategoryId) -> bool {
        !self.random && self.picked.contains(&id)
    }

    #[must_use]
    pub fn is_random(&self) -> bool {
        self.random
    }

    /// Flip one category. Returns whether it is picked afterwards.
    ///
    /// Ids not in the list are ignored.
    pub fn toggle(&mut self, id: CategoryId) -> bool {
        if !self.categories.iter().any(|c| c.id() == id) {
            return false;
        }
        if self.random {
            self.random = false;
            self.picked.clear();
        }
        if self.picked.remove(&id) {
            false
        } else {
            self.picked.insert(id);
            true
        }
    }

    pub fn choose_random(&mut self) {
        self.random = true;
        self.picked.clear();
    }

    pub fn pick_all(&mut self) {
        self.random = false;
        self.picked = self.categories.iter().map(Category::id).collect();
    }

    /// The selection to deal from.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Empty` when nothing is picked, or when "random"
    /// is chosen but there are no categories at all.
    pub fn start(&self) -> Result<SelectionSet, SelectionError> {
        if self.random {
            SelectionSet::new(self.categories.iter().map(Category::id))
        } else {
            SelectionSet::new(self.picked.iter().copied())
        }
    }
}

//
// ─── CARD DECK ─────────────────────────────────────────────────────────────────
//

/// One dealt card and whether the user has marked it complete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckCard {
    pub question: QuestionWithCategory,
    pub completed: bool,
}

/// Where the user is in the deck, for display as "position of total".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckProgress {
    /// 1-based position of the current card.
    pub position: usize,
    pub total: usize,
    pub completed: usize,
}

/// A completion write that has been started but not yet applied to the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pass the pending toggle to finish_toggle or cancel_toggle"]
pub struct PendingToggle {
    index: usize,
    pub question_id: QuestionId,
    pub completed: bool,
}

/// A browsing session over a dealt list of questions.
///
/// Cards marked complete stay where they are and show as completed so they
/// can be reopened. Only one completion write may be in flight at a time.
#[derive(Debug, Clone, Default)]
pub struct CardDeck {
    cards: Vec<DeckCard>,
    current: usize,
    busy: bool,
}

impl CardDeck {
    #[must_use]
    pub fn new(questions: Vec<QuestionWithCategory>) -> Self {
        let cards = questions
            .into_iter()
            .map(|question| DeckCard {
                question,
                completed: false,
            })
            .collect();
        Self {
            cards,
            current: 0,
            busy: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn cards(&self) -> &[DeckCard] {
        &self.cards
    }

    #[must_use]
    pub fn current(&self) -> Option<&DeckCard> {
        self.cards.get(self.current)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.cards.iter().filter(|card| card.completed).count()
    }

    #[must_use]
    pub fn progress(&self) -> Option<DeckProgress> {
        if self.cards.is_empty() {
            return None;
        }
        Some(DeckProgress {
            position: self.current + 1,
            total: self.cards.len(),
            completed: self.completed_count(),
        })
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current + 1 < self.cards.len()
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    /// Move forward one card. Returns false at the last card.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Move back one card. Returns false at the first card.
    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Claim the busy flag and describe the write that flips the current card.
    ///
    /// # Errors
    ///
    /// `ServiceError::Busy` while another toggle is pending, and
    /// `ServiceError::NoCurrentCard` on an empty deck.
    pub fn begin_toggle(&mut self) -> Result<PendingToggle, ServiceError> {
        if self.busy {
            return Err(ServiceError::Busy);
        }
        let card = self.cards.get(self.current).ok_or(ServiceError::NoCurrentCard)?;
        let pending = PendingToggle {
            index: self.current,
            question_id: card.question.id(),
            completed: !card.completed,
        };
        self.busy = true;
        Ok(pending)
    }

    /// Release the busy flag and apply `outcome`. Returns the card's new flag.
    ///
    /// On failure the card keeps its previous flag and the error is returned.
    ///
    /// # Errors
    ///
    /// Passes `outcome`'s error through.
    pub fn finish_toggle(
        &mut self,
        pending: PendingToggle,
        outcome: Result<(), ServiceError>,
    ) -> Result<bool, ServiceError> {
        self.busy = false;
        outcome?;
        if let Some(card) = self.cards.get_mut(pending.index) {
            card.completed = pending.completed;
        }
        Ok(pending.completed)
    }

    /// Drop a pending toggle without applying it.
    pub fn cancel_toggle(&mut self, _pending: PendingToggle) {
        self.busy = false;
    }

    /// Flip the current card's completion through `tracker`.
    ///
    /// # Errors
    ///
    /// `ServiceError::Busy`, `ServiceError::NoCurrentCard`, or whatever the
    /// tracker returns.
    pub async fn toggle_current(
        &mut self,
        tracker: &CompletionTracker,
        ctx: &RequestContext,
    ) -> Result<bool, ServiceError> {
        let pending = self.begin_toggle()?;
        let outcome = tracker
            .set_question_completion(ctx, pending.question_id, pending.completed)
            .await;
        self.finish_toggle(pending, outcome)
    }
}
