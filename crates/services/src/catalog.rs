use std::sync::Arc;

use tracing::warn;

use cc_core::model::{Category, sort_for_display};
use storage::repository::CategoryRepository;

use crate::error::ServiceError;
use crate::session_gate::{RequestContext, SessionGate};

/// Read access to the category list shown in the picker.
#[derive(Clone)]
pub struct CatalogService {
    gate: Arc<dyn SessionGate>,
    categories: Arc<dyn CategoryRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(gate: Arc<dyn SessionGate>, categories: Arc<dyn CategoryRepository>) -> Self {
        Self { gate, categories }
    }

    /// All categories, ascending by sort key.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unauthenticated` without a session, or
    /// `ServiceError::Upstream` if the store fails.
    pub async fn list_categories(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<Category>, ServiceError> {
        self.gate
            .resolve_session(ctx)
            .ok_or(ServiceError::Unauthenticated)?;
        let mut categories = self
            .categories
            .list_categories()
            .await
            .inspect_err(|err| warn!(error = %err, "category fetch failed"))?;
        sort_for_display(&mut categories);
        Ok(categories)
    }
}
