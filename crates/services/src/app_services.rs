use std::sync::Arc;

use tracing::info;

use cc_core::model::UserId;
use storage::remote::RemoteConfig;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog::CatalogService;
use crate::completion::CompletionTracker;
use crate::error::AppServicesError;
use crate::identity::{AuthService, IdentityProvider, SupabaseAuth};
use crate::selection::QuestionSelectionService;
use crate::session_gate::{SessionGate, SessionSlot, StaticGate};

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    gate: Arc<dyn SessionGate>,
    catalog: Arc<CatalogService>,
    selection: Arc<QuestionSelectionService>,
    completions: Arc<CompletionTracker>,
    auth: Option<Arc<AuthService>>,
}

impl AppServices {
    /// Wire services over an existing `Storage` and gate.
    #[must_use]
    pub fn new(storage: &Storage, gate: Arc<dyn SessionGate>, clock: Clock) -> Self {
        let catalog = Arc::new(CatalogService::new(
            Arc::clone(&gate),
            Arc::clone(&storage.categories),
        ));
        let selection = Arc::new(QuestionSelectionService::new(
            Arc::clone(&gate),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.completions),
        ));
        let completions = Arc::new(CompletionTracker::new(
            clock,
            Arc::clone(&gate),
            Arc::clone(&storage.completions),
            Arc::clone(&storage.questions),
        ));
        Self {
            gate,
            catalog,
            selection,
            completions,
            auth: None,
        }
    }

    /// Build services backed by `SQLite` storage, acting as one local user.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn sqlite(db_url: &str, user_id: UserId, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        info!(user = %user_id, "using local database");
        Ok(Self::new(&storage, Arc::new(StaticGate::new(user_id)), clock))
    }

    /// Sign in to the hosted project and build services backed by it.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Identity` if sign-in fails, or
    /// `AppServicesError::Remote` if the store client cannot be built.
    pub async fn remote(
        config: RemoteConfig,
        email: &str,
        password: &str,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(SupabaseAuth::new(config.clone(), clock)?);
        Self::remote_with_provider(config, provider, email, password, clock).await
    }

    /// Like [`Self::remote`] with a caller-supplied identity provider.
    ///
    /// # Errors
    ///
    /// See [`Self::remote`].
    pub async fn remote_with_provider(
        config: RemoteConfig,
        provider: Arc<dyn IdentityProvider>,
        email: &str,
        password: &str,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let slot = SessionSlot::new(clock);
        let auth = AuthService::new(provider, slot.clone());
        let session = auth.sign_in(email, password).await?;
        let storage = Storage::remote(config, &session.access_token)?;

        let mut services = Self::new(&storage, Arc::new(slot), clock);
        services.auth = Some(Arc::new(auth));
        Ok(services)
    }

    #[must_use]
    pub fn gate(&self) -> Arc<dyn SessionGate> {
        Arc::clone(&self.gate)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn selection(&self) -> Arc<QuestionSelectionService> {
        Arc::clone(&self.selection)
    }

    #[must_use]
    pub fn completions(&self) -> Arc<CompletionTracker> {
        Arc::clone(&self.completions)
    }

    /// Present only when the services were built against the hosted project.
    #[must_use]
    pub fn auth(&self) -> Option<Arc<AuthService>> {
        self.auth.clone()
    }
}
